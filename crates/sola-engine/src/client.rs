use std::sync::Arc;
use std::thread;

use serde_json::{json, Map, Value};
use sola_contracts::categories::prompt_helper_for;
use sola_contracts::models::ModelRegistry;
use sola_contracts::pins::{HexColor, ImagePayload};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::providers::{
    reply_object, GenerativeProvider, ImageRequest, TextRequest, VisionRequest,
};

pub const FALLBACK_POSTER_TITLE: &str = "UNTITLED";
pub const FALLBACK_POSTER_SUBTITLE: &str = "The void stares back.";
/// `#E35336`.
pub const FALLBACK_ACCENT_RGB: (u8, u8, u8) = (0xE3, 0x53, 0x36);

pub const REMOTE_IMAGE_TITLE: &str = "Aesthetic Vision";
pub const REMOTE_IMAGE_DESCRIPTION: &str = "A curated moment of beauty captured in time.";
pub const EMPTY_ANALYSIS_TITLE: &str = "Generated Art";
pub const EMPTY_ANALYSIS_DESCRIPTION: &str = "An AI generated masterpiece.";
pub const FAILED_ANALYSIS_TITLE: &str = "Mystery Vibe";
pub const FAILED_ANALYSIS_DESCRIPTION: &str = "Beauty beyond words.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkMetadata {
    pub title: String,
    pub subtitle: String,
    pub accent_color: HexColor,
    pub art_prompt: String,
}

impl ArtworkMetadata {
    fn fallback(concept: &str) -> Self {
        let (r, g, b) = FALLBACK_ACCENT_RGB;
        Self {
            title: FALLBACK_POSTER_TITLE.to_string(),
            subtitle: FALLBACK_POSTER_SUBTITLE.to_string(),
            accent_color: HexColor::rgb(r, g, b),
            art_prompt: concept.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAnalysis {
    pub title: String,
    pub description: String,
}

impl ImageAnalysis {
    fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Single point of contact with the generative backend. Every operation has a
/// total fallback except `synthesize_images`, which reports an empty batch.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerativeProvider>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn GenerativeProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn refine_prompt(&self, category: &str, user_idea: &str) -> String {
        let request = TextRequest {
            model: self.config.text_model.clone(),
            prompt: refine_instruction(category, user_idea),
            response_schema: None,
        };
        match self.provider.complete_text(&request) {
            Ok(text) => {
                let refined = text.trim();
                if refined.is_empty() {
                    return format!("{user_idea}, {category} style, aesthetic, 8k");
                }
                refined.to_string()
            }
            Err(err) => {
                debug!("prompt refinement failed, using raw idea: {err:#}");
                format!("{user_idea}, {category} style, high quality")
            }
        }
    }

    /// Issues `count` image requests one after another, pausing
    /// `request_delay` between them. Individual failures are skipped.
    pub fn synthesize_images(
        &self,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<ImagePayload>, GenerationError> {
        let count = count.max(1);
        let image_size = self
            .image_model_accepts_size()
            .then(|| "1K".to_string());
        let mut images = Vec::with_capacity(count);
        for index in 0..count {
            let request = ImageRequest {
                model: self.config.image_model.clone(),
                prompt: prompt.to_string(),
                aspect_ratio: self.config.aspect_ratio.clone(),
                image_size: image_size.clone(),
                index,
            };
            match self.provider.generate_image(&request) {
                Ok(Some(image)) => images.push(image),
                Ok(None) => warn!(
                    "generation {}/{} for {} returned no image",
                    index + 1,
                    count,
                    self.config.image_model
                ),
                Err(err) => warn!(
                    "generation {}/{} failed for {}: {err:#}",
                    index + 1,
                    count,
                    self.config.image_model
                ),
            }
            if index + 1 < count && !self.config.request_delay.is_zero() {
                thread::sleep(self.config.request_delay);
            }
        }
        if images.is_empty() {
            return Err(GenerationError::NoImages { requested: count });
        }
        Ok(images)
    }

    pub fn derive_artwork_metadata(&self, concept: &str) -> ArtworkMetadata {
        let request = TextRequest {
            model: self.config.text_model.clone(),
            prompt: artwork_instruction(concept),
            response_schema: Some(artwork_schema()),
        };
        let reply = match self.provider.complete_text(&request) {
            Ok(reply) => reply,
            Err(err) => {
                debug!("artwork metadata request failed: {err:#}");
                return ArtworkMetadata::fallback(concept);
            }
        };
        parse_artwork_metadata(&reply).unwrap_or_else(|| {
            debug!("artwork metadata reply unusable, using fallback");
            ArtworkMetadata::fallback(concept)
        })
    }

    pub fn analyze_image(&self, payload: &ImagePayload) -> ImageAnalysis {
        let ImagePayload::Inline { mime_type, data } = payload else {
            return ImageAnalysis::new(REMOTE_IMAGE_TITLE, REMOTE_IMAGE_DESCRIPTION);
        };
        let request = VisionRequest {
            model: self.config.text_model.clone(),
            mime_type: mime_type.clone(),
            data: data.clone(),
            instruction: analysis_instruction().to_string(),
            response_schema: Some(analysis_schema()),
        };
        match self.provider.analyze_image(&request) {
            Ok(reply) if reply.trim().is_empty() => {
                ImageAnalysis::new(EMPTY_ANALYSIS_TITLE, EMPTY_ANALYSIS_DESCRIPTION)
            }
            Ok(reply) => parse_analysis(&reply).unwrap_or_else(|| {
                ImageAnalysis::new(FAILED_ANALYSIS_TITLE, FAILED_ANALYSIS_DESCRIPTION)
            }),
            Err(err) => {
                debug!("image analysis failed: {err:#}");
                ImageAnalysis::new(FAILED_ANALYSIS_TITLE, FAILED_ANALYSIS_DESCRIPTION)
            }
        }
    }

    fn image_model_accepts_size(&self) -> bool {
        ModelRegistry::new(None)
            .get(&self.config.image_model)
            .map(|spec| spec.sized_output)
            .unwrap_or(false)
    }
}

fn refine_instruction(category: &str, user_idea: &str) -> String {
    let mut instruction = format!(
        "Create a highly detailed, artistic, and aesthetic image generation prompt based on this category: \"{category}\" and this user idea: \"{user_idea}\".\n\
         The prompt should be optimized for an image generation model.\n\
         Include keywords about lighting, style (e.g., oil painting, 3d render, anime, photography), and mood.\n"
    );
    if let Some(helper) = prompt_helper_for(category) {
        instruction.push_str(&format!("Lean towards this palette: {helper}.\n"));
    }
    instruction.push_str(
        "Output ONLY the prompt string, no markdown, no explanations. Keep it under 50 words.",
    );
    instruction
}

fn artwork_instruction(concept: &str) -> String {
    format!(
        "Analyze this concept: \"{concept}\".\n\
         1. Create a short, punchy, artistic title (max 3 words).\n\
         2. Create a cryptic or poetic subtitle (max 10 words).\n\
         3. Pick a hex color code that fits the mood.\n\
         4. Create a visual art prompt for an image generator.\n\
         Return JSON."
    )
}

fn analysis_instruction() -> &'static str {
    "Analyze this image. Give it a short, poetic 3-word title and a single sentence aesthetic description."
}

fn string_object_schema(fields: &[&str]) -> Value {
    let properties = fields
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "STRING" })))
        .collect::<Map<String, Value>>();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": fields,
    })
}

fn artwork_schema() -> Value {
    string_object_schema(&["title", "subtitle", "accentColor", "artPrompt"])
}

fn analysis_schema() -> Value {
    string_object_schema(&["title", "description"])
}

fn required_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_artwork_metadata(reply: &str) -> Option<ArtworkMetadata> {
    let object = reply_object(reply)?;
    Some(ArtworkMetadata {
        title: required_text(&object, "title")?,
        subtitle: required_text(&object, "subtitle")?,
        accent_color: required_text(&object, "accentColor")?.parse().ok()?,
        art_prompt: required_text(&object, "artPrompt")?,
    })
}

fn parse_analysis(reply: &str) -> Option<ImageAnalysis> {
    let object = reply_object(reply)?;
    Some(ImageAnalysis {
        title: required_text(&object, "title")?,
        description: required_text(&object, "description")?,
    })
}
