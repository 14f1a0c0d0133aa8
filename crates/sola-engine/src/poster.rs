use std::mem;

use sola_contracts::categories::CategoryId;
use sola_contracts::pins::{HexColor, ImagePayload, Pin, PosterData, PosterStyle, Provenance};

use crate::client::{ArtworkMetadata, GenerationClient};
use crate::error::{CycleError, GenerationError, SessionError};

pub const POSTER_FAILURE_MESSAGE: &str =
    "Could not generate artwork. Please try a different prompt.";
pub const POSTER_DESCRIPTION: &str = "Sola Art Lab Original";
pub const POSTER_AUTHOR: &str = "Art Lab";
pub const POSTER_HEIGHT_RATIO: f64 = 1.2;
pub const POSTER_CATEGORY: CategoryId = CategoryId::Atelier;

/// Shortest metadata art prompt used verbatim for synthesis.
const MIN_ART_PROMPT_CHARS: usize = 6;

/// Prompt sent to image synthesis for a concept and its derived metadata.
pub fn poster_art_prompt(concept: &str, metadata: &ArtworkMetadata) -> String {
    if metadata.art_prompt.chars().count() >= MIN_ART_PROMPT_CHARS {
        return metadata.art_prompt.clone();
    }
    format!("{concept}, artistic, 8k, poster art")
}

pub fn default_text_color(style: PosterStyle) -> HexColor {
    match style {
        PosterStyle::Swiss => HexColor::rgb(0xA0, 0x52, 0x2D),
        _ => HexColor::rgb(0xFF, 0xFF, 0xFF),
    }
}

/// Editable poster before it is saved. Edits never touch the network.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterDraft {
    concept: String,
    image: ImagePayload,
    style: PosterStyle,
    title: String,
    subtitle: String,
    accent_color: HexColor,
    text_color: HexColor,
    filter: Option<String>,
    title_size: f64,
}

impl PosterDraft {
    pub fn new(
        concept: &str,
        style: PosterStyle,
        metadata: ArtworkMetadata,
        image: ImagePayload,
    ) -> Self {
        Self {
            concept: concept.to_string(),
            image,
            style,
            title: metadata.title,
            subtitle: metadata.subtitle,
            accent_color: metadata.accent_color,
            text_color: default_text_color(style),
            filter: None,
            title_size: 1.0,
        }
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn image(&self) -> &ImagePayload {
        &self.image
    }

    pub fn style(&self) -> PosterStyle {
        self.style
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn accent_color(&self) -> &HexColor {
        &self.accent_color
    }

    pub fn text_color(&self) -> &HexColor {
        &self.text_color
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn title_size(&self) -> f64 {
        self.title_size
    }

    pub fn set_style(&mut self, style: PosterStyle) {
        self.style = style;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_subtitle(&mut self, subtitle: impl Into<String>) {
        self.subtitle = subtitle.into();
    }

    pub fn set_accent_color(&mut self, value: &str) -> Result<(), SessionError> {
        self.accent_color = parse_color(value)?;
        Ok(())
    }

    pub fn set_text_color(&mut self, value: &str) -> Result<(), SessionError> {
        self.text_color = parse_color(value)?;
        Ok(())
    }

    /// Accepts a preset label or a raw CSS filter expression.
    pub fn set_filter(&mut self, value: &str) {
        self.filter = PosterData::normalize_filter(value);
    }

    /// Returns the stored, clamped size.
    pub fn set_title_size(&mut self, value: f64) -> f64 {
        self.title_size = PosterData::clamp_title_size(value);
        self.title_size
    }

    fn into_pin(self) -> Result<Pin, SessionError> {
        let poster = PosterData {
            style: self.style,
            title: self.title.clone(),
            subtitle: self.subtitle,
            accent_color: self.accent_color,
            overlay_text: true,
            text_color: Some(self.text_color),
            filter: self.filter,
            title_size: self.title_size,
        };
        Pin::new(
            Pin::fresh_id("poster"),
            self.image,
            self.title,
            POSTER_DESCRIPTION,
            POSTER_CATEGORY,
            POSTER_HEIGHT_RATIO,
            Provenance::Generated,
        )
        .map(|pin| pin.with_author(POSTER_AUTHOR).with_poster(poster))
        .map_err(|err| SessionError::Internal(err.to_string()))
    }
}

fn parse_color(value: &str) -> Result<HexColor, SessionError> {
    value
        .parse::<HexColor>()
        .map_err(|_| SessionError::InvalidColor(value.trim().to_string()))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PosterState {
    #[default]
    Idle,
    Drafting {
        concept: String,
        style: PosterStyle,
        /// Metadata kept from a draft whose image never arrived.
        metadata: Option<ArtworkMetadata>,
        failure: Option<String>,
    },
    Editing(PosterDraft),
    Done {
        pin_id: String,
    },
}

impl PosterState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Drafting { .. } => "drafting",
            Self::Editing(_) => "editing",
            Self::Done { .. } => "done",
        }
    }
}

#[derive(Debug, Default)]
pub struct PosterSession {
    state: PosterState,
}

impl PosterSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PosterState {
        &self.state
    }

    pub fn draft_mut(&mut self) -> Result<&mut PosterDraft, SessionError> {
        match &mut self.state {
            PosterState::Editing(draft) => Ok(draft),
            _ => Err(SessionError::NotEditing),
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            PosterState::Drafting { failure, .. } => failure.as_deref(),
            _ => None,
        }
    }

    /// Starts drafting from `Idle`, `Done`, or a failed draft (retry).
    pub fn begin(&mut self, concept: &str, style: PosterStyle) -> Result<(), SessionError> {
        let retryable = match &self.state {
            PosterState::Idle | PosterState::Done { .. } => true,
            PosterState::Drafting { failure, .. } => failure.is_some(),
            PosterState::Editing(_) => false,
        };
        if !retryable {
            return Err(SessionError::Busy);
        }
        let concept = concept.trim();
        if concept.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        self.state = PosterState::Drafting {
            concept: concept.to_string(),
            style,
            metadata: None,
            failure: None,
        };
        Ok(())
    }

    /// Records the draft outcome: the first image opens the editor, an empty
    /// batch leaves the session drafting with a failure message.
    pub fn drafted(
        &mut self,
        metadata: ArtworkMetadata,
        outcome: Result<Vec<ImagePayload>, GenerationError>,
    ) -> Result<(), SessionError> {
        let PosterState::Drafting {
            concept,
            style,
            failure: None,
            ..
        } = &self.state
        else {
            return Err(SessionError::UnexpectedState {
                expected: "drafting",
                actual: self.state.name(),
            });
        };
        let image = outcome.ok().and_then(|images| images.into_iter().next());
        self.state = match image {
            Some(image) => PosterState::Editing(PosterDraft::new(concept, *style, metadata, image)),
            None => PosterState::Drafting {
                concept: concept.clone(),
                style: *style,
                metadata: Some(metadata),
                failure: Some(POSTER_FAILURE_MESSAGE.to_string()),
            },
        };
        Ok(())
    }

    pub fn save(&mut self) -> Result<Pin, SessionError> {
        match &self.state {
            PosterState::Editing(_) => {}
            PosterState::Drafting {
                failure: Some(_), ..
            } => return Err(SessionError::NoDraftImage),
            _ => return Err(SessionError::NotEditing),
        }
        let PosterState::Editing(draft) = mem::take(&mut self.state) else {
            return Err(SessionError::NotEditing);
        };
        let pin = draft.into_pin()?;
        self.state = PosterState::Done {
            pin_id: pin.id().to_string(),
        };
        Ok(pin)
    }

    /// Drops any draft and returns to `Idle`. Returns whether anything was
    /// discarded.
    pub fn reset(&mut self) -> bool {
        let had_draft = !matches!(self.state, PosterState::Idle | PosterState::Done { .. });
        self.state = PosterState::Idle;
        had_draft
    }
}

/// Derives metadata for `concept`, renders one image and opens the editor.
pub fn run_draft<'s>(
    client: &GenerationClient,
    session: &'s mut PosterSession,
    concept: &str,
    style: PosterStyle,
) -> Result<&'s mut PosterDraft, CycleError> {
    session.begin(concept, style)?;
    let concept = concept.trim();
    let metadata = client.derive_artwork_metadata(concept);
    let prompt = poster_art_prompt(concept, &metadata);
    let outcome = client.synthesize_images(&prompt, 1);
    let failure = outcome.as_ref().err().cloned();
    session.drafted(metadata, outcome)?;
    if let Some(source) = failure {
        return Err(CycleError::Failed {
            message: POSTER_FAILURE_MESSAGE.to_string(),
            source,
        });
    }
    Ok(session.draft_mut()?)
}
