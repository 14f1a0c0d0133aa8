use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use sola_contracts::pins::ImagePayload;

use crate::config::GenerationConfig;
use crate::providers::{GenerativeProvider, ImageRequest, TextRequest, VisionRequest};

type Outcome<T> = std::result::Result<T, String>;

/// Fake provider replaying queued outcomes. An empty queue falls back to a
/// canned success (or failure for images when built with `failing_images`).
#[derive(Default)]
pub struct ScriptedProvider {
    fail_images: bool,
    texts: Mutex<VecDeque<Outcome<String>>>,
    images: Mutex<VecDeque<Outcome<Option<ImagePayload>>>>,
    visions: Mutex<VecDeque<Outcome<String>>>,
    log: Mutex<CallLog>,
}

#[derive(Default)]
struct CallLog {
    text_prompts: Vec<String>,
    image_requests: Vec<ImageRequest>,
    vision_requests: Vec<VisionRequest>,
}

pub fn inline_image(tag: &str) -> ImagePayload {
    ImagePayload::inline("image/png", format!("{tag}AAAA"))
}

impl ScriptedProvider {
    pub fn failing_images() -> Self {
        Self {
            fail_images: true,
            ..Self::default()
        }
    }

    pub fn config() -> GenerationConfig {
        GenerationConfig {
            provider: "scripted".to_string(),
            ..GenerationConfig::dryrun()
        }
    }

    pub fn push_text(&self, outcome: Outcome<String>) {
        lock(&self.texts).push_back(outcome);
    }

    pub fn push_image(&self, outcome: Outcome<Option<ImagePayload>>) {
        lock(&self.images).push_back(outcome);
    }

    pub fn push_vision(&self, outcome: Outcome<String>) {
        lock(&self.visions).push_back(outcome);
    }

    pub fn text_prompts(&self) -> Vec<String> {
        lock(&self.log).text_prompts.clone()
    }

    pub fn image_calls(&self) -> usize {
        lock(&self.log).image_requests.len()
    }

    pub fn image_indices(&self) -> Vec<usize> {
        lock(&self.log)
            .image_requests
            .iter()
            .map(|request| request.index)
            .collect()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        lock(&self.log)
            .image_requests
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }

    pub fn image_sizes(&self) -> Vec<Option<String>> {
        lock(&self.log)
            .image_requests
            .iter()
            .map(|request| request.image_size.clone())
            .collect()
    }

    pub fn vision_calls(&self) -> usize {
        lock(&self.log).vision_requests.len()
    }

    pub fn vision_payloads(&self) -> Vec<String> {
        lock(&self.log)
            .vision_requests
            .iter()
            .map(|request| request.data.clone())
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GenerativeProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete_text(&self, request: &TextRequest) -> Result<String> {
        lock(&self.log).text_prompts.push(request.prompt.clone());
        lock(&self.texts)
            .pop_front()
            .unwrap_or_else(|| Ok("scripted reply".to_string()))
            .map_err(|err| anyhow!(err))
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>> {
        lock(&self.log).image_requests.push(request.clone());
        let fallback = if self.fail_images {
            Err("scripted image failure".to_string())
        } else {
            Ok(Some(inline_image(&format!("img{}", request.index))))
        };
        lock(&self.images)
            .pop_front()
            .unwrap_or(fallback)
            .map_err(|err| anyhow!(err))
    }

    fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        lock(&self.log).vision_requests.push(request.clone());
        lock(&self.visions)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
            .map_err(|err| anyhow!(err))
    }
}
