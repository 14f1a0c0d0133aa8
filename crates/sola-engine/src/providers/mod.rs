use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Response as HttpResponse;
use serde_json::{Map, Value};
use sola_contracts::pins::ImagePayload;

use crate::config::GenerationConfig;

mod dryrun;
mod gemini;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub model: String,
    pub prompt: String,
    /// JSON schema the reply must follow; `None` for free text.
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
    /// Output size hint, honoured only by models that accept one.
    pub image_size: Option<String>,
    /// Position of this request within a sequential batch.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub mime_type: String,
    /// Base64 image body.
    pub data: String,
    pub instruction: String,
    pub response_schema: Option<Value>,
}

/// One remote generative-AI backend. Every method is a single blocking
/// request/response exchange; callers own retries and fallbacks.
pub trait GenerativeProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete_text(&self, request: &TextRequest) -> Result<String>;
    /// `Ok(None)` when the reply carried no image part.
    fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>>;
    fn analyze_image(&self, request: &VisionRequest) -> Result<String>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn GenerativeProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: GenerativeProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerativeProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &GenerationConfig) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(config));
    providers
}

/// Non-2xx bodies are echoed into the error up to this many characters.
const ERROR_BODY_LIMIT: usize = 512;

/// Reads a backend reply as JSON. A failing status becomes an error that
/// names the backend and carries the start of the body.
pub(crate) fn read_json_reply(backend: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("reading {backend} reply"))?;
    if !status.is_success() {
        bail!(
            "{backend} replied {}: {}",
            status.as_u16(),
            clip(&body, ERROR_BODY_LIMIT)
        );
    }
    serde_json::from_str(&body).with_context(|| format!("{backend} reply is not JSON"))
}

pub(crate) fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|transport| transport.is_timeout() || transport.is_connect())
}

pub(crate) fn clip(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &value[..cut]),
        None => value.to_string(),
    }
}

/// Drops a surrounding Markdown fence, and a `json` info string, from a
/// model reply.
fn unfence(text: &str) -> &str {
    let raw = text.trim();
    let Some(inner) = raw
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return raw;
    };
    let Some((info, body)) = inner.split_once('\n') else {
        return raw;
    };
    if info.trim().is_empty() || info.trim().eq_ignore_ascii_case("json") {
        body.trim()
    } else {
        inner.trim()
    }
}

/// The JSON object a model was asked to reply with. Models wrap it in fences
/// or surround it with prose often enough that both are tolerated.
pub(crate) fn reply_object(text: &str) -> Option<Map<String, Value>> {
    let raw = unfence(text);
    if raw.is_empty() {
        return None;
    }
    let braced = raw
        .find('{')
        .zip(raw.rfind('}'))
        .filter(|(start, end)| end > start)
        .map(|(start, end)| &raw[start..=end]);
    std::iter::once(raw)
        .chain(braced)
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        })
}
