use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sola_contracts::pins::ImagePayload;
use tracing::{debug, warn};

use super::{
    is_retryable_transport_error, read_json_reply, GenerativeProvider, ImageRequest,
    TextRequest, VisionRequest,
};
use crate::config::GenerationConfig;

/// Adapter for the Gemini `generateContent` REST endpoint.
pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    transport_retries: usize,
    retry_backoff: Duration,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
            transport_retries: config.transport_retries,
            retry_backoff: config.retry_backoff,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY not set"))
    }

    fn safety_settings() -> Vec<Value> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| {
            json!({
                "category": category,
                "threshold": "BLOCK_ONLY_HIGH",
            })
        })
        .collect()
    }

    fn json_generation_config(schema: Option<&Value>) -> Option<Value> {
        schema.map(|schema| {
            json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            })
        })
    }

    fn post_with_transport_retries(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        let api_key = self.api_key()?;
        for attempt in 0..=self.transport_retries {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(self.timeout)
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw)
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    warn!(
                        "Gemini transport retry {}/{} after transient request failure",
                        attempt + 1,
                        self.transport_retries
                    );
                    thread::sleep(self.retry_backoff.mul_f64(attempt as f64 + 1.0));
                }
            }
        }

        Err(anyhow!("Gemini transport retries exhausted ({endpoint})"))
    }

    fn generate(&self, model: &str, payload: Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        debug!("Gemini request to {endpoint}");
        let response = self.post_with_transport_retries(&endpoint, &payload)?;
        read_json_reply("Gemini", response)
    }

    fn candidate_parts(response_payload: &Value) -> Result<Vec<Value>> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let Some(first) = candidates.first() else {
            bail!("Gemini returned no candidates (likely safety block)");
        };
        Ok(first
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    fn extract_text(response_payload: &Value) -> Result<String> {
        let text = Self::candidate_parts(response_payload)?
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("");
        Ok(text.trim().to_string())
    }

    fn extract_image(response_payload: &Value) -> Result<Option<ImagePayload>> {
        for part in Self::candidate_parts(response_payload)? {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            return Ok(Some(ImagePayload::inline(mime_type, data)));
        }
        Ok(None)
    }
}

impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete_text(&self, request: &TextRequest) -> Result<String> {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": [{ "text": request.prompt }] }]),
        );
        if let Some(config) = Self::json_generation_config(request.response_schema.as_ref()) {
            payload.insert("generationConfig".to_string(), config);
        }
        let response = self.generate(&request.model, Value::Object(payload))?;
        Self::extract_text(&response)
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>> {
        let mut image_config = Map::new();
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(request.aspect_ratio.clone()),
        );
        if let Some(size) = request.image_size.as_ref() {
            image_config.insert("imageSize".to_string(), Value::String(size.clone()));
        }
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "imageConfig": image_config },
            "safetySettings": Self::safety_settings(),
        });
        let response = self
            .generate(&request.model, payload)
            .with_context(|| format!("Gemini image request {} failed", request.index + 1))?;
        Self::extract_image(&response)
    }

    fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            json!([{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": request.mime_type, "data": request.data } },
                    { "text": request.instruction },
                ],
            }]),
        );
        if let Some(config) = Self::json_generation_config(request.response_schema.as_ref()) {
            payload.insert("generationConfig".to_string(), config);
        }
        let response = self.generate(&request.model, Value::Object(payload))?;
        Self::extract_text(&response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sola_contracts::pins::ImagePayload;

    use super::GeminiProvider;
    use crate::config::GenerationConfig;
    use crate::providers::{GenerativeProvider, TextRequest};

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        let provider = GeminiProvider::new(&GenerationConfig {
            api_base: "http://localhost:1/v1beta/".to_string(),
            ..GenerationConfig::default()
        });
        assert_eq!(
            provider.endpoint_for_model("gemini-2.5-flash"),
            "http://localhost:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            provider.endpoint_for_model("models/gemini-2.5-flash-image"),
            "http://localhost:1/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn extract_image_returns_first_inline_part() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "QUJD" } },
                    { "inlineData": { "mimeType": "image/png", "data": "REVG" } },
                ]}
            }]
        });
        assert_eq!(
            GeminiProvider::extract_image(&payload)?,
            Some(ImagePayload::inline("image/jpeg", "QUJD"))
        );
        Ok(())
    }

    #[test]
    fn extract_image_without_inline_part_is_none() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "refused" }] } }]
        });
        assert_eq!(GeminiProvider::extract_image(&payload)?, None);
        Ok(())
    }

    #[test]
    fn missing_candidates_is_a_safety_block_error() {
        let err = GeminiProvider::extract_text(&json!({ "promptFeedback": {} }))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("no candidates"), "unexpected error: {err}");
    }

    #[test]
    fn extract_text_joins_parts() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": " misty " }, { "text": "dunes " }] } }]
        });
        assert_eq!(GeminiProvider::extract_text(&payload)?, "misty dunes");
        Ok(())
    }

    #[test]
    fn missing_api_key_fails_without_network() {
        let provider = GeminiProvider::new(&GenerationConfig {
            api_key: None,
            ..GenerationConfig::default()
        });
        let err = provider
            .complete_text(&TextRequest {
                model: "gemini-2.5-flash".to_string(),
                prompt: "hello".to_string(),
                response_schema: None,
            })
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("GEMINI_API_KEY"), "unexpected error: {err}");
    }
}
