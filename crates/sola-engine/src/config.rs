use std::env;
use std::time::Duration;

use anyhow::bail;
use sola_contracts::models::{
    ModelSelector, CAPABILITY_IMAGE, CAPABILITY_TEXT, CAPABILITY_VISION,
};
use tracing::{debug, warn};

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_VARS: [&str; 3] = ["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Runtime settings for the generation client.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub provider: String,
    pub text_model: String,
    pub image_model: String,
    /// Image variants requested per vibe cycle.
    pub image_count: usize,
    /// Pause between consecutive image requests.
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub transport_retries: usize,
    pub retry_backoff: Duration,
    pub aspect_ratio: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model_fallbacks: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_count: 4,
            request_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(90),
            transport_retries: 2,
            retry_backoff: Duration::from_millis(1200),
            aspect_ratio: "1:1".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model_fallbacks: Vec::new(),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; numbers outside their
    /// range are clamped, unparsable ones fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let number = |key: &str, default: f64, min: f64, max: f64| -> f64 {
            text(key)
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(min, max))
                .unwrap_or(default)
        };

        let config = Self {
            provider: text("SOLA_PROVIDER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.provider),
            text_model: text("SOLA_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: text("SOLA_IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_count: number("SOLA_IMAGE_COUNT", 4.0, 1.0, 8.0).round() as usize,
            request_delay: Duration::from_millis(
                number("SOLA_REQUEST_DELAY_MS", 500.0, 0.0, 10_000.0).round() as u64,
            ),
            request_timeout: Duration::from_secs_f64(number(
                "SOLA_REQUEST_TIMEOUT_S",
                90.0,
                5.0,
                300.0,
            )),
            transport_retries: number("SOLA_TRANSPORT_RETRIES", 2.0, 0.0, 4.0).round() as usize,
            retry_backoff: defaults.retry_backoff,
            aspect_ratio: text("SOLA_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio),
            api_base: text("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            api_key: API_KEY_VARS.iter().find_map(|key| text(*key)),
            model_fallbacks: Vec::new(),
        };
        if config.api_key.is_none() && config.provider != "dryrun" {
            warn!(
                "no API credential set ({}); generation calls will fall back",
                API_KEY_VARS.join(", ")
            );
        }
        config
    }

    /// Snaps the text and image models onto models the registry knows for the
    /// configured provider, recording why a model was replaced.
    pub fn resolve_models(mut self, selector: &ModelSelector) -> anyhow::Result<Self> {
        let text = selector
            .select(&self.provider, Some(&self.text_model), CAPABILITY_TEXT)
            .map_err(anyhow::Error::msg)?;
        let image = selector
            .select(&self.provider, Some(&self.image_model), CAPABILITY_IMAGE)
            .map_err(anyhow::Error::msg)?;
        // Image analysis runs on the text model.
        if !text.model.supports(CAPABILITY_VISION) {
            bail!(
                "text model '{}' cannot analyze images on provider '{}'",
                text.model.name,
                self.provider
            );
        }
        for reason in [text.fallback_reason, image.fallback_reason]
            .into_iter()
            .flatten()
        {
            debug!("model fallback: {reason}");
            self.model_fallbacks.push(reason);
        }
        self.text_model = text.model.name;
        self.image_model = image.model.name;
        Ok(self)
    }

    pub fn dryrun() -> Self {
        Self {
            provider: "dryrun".to_string(),
            text_model: "dryrun-text-1".to_string(),
            image_model: "dryrun-image-1".to_string(),
            request_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use indexmap::IndexMap;
    use sola_contracts::models::{ModelRegistry, ModelSelector, ModelSpec};

    use super::GenerationConfig;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = GenerationConfig::from_lookup(lookup(&[]));
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn numbers_are_clamped_and_garbage_ignored() {
        let config = GenerationConfig::from_lookup(lookup(&[
            ("SOLA_IMAGE_COUNT", "40"),
            ("SOLA_REQUEST_DELAY_MS", "-5"),
            ("SOLA_TRANSPORT_RETRIES", "many"),
        ]));
        assert_eq!(config.image_count, 8);
        assert_eq!(config.request_delay, Duration::ZERO);
        assert_eq!(config.transport_retries, 2);
    }

    #[test]
    fn first_non_empty_credential_wins() {
        let config = GenerationConfig::from_lookup(lookup(&[
            ("API_KEY", "  "),
            ("GEMINI_API_KEY", "gemini-key"),
            ("GOOGLE_API_KEY", "google-key"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("gemini-key"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let config =
            GenerationConfig::from_lookup(lookup(&[("GEMINI_API_BASE", "http://localhost:9/v1/")]));
        assert_eq!(config.api_base, "http://localhost:9/v1");
    }

    #[test]
    fn unknown_models_fall_back_to_provider_defaults() -> anyhow::Result<()> {
        let config = GenerationConfig::from_lookup(lookup(&[("SOLA_IMAGE_MODEL", "sdxl")]))
            .resolve_models(&ModelSelector::new(None))?;
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.text_model, "gemini-2.5-flash");
        assert_eq!(config.model_fallbacks.len(), 1);
        Ok(())
    }

    #[test]
    fn dryrun_config_resolves_cleanly() -> anyhow::Result<()> {
        let config = GenerationConfig::dryrun().resolve_models(&ModelSelector::new(None))?;
        assert_eq!(config.image_model, "dryrun-image-1");
        assert!(config.model_fallbacks.is_empty());
        Ok(())
    }

    #[test]
    fn text_model_without_vision_is_rejected() {
        let mut models = IndexMap::new();
        for (name, capabilities) in [("blind-text", &["text"][..]), ("flat-image", &["image"][..])] {
            models.insert(
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: "gemini".to_string(),
                    capabilities: capabilities.iter().map(|item| item.to_string()).collect(),
                    sized_output: false,
                },
            );
        }
        let selector = ModelSelector::new(Some(ModelRegistry::new(Some(models))));
        let err = GenerationConfig::from_lookup(lookup(&[]))
            .resolve_models(&selector)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("blind-text"), "{err}");
    }
}
