pub mod client;
pub mod config;
pub mod error;
pub mod gallery;
pub mod poster;
pub mod providers;
pub mod seed;
pub mod vibe;

#[cfg(test)]
mod test_support;

use anyhow::{anyhow, Result};
use rand::Rng;
use serde_json::{json, Map, Value};
use sola_contracts::categories::CategoryId;
use sola_contracts::events::{EventPayload, EventWriter};
use sola_contracts::models::ModelSelector;
use sola_contracts::pins::{Pin, PosterStyle};
use tracing::{info, warn};

pub use client::{ArtworkMetadata, GenerationClient, ImageAnalysis};
pub use config::GenerationConfig;
pub use error::{CycleError, GenerationError, SessionError};
pub use gallery::Gallery;
pub use poster::{PosterDraft, PosterSession, PosterState};
pub use providers::{default_provider_registry, GenerativeProvider, ProviderRegistry};
pub use vibe::{CycleId, VibeGeneration, VibeSession, VibeState};

/// One in-process moodboard session: the generation client, the gallery and
/// both creation workflows. Completed pins land at the front of the gallery.
pub struct Studio {
    client: GenerationClient,
    gallery: Gallery,
    vibe: VibeSession,
    poster: PosterSession,
    events: Option<EventWriter>,
}

impl Studio {
    pub fn new(
        client: GenerationClient,
        gallery: Gallery,
        events: Option<EventWriter>,
    ) -> Self {
        let studio = Self {
            client,
            gallery,
            vibe: VibeSession::new(),
            poster: PosterSession::new(),
            events,
        };
        let config = studio.client.config();
        studio.emit(
            "session_started",
            json!({
                "provider": studio.client.provider_name(),
                "text_model": config.text_model,
                "image_model": config.image_model,
                "model_fallbacks": config.model_fallbacks,
                "pins": studio.gallery.len(),
            }),
        );
        studio
    }

    /// Resolves models, picks the configured provider and builds the studio.
    pub fn from_config(
        config: GenerationConfig,
        gallery: Gallery,
        events: Option<EventWriter>,
    ) -> Result<Self> {
        let config = config.resolve_models(&ModelSelector::new(None))?;
        let providers = default_provider_registry(&config);
        let provider = providers.get(&config.provider).ok_or_else(|| {
            anyhow!(
                "unknown provider '{}' (available: {})",
                config.provider,
                providers.names().join(", ")
            )
        })?;
        info!(
            "studio using {} ({} / {})",
            config.provider, config.text_model, config.image_model
        );
        Ok(Self::new(
            GenerationClient::new(provider, config),
            gallery,
            events,
        ))
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn gallery_mut(&mut self) -> &mut Gallery {
        &mut self.gallery
    }

    pub fn vibe(&self) -> &VibeSession {
        &self.vibe
    }

    pub fn poster(&self) -> &PosterSession {
        &self.poster
    }

    /// Runs refine + synthesize. `count` defaults to the configured batch size.
    pub fn generate_vibe(
        &mut self,
        prompt: &str,
        category: CategoryId,
        count: Option<usize>,
    ) -> Result<VibeGeneration, CycleError> {
        let count = count.unwrap_or(self.client.config().image_count);
        match vibe::run_generation(&self.client, &mut self.vibe, prompt, category, count) {
            Ok(generation) => {
                self.emit(
                    "prompt_refined",
                    json!({
                        "workflow": "vibe",
                        "category": category,
                        "prompt": prompt.trim(),
                        "refined_prompt": generation.refined_prompt,
                    }),
                );
                self.emit(
                    "images_synthesized",
                    json!({
                        "workflow": "vibe",
                        "requested": count.max(1),
                        "received": generation.image_count,
                    }),
                );
                Ok(generation)
            }
            Err(err) => {
                self.record_failure("vibe", &err);
                Err(err)
            }
        }
    }

    pub fn toggle_vibe(&mut self, index: usize) -> Result<bool, CycleError> {
        Ok(self.vibe.toggle(index)?)
    }

    /// Analyzes the selection and adds the resulting pins to the gallery.
    pub fn confirm_vibe(&mut self) -> Result<Vec<Pin>, CycleError> {
        let pins = vibe::run_confirmation(&self.client, &mut self.vibe)?;
        self.emit(
            "pins_created",
            json!({
                "workflow": "vibe",
                "pin_ids": pins.iter().map(Pin::id).collect::<Vec<_>>(),
                "titles": pins.iter().map(Pin::title).collect::<Vec<_>>(),
            }),
        );
        self.accept_pins(pins.clone());
        Ok(pins)
    }

    pub fn discard_vibe(&mut self) -> bool {
        let cycle = self.vibe.cycle();
        let discarded = self.vibe.discard();
        if discarded {
            self.emit("vibe_discarded", json!({ "cycle": cycle.get() }));
        }
        discarded
    }

    pub fn draft_poster(
        &mut self,
        concept: &str,
        style: PosterStyle,
    ) -> Result<&mut PosterDraft, CycleError> {
        let drafted = poster::run_draft(&self.client, &mut self.poster, concept, style)
            .map(|draft| json!({
                "concept": draft.concept(),
                "style": draft.style(),
                "title": draft.title(),
                "subtitle": draft.subtitle(),
                "accent_color": draft.accent_color(),
            }));
        match drafted {
            Ok(payload) => self.emit("poster_drafted", payload),
            Err(err) => {
                self.record_failure("poster", &err);
                return Err(err);
            }
        }
        self.poster_draft_mut()
    }

    pub fn poster_draft_mut(&mut self) -> Result<&mut PosterDraft, CycleError> {
        Ok(self.poster.draft_mut()?)
    }

    pub fn save_poster(&mut self) -> Result<Pin, CycleError> {
        let pin = self.poster.save()?;
        self.emit(
            "poster_saved",
            json!({
                "pin_id": pin.id(),
                "title": pin.title(),
                "poster": pin.poster(),
            }),
        );
        self.accept_pins(vec![pin.clone()]);
        Ok(pin)
    }

    pub fn reset_poster(&mut self) -> bool {
        let discarded = self.poster.reset();
        if discarded {
            self.emit("poster_reset", json!({}));
        }
        discarded
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.gallery.shuffle_with(rng);
        self.emit("gallery_shuffled", json!({ "pins": self.gallery.len() }));
    }

    /// Prepends new pins and focuses the gallery on them: the first pin's
    /// palette, or every palette for posters.
    fn accept_pins(&mut self, pins: Vec<Pin>) {
        let Some(first) = pins.first() else {
            return;
        };
        let focus = if first.poster().is_some() {
            CategoryId::All
        } else {
            first.category()
        };
        self.gallery.add_pins(pins);
        self.gallery.focus_category(focus);
    }

    fn record_failure(&self, workflow: &str, err: &CycleError) {
        match err {
            CycleError::Session(_) => {}
            CycleError::Failed { message, source } => {
                warn!("{workflow} generation failed: {source}");
                self.emit(
                    "generation_failed",
                    json!({
                        "workflow": workflow,
                        "message": message,
                        "error": source.to_string(),
                    }),
                );
            }
        }
    }

    /// Session log writes never fail a workflow; problems go to diagnostics.
    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, map_object(payload)) {
            warn!("failed to write {event_type} event: {err:#}");
        }
    }
}

fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_else(Map::new)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Value;
    use sola_contracts::categories::CategoryId;
    use sola_contracts::events::EventWriter;
    use sola_contracts::pins::PosterStyle;

    use super::*;
    use crate::poster::POSTER_FAILURE_MESSAGE;
    use crate::seed::seed_pins;
    use crate::test_support::ScriptedProvider;
    use crate::vibe::VIBE_FAILURE_MESSAGE;

    fn studio(provider: &Arc<ScriptedProvider>, events: Option<EventWriter>) -> anyhow::Result<Studio> {
        let gallery = Gallery::new(seed_pins(6, &mut StdRng::seed_from_u64(5))?);
        Ok(Studio::new(
            GenerationClient::new(provider.clone(), ScriptedProvider::config()),
            gallery,
            events,
        ))
    }

    fn event_types(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
        let raw = fs::read_to_string(path)?;
        raw.lines()
            .map(|line| -> anyhow::Result<String> {
                let event: Value = serde_json::from_str(line)?;
                Ok(event["type"].as_str().unwrap_or_default().to_string())
            })
            .collect()
    }

    #[test]
    fn vibe_pins_land_first_and_focus_their_palette() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("session").join("events.jsonl");
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_vision(Ok(r#"{"title":"Chrome Dusk","description":"Rain on neon."}"#.to_string()));
        provider.push_vision(Ok(r#"{"title":"Static Bloom","description":"Signals."}"#.to_string()));
        let mut studio = studio(&provider, Some(EventWriter::new(&events_path, "session-1")))?;
        studio.gallery_mut().set_search_query("bloom");

        let generation = studio.generate_vibe("neon alley", CategoryId::Nomad, Some(4))?;
        assert_eq!(generation.image_count, 4);
        studio.toggle_vibe(0)?;
        studio.toggle_vibe(2)?;
        let pins = studio.confirm_vibe()?;

        let gallery = studio.gallery();
        assert_eq!(gallery.len(), 8);
        assert_eq!(gallery.pins()[0].id(), pins[0].id());
        assert_eq!(gallery.pins()[1].title(), "Static Bloom");
        assert_eq!(gallery.active_category(), CategoryId::Nomad);
        assert_eq!(gallery.search_query(), "bloom");
        let visible = gallery.visible();
        assert!(visible.iter().any(|pin| pin.title() == "Static Bloom"));
        assert!(visible.iter().all(|pin| pin.title() != "Chrome Dusk"));

        assert_eq!(
            event_types(&events_path)?,
            vec![
                "session_started",
                "prompt_refined",
                "images_synthesized",
                "pins_created"
            ]
        );
        Ok(())
    }

    #[test]
    fn failed_vibe_leaves_gallery_untouched() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let provider = Arc::new(ScriptedProvider::failing_images());
        let mut studio = studio(&provider, Some(EventWriter::new(&events_path, "session-2")))?;
        let before = studio
            .gallery()
            .pins()
            .iter()
            .map(|pin| pin.id().to_string())
            .collect::<Vec<_>>();

        let err = studio
            .generate_vibe("neon alley", CategoryId::Nomad, Some(2))
            .err()
            .map(|err| err.user_message());
        assert_eq!(err.as_deref(), Some(VIBE_FAILURE_MESSAGE));
        let after = studio
            .gallery()
            .pins()
            .iter()
            .map(|pin| pin.id().to_string())
            .collect::<Vec<_>>();
        assert_eq!(before, after);
        assert_eq!(studio.gallery().active_category(), CategoryId::All);

        let raw = fs::read_to_string(&events_path)?;
        let last: Value = serde_json::from_str(raw.lines().last().unwrap_or("{}"))?;
        assert_eq!(last["type"], "generation_failed");
        assert_eq!(last["session_id"], "session-2");
        assert_eq!(last["message"], VIBE_FAILURE_MESSAGE);
        Ok(())
    }

    #[test]
    fn saved_poster_switches_gallery_to_all() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::default());
        let mut studio = studio(&provider, None)?;
        studio.gallery_mut().set_active_category(CategoryId::Botanica);

        let draft = studio.draft_poster("lonely lighthouse", PosterStyle::Editorial)?;
        draft.set_title("BEACON");
        let pin = studio.save_poster()?;

        assert_eq!(studio.gallery().pins()[0].id(), pin.id());
        assert_eq!(pin.category(), CategoryId::Atelier);
        assert_eq!(studio.gallery().active_category(), CategoryId::All);
        assert_eq!(studio.gallery().visible().len(), 7);
        Ok(())
    }

    #[test]
    fn failed_poster_reports_message_and_keeps_gallery() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::failing_images());
        let mut studio = studio(&provider, None)?;
        let err = studio
            .draft_poster("lonely lighthouse", PosterStyle::Swiss)
            .err()
            .map(|err| err.user_message());
        assert_eq!(err.as_deref(), Some(POSTER_FAILURE_MESSAGE));
        assert_eq!(studio.gallery().len(), 6);
        assert!(studio.save_poster().is_err());
        assert!(studio.reset_poster());
        Ok(())
    }

    #[test]
    fn discard_and_shuffle_are_logged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let provider = Arc::new(ScriptedProvider::default());
        let mut studio = studio(&provider, Some(EventWriter::new(&events_path, "session-3")))?;
        studio.generate_vibe("dunes", CategoryId::Mirage, Some(1))?;
        assert!(studio.discard_vibe());
        assert!(!studio.discard_vibe());
        studio.shuffle_with(&mut StdRng::seed_from_u64(1));
        assert_eq!(studio.gallery().len(), 6);

        let types = event_types(&events_path)?;
        assert_eq!(types.iter().filter(|kind| *kind == "vibe_discarded").count(), 1);
        assert_eq!(types.last().map(String::as_str), Some("gallery_shuffled"));
        Ok(())
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let config = GenerationConfig {
            provider: "midjourney".to_string(),
            ..GenerationConfig::dryrun()
        };
        assert!(Studio::from_config(config, Gallery::default(), None).is_err());
    }

    #[test]
    fn dryrun_studio_runs_offline() -> anyhow::Result<()> {
        let mut studio = Studio::from_config(GenerationConfig::dryrun(), Gallery::default(), None)?;
        studio.generate_vibe("quiet greenhouse", CategoryId::Botanica, Some(2))?;
        studio.toggle_vibe(1)?;
        let pins = studio.confirm_vibe()?;
        assert_eq!(pins.len(), 1);
        assert!(pins[0].title().starts_with("Dryrun title"));
        assert_eq!(studio.client().provider_name(), "dryrun");
        Ok(())
    }
}
