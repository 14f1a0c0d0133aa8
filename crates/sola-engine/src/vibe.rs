use std::mem;

use sola_contracts::categories::CategoryId;
use sola_contracts::pins::{ImagePayload, Pin, Provenance};
use tracing::debug;

use crate::client::{GenerationClient, ImageAnalysis};
use crate::error::{CycleError, GenerationError, SessionError};

pub const VIBE_FAILURE_MESSAGE: &str = "Failed to generate vibe. Try again later.";
pub const VIBE_AUTHOR: &str = "You + Sola";
/// Card ratio for vibe pins, independent of the generated aspect ratio.
pub const VIBE_HEIGHT_RATIO: f64 = 4.0 / 3.0;

/// Generation cycle tag. Results carrying an older tag are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(u64);

impl CycleId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum VibeState {
    #[default]
    Idle,
    Refining {
        prompt: String,
        category: CategoryId,
    },
    Synthesizing {
        refined_prompt: String,
        category: CategoryId,
    },
    AwaitingSelection {
        images: Vec<ImagePayload>,
        /// Indices into `images` in the order they were picked.
        selected: Vec<usize>,
        category: CategoryId,
    },
    Analyzing {
        selections: Vec<ImagePayload>,
        category: CategoryId,
    },
    Done {
        pins_created: usize,
    },
}

impl VibeState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refining { .. } => "refining",
            Self::Synthesizing { .. } => "synthesizing",
            Self::AwaitingSelection { .. } => "awaiting_selection",
            Self::Analyzing { .. } => "analyzing",
            Self::Done { .. } => "done",
        }
    }

    /// `Idle` and `Done` accept a new cycle; everything else is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done { .. })
    }
}

#[derive(Debug, Default)]
pub struct VibeSession {
    state: VibeState,
    cycle: u64,
    last_error: Option<String>,
}

impl VibeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &VibeState {
        &self.state
    }

    pub fn cycle(&self) -> CycleId {
        CycleId(self.cycle)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin(&mut self, prompt: &str, category: CategoryId) -> Result<CycleId, SessionError> {
        if self.state.is_busy() {
            return Err(SessionError::Busy);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        if category.is_wildcard() {
            return Err(SessionError::WildcardCategory);
        }
        self.cycle += 1;
        self.last_error = None;
        self.state = VibeState::Refining {
            prompt: prompt.to_string(),
            category,
        };
        Ok(self.cycle())
    }

    pub fn refined(&mut self, cycle: CycleId, refined_prompt: String) -> Result<(), SessionError> {
        self.ensure_current(cycle)?;
        let VibeState::Refining { category, .. } = self.state else {
            return Err(self.unexpected("refining"));
        };
        self.state = VibeState::Synthesizing {
            refined_prompt,
            category,
        };
        Ok(())
    }

    /// Records the synthesis outcome. An empty batch returns the session to
    /// `Idle` with a user-facing failure message.
    pub fn synthesized(
        &mut self,
        cycle: CycleId,
        outcome: Result<Vec<ImagePayload>, GenerationError>,
    ) -> Result<(), SessionError> {
        self.ensure_current(cycle)?;
        let VibeState::Synthesizing { category, .. } = self.state else {
            return Err(self.unexpected("synthesizing"));
        };
        match outcome {
            Ok(images) if !images.is_empty() => {
                self.state = VibeState::AwaitingSelection {
                    images,
                    selected: Vec::new(),
                    category,
                };
            }
            _ => {
                self.state = VibeState::Idle;
                self.last_error = Some(VIBE_FAILURE_MESSAGE.to_string());
            }
        }
        Ok(())
    }

    pub fn images(&self) -> &[ImagePayload] {
        match &self.state {
            VibeState::AwaitingSelection { images, .. } => images,
            _ => &[],
        }
    }

    pub fn selection(&self) -> &[usize] {
        match &self.state {
            VibeState::AwaitingSelection { selected, .. } => selected,
            _ => &[],
        }
    }

    /// Flips the selection of image `index`; returns whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> Result<bool, SessionError> {
        let VibeState::AwaitingSelection {
            images, selected, ..
        } = &mut self.state
        else {
            return Err(SessionError::NotAwaitingSelection);
        };
        if index >= images.len() {
            return Err(SessionError::SelectionOutOfRange {
                index,
                len: images.len(),
            });
        }
        if let Some(position) = selected.iter().position(|item| *item == index) {
            selected.remove(position);
            return Ok(false);
        }
        selected.push(index);
        Ok(true)
    }

    pub fn can_confirm(&self) -> bool {
        !self.selection().is_empty()
    }

    /// Moves the picked images into `Analyzing`, in selection order.
    pub fn confirm(&mut self) -> Result<(CycleId, Vec<ImagePayload>), SessionError> {
        let VibeState::AwaitingSelection {
            images,
            selected,
            category,
        } = &self.state
        else {
            return Err(SessionError::NotAwaitingSelection);
        };
        if selected.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        let category = *category;
        let selections = selected
            .iter()
            .map(|index| images[*index].clone())
            .collect::<Vec<_>>();
        self.state = VibeState::Analyzing {
            selections: selections.clone(),
            category,
        };
        Ok((self.cycle(), selections))
    }

    /// Turns analysed selections into pins, one per selection, in order.
    pub fn analyzed(
        &mut self,
        cycle: CycleId,
        analyses: Vec<ImageAnalysis>,
    ) -> Result<Vec<Pin>, SessionError> {
        self.ensure_current(cycle)?;
        let actual = self.state.name();
        let VibeState::Analyzing {
            selections,
            category,
        } = &mut self.state
        else {
            return Err(SessionError::UnexpectedState {
                expected: "analyzing",
                actual,
            });
        };
        if analyses.len() != selections.len() {
            return Err(SessionError::AnalysisCountMismatch {
                expected: selections.len(),
                actual: analyses.len(),
            });
        }
        let category = *category;
        let pins = mem::take(selections)
            .into_iter()
            .zip(analyses)
            .map(|(image, analysis)| {
                Pin::new(
                    Pin::fresh_id("vibe"),
                    image,
                    analysis.title,
                    analysis.description,
                    category,
                    VIBE_HEIGHT_RATIO,
                    Provenance::Generated,
                )
                .map(|pin| pin.with_author(VIBE_AUTHOR))
                .map_err(|err| SessionError::Internal(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.state = VibeState::Done {
            pins_created: pins.len(),
        };
        Ok(pins)
    }

    /// Closes a finished cycle, returning the session to `Idle` with the
    /// number of pins it produced.
    pub fn finish(&mut self) -> Result<usize, SessionError> {
        let VibeState::Done { pins_created } = self.state else {
            return Err(self.unexpected("done"));
        };
        self.state = VibeState::Idle;
        Ok(pins_created)
    }

    /// Abandons the current cycle from any state. Returns whether a cycle
    /// was actually in progress.
    pub fn discard(&mut self) -> bool {
        let was_busy = self.state.is_busy();
        self.cycle += 1;
        self.state = VibeState::Idle;
        self.last_error = None;
        was_busy
    }

    fn ensure_current(&self, cycle: CycleId) -> Result<(), SessionError> {
        if cycle != self.cycle() {
            debug!("dropping result of cycle {:?}, current {}", cycle, self.cycle);
            return Err(SessionError::StaleCycle);
        }
        Ok(())
    }

    fn unexpected(&self, expected: &'static str) -> SessionError {
        SessionError::UnexpectedState {
            expected,
            actual: self.state.name(),
        }
    }
}

/// Images presented for selection after a successful generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct VibeGeneration {
    pub cycle: CycleId,
    pub refined_prompt: String,
    pub image_count: usize,
}

/// Refines the prompt and synthesizes `count` variants, leaving the session
/// in `AwaitingSelection`.
pub fn run_generation(
    client: &GenerationClient,
    session: &mut VibeSession,
    prompt: &str,
    category: CategoryId,
    count: usize,
) -> Result<VibeGeneration, CycleError> {
    let cycle = session.begin(prompt, category)?;
    let refined_prompt = client.refine_prompt(category.category().label, prompt.trim());
    session.refined(cycle, refined_prompt.clone())?;

    let outcome = client.synthesize_images(&refined_prompt, count);
    let failure = outcome.as_ref().err().cloned();
    session.synthesized(cycle, outcome)?;
    if let Some(source) = failure {
        return Err(CycleError::Failed {
            message: VIBE_FAILURE_MESSAGE.to_string(),
            source,
        });
    }
    Ok(VibeGeneration {
        cycle,
        refined_prompt,
        image_count: session.images().len(),
    })
}

/// Analyzes each selected image in selection order and returns the new pins.
/// The session passes through `Done` and ends back in `Idle`.
pub fn run_confirmation(
    client: &GenerationClient,
    session: &mut VibeSession,
) -> Result<Vec<Pin>, CycleError> {
    let (cycle, selections) = session.confirm()?;
    let analyses = selections
        .iter()
        .map(|image| client.analyze_image(image))
        .collect::<Vec<_>>();
    let pins = session.analyzed(cycle, analyses)?;
    session.finish()?;
    Ok(pins)
}
