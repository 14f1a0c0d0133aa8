use thiserror::Error;

/// Failure the generation client surfaces to its caller. Everything else is
/// absorbed with a fallback value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("no images produced ({requested} requested)")]
    NoImages { requested: usize },
}

/// Rejected workflow transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a generation cycle is already in flight")]
    Busy,
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("pick a specific palette; 'all' cannot tag generated pins")]
    WildcardCategory,
    #[error("result belongs to a discarded generation cycle")]
    StaleCycle,
    #[error("no images are awaiting selection")]
    NotAwaitingSelection,
    #[error("select at least one image")]
    NothingSelected,
    #[error("selection index {index} out of range ({len} images)")]
    SelectionOutOfRange { index: usize, len: usize },
    #[error("no poster draft is being edited")]
    NotEditing,
    #[error("poster draft has no image; start the draft again")]
    NoDraftImage,
    #[error("invalid colour: {0}")]
    InvalidColor(String),
    #[error("expected {expected} state, session is {actual}")]
    UnexpectedState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{expected} analyses expected, got {actual}")]
    AnalysisCountMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Internal(String),
}

/// Outcome of a driven cycle that did not produce a result.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: GenerationError,
    },
}

impl CycleError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(err) => err.to_string(),
            Self::Failed { message, .. } => message.clone(),
        }
    }
}
