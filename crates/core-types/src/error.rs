use thiserror::Error;

/// Error taxonomy shared by the store, the bridge, the adapters and the runners.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Input rejected before any state changed (empty task text, bad status filter).
    #[error("validation error: {0}")]
    Validation(String),

    /// Imported or persisted data is not task-shaped.
    #[error("format error: {0}")]
    Format(String),

    /// No candidate selector matched an element on the target page.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A polling budget or channel deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The execution context could not be reached.
    #[error("channel error: {0}")]
    Channel(String),

    /// The execution context ran and reported a failure of its own.
    #[error("application error: {0}")]
    Application(String),

    /// Local persistence I/O failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Format(_) => "format",
            Self::ElementNotFound(_) => "element_not_found",
            Self::Timeout(_) => "timeout",
            Self::Channel(_) => "channel",
            Self::Application(_) => "application",
            Self::Storage(_) => "storage",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
