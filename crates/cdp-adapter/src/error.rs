use thiserror::Error;

/// Failures starting or driving the browser session.
#[derive(Clone, Debug, Error)]
pub enum SessionError {
    #[error("browser config error: {0}")]
    Config(String),

    #[error("failed to launch chromium: {0}")]
    Launch(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("cdp failure: {0}")]
    Protocol(String),

    #[error("browser session closed")]
    Closed,
}

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<SessionError> for promptsmith_core_types::PipelineError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Closed => Self::Channel(err.to_string()),
            other => Self::Application(other.to_string()),
        }
    }
}
