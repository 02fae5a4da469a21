use crate::config::ConfigError;
use crate::parser::ParseError;
use crate::portal::AuthError;

/// Every operation reports the most specific kind it can determine. A transport
/// failure is never reported as a rejected login and vice versa.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Connection failures and non-2xx answers alike; `status()` tells them apart.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Unexpected page format: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to decode response body: {0}")]
    Decode(#[from] DecodeError),

    #[error("Login rejected: {0}")]
    Authentication(#[from] AuthError),
}

/// Page bodies must arrive gzip encoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected a gzip body, got content-encoding {0:?}")]
    UnexpectedEncoding(Option<String>),
    #[error("corrupt gzip stream: {0}")]
    Inflate(#[source] std::io::Error),
    #[error("unreadable body: {0}")]
    Body(#[source] reqwest::Error),
}

impl PortalError {
    /// Only transport failures are worth retrying; the rest need a human or a code change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortalError::Transport(_))
    }

    /// HTTP status of a portal answer outside 2xx. `None` when the portal was not reached.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            PortalError::Transport(error) => error.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            PortalError::Configuration(ConfigError::Client(error.to_string()))
        } else if error.is_decode() {
            PortalError::Decode(DecodeError::Body(error))
        } else {
            PortalError::Transport(error)
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
