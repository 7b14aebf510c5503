/// Shared error type used across all Wayfarer crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("session: {0}")]
    Session(String),

    #[error("tool {tool}: {reason}")]
    Tool { tool: String, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The upstream HTTP status carried by this error, when there is one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for timeouts and cancellations (both mean "the deadline won").
    pub fn is_deadline(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled(_))
    }
}
