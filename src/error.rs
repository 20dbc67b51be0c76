use thiserror::Error;

/// Errors that can occur while fetching, tracking or bridging ads
#[derive(Error, Debug)]
pub enum AdError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Beacon delivery failed: {0}")]
    Beacon(String),

    #[error("Malformed payload on channel {channel}: {reason}")]
    MalformedPayload { channel: String, reason: String },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

/// Coarse classification used when reporting failures to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Beacon,
    BridgeDecode,
    Navigation,
}

impl AdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdError::MalformedPayload { .. } => ErrorKind::BridgeDecode,
            AdError::Beacon(_) => ErrorKind::Beacon,
            AdError::Navigation(_) | AdError::Script(_) => ErrorKind::Navigation,
            // navigation and beacon paths wrap their own URL failures
            AdError::Http(_)
            | AdError::Status(_)
            | AdError::Decode(_)
            | AdError::UrlError(_)
            | AdError::Other(_) => ErrorKind::Fetch,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdError>;
