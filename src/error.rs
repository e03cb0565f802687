use thiserror::Error;

/// Unified error type for proxyvote
#[derive(Error, Debug)]
pub enum ProxyVoteError {
    // Catalog errors
    #[error("No eligible proxies after filtering")]
    NoEligibleProxies,

    #[error("Cannot rotate over an empty proxy list")]
    EmptyRotor,

    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    #[error("Unknown anonymity level: {0}")]
    UnknownAnonymityLevel(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for proxyvote operations
pub type Result<T> = std::result::Result<T, ProxyVoteError>;

impl ProxyVoteError {
    /// Catalog errors are fatal at startup: the run must not begin.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            ProxyVoteError::NoEligibleProxies | ProxyVoteError::EmptyRotor
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for ProxyVoteError {
    fn from(err: url::ParseError) -> Self {
        ProxyVoteError::InvalidConfig(format!("invalid URL: {}", err))
    }
}
