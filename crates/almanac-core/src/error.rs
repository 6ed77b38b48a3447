use almanac_warehouse::WarehouseError;
use thiserror::Error;

/// Failures turning raw JSON into rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("required field '{path}' is missing")]
    MissingField { path: String },

    #[error("field '{path}' has an unexpected shape: expected {expected}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
    },

    #[error("dimension key '{key}' appears more than once after stripping the '@' marker")]
    DimensionCollision { key: String },

    #[error("payload produced no rows")]
    NoRows,

    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Failures obtaining a decoded JSON body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failed, after retries where they were allowed.
    #[error("transport failed after {attempts} attempt(s): {cause}")]
    Transport {
        attempts: u32,
        /// Final HTTP status, when the last attempt got a response.
        status: Option<u16>,
        cause: String,
    },

    /// The API answered but reported an application-level error.
    #[error("api returned status {status}: {message}")]
    Api { status: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FetchError {
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Transport { attempts, .. } => Some(*attempts),
            Self::Api { .. } | Self::Parse(_) => None,
        }
    }
}

/// Configuration problems detected before any network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("credential '{var}' is not set")]
    MissingCredential { var: &'static str },

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no statistics table matched keyword '{keyword}' at position {pick}")]
    NoMatchingTable { keyword: String, pick: usize },
}

impl CoreError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Transport { .. }) => "fetch.transport",
            Self::Fetch(FetchError::Api { .. }) => "fetch.api",
            Self::Fetch(FetchError::Parse(_)) | Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Warehouse(_) => "warehouse",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::NoMatchingTable { .. } => "not_found",
        }
    }
}
