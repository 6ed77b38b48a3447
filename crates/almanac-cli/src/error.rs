use almanac_core::{ConfigError, CoreError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<WarehouseError> for CliError {
    fn from(error: WarehouseError) -> Self {
        Self::Core(CoreError::Warehouse(error))
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Command(_) => 2,
            Self::Core(CoreError::Config(_)) => 2,
            Self::Core(CoreError::Fetch(_)) => 6,
            Self::Core(CoreError::Parse(_)) => 7,
            Self::Core(CoreError::NoMatchingTable { .. }) => 8,
            Self::Core(CoreError::Serialization(_)) | Self::Serialization(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Core(CoreError::Warehouse(_) | CoreError::Io(_)) | Self::Io(_) => 10,
        }
    }
}
