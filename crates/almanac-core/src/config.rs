use std::env;
use std::path::PathBuf;

use almanac_warehouse::{resolve_almanac_home, WarehouseConfig};

use crate::adapters::{ESTAT_DEFAULT_BASE_URL, JMA_DEFAULT_BASE_URL};
use crate::error::ConfigError;

pub(crate) const ESTAT_APP_ID_VARS: [&str; 2] = ["ESTAT_APP_ID", "ALMANAC_ESTAT_APP_ID"];

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlmanacConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    /// Audit copy of the most recent statistics body.
    pub raw_json_path: PathBuf,
    pub estat_app_id: Option<String>,
    pub jma_base_url: String,
    pub estat_base_url: String,
    /// Overrides each provider's default request timeout.
    pub timeout_ms: Option<u64>,
}

impl AlmanacConfig {
    /// Defaults rooted at `home`, with no credentials.
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join("almanac.duckdb"),
            raw_json_path: home.join("raw").join("estat_raw.json"),
            home,
            estat_app_id: None,
            jma_base_url: JMA_DEFAULT_BASE_URL.to_owned(),
            estat_base_url: ESTAT_DEFAULT_BASE_URL.to_owned(),
            timeout_ms: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::for_home(resolve_almanac_home());
        config.estat_app_id = ESTAT_APP_ID_VARS.iter().find_map(|var| non_empty_var(var));
        if let Some(url) = non_empty_var("ALMANAC_JMA_BASE_URL") {
            config.jma_base_url = url;
        }
        if let Some(url) = non_empty_var("ALMANAC_ESTAT_BASE_URL") {
            config.estat_base_url = url;
        }
        if let Some(raw) = non_empty_var("ALMANAC_TIMEOUT_MS") {
            let timeout = raw
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: "ALMANAC_TIMEOUT_MS",
                    value: raw,
                })?;
            config.timeout_ms = Some(timeout);
        }
        Ok(config)
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            db_path: self.db_path.clone(),
            ..WarehouseConfig::for_home(&self.home)
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
