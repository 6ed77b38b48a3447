mod areas;
mod forecast;
mod stats;

use std::sync::Arc;

use almanac_core::{AlmanacConfig, CoreError, Pipeline, RefreshOutcome, ReqwestHttpClient};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, OutputError};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<OutputError>,
    pub freshness: &'static str,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            freshness: "stored",
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_error(mut self, error: &CoreError) -> Self {
        self.errors.push(OutputError::from(error));
        self
    }

    pub fn with_freshness(mut self, freshness: &'static str) -> Self {
        self.freshness = freshness;
        self
    }

    /// Shape a refresh outcome: stored fallbacks carry a warning and the
    /// cause, failures carry only the cause.
    pub fn from_refresh<T: Serialize>(outcome: RefreshOutcome<T>) -> Result<Self, CliError> {
        match outcome {
            RefreshOutcome::Fresh(data) => {
                Ok(Self::ok(serde_json::to_value(data)?).with_freshness("fresh"))
            }
            RefreshOutcome::Fallback { stored, error } => Ok(Self::ok(serde_json::to_value(stored)?)
                .with_warning("refresh failed; serving previously stored data")
                .with_error(&error)),
            RefreshOutcome::Failed(error @ CoreError::Config(_)) => Err(error.into()),
            RefreshOutcome::Failed(error) => Ok(Self::ok(Value::Null)
                .with_freshness("none")
                .with_error(&error)),
        }
    }
}

pub fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Areas => "areas",
        Command::Forecast(_) => "forecast",
        Command::Snapshot(_) => "snapshot",
        Command::Periods(_) => "periods",
        Command::At(_) => "at",
        Command::Tables(_) => "tables",
        Command::Stats(_) => "stats",
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let mut config = AlmanacConfig::from_env()?;
    if let Some(timeout_ms) = cli.timeout_ms {
        if timeout_ms == 0 {
            return Err(CliError::Command("--timeout-ms must be positive".to_string()));
        }
        config.timeout_ms = Some(timeout_ms);
    }
    tracing::debug!(home = %config.home.display(), "resolved configuration");

    let pipeline = Pipeline::from_config(&config, Arc::new(ReqwestHttpClient::new()))?;

    let result = match &cli.command {
        Command::Areas => areas::run(&pipeline).await?,
        Command::Forecast(args) => forecast::refresh(args, &pipeline).await?,
        Command::Snapshot(args) => forecast::snapshot(args, &pipeline)?,
        Command::Periods(args) => forecast::periods(args, &pipeline)?,
        Command::At(args) => forecast::at(args, &pipeline)?,
        Command::Tables(args) => stats::tables(args, &pipeline).await?,
        Command::Stats(args) => stats::refresh(args, &pipeline).await?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        freshness,
    } = result;
    Envelope::new(command_name(&cli.command), freshness, data, warnings, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use almanac_core::{FetchError, ParseError};

    #[test]
    fn fallback_outcome_keeps_stored_data_and_reports_the_cause() {
        let outcome = RefreshOutcome::Fallback {
            stored: vec![1, 2, 3],
            error: CoreError::from(FetchError::Transport {
                attempts: 3,
                status: None,
                cause: "timed out".to_string(),
            }),
        };

        let result = CommandResult::from_refresh(outcome).expect("result");
        assert_eq!(result.data, serde_json::json!([1, 2, 3]));
        assert_eq!(result.freshness, "stored");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.errors[0].code, "fetch.transport");
    }

    #[test]
    fn failed_outcome_without_stored_data_yields_null() {
        let outcome: RefreshOutcome<Vec<u8>> =
            RefreshOutcome::Failed(CoreError::from(ParseError::NoRows));

        let result = CommandResult::from_refresh(outcome).expect("result");
        assert_eq!(result.data, Value::Null);
        assert_eq!(result.freshness, "none");
        assert!(result.warnings.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn missing_credentials_abort_the_command() {
        let outcome: RefreshOutcome<Vec<u8>> = RefreshOutcome::Failed(CoreError::from(
            almanac_core::ConfigError::MissingCredential {
                var: "ESTAT_APP_ID",
            },
        ));

        let error = CommandResult::from_refresh(outcome).err().expect("error");
        assert_eq!(error.exit_code(), 2);
    }
}
