use almanac_core::CoreError;
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::CliError;

/// Structured error entry in command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputError {
    pub code: String,
    pub message: String,
}

impl From<&CoreError> for OutputError {
    fn from(error: &CoreError) -> Self {
        Self {
            code: error.code().to_owned(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub command: &'static str,
    pub generated_at: String,
    /// `fresh`, `stored` or `none`.
    pub freshness: &'static str,
}

/// JSON document printed on stdout for every command.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub meta: Meta,
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<OutputError>,
}

impl Envelope {
    pub fn new(
        command: &'static str,
        freshness: &'static str,
        data: Value,
        warnings: Vec<String>,
        errors: Vec<OutputError>,
    ) -> Result<Self, CliError> {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|error| CliError::Command(error.to_string()))?;
        Ok(Self {
            meta: Meta {
                command,
                generated_at,
                freshness,
            },
            data,
            warnings,
            errors,
        })
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    println!("{payload}");
    Ok(())
}
