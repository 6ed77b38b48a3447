use almanac_core::{AreaOffice, Pipeline};
use serde::Serialize;

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct AreasResponseData {
    offices: Vec<AreaOffice>,
}

pub async fn run(pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    match pipeline.area_offices().await {
        Ok(offices) => {
            let data = serde_json::to_value(AreasResponseData { offices })?;
            Ok(CommandResult::ok(data).with_freshness("fresh"))
        }
        Err(error) => {
            let data = serde_json::to_value(AreasResponseData { offices: Vec::new() })?;
            Ok(CommandResult::ok(data).with_freshness("none").with_error(&error))
        }
    }
}
