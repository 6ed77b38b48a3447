use almanac_core::{ForecastRecord, Pipeline};
use serde::Serialize;

use crate::cli::{AtArgs, EntityArgs, ForecastArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct PeriodsResponseData<'a> {
    entity_code: &'a str,
    periods: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AtResponseData<'a> {
    entity_code: &'a str,
    target_period: &'a str,
    row: Option<ForecastRecord>,
}

pub async fn refresh(args: &ForecastArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let name = args.name.as_deref().unwrap_or(&args.code);
    let outcome = pipeline.refresh_forecast(&args.code, name).await;
    CommandResult::from_refresh(outcome)
}

pub fn snapshot(args: &EntityArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    match pipeline.warehouse().latest_state().current(&args.code)? {
        Some(snapshot) => Ok(CommandResult::ok(serde_json::to_value(snapshot)?)),
        None => Ok(CommandResult::ok(serde_json::Value::Null)
            .with_freshness("none")
            .with_warning(format!("no forecast stored for {}", args.code))),
    }
}

pub fn periods(args: &EntityArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let periods = pipeline.warehouse().latest_state().known_periods(&args.code)?;
    let empty = periods.is_empty();
    let data = serde_json::to_value(PeriodsResponseData {
        entity_code: &args.code,
        periods,
    })?;

    let result = CommandResult::ok(data);
    if empty {
        return Ok(result
            .with_freshness("none")
            .with_warning(format!("no forecast stored for {}", args.code)));
    }
    Ok(result)
}

pub fn at(args: &AtArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let row = pipeline
        .warehouse()
        .latest_state()
        .for_period(&args.code, &args.period)?;
    let missing = row.is_none();
    let data = serde_json::to_value(AtResponseData {
        entity_code: &args.code,
        target_period: &args.period,
        row,
    })?;

    let result = CommandResult::ok(data);
    if missing {
        return Ok(result.with_freshness("none").with_warning(format!(
            "no forecast stored for {} on {}",
            args.code, args.period
        )));
    }
    Ok(result)
}
