use almanac_core::{CoreError, Pipeline, StatsSelector, StatsTable};
use serde::Serialize;

use crate::cli::{StatsArgs, TablesArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct TablesResponseData<'a> {
    keyword: &'a str,
    tables: Vec<StatsTable>,
}

pub async fn tables(args: &TablesArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    match pipeline.search_tables(&args.keyword).await {
        Ok(tables) => {
            let empty = tables.is_empty();
            let data = serde_json::to_value(TablesResponseData {
                keyword: &args.keyword,
                tables,
            })?;
            let result = CommandResult::ok(data).with_freshness("fresh");
            if empty {
                return Ok(result.with_warning(format!("no tables match {}", args.keyword)));
            }
            Ok(result)
        }
        Err(error @ CoreError::Config(_)) => Err(error.into()),
        Err(error) => {
            let data = serde_json::to_value(TablesResponseData {
                keyword: &args.keyword,
                tables: Vec::new(),
            })?;
            Ok(CommandResult::ok(data).with_freshness("none").with_error(&error))
        }
    }
}

pub async fn refresh(args: &StatsArgs, pipeline: &Pipeline) -> Result<CommandResult, CliError> {
    let outcome = pipeline.refresh_statistics(&selector(args)).await;
    CommandResult::from_refresh(outcome)
}

fn selector(args: &StatsArgs) -> StatsSelector {
    match args.stats_data_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => StatsSelector::Id(id.to_owned()),
        _ => StatsSelector::Keyword {
            keyword: args.keyword.clone(),
            pick: args.pick,
        },
    }
}
