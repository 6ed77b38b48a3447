use std::collections::BTreeMap;

use almanac_warehouse::ObservationRecord;
use serde_json::Value;

use crate::error::ParseError;
use crate::json_path::{required, JsonPath};
use crate::normalize::{coerce_float, scalar_text};

/// Prefix marking dimension attributes on e-Stat value items.
pub const DIMENSION_MARKER: char = '@';

const VALUES_PATH: [&str; 4] = ["GET_STATS_DATA", "STATISTICAL_DATA", "DATA_INF", "VALUE"];
const VALUE_KEYS: [&str; 3] = ["$", "@value", "value"];

/// Flatten an e-Stat `getStatsData` body into observation rows.
pub fn normalize_observations(
    series_id: &str,
    raw: &Value,
) -> Result<Vec<ObservationRecord>, ParseError> {
    let items = required(
        JsonPath::root(raw).dig(&VALUES_PATH).one_or_many(),
        &VALUES_PATH.join("."),
    )?;

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(position, item)| observation_row(series_id, position, item))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(series_id, rows = rows.len(), "normalized observations");
    Ok(rows)
}

fn observation_row(
    series_id: &str,
    position: usize,
    item: &Value,
) -> Result<ObservationRecord, ParseError> {
    let fields = item
        .as_object()
        .ok_or_else(|| ParseError::UnexpectedShape {
            path: format!("{}[{position}]", VALUES_PATH.join(".")),
            expected: "object",
        })?;

    let raw_value = VALUE_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !is_blank(value));

    let mut dimensions = BTreeMap::new();
    for (key, value) in fields {
        if !key.starts_with(DIMENSION_MARKER) || VALUE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let name = key.trim_start_matches(DIMENSION_MARKER);
        let text = scalar_text(value).unwrap_or_else(|| value.to_string());
        if dimensions.insert(name.to_owned(), text).is_some() {
            return Err(ParseError::DimensionCollision {
                key: name.to_owned(),
            });
        }
    }

    Ok(ObservationRecord {
        series_id: series_id.to_owned(),
        value: coerce_float(raw_value),
        time_label: dimensions.get("time").cloned(),
        area_label: dimensions.get("area").cloned(),
        dimensions,
        ingested_at: None,
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
