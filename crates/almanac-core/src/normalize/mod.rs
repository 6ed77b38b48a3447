//! Schema normalizers: nested source JSON in, flat typed rows out.

mod catalog;
mod forecast;
mod observation;

use serde_json::Value;

pub use catalog::{parse_area_offices, parse_stats_tables, AreaOffice, StatsTable};
pub use forecast::{normalize_forecast, ForecastLayout, ForecastMeta};
pub use observation::{normalize_observations, DIMENSION_MARKER};

/// Total numeric coercion.
///
/// Absent, null, empty and whitespace-only inputs, unparsable strings,
/// booleans, containers and non-finite results all map to `None`.
pub fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|number| number.is_finite())
}

/// Render a scalar as text; `None` for null and containers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
