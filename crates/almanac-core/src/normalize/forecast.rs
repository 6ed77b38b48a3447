use almanac_warehouse::ForecastRecord;
use serde::Serialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::json_path::{required, JsonPath};
use crate::normalize::coerce_float;
use crate::ProviderId;

/// JSON key names of a forecast-shaped report.
///
/// The walker expects an array of reports whose first element carries
/// publication metadata and a list of series groups. The first group
/// defines the periods and the categorical arrays; numeric arrays may live
/// in any group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastLayout {
    pub publisher: &'static str,
    pub published_at: &'static str,
    pub series: &'static str,
    pub periods: &'static str,
    pub areas: &'static str,
    pub area: &'static str,
    pub area_name: &'static str,
    /// Category arrays mapped to `category_a`, `category_b`, `category_c`.
    /// The first one is required and bounds the row count.
    pub categories: [&'static str; 3],
    pub numeric_low: &'static str,
    pub numeric_high: &'static str,
    pub source_tag: &'static str,
}

impl ForecastLayout {
    pub const fn jma() -> Self {
        Self {
            publisher: "publishingOffice",
            published_at: "reportDatetime",
            series: "timeSeries",
            periods: "timeDefines",
            areas: "areas",
            area: "area",
            area_name: "name",
            categories: ["weathers", "winds", "waves"],
            numeric_low: "tempsMin",
            numeric_high: "tempsMax",
            source_tag: ProviderId::Jma.as_str(),
        }
    }
}

impl Default for ForecastLayout {
    fn default() -> Self {
        Self::jma()
    }
}

/// Publication metadata shown alongside a row set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastMeta {
    pub publisher: Option<String>,
    pub published_at: String,
    pub detail_label: Option<String>,
}

/// Flatten one forecast document into rows keyed by target period.
///
/// Either every row is produced or a [`ParseError`] is returned.
pub fn normalize_forecast(
    entity_code: &str,
    entity_name: &str,
    raw: &Value,
    layout: &ForecastLayout,
) -> Result<(Vec<ForecastRecord>, ForecastMeta), ParseError> {
    let reports = JsonPath::root(raw)
        .as_array()
        .filter(|reports| !reports.is_empty())
        .ok_or(ParseError::UnexpectedShape {
            path: String::from("$"),
            expected: "non-empty array of reports",
        })?;
    let report = JsonPath::root(&reports[0]);

    let published_at = required(
        report
            .key(layout.published_at)
            .as_str()
            .filter(|text| !text.trim().is_empty()),
        layout.published_at,
    )?
    .to_owned();
    let publisher = report.key(layout.publisher).as_str().map(str::to_owned);

    let groups = required(report.key(layout.series).as_array(), layout.series)?;
    if groups.is_empty() {
        return Err(ParseError::UnexpectedShape {
            path: layout.series.to_owned(),
            expected: "non-empty array",
        });
    }

    let primary = JsonPath::root(&groups[0]);
    let periods = primary.key(layout.periods).array_or_empty();
    let areas_path = format!("{}[0].{}", layout.series, layout.areas);
    let target = JsonPath::root(required(
        primary
            .key(layout.areas)
            .as_array()
            .and_then(<[Value]>::first),
        &areas_path,
    )?);

    let detail_label = target
        .key(layout.area)
        .key(layout.area_name)
        .as_str()
        .map(str::to_owned);

    let [primary_key, second_key, third_key] = layout.categories;
    let category_a = required(
        target.key(primary_key).as_array(),
        &format!("{areas_path}[0].{primary_key}"),
    )?;
    let category_b = target.key(second_key).array_or_empty();
    let category_c = target.key(third_key).array_or_empty();

    let numeric_low = first_numeric_series(groups, layout, layout.numeric_low);
    let numeric_high = first_numeric_series(groups, layout, layout.numeric_high);

    let days = periods.len().min(category_a.len());
    let mut rows = Vec::with_capacity(days);
    for day in 0..days {
        let label = periods[day]
            .as_str()
            .ok_or_else(|| ParseError::UnexpectedShape {
                path: format!("{}[0].{}[{day}]", layout.series, layout.periods),
                expected: "period label string",
            })?;

        rows.push(ForecastRecord {
            entity_code: entity_code.to_owned(),
            entity_name: entity_name.to_owned(),
            detail_label: detail_label.clone(),
            publisher: publisher.clone(),
            published_at: published_at.clone(),
            target_period: label.chars().take(10).collect(),
            category_a: text_at(category_a, day),
            category_b: text_at(category_b, day),
            category_c: text_at(category_c, day),
            numeric_low: coerce_float(numeric_low.get(day)),
            numeric_high: coerce_float(numeric_high.get(day)),
            source: layout.source_tag.to_owned(),
        });
    }

    if rows.is_empty() {
        return Err(ParseError::NoRows);
    }

    tracing::debug!(
        entity_code,
        rows = rows.len(),
        published_at = published_at.as_str(),
        "normalized forecast"
    );
    Ok((
        rows,
        ForecastMeta {
            publisher,
            published_at,
            detail_label,
        },
    ))
}

/// First non-empty `key` array found in any group's first area.
fn first_numeric_series<'a>(
    groups: &'a [Value],
    layout: &ForecastLayout,
    key: &str,
) -> &'a [Value] {
    groups
        .iter()
        .map(|group| {
            JsonPath::root(group)
                .key(layout.areas)
                .first()
                .key(key)
                .array_or_empty()
        })
        .find(|values| !values.is_empty())
        .unwrap_or(&[])
}

fn text_at(values: &[Value], index: usize) -> Option<String> {
    values.get(index)?.as_str().map(str::to_owned)
}
