// Shared fixtures for the behavior suites
use std::collections::BTreeMap;

pub use almanac_warehouse::ObservationRecord;

/// One not-yet-stored observation of `series_id` with the given dimensions.
pub fn observation(series_id: &str, value: Option<f64>, dimensions: &[(&str, &str)]) -> ObservationRecord {
    let dimensions: BTreeMap<String, String> = dimensions
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    ObservationRecord {
        series_id: series_id.to_string(),
        value,
        time_label: dimensions.get("time").cloned(),
        area_label: dimensions.get("area").cloned(),
        dimensions,
        ingested_at: None,
    }
}
