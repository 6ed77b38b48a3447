use serde::Serialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::json_path::{required, JsonPath};

/// A forecast office from the JMA area list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaOffice {
    pub code: String,
    pub name: String,
}

/// One statistics table returned by an e-Stat search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsTable {
    pub id: String,
    pub title: String,
}

const TABLES_PATH: [&str; 3] = ["GET_STATS_LIST", "DATALIST_INF", "TABLE_INF"];
const TABLE_ID_KEYS: [&str; 3] = ["@id", "STATSDATA_ID", "statsDataId"];
const TABLE_TITLE_KEYS: [&str; 2] = ["TITLE", "STAT_NAME"];

/// Offices listed under `offices` in the JMA `area.json`, ordered by code.
pub fn parse_area_offices(raw: &Value) -> Result<Vec<AreaOffice>, ParseError> {
    let offices = JsonPath::root(raw)
        .key("offices")
        .value()
        .and_then(Value::as_object);
    let offices = required(offices, "offices")?;

    let mut parsed: Vec<AreaOffice> = offices
        .iter()
        .map(|(code, info)| AreaOffice {
            code: code.clone(),
            name: JsonPath::root(info)
                .key("name")
                .as_str()
                .unwrap_or_default()
                .to_owned(),
        })
        .collect();
    parsed.sort_by(|left, right| {
        (left.code.len(), left.code.as_str()).cmp(&(right.code.len(), right.code.as_str()))
    });
    Ok(parsed)
}

/// Tables listed in an e-Stat `getStatsList` body, in response order.
///
/// Entries without any recognizable identifier are skipped.
pub fn parse_stats_tables(raw: &Value) -> Result<Vec<StatsTable>, ParseError> {
    let entries = required(
        JsonPath::root(raw).dig(&TABLES_PATH).one_or_many(),
        &TABLES_PATH.join("."),
    )?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let entry = JsonPath::root(entry);
            let id = first_text(entry, &TABLE_ID_KEYS)?;
            let title = TABLE_TITLE_KEYS
                .iter()
                .map(|key| entry.key(key))
                .find(|candidate| candidate.is_present())
                .map(title_text)
                .unwrap_or_default();
            Some(StatsTable { id, title })
        })
        .collect())
}

fn first_text(entry: JsonPath<'_>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.key(key).value().and_then(super::scalar_text))
        .find(|text| !text.is_empty())
}

/// Titles come either as plain strings or as `{"@no": .., "$": text}`.
fn title_text(title: JsonPath<'_>) -> String {
    title
        .as_str()
        .or_else(|| title.key("$").as_str())
        .map_or_else(
            || title.value().map(Value::to_string).unwrap_or_default(),
            str::to_owned,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offices_are_sorted_by_code() {
        let raw = json!({
            "centers": {"010100": {"name": "北海道地方"}},
            "offices": {
                "270000": {"name": "大阪府", "parent": "010600"},
                "130000": {"name": "東京都"},
                "016000": {"name": "石狩・空知・後志地方"},
                "474000": {}
            }
        });

        let offices = parse_area_offices(&raw).expect("offices");
        let codes: Vec<_> = offices.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(codes, vec!["016000", "130000", "270000", "474000"]);
        assert_eq!(offices[1].name, "東京都");
        assert_eq!(offices[3].name, "");
    }

    #[test]
    fn missing_offices_map_is_fatal() {
        assert!(parse_area_offices(&json!({"centers": {}})).is_err());
        assert!(parse_area_offices(&json!([])).is_err());
    }

    #[test]
    fn tables_accept_alternative_id_and_title_shapes() {
        let raw = json!({
            "GET_STATS_LIST": {
                "RESULT": {"STATUS": 0},
                "DATALIST_INF": {
                    "TABLE_INF": [
                        {"@id": "0003411595", "TITLE": {"@no": "1", "$": "宿泊旅行統計"}},
                        {"STATSDATA_ID": "0003000001", "TITLE": "人口推計"},
                        {"statsDataId": 42, "STAT_NAME": {"$": "住宅・土地統計"}},
                        {"TITLE": "no id"}
                    ]
                }
            }
        });

        let tables = parse_stats_tables(&raw).expect("tables");
        assert_eq!(
            tables,
            vec![
                StatsTable {
                    id: "0003411595".to_string(),
                    title: "宿泊旅行統計".to_string()
                },
                StatsTable {
                    id: "0003000001".to_string(),
                    title: "人口推計".to_string()
                },
                StatsTable {
                    id: "42".to_string(),
                    title: "住宅・土地統計".to_string()
                },
            ]
        );
    }

    #[test]
    fn single_table_object_is_one_entry() {
        let raw = json!({
            "GET_STATS_LIST": {"DATALIST_INF": {"TABLE_INF": {"@id": "1", "TITLE": "x"}}}
        });
        assert_eq!(parse_stats_tables(&raw).expect("tables").len(), 1);
        assert!(parse_stats_tables(&json!({"GET_STATS_LIST": {}})).is_err());
    }
}
