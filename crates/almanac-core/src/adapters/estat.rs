use serde_json::Value;

use super::join_url;
use crate::error::FetchError;
use crate::fetch::{ApiStatusCheck, Endpoint, FetchClient};

pub const ESTAT_DEFAULT_BASE_URL: &str = "https://api.e-stat.go.jp";

const API_PREFIX: &str = "rest/3.0/app/json";

/// e-Stat statistics API. Every call carries the application id.
#[derive(Clone)]
pub struct EstatAdapter {
    client: FetchClient,
    base_url: String,
    app_id: String,
}

impl EstatAdapter {
    pub fn new(client: FetchClient, base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            app_id: app_id.into(),
        }
    }

    pub fn stats_list_endpoint(&self) -> Endpoint {
        Endpoint::new(
            join_url(&self.base_url, &format!("{API_PREFIX}/getStatsList")),
            ApiStatusCheck::EstatResult,
        )
    }

    pub fn stats_data_endpoint(&self) -> Endpoint {
        Endpoint::new(
            join_url(&self.base_url, &format!("{API_PREFIX}/getStatsData")),
            ApiStatusCheck::EstatResult,
        )
    }

    /// Raw `getStatsList` body for a keyword search.
    pub async fn search_tables(&self, keyword: &str, limit: u32) -> Result<Value, FetchError> {
        let limit = limit.to_string();
        self.client
            .fetch(
                &self.stats_list_endpoint(),
                &[
                    ("appId", self.app_id.as_str()),
                    ("searchWord", keyword),
                    ("limit", limit.as_str()),
                ],
            )
            .await
    }

    /// Raw `getStatsData` body for one table.
    pub async fn stats_data(&self, stats_data_id: &str) -> Result<Value, FetchError> {
        self.client
            .fetch(
                &self.stats_data_endpoint(),
                &[
                    ("appId", self.app_id.as_str()),
                    ("statsDataId", stats_data_id),
                ],
            )
            .await
    }
}
