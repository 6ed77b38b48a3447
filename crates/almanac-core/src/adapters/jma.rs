use serde_json::Value;

use super::join_url;
use crate::error::FetchError;
use crate::fetch::{Endpoint, FetchClient};

pub const JMA_DEFAULT_BASE_URL: &str = "https://www.jma.go.jp/bosai";

/// Japan Meteorological Agency forecast feed.
#[derive(Clone)]
pub struct JmaAdapter {
    client: FetchClient,
    base_url: String,
}

impl JmaAdapter {
    pub fn new(client: FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn area_list_endpoint(&self) -> Endpoint {
        Endpoint::unchecked(join_url(&self.base_url, "common/const/area.json"))
    }

    pub fn forecast_endpoint(&self, office_code: &str) -> Endpoint {
        Endpoint::unchecked(join_url(
            &self.base_url,
            &format!(
                "forecast/data/forecast/{}.json",
                urlencoding::encode(office_code.trim())
            ),
        ))
    }

    /// Raw `area.json` document.
    pub async fn area_list(&self) -> Result<Value, FetchError> {
        self.client.fetch(&self.area_list_endpoint(), &[]).await
    }

    /// Raw forecast document for one office.
    pub async fn forecast(&self, office_code: &str) -> Result<Value, FetchError> {
        self.client
            .fetch(&self.forecast_endpoint(office_code), &[])
            .await
    }
}
