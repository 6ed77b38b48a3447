//! Refresh cycles: fetch, normalize, store, and fall back to stored state
//! when any step fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use almanac_warehouse::{ObservationGeneration, Snapshot, Warehouse};
use serde_json::Value;

use crate::adapters::{EstatAdapter, JmaAdapter};
use crate::config::{AlmanacConfig, ESTAT_APP_ID_VARS};
use crate::error::{ConfigError, CoreError, ParseError};
use crate::fetch::FetchClient;
use crate::http_client::HttpClient;
use crate::normalize::{
    normalize_forecast, normalize_observations, parse_area_offices, parse_stats_tables,
    AreaOffice, ForecastLayout, StatsTable,
};
use crate::provider_policy::ProviderPolicy;

/// Number of candidates requested from a table search.
pub const SEARCH_LIMIT: u32 = 10;

/// Result of one refresh cycle.
#[derive(Debug)]
pub enum RefreshOutcome<T> {
    /// Fetched, normalized and stored in this cycle.
    Fresh(T),
    /// The cycle failed; previously stored data is served instead.
    Fallback { stored: T, error: CoreError },
    /// The cycle failed and nothing was stored before.
    Failed(CoreError),
}

impl<T> RefreshOutcome<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Fresh(data) | Self::Fallback { stored: data, .. } => Some(data),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Fresh(_) => None,
            Self::Fallback { error, .. } | Self::Failed(error) => Some(error),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            Self::Fresh(data) => Ok(data),
            Self::Fallback { error, .. } | Self::Failed(error) => Err(error),
        }
    }
}

/// Which statistics table to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsSelector {
    Id(String),
    /// The `pick`-th (1-based) table of a keyword search.
    Keyword { keyword: String, pick: usize },
}

pub struct Pipeline {
    warehouse: Warehouse,
    jma: JmaAdapter,
    estat: Option<EstatAdapter>,
    layout: ForecastLayout,
    raw_json_path: PathBuf,
}

impl Pipeline {
    pub fn new(
        warehouse: Warehouse,
        jma: JmaAdapter,
        estat: Option<EstatAdapter>,
        raw_json_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            warehouse,
            jma,
            estat,
            layout: ForecastLayout::jma(),
            raw_json_path: raw_json_path.into(),
        }
    }

    /// Open the configured warehouse and build both adapters over `http`.
    ///
    /// The statistics adapter is only built when an application id is set.
    pub fn from_config(config: &AlmanacConfig, http: Arc<dyn HttpClient>) -> Result<Self, CoreError> {
        let warehouse = Warehouse::open(config.warehouse_config())?;

        let mut jma_policy = ProviderPolicy::jma_default();
        let mut estat_policy = ProviderPolicy::estat_default();
        if let Some(timeout_ms) = config.timeout_ms {
            jma_policy.timeout_ms = timeout_ms;
            estat_policy.timeout_ms = timeout_ms;
        }

        let jma = JmaAdapter::new(
            FetchClient::new(Arc::clone(&http), &jma_policy),
            config.jma_base_url.as_str(),
        );
        let estat = config.estat_app_id.as_deref().map(|app_id| {
            EstatAdapter::new(
                FetchClient::new(Arc::clone(&http), &estat_policy),
                config.estat_base_url.as_str(),
                app_id,
            )
        });

        Ok(Self::new(warehouse, jma, estat, config.raw_json_path.clone()))
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn raw_json_path(&self) -> &Path {
        &self.raw_json_path
    }

    /// Forecast offices known to the JMA area list.
    pub async fn area_offices(&self) -> Result<Vec<AreaOffice>, CoreError> {
        let raw = self.jma.area_list().await?;
        Ok(parse_area_offices(&raw)?)
    }

    /// Candidate statistics tables for a keyword.
    pub async fn search_tables(&self, keyword: &str) -> Result<Vec<StatsTable>, CoreError> {
        let raw = self.estat()?.search_tables(keyword, SEARCH_LIMIT).await?;
        Ok(parse_stats_tables(&raw)?)
    }

    /// Fetch, normalize and store one office's forecast.
    pub async fn refresh_forecast(
        &self,
        entity_code: &str,
        entity_name: &str,
    ) -> RefreshOutcome<Snapshot> {
        match self.ingest_forecast(entity_code, entity_name).await {
            Ok(snapshot) => RefreshOutcome::Fresh(snapshot),
            Err(error) => {
                let stored = self.warehouse.latest_state().current(entity_code);
                fall_back(entity_code, stored, error)
            }
        }
    }

    /// Fetch, normalize and append one statistics table.
    pub async fn refresh_statistics(
        &self,
        selector: &StatsSelector,
    ) -> RefreshOutcome<ObservationGeneration> {
        let series_id = match self.resolve_series_id(selector).await {
            Ok(series_id) => series_id,
            Err(error) => return RefreshOutcome::Failed(error),
        };

        match self.ingest_statistics(&series_id).await {
            Ok(generation) => RefreshOutcome::Fresh(generation),
            Err(error) => {
                let stored = self.warehouse.latest_state().observations(&series_id);
                fall_back(&series_id, stored, error)
            }
        }
    }

    async fn ingest_forecast(
        &self,
        entity_code: &str,
        entity_name: &str,
    ) -> Result<Snapshot, CoreError> {
        let raw = self.jma.forecast(entity_code).await?;
        let (rows, meta) = normalize_forecast(entity_code, entity_name, &raw, &self.layout)?;
        self.warehouse.upsert_forecasts(&rows)?;
        tracing::info!(
            entity_code,
            rows = rows.len(),
            published_at = meta.published_at.as_str(),
            "forecast refreshed"
        );

        self.warehouse
            .latest_state()
            .current(entity_code)?
            .ok_or(CoreError::Parse(ParseError::NoRows))
    }

    async fn resolve_series_id(&self, selector: &StatsSelector) -> Result<String, CoreError> {
        match selector {
            StatsSelector::Id(id) => Ok(id.trim().to_owned()),
            StatsSelector::Keyword { keyword, pick } => {
                let tables = self.search_tables(keyword).await?;
                let chosen = pick
                    .checked_sub(1)
                    .and_then(|index| tables.get(index))
                    .ok_or_else(|| CoreError::NoMatchingTable {
                        keyword: keyword.clone(),
                        pick: *pick,
                    })?;
                tracing::info!(
                    keyword = keyword.as_str(),
                    pick,
                    stats_data_id = chosen.id.as_str(),
                    "selected statistics table"
                );
                Ok(chosen.id.clone())
            }
        }
    }

    async fn ingest_statistics(&self, series_id: &str) -> Result<ObservationGeneration, CoreError> {
        let raw = self.estat()?.stats_data(series_id).await?;
        if let Err(error) = self.write_raw_json(&raw).await {
            tracing::warn!(
                series_id,
                path = %self.raw_json_path.display(),
                error = %error,
                "could not write statistics audit copy"
            );
        }

        let mut rows = normalize_observations(series_id, &raw)?;
        if rows.is_empty() {
            return Err(ParseError::NoRows.into());
        }

        let report = self.warehouse.insert_observations(&rows)?;
        for row in &mut rows {
            row.ingested_at = Some(report.ingested_at.clone());
        }
        tracing::info!(
            series_id,
            rows = report.inserted,
            ingested_at = report.ingested_at.as_str(),
            "statistics refreshed"
        );

        Ok(ObservationGeneration {
            series_id: series_id.to_owned(),
            ingested_at: report.ingested_at,
            rows,
        })
    }

    async fn write_raw_json(&self, raw: &Value) -> Result<(), CoreError> {
        if let Some(parent) = self.raw_json_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let pretty = serde_json::to_string_pretty(raw)?;
        tokio::fs::write(&self.raw_json_path, pretty).await?;
        Ok(())
    }

    fn estat(&self) -> Result<&EstatAdapter, ConfigError> {
        self.estat.as_ref().ok_or(ConfigError::MissingCredential {
            var: ESTAT_APP_ID_VARS[0],
        })
    }
}

fn fall_back<T, E>(key: &str, stored: Result<Option<T>, E>, error: CoreError) -> RefreshOutcome<T>
where
    E: std::fmt::Display,
{
    match stored {
        Ok(Some(stored)) => {
            tracing::warn!(key, error = %error, "refresh failed, serving stored data");
            RefreshOutcome::Fallback { stored, error }
        }
        Ok(None) => {
            tracing::warn!(key, error = %error, "refresh failed, nothing stored");
            RefreshOutcome::Failed(error)
        }
        Err(store_error) => {
            tracing::warn!(key, error = %error, store_error = %store_error, "refresh failed, stored data unreadable");
            RefreshOutcome::Failed(error)
        }
    }
}
