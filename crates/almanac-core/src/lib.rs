//! # Almanac Core
//!
//! Ingestion pipeline for loosely structured time-series JSON APIs.
//!
//! ## Overview
//!
//! - **Fetch client** with bounded retry, backoff, pacing and API status checks
//! - **Optional-path accessor** for deeply nested, ragged JSON
//! - **Schema normalizers** turning JMA forecasts and e-Stat statistics into flat rows
//! - **Refresh pipeline** that stores rows idempotently and falls back to stored state
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | JMA and e-Stat endpoint layouts |
//! | [`config`] | Environment-driven settings |
//! | [`error`] | Core error types |
//! | [`fetch`] | Retrying JSON fetch client |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`json_path`] | Optional-path JSON traversal |
//! | [`normalize`] | Schema normalizers and numeric coercion |
//! | [`pipeline`] | Refresh cycles and fallback |
//! | [`provider_policy`] | Per-source retry and pacing policies |
//! | [`retry`] | Retry configuration and backoff |
//! | [`source`] | Source identifiers |
//! | [`throttling`] | Quota limiter and pacing |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use almanac_core::{AlmanacConfig, Pipeline, RefreshOutcome, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AlmanacConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(&config, Arc::new(ReqwestHttpClient::new()))?;
//!
//!     match pipeline.refresh_forecast("130000", "東京都").await {
//!         RefreshOutcome::Fresh(snapshot) => println!("{} fresh rows", snapshot.rows.len()),
//!         RefreshOutcome::Fallback { stored, error } => {
//!             println!("offline ({error}); {} stored rows", stored.rows.len())
//!         }
//!         RefreshOutcome::Failed(error) => return Err(error.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Pipeline        │────▶│ Source adapters  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       ▼
//!          │              ┌──────────────────┐
//!          │              │ FetchClient      │
//!          │              │ retry + pacing   │
//!          │              └────────┬─────────┘
//!          ▼                       ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Normalizers     │◀────│ raw JSON         │
//! └────────┬────────┘     └──────────────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Warehouse       │
//! │ (DuckDB)        │
//! └─────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod json_path;
pub mod normalize;
pub mod pipeline;
pub mod provider_policy;
pub mod retry;
pub mod source;
pub mod throttling;

pub use adapters::{EstatAdapter, JmaAdapter};
pub use almanac_warehouse::{
    ForecastRecord, LatestState, ObservationGeneration, ObservationRecord, Snapshot, Warehouse,
    WarehouseConfig, WarehouseError,
};
pub use config::AlmanacConfig;
pub use error::{ConfigError, CoreError, FetchError, ParseError};
pub use fetch::{ApiStatusCheck, Endpoint, FetchClient};
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient, ScriptedHttpClient,
};
pub use json_path::JsonPath;
pub use normalize::{
    coerce_float, normalize_forecast, normalize_observations, parse_area_offices,
    parse_stats_tables, AreaOffice, ForecastLayout, ForecastMeta, StatsTable,
};
pub use pipeline::{Pipeline, RefreshOutcome, StatsSelector};
pub use provider_policy::ProviderPolicy;
pub use retry::{Backoff, RetryConfig};
pub use source::ProviderId;
pub use throttling::RequestPacer;
