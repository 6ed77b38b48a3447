//! # Almanac Warehouse
//!
//! DuckDB-based persistence for normalized forecast and observation rows.
//!
//! ## Overview
//!
//! The warehouse guarantees at most one logical forecast row per natural key
//! `(entity_code, published_at, target_period)`. Re-upserting a key replaces
//! every mutable attribute in place. Observation rows are append-only: each
//! insert call lands as a new generation stamped with one `ingested_at`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use almanac_warehouse::{ForecastRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let row = ForecastRecord {
//!         entity_code: "130000".to_string(),
//!         entity_name: "東京都".to_string(),
//!         detail_label: Some("東京地方".to_string()),
//!         publisher: Some("気象庁".to_string()),
//!         published_at: "2026-10-19T11:00:00+09:00".to_string(),
//!         target_period: "2026-10-19".to_string(),
//!         category_a: Some("晴れ".to_string()),
//!         category_b: None,
//!         category_c: None,
//!         numeric_low: None,
//!         numeric_high: Some(24.0),
//!         source: "jma".to_string(),
//!     };
//!     warehouse.upsert_forecasts(&[row])?;
//!
//!     let rows = warehouse.latest_snapshot("130000")?;
//!     println!("{} rows in the newest publication", rows.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `forecasts` | Forecast-like rows, unique per natural key |
//! | `observations` | Append-only statistical observations |
//! | `schema_migrations` | Bootstrap DDL ledger |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_forecasts_current` | Rows of each entity's newest publication |
//! | `vw_observations_latest` | Newest generation per series |

pub mod duckdb;
pub mod migrations;
pub mod resolver;
pub mod views;

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::{params, Connection, ToSql};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

pub use duckdb::{DatabaseLocation, DuckDbConnectionManager, PooledConnection};
pub use resolver::{LatestState, ObservationGeneration, Snapshot};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Dimension map could not be encoded or decoded.
    #[error("dimension blob error: {0}")]
    Dimensions(#[from] serde_json::Error),

    /// Generation timestamp could not be rendered.
    #[error("timestamp formatting failed: {0}")]
    Clock(#[from] time::error::Format),

    /// A row was rejected before reaching the database.
    #[error("record rejected: {0}")]
    RecordRejected(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for almanac data.
    pub almanac_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_almanac_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `almanac_home` with the default file layout.
    pub fn for_home(almanac_home: impl Into<PathBuf>) -> Self {
        let almanac_home = almanac_home.into();
        let db_path = almanac_home.join("almanac.duckdb");
        Self {
            almanac_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// One forecast-like row: an entity's statement about one target period,
/// as published at one point in time.
///
/// For the JMA source the generic columns carry:
/// `category_a` weather, `category_b` wind, `category_c` wave,
/// `numeric_low` / `numeric_high` minimum / maximum temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Entity identifier (e.g. JMA office code). Part of the natural key.
    pub entity_code: String,
    /// Human-readable entity name.
    pub entity_name: String,
    /// Sub-area label reported by the source.
    pub detail_label: Option<String>,
    /// Publishing office.
    pub publisher: Option<String>,
    /// Publication timestamp, string-sortable. Part of the natural key.
    pub published_at: String,
    /// Date the row describes (`YYYY-MM-DD`). Part of the natural key.
    pub target_period: String,
    pub category_a: Option<String>,
    pub category_b: Option<String>,
    pub category_c: Option<String>,
    pub numeric_low: Option<f64>,
    pub numeric_high: Option<f64>,
    /// Source tag (e.g. "jma").
    pub source: String,
}

impl ForecastRecord {
    /// The `(entity_code, published_at, target_period)` triple.
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (
            self.entity_code.as_str(),
            self.published_at.as_str(),
            self.target_period.as_str(),
        )
    }
}

/// One statistical observation. Never deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Dataset identifier (e.g. e-Stat `statsDataId`).
    pub series_id: String,
    pub value: Option<f64>,
    pub time_label: Option<String>,
    pub area_label: Option<String>,
    /// Every dimension attribute of the source item, marker prefix stripped.
    pub dimensions: BTreeMap<String, String>,
    /// Generation stamp; `None` until the row has been stored.
    pub ingested_at: Option<String>,
}

/// Result of appending one observation generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    /// Stamp shared by every row of the generation.
    pub ingested_at: String,
    /// Number of rows appended.
    pub inserted: usize,
}

/// Row count of one stored observation generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub ingested_at: String,
    pub row_count: u64,
}

const FORECAST_COLUMNS: &str = "entity_code, entity_name, detail_label, publisher, \
     published_at, target_period, category_a, category_b, category_c, \
     numeric_low, numeric_high, source";

const OBSERVATION_COLUMNS: &str =
    "series_id, value, time_label, area_label, dimensions, ingested_at";

const UPSERT_FORECAST_SQL: &str = "INSERT INTO forecasts \
     (entity_code, entity_name, detail_label, publisher, published_at, target_period, \
      category_a, category_b, category_c, numeric_low, numeric_high, source) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT (entity_code, published_at, target_period) DO UPDATE SET \
         entity_name = excluded.entity_name, \
         detail_label = excluded.detail_label, \
         publisher = excluded.publisher, \
         category_a = excluded.category_a, \
         category_b = excluded.category_b, \
         category_c = excluded.category_c, \
         numeric_low = excluded.numeric_low, \
         numeric_high = excluded.numeric_high, \
         source = excluded.source";

/// The main warehouse interface.
///
/// Clones share one database and one write gate: write transactions from
/// any clone run one at a time, reads are never blocked.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
    write_gate: Arc<Mutex<()>>,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(
            DatabaseLocation::File(config.db_path),
            config.max_pool_size,
        )?;
        let warehouse = Self::with_manager(manager);
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a private in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open(DatabaseLocation::InMemory, 2)?;
        let warehouse = Self::with_manager(manager);
        warehouse.initialize()?;
        Ok(warehouse)
    }

    fn with_manager(manager: DuckDbConnectionManager) -> Self {
        Self {
            manager,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema and views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    /// Path to the database file, `None` when in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Read-only query layer over this warehouse.
    pub fn latest_state(&self) -> LatestState<'_> {
        LatestState::new(self)
    }

    /// Insert or replace a single forecast row by natural key.
    pub fn upsert_forecast(&self, row: &ForecastRecord) -> Result<(), WarehouseError> {
        self.upsert_forecasts(std::slice::from_ref(row)).map(|_| ())
    }

    /// Insert or replace forecast rows by natural key.
    ///
    /// The whole batch commits in one transaction or not at all. When a batch
    /// carries the same natural key more than once, the last occurrence wins.
    /// Returns the number of distinct keys written.
    pub fn upsert_forecasts(&self, rows: &[ForecastRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        for row in rows {
            validate_forecast(row)?;
        }
        let batch = collapse_by_natural_key(rows);

        let _writer = self.lock_writer();
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(UPSERT_FORECAST_SQL)?;
            for row in &batch {
                let params: [&dyn ToSql; 12] = [
                    &row.entity_code,
                    &row.entity_name,
                    &row.detail_label,
                    &row.publisher,
                    &row.published_at,
                    &row.target_period,
                    &row.category_a,
                    &row.category_b,
                    &row.category_c,
                    &row.numeric_low,
                    &row.numeric_high,
                    &row.source,
                ];
                statement.execute(params.as_slice())?;
            }
            Ok(batch.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        tracing::info!(
            rows = written,
            entity_code = rows[0].entity_code.as_str(),
            "forecast batch committed"
        );
        Ok(written)
    }

    /// Append one observation generation stamped with the current UTC time.
    ///
    /// When the stamp is already taken by a stored generation it is moved
    /// forward one microsecond at a time until it is free.
    pub fn insert_observations(
        &self,
        rows: &[ObservationRecord],
    ) -> Result<InsertReport, WarehouseError> {
        let _writer = self.lock_writer();
        let connection = self.manager.acquire()?;

        let mut stamped = OffsetDateTime::now_utc();
        let mut ingested_at = generation_stamp(stamped)?;
        while generation_exists(&connection, &ingested_at)? {
            stamped += Duration::microseconds(1);
            ingested_at = generation_stamp(stamped)?;
        }
        append_generation(&connection, rows, &ingested_at)
    }

    /// Append one observation generation with an explicit stamp.
    ///
    /// A stamp names exactly one generation; reusing a stored stamp is
    /// rejected.
    pub fn insert_observations_at(
        &self,
        rows: &[ObservationRecord],
        ingested_at: &str,
    ) -> Result<InsertReport, WarehouseError> {
        if ingested_at.trim().is_empty() {
            return Err(WarehouseError::RecordRejected(String::from(
                "ingested_at must not be empty",
            )));
        }

        let _writer = self.lock_writer();
        let connection = self.manager.acquire()?;
        if generation_exists(&connection, ingested_at)? {
            return Err(WarehouseError::RecordRejected(format!(
                "generation '{ingested_at}' is already stored"
            )));
        }
        append_generation(&connection, rows, ingested_at)
    }

    /// Maximum `published_at` stored for the entity.
    pub fn latest_published_at(&self, entity_code: &str) -> Result<Option<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let latest: Option<String> = connection.query_row(
            "SELECT MAX(published_at) FROM forecasts WHERE entity_code = ?",
            params![entity_code],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// All rows of the entity's newest publication, ascending by target period.
    pub fn latest_snapshot(&self, entity_code: &str) -> Result<Vec<ForecastRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {FORECAST_COLUMNS} FROM vw_forecasts_current \
             WHERE entity_code = ? ORDER BY target_period ASC"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement
            .query_map(params![entity_code], read_forecast)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct target periods ever stored for the entity, ascending.
    pub fn known_periods(&self, entity_code: &str) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT target_period FROM forecasts \
             WHERE entity_code = ? ORDER BY target_period ASC",
        )?;
        let periods = statement
            .query_map(params![entity_code], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(periods)
    }

    /// The most recently published row covering `target_period`.
    pub fn best_row_for_period(
        &self,
        entity_code: &str,
        target_period: &str,
    ) -> Result<Option<ForecastRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {FORECAST_COLUMNS} FROM forecasts \
             WHERE entity_code = ? AND target_period = ? \
             ORDER BY published_at DESC LIMIT 1"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let mut rows = statement.query_map(params![entity_code, target_period], read_forecast)?;
        let best = rows.next().transpose()?;
        Ok(best)
    }

    /// Rows of the newest observation generation for the series, in insert order.
    pub fn latest_observations(
        &self,
        series_id: &str,
    ) -> Result<Vec<ObservationRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM vw_observations_latest \
             WHERE series_id = ? ORDER BY id ASC"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let raw = statement
            .query_map(params![series_id], read_observation)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawObservation::decode).collect()
    }

    /// Every stored generation for the series, oldest first.
    pub fn observation_generations(
        &self,
        series_id: &str,
    ) -> Result<Vec<GenerationSummary>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT ingested_at, COUNT(*) FROM observations \
             WHERE series_id = ? GROUP BY ingested_at ORDER BY MIN(id) ASC",
        )?;
        let generations = statement
            .query_map(params![series_id], |row| {
                let row_count: i64 = row.get(1)?;
                Ok(GenerationSummary {
                    ingested_at: row.get(0)?,
                    row_count: u64::try_from(row_count).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(generations)
    }
}

fn generation_exists(connection: &Connection, ingested_at: &str) -> Result<bool, WarehouseError> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM observations WHERE ingested_at = ?",
        params![ingested_at],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert `rows` as one generation in a single transaction.
fn append_generation(
    connection: &Connection,
    rows: &[ObservationRecord],
    ingested_at: &str,
) -> Result<InsertReport, WarehouseError> {
    if rows.is_empty() {
        return Ok(InsertReport {
            ingested_at: ingested_at.to_owned(),
            inserted: 0,
        });
    }

    let encoded = rows
        .iter()
        .map(|row| serde_json::to_string(&row.dimensions))
        .collect::<Result<Vec<_>, _>>()?;

    connection.execute_batch("BEGIN TRANSACTION")?;
    let result = (|| -> Result<usize, WarehouseError> {
        let mut statement = connection.prepare(
            "INSERT INTO observations \
             (series_id, value, time_label, area_label, dimensions, ingested_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        for (row, dimensions) in rows.iter().zip(&encoded) {
            let params: [&dyn ToSql; 6] = [
                &row.series_id,
                &row.value,
                &row.time_label,
                &row.area_label,
                dimensions,
                &ingested_at,
            ];
            statement.execute(params.as_slice())?;
        }
        Ok(rows.len())
    })();

    let inserted = finalize_transaction(connection, result)?;
    tracing::info!(rows = inserted, ingested_at, "observation generation appended");
    Ok(InsertReport {
        ingested_at: ingested_at.to_owned(),
        inserted,
    })
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn validate_forecast(row: &ForecastRecord) -> Result<(), WarehouseError> {
    let (entity_code, published_at, target_period) = row.natural_key();
    for (field, value) in [
        ("entity_code", entity_code),
        ("published_at", published_at),
        ("target_period", target_period),
    ] {
        if value.trim().is_empty() {
            return Err(WarehouseError::RecordRejected(format!(
                "natural key field '{field}' must not be empty"
            )));
        }
    }
    Ok(())
}

/// Keep one row per natural key, the last occurrence replacing earlier ones
/// in the position of the first.
fn collapse_by_natural_key(rows: &[ForecastRecord]) -> Vec<&ForecastRecord> {
    let mut batch: Vec<&ForecastRecord> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<(&str, &str, &str), usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        match positions.get(&row.natural_key()) {
            Some(&index) => batch[index] = row,
            None => {
                positions.insert(row.natural_key(), batch.len());
                batch.push(row);
            }
        }
    }
    batch
}

fn read_forecast(row: &::duckdb::Row<'_>) -> Result<ForecastRecord, ::duckdb::Error> {
    Ok(ForecastRecord {
        entity_code: row.get(0)?,
        entity_name: row.get(1)?,
        detail_label: row.get(2)?,
        publisher: row.get(3)?,
        published_at: row.get(4)?,
        target_period: row.get(5)?,
        category_a: row.get(6)?,
        category_b: row.get(7)?,
        category_c: row.get(8)?,
        numeric_low: row.get(9)?,
        numeric_high: row.get(10)?,
        source: row.get(11)?,
    })
}

/// Observation row with its dimension blob still encoded.
struct RawObservation {
    series_id: String,
    value: Option<f64>,
    time_label: Option<String>,
    area_label: Option<String>,
    dimensions: String,
    ingested_at: String,
}

impl RawObservation {
    fn decode(self) -> Result<ObservationRecord, WarehouseError> {
        Ok(ObservationRecord {
            series_id: self.series_id,
            value: self.value,
            time_label: self.time_label,
            area_label: self.area_label,
            dimensions: serde_json::from_str(&self.dimensions)?,
            ingested_at: Some(self.ingested_at),
        })
    }
}

fn read_observation(row: &::duckdb::Row<'_>) -> Result<RawObservation, ::duckdb::Error> {
    Ok(RawObservation {
        series_id: row.get(0)?,
        value: row.get(1)?,
        time_label: row.get(2)?,
        area_label: row.get(3)?,
        dimensions: row.get(4)?,
        ingested_at: row.get(5)?,
    })
}

/// Fixed-width UTC stamp so generations sort lexically in time order.
fn generation_stamp(now: OffsetDateTime) -> Result<String, time::error::Format> {
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    ))
}

/// Resolve the almanac home directory from environment or default.
pub fn resolve_almanac_home() -> PathBuf {
    if let Some(path) = env::var_os("ALMANAC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".almanac");
    }

    PathBuf::from(".almanac")
}
