//! Read-side queries answering "what is the newest thing we know".

use serde::Serialize;

use crate::{ForecastRecord, ObservationRecord, Warehouse, WarehouseError};

/// All rows of one entity's newest publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub entity_code: String,
    pub published_at: String,
    /// Ascending by target period.
    pub rows: Vec<ForecastRecord>,
}

/// The newest stored generation of one observation series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationGeneration {
    pub series_id: String,
    pub ingested_at: String,
    pub rows: Vec<ObservationRecord>,
}

/// Stateless query layer over a [`Warehouse`].
#[derive(Clone, Copy)]
pub struct LatestState<'a> {
    warehouse: &'a Warehouse,
}

impl<'a> LatestState<'a> {
    pub fn new(warehouse: &'a Warehouse) -> Self {
        Self { warehouse }
    }

    /// The entity's newest publication, `None` if nothing is stored.
    pub fn current(&self, entity_code: &str) -> Result<Option<Snapshot>, WarehouseError> {
        let rows = self.warehouse.latest_snapshot(entity_code)?;
        let Some(published_at) = rows.first().map(|row| row.published_at.clone()) else {
            return Ok(None);
        };

        Ok(Some(Snapshot {
            entity_code: entity_code.to_owned(),
            published_at,
            rows,
        }))
    }

    /// The most recently published row for `target_period`, even when that
    /// period is no longer part of the current snapshot.
    pub fn for_period(
        &self,
        entity_code: &str,
        target_period: &str,
    ) -> Result<Option<ForecastRecord>, WarehouseError> {
        self.warehouse.best_row_for_period(entity_code, target_period)
    }

    pub fn known_periods(&self, entity_code: &str) -> Result<Vec<String>, WarehouseError> {
        self.warehouse.known_periods(entity_code)
    }

    /// Newest observation generation for the series.
    pub fn observations(
        &self,
        series_id: &str,
    ) -> Result<Option<ObservationGeneration>, WarehouseError> {
        let rows = self.warehouse.latest_observations(series_id)?;
        let Some(ingested_at) = rows.first().and_then(|row| row.ingested_at.clone()) else {
            return Ok(None);
        };

        Ok(Some(ObservationGeneration {
            series_id: series_id.to_owned(),
            ingested_at,
            rows,
        }))
    }
}
