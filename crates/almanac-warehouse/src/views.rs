//! Database views backing the latest-state queries.

use ::duckdb::Connection;

/// Create the read views used by the resolver.
///
/// Creates the following views:
/// - `vw_forecasts_current`: every row of each entity's newest publication
/// - `vw_observations_latest`: the most recently inserted generation per series
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_forecasts_current AS
SELECT f.*
FROM forecasts f
JOIN (
    SELECT entity_code, MAX(published_at) AS latest_published_at
    FROM forecasts
    GROUP BY entity_code
) newest
  ON f.entity_code = newest.entity_code
 AND f.published_at = newest.latest_published_at;

CREATE OR REPLACE VIEW vw_observations_latest AS
SELECT o.*
FROM observations o
JOIN (
    SELECT series_id, arg_max(ingested_at, id) AS latest_ingested_at
    FROM observations
    GROUP BY series_id
) newest
  ON o.series_id = newest.series_id
 AND o.ingested_at = newest.latest_ingested_at;
",
    )?;

    Ok(())
}
