use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_forecasts",
        sql: r#"
CREATE TABLE IF NOT EXISTS forecasts (
    entity_code TEXT NOT NULL,
    entity_name TEXT NOT NULL,
    detail_label TEXT,
    publisher TEXT,
    published_at TEXT NOT NULL,
    target_period TEXT NOT NULL,
    category_a TEXT,
    category_b TEXT,
    category_c TEXT,
    numeric_low DOUBLE,
    numeric_high DOUBLE,
    source TEXT NOT NULL DEFAULT 'jma',
    UNIQUE(entity_code, published_at, target_period)
);

CREATE INDEX IF NOT EXISTS idx_forecasts_entity_period ON forecasts(entity_code, target_period);
CREATE INDEX IF NOT EXISTS idx_forecasts_entity_published ON forecasts(entity_code, published_at);
"#,
    },
    Migration {
        version: "0002_observations",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS observations_id_seq START 1;

CREATE TABLE IF NOT EXISTS observations (
    id BIGINT PRIMARY KEY DEFAULT nextval('observations_id_seq'),
    series_id TEXT NOT NULL,
    value DOUBLE,
    time_label TEXT,
    area_label TEXT,
    dimensions TEXT NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_time ON observations(time_label);
CREATE INDEX IF NOT EXISTS idx_observations_area ON observations(area_label);
CREATE INDEX IF NOT EXISTS idx_observations_series_ingested ON observations(series_id, ingested_at);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}

/// Versions recorded in the migration ledger, oldest first.
pub fn applied_versions(connection: &Connection) -> Result<Vec<String>, ::duckdb::Error> {
    let mut statement =
        connection.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = statement
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}
