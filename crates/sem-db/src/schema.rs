use rusqlite::{params, Connection, OptionalExtension};
use sem_core::{CampaignConfig, ErrorInfo, SemError};

pub const SCHEMA_VERSION: i64 = 1;

/// Counter row holding the next repetition id.
pub(crate) const RNG_RUN_COUNTER: &str = "rng_run";

pub(crate) fn store_error(code: &str, err: impl ToString) -> SemError {
    SemError::Store(ErrorInfo::new(code, err.to_string()))
}

pub(crate) fn query_error(code: &str, err: impl ToString) -> SemError {
    SemError::Query(ErrorInfo::new(code, err.to_string()))
}

pub fn init_schema(conn: &Connection) -> Result<(), SemError> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS meta(version INTEGER NOT NULL);
        CREATE TABLE IF NOT EXISTS campaign(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            config TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS counters(
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS results(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            param_key TEXT NOT NULL UNIQUE,
            params TEXT NOT NULL,
            rng_run INTEGER NOT NULL,
            status TEXT NOT NULL,
            record TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS results_rng_run ON results(rng_run);
        COMMIT;",
    )
    .map_err(|err| store_error("sem_db.schema", err))?;
    conn.execute(
        "INSERT OR IGNORE INTO counters(name, value) VALUES (?, 0)",
        params![RNG_RUN_COUNTER],
    )
    .map_err(|err| store_error("sem_db.schema", err))?;
    set_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn set_version(conn: &Connection, version: i64) -> Result<(), SemError> {
    let existing: Option<i64> = conn
        .query_row("SELECT version FROM meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| store_error("sem_db.schema", err))?;
    match existing {
        Some(current) if current == version => Ok(()),
        Some(current) => Err(store_error(
            "sem_db.schema_version",
            format!("campaign schema {current} incompatible with expected {version}"),
        )),
        None => {
            conn.execute("INSERT INTO meta(version) VALUES (?)", params![version])
                .map_err(|err| store_error("sem_db.schema", err))?;
            Ok(())
        }
    }
}

/// Writes the campaign configuration. Fails if one is already recorded.
pub fn insert_config(conn: &Connection, config: &CampaignConfig) -> Result<(), SemError> {
    let text = serde_json::to_string(config)
        .map_err(|err| sem_core::serde_error("sem_db.config_encode", err))?;
    conn.execute(
        "INSERT INTO campaign(id, config) VALUES (1, ?)",
        params![text],
    )
    .map_err(|err| {
        SemError::Config(
            ErrorInfo::new("sem_db.config_exists", err.to_string())
                .with_context("campaign_dir", config.campaign_dir.display().to_string())
                .with_hint("load the existing campaign instead of creating it again"),
        )
    })?;
    Ok(())
}

pub fn load_config(conn: &Connection) -> Result<CampaignConfig, SemError> {
    let text: Option<String> = conn
        .query_row("SELECT config FROM campaign WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| query_error("sem_db.config_load", err))?;
    let text = text.ok_or_else(|| {
        SemError::Config(ErrorInfo::new(
            "sem_db.config_missing",
            "database holds no campaign configuration",
        ))
    })?;
    serde_json::from_str(&text).map_err(|err| sem_core::serde_error("sem_db.config_decode", err))
}
