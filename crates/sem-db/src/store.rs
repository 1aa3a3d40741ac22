use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use sem_core::{
    CampaignConfig, ErrorInfo, Query, RepetitionId, ResultStore, SemError, SimulationResult,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::schema::{
    init_schema, insert_config, load_config, query_error, store_error, RNG_RUN_COUNTER,
};

/// File name of the campaign database inside a campaign directory.
pub const DB_FILE_NAME: &str = "campaign.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ResultStore`] backed by a single SQLite file.
///
/// Results are stored as JSON records; parameter filters are evaluated with
/// `json_extract` so queries never load the whole table.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    config: CampaignConfig,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Creates a new campaign database inside `config.campaign_dir`.
    pub fn create(config: CampaignConfig) -> Result<Self, SemError> {
        let path = config.campaign_dir.join(DB_FILE_NAME);
        Self::create_at(path, config)
    }

    /// Creates a new campaign database at an explicit file path.
    pub fn create_at(path: impl Into<PathBuf>, config: CampaignConfig) -> Result<Self, SemError> {
        let path = path.into();
        ensure_parent(&path)?;
        fs::create_dir_all(config.data_dir()).map_err(|err| {
            SemError::Store(
                ErrorInfo::new("sem_db.data_dir", err.to_string())
                    .with_context("path", config.data_dir().display().to_string()),
            )
        })?;
        let conn = open_connection(&path)?;
        init_schema(&conn)?;
        insert_config(&conn, &config)?;
        info!(path = %path.display(), script = %config.script, "created campaign database");
        Ok(Self {
            path,
            config,
            conn: Mutex::new(conn),
        })
    }

    /// Opens an existing campaign from its directory or database file.
    pub fn open(location: &Path) -> Result<Self, SemError> {
        let path = if location.is_dir() {
            location.join(DB_FILE_NAME)
        } else {
            location.to_path_buf()
        };
        if !path.exists() {
            return Err(SemError::Query(
                ErrorInfo::new("sem_db.open", "campaign database not found")
                    .with_context("path", path.display().to_string()),
            ));
        }
        let conn = open_connection(&path)?;
        init_schema(&conn)?;
        let config = load_config(&conn)?;
        debug!(path = %path.display(), "opened campaign database");
        Ok(Self {
            path,
            config,
            conn: Mutex::new(conn),
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SemError> {
        self.conn.lock().map_err(|_| {
            SemError::Query(ErrorInfo::new(
                "sem_db.lock",
                "database connection lock poisoned",
            ))
        })
    }
}

impl ResultStore for SqliteStore {
    fn next_repetition_id(&self) -> Result<RepetitionId, SemError> {
        let conn = self.lock()?;
        let value: i64 = conn
            .query_row(
                "SELECT value FROM counters WHERE name = ?",
                params![RNG_RUN_COUNTER],
                |row| row.get(0),
            )
            .map_err(|err| query_error("sem_db.counter", err))?;
        Ok(RepetitionId::from_raw(value as u64))
    }

    fn allocate_repetition_ids(&self, count: u64) -> Result<RepetitionId, SemError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so concurrent campaign
        // processes serialize on the counter.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| store_error("sem_db.counter_tx", err))?;
        let first: i64 = tx
            .query_row(
                "SELECT value FROM counters WHERE name = ?",
                params![RNG_RUN_COUNTER],
                |row| row.get(0),
            )
            .map_err(|err| store_error("sem_db.counter", err))?;
        tx.execute(
            "UPDATE counters SET value = ? WHERE name = ?",
            params![first + count as i64, RNG_RUN_COUNTER],
        )
        .map_err(|err| store_error("sem_db.counter", err))?;
        tx.commit()
            .map_err(|err| store_error("sem_db.counter_commit", err))?;
        debug!(first, count, "allocated repetition ids");
        Ok(RepetitionId::from_raw(first as u64))
    }

    fn insert_result(&self, result: &SimulationResult) -> Result<(), SemError> {
        let rng_run = result.rng_run().ok_or_else(|| {
            SemError::Store(
                ErrorInfo::new("sem_db.insert", "result carries no repetition id")
                    .with_context("run_id", result.meta.id.clone()),
            )
        })?;
        let param_key = result.params.normalized_key()?;
        let record = serde_json::to_string(result)
            .map_err(|err| sem_core::serde_error("sem_db.record_encode", err))?;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| store_error("sem_db.insert_tx", err))?;
        tx.execute(
            "INSERT INTO results(run_id, param_key, params, rng_run, status, record)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                &result.meta.id,
                &param_key,
                &param_key,
                rng_run.as_raw() as i64,
                result.status.label(),
                record,
            ],
        )
        .map_err(|err| match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => SemError::DuplicateKey(
                ErrorInfo::new("sem_db.duplicate", "result already stored")
                    .with_context("params", param_key.clone())
                    .with_hint("repetition ids must be allocated once per batch"),
            ),
            _ => store_error("sem_db.insert", err),
        })?;
        tx.execute(
            "UPDATE counters SET value = MAX(value, ?) WHERE name = ?",
            params![rng_run.as_raw() as i64 + 1, RNG_RUN_COUNTER],
        )
        .map_err(|err| store_error("sem_db.counter", err))?;
        tx.commit()
            .map_err(|err| store_error("sem_db.insert_commit", err))?;
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Vec<SimulationResult>, SemError> {
        let (filter, values) = build_filter(query)?;
        let sql = format!("SELECT record FROM results{filter} ORDER BY id");
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|err| query_error("sem_db.query_prepare", err))?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
            .map_err(|err| query_error("sem_db.query", err))?;
        let mut results = Vec::new();
        for row in rows {
            let text = row.map_err(|err| query_error("sem_db.query_row", err))?;
            let result: SimulationResult = serde_json::from_str(&text)
                .map_err(|err| sem_core::serde_error("sem_db.record_decode", err))?;
            results.push(result);
        }
        debug!(bindings = query.bindings().len(), matches = results.len(), "queried results");
        Ok(results)
    }

    fn count(&self, query: &Query) -> Result<usize, SemError> {
        let (filter, values) = build_filter(query)?;
        let sql = format!("SELECT COUNT(*) FROM results{filter}");
        let conn = self.lock()?;
        let count: Option<i64> = conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .optional()
            .map_err(|err| query_error("sem_db.count", err))?;
        Ok(count.unwrap_or(0) as usize)
    }

    fn config(&self) -> &CampaignConfig {
        &self.config
    }
}

fn open_connection(path: &Path) -> Result<Connection, SemError> {
    let conn = Connection::open(path).map_err(|err| {
        SemError::Query(
            ErrorInfo::new("sem_db.open", "failed to open campaign database")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|err| query_error("sem_db.open", err))?;
    Ok(conn)
}

fn ensure_parent(path: &Path) -> Result<(), SemError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            SemError::Store(
                ErrorInfo::new("sem_db.create", "failed to create campaign directory")
                    .with_context("path", parent.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?
    }
    Ok(())
}

/// Builds the ` WHERE ...` suffix and its bound values for the query.
///
/// Booleans are matched on their JSON type, since `json_extract` yields
/// `1`/`0` for them. Numbers must be stored as numbers.
fn build_filter(query: &Query) -> Result<(String, Vec<SqlValue>), SemError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for (name, value) in query.bindings() {
        let path = format!("$.\"{}\"", name.replace('"', "\\\""));
        match value {
            Value::Null => {
                clauses.push("json_extract(params, ?) IS NULL");
                values.push(SqlValue::Text(path));
            }
            Value::Bool(flag) => {
                clauses.push("json_type(params, ?) = ?");
                values.push(SqlValue::Text(path));
                values.push(SqlValue::Text(flag.to_string()));
            }
            Value::Number(number) => {
                clauses.push("json_type(params, ?) IN ('integer', 'real') AND json_extract(params, ?) = ?");
                values.push(SqlValue::Text(path.clone()));
                values.push(SqlValue::Text(path));
                values.push(match number.as_i64() {
                    Some(int) => SqlValue::Integer(int),
                    None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
                });
            }
            Value::String(text) => {
                clauses.push("json_extract(params, ?) = ?");
                values.push(SqlValue::Text(path));
                values.push(SqlValue::Text(text.clone()));
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(SemError::Query(
                    ErrorInfo::new("sem_db.query_binding", "query values must be scalars")
                        .with_context("parameter", name.clone()),
                ))
            }
        }
    }
    if clauses.is_empty() {
        return Ok((String::new(), values));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
}
