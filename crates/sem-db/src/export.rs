use std::fs;
use std::path::Path;

use sem_core::{ErrorInfo, Query, ResultStore, SemError};

fn export_error(path: &Path, err: impl ToString) -> SemError {
    SemError::Store(
        ErrorInfo::new("sem_db.export", err.to_string())
            .with_context("path", path.display().to_string()),
    )
}

/// Writes every stored result as a pretty-printed JSON array.
pub fn export_json<S: ResultStore + ?Sized>(store: &S, out_path: &Path) -> Result<usize, SemError> {
    let results = store.query(&Query::all())?;
    let bytes = serde_json::to_vec_pretty(&results)
        .map_err(|err| sem_core::serde_error("sem_db.export_encode", err))?;
    fs::write(out_path, bytes).map_err(|err| export_error(out_path, err))?;
    Ok(results.len())
}

/// Writes one CSV row per stored result.
pub fn export_csv<S: ResultStore + ?Sized>(store: &S, out_path: &Path) -> Result<usize, SemError> {
    let results = store.query(&Query::all())?;
    let mut wtr = csv::Writer::from_path(out_path).map_err(|err| export_error(out_path, err))?;
    wtr.write_record([
        "id",
        "rng_run",
        "status",
        "exit_code",
        "elapsed_secs",
        "params",
        "stdout",
    ])
    .map_err(|err| export_error(out_path, err))?;
    for result in &results {
        let params = result.params.without_repetition().to_canonical_json()?;
        wtr.write_record([
            result.meta.id.clone(),
            result
                .rng_run()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            result.status.label().to_string(),
            result
                .meta
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_default(),
            format!("{:.6}", result.meta.elapsed_secs),
            params,
            result.stdout.clone(),
        ])
        .map_err(|err| export_error(out_path, err))?;
    }
    wtr.flush().map_err(|err| export_error(out_path, err))?;
    Ok(results.len())
}
