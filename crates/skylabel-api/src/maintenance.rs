//! Admin maintenance of the label tables.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/maintenance/backup` | Write `{backup_dir}/{table}_backup.csv` for every table |
//! | `POST` | `/maintenance/dedupe` | Delete within-table duplicate rows, keeping the lowest id |

use std::path::{Path, PathBuf};

use axum::{Json, extract::State};
use serde::Serialize;
use skylabel_core::{
  label::{LabelRow, LabelTable},
  review::ReviewLog,
  store::CandidateStore,
};

use crate::{ApiState, error::ApiError};

// ─── Backup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BackupFile {
  pub table: LabelTable,
  pub path:  PathBuf,
  pub rows:  usize,
}

/// Write one table's rows as `{id_column},candid` CSV.
pub fn write_backup(dir: &Path, table: LabelTable, rows: &[LabelRow]) -> Result<PathBuf, ApiError> {
  let path = dir.join(format!("{}_backup.csv", table.table_name()));
  let mut writer = csv::Writer::from_path(&path)?;
  writer.write_record([table.id_column(), "candid"])?;
  for row in rows {
    writer.write_record([row.label_id.to_string(), row.candid.to_string()])?;
  }
  writer.flush().map_err(|e| ApiError::Internal(e.to_string()))?;
  Ok(path)
}

/// `POST /maintenance/backup`
pub async fn backup<S, L>(
  State(state): State<ApiState<S, L>>,
) -> Result<Json<Vec<BackupFile>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let mut tables = Vec::new();
  for table in LabelTable::all() {
    let rows = state.store().label_rows(table).await.map_err(ApiError::store)?;
    tables.push((table, rows));
  }

  let dir = state.settings.backup_dir.clone();
  let files = tokio::task::spawn_blocking(move || {
    std::fs::create_dir_all(&dir).map_err(|e| {
      ApiError::Internal(format!("cannot create {}: {e}", dir.display()))
    })?;
    tables
      .iter()
      .map(|(table, rows)| {
        let path = write_backup(&dir, *table, rows)?;
        Ok(BackupFile { table: *table, path, rows: rows.len() })
      })
      .collect::<Result<Vec<_>, ApiError>>()
  })
  .await??;

  tracing::info!(dir = %state.settings.backup_dir.display(), "backed up label tables");
  Ok(Json(files))
}

// ─── Dedupe ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DedupeEntry {
  pub table:   LabelTable,
  pub removed: u64,
}

/// `POST /maintenance/dedupe`
pub async fn dedupe<S, L>(
  State(state): State<ApiState<S, L>>,
) -> Result<Json<Vec<DedupeEntry>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let removed = state.reclassifier.deduplicate_all().await?;
  Ok(Json(
    removed
      .into_iter()
      .map(|(table, removed)| DedupeEntry { table, removed })
      .collect(),
  ))
}
