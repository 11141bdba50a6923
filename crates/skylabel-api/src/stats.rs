//! Handler for `/stats`: how many candidates each label table holds.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/stats` | Per-table distinct count, share of total, within-table duplicates |

use axum::{Json, extract::State};
use serde::Serialize;
use skylabel_core::{label::LabelTable, review::ReviewLog, store::CandidateStore};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct TableStats {
  pub table:      LabelTable,
  /// Distinct candids.
  pub count:      u64,
  pub rows:       u64,
  /// Percentage of the distinct total across all tables.
  pub percentage: f64,
  /// Rows repeating a candid already in the table.
  pub duplicates: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
  pub tables: Vec<TableStats>,
  pub total:  u64,
}

/// `GET /stats`
pub async fn handler<S, L>(
  State(state): State<ApiState<S, L>>,
) -> Result<Json<StatsBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let counts = state.store().label_counts().await.map_err(ApiError::store)?;
  let total: u64 = counts.iter().map(|c| c.distinct).sum();

  let tables = counts
    .iter()
    .map(|c| TableStats {
      table:      c.table,
      count:      c.distinct,
      rows:       c.rows,
      percentage: if total == 0 { 0.0 } else { c.distinct as f64 * 100.0 / total as f64 },
      duplicates: c.duplicates(),
    })
    .collect();

  Ok(Json(StatsBody { tables, total }))
}
