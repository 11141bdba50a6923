//! Hostless scan: unclassified candidates passing the quality cuts.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/hostless` | `?epoch&gallat_min&gallat_max&limit&page` |
//! | `POST` | `/hostless/{candid}/classify` | Body: `{"to":"reals"}`; 409 if already classified |

use std::collections::HashSet;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use skylabel_core::{
  candidate::HostlessFilter,
  label::LabelTable,
  reclassify::Reclassification,
  review::ReviewLog,
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, candidate_page},
};

// ─── Scan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScanParams {
  pub epoch:      i64,
  #[serde(default)]
  pub gallat_min: f64,
  #[serde(default = "default_gallat_max")]
  pub gallat_max: f64,
  #[serde(default = "default_limit")]
  pub limit:      usize,
  pub page:       Option<usize>,
}

fn default_gallat_max() -> f64 { 90.0 }

fn default_limit() -> usize { 1000 }

#[derive(Debug, Serialize)]
pub struct ScanBody {
  /// Candids returned by the filter query before removing classified ones.
  pub matched: usize,
  #[serde(flatten)]
  pub page:    Page<CandidateView>,
}

/// `GET /hostless?epoch=..&gallat_min=..&gallat_max=..&limit=..&page=..`
pub async fn scan<S, L>(
  State(state): State<ApiState<S, L>>,
  Query(params): Query<ScanParams>,
) -> Result<Json<ScanBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let filter = HostlessFilter {
    epoch:      params.epoch,
    gallat_min: params.gallat_min,
    gallat_max: params.gallat_max,
    limit:      params.limit,
  };
  filter.validate()?;

  let store = state.store();
  let matched = store.hostless_candids(&filter).await.map_err(ApiError::store)?;
  let classified: HashSet<i64> = store
    .all_classified()
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .collect();

  let unclassified: Vec<i64> = matched
    .iter()
    .copied()
    .filter(|c| !classified.contains(c))
    .collect();

  tracing::debug!(
    epoch = filter.epoch,
    matched = matched.len(),
    unclassified = unclassified.len(),
    "hostless scan"
  );

  let page = candidate_page(
    store,
    &unclassified,
    params.page.unwrap_or(1),
    state.settings.page_size,
  )
  .await?;
  Ok(Json(ScanBody { matched: matched.len(), page }))
}

// ─── Classify ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyBody {
  pub to: LabelTable,
}

/// `POST /hostless/{candid}/classify`
pub async fn classify<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
  Json(body): Json<ClassifyBody>,
) -> Result<Json<Reclassification>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  if state.store().coordinates(candid).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::NotFound(format!("candidate {candid}")));
  }
  if let Some(table) = state.reclassifier.locate(candid).await? {
    return Err(ApiError::Conflict(format!(
      "candidate {candid} is already classified as {table}"
    )));
  }

  let outcome = state.reclassifier.reclassify(candid, None, body.to).await?;
  Ok(Json(outcome))
}
