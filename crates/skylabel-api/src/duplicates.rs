//! Cross-table duplicates and their manual resolution.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/duplicates` | `?page=N`; candids in two or more label tables |
//! | `POST` | `/duplicates/{candid}/resolve` | Body: `{"keep":"echo"}` |
//! | `DELETE` | `/duplicates/{candid}` | Drops it from every table and the review log |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use skylabel_core::{
  Error as CoreError,
  label::{Classification, LabelRow, LabelTable},
  page::paginate,
  review::ReviewLog,
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, PageParams, candidate_views},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DuplicateItem {
  pub tables: BTreeSet<LabelTable>,
  #[serde(flatten)]
  pub view:   CandidateView,
}

/// `GET /duplicates[?page=N]`
pub async fn list<S, L>(
  State(state): State<ApiState<S, L>>,
  Query(params): Query<PageParams>,
) -> Result<Json<Page<DuplicateItem>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let duplicates = state.reclassifier.find_duplicates().await?;
  let (info, slice) = paginate(&duplicates, params.page(), state.settings.page_size)?;

  let candids: Vec<i64> = slice.iter().map(|d| d.candid).collect();
  let views = candidate_views(state.store(), &candids).await?;

  let items = slice
    .iter()
    .zip(views)
    .map(|(d, view)| DuplicateItem { tables: d.tables.clone(), view })
    .collect();
  Ok(Json(Page { page: info, items }))
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub keep: LabelTable,
}

/// `POST /duplicates/{candid}/resolve`
pub async fn resolve<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<LabelRow>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  if let Classification::Unclassified = state.reclassifier.classification(candid).await? {
    return Err(CoreError::NotClassified(candid).into());
  }
  let row = state.reclassifier.resolve_duplicate(candid, body.keep).await?;
  Ok(Json(row))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DiscardBody {
  pub candid:  i64,
  pub tables:  Vec<LabelTable>,
  pub removed: u64,
}

/// `DELETE /duplicates/{candid}`
///
/// Works for any classified candidate, but exists for duplicates, which
/// `DELETE /candidates/{candid}` refuses.
pub async fn discard<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
) -> Result<Json<DiscardBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let tables: Vec<LabelTable> = match state.reclassifier.classification(candid).await? {
    Classification::Unclassified => return Err(CoreError::NotClassified(candid).into()),
    Classification::ClassifiedAs(table) => vec![table],
    Classification::DuplicateIn(tables) => tables.into_iter().collect(),
  };
  let removed = state.reclassifier.delete_everywhere(candid).await?;
  Ok(Json(DiscardBody { candid, tables, removed }))
}
