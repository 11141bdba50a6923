//! The misclassified queue: candids a reviewer suspects are misfiled.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/misclassified` | Body: candid list text, e.g. `[1, "2"]`; `?page=N` |
//! | `GET`  | `/misclassified/log` | Candids flagged in the review log; `?page=N` |
//!
//! Reclassify and delete actions go through `/candidates/{candid}`.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Serialize;
use skylabel_core::{
  candidate::parse_candid_list,
  label::Classification,
  page::paginate,
  review::{ReviewEntry, ReviewLog},
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, PageParams, candidate_views},
};

#[derive(Debug, Serialize)]
pub struct QueueItem {
  pub classification: Classification,
  /// Review-log entries for this candid; empty for manual lists.
  pub flags:          Vec<ReviewEntry>,
  #[serde(flatten)]
  pub view:           CandidateView,
}

async fn queue_page<S, L>(
  state: &ApiState<S, L>,
  candids: &[i64],
  flags: &[ReviewEntry],
  page: usize,
) -> Result<Page<QueueItem>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let (info, slice) = paginate(candids, page, state.settings.page_size)?;
  let views = candidate_views(state.store(), slice).await?;

  let mut items = Vec::with_capacity(views.len());
  for view in views {
    let classification = state.reclassifier.classification(view.candid).await?;
    let flags = flags.iter().filter(|e| e.candid == view.candid).cloned().collect();
    items.push(QueueItem { classification, flags, view });
  }
  Ok(Page { page: info, items })
}

fn unique_in_order(candids: impl IntoIterator<Item = i64>) -> Vec<i64> {
  let mut seen = std::collections::HashSet::new();
  candids.into_iter().filter(|c| seen.insert(*c)).collect()
}

// ─── Manual list ─────────────────────────────────────────────────────────────

/// `POST /misclassified[?page=N]`
pub async fn check_list<S, L>(
  State(state): State<ApiState<S, L>>,
  Query(params): Query<PageParams>,
  body: String,
) -> Result<Json<Page<QueueItem>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let candids = unique_in_order(parse_candid_list(&body)?);
  let page = queue_page(&state, &candids, &[], params.page()).await?;
  Ok(Json(page))
}

// ─── Review log ──────────────────────────────────────────────────────────────

/// `GET /misclassified/log[?page=N]`
pub async fn queue<S, L>(
  State(state): State<ApiState<S, L>>,
  Query(params): Query<PageParams>,
) -> Result<Json<Page<QueueItem>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let entries = state
    .reclassifier
    .log()
    .entries()
    .await
    .map_err(ApiError::store)?;
  let candids = unique_in_order(entries.iter().map(|e| e.candid));
  let page = queue_page(&state, &candids, &entries, params.page()).await?;
  Ok(Json(page))
}
