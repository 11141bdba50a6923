//! Handlers for the label review pages.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/labels/{table}` | `?page=N`, decoded cutouts of members with cutouts |
//! | `GET`  | `/labels/{table}/count` | Distinct candids in the table |
//! | `POST` | `/labels/{table}/{candid}/incorrect` | Flag for the misclassified queue |

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use skylabel_core::{
  label::LabelTable,
  page::paginate,
  review::{ReviewKind, ReviewLog, Reviewer},
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, PageParams, views_from_blobs},
};

// ─── Page ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LabelPage {
  pub table: LabelTable,
  #[serde(flatten)]
  pub page:  Page<CandidateView>,
}

/// `GET /labels/{table}[?page=N]`
///
/// Pages over members that have cutouts stored; only the selected page is
/// decoded.
pub async fn page<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(table): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Json<LabelPage>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let table = LabelTable::parse(&table)?;
  let blobs = state.store().label_cutouts(table).await.map_err(ApiError::store)?;

  let (info, selected) = paginate(&blobs, params.page(), state.settings.page_size)?;
  let candids: Vec<i64> = selected.iter().map(|b| b.candid).collect();
  let items = views_from_blobs(state.store(), &candids, selected.to_vec()).await?;

  Ok(Json(LabelPage { table, page: Page { page: info, items } }))
}

// ─── Count ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LabelCountBody {
  pub table: LabelTable,
  pub count: u64,
}

/// `GET /labels/{table}/count`
pub async fn count<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(table): Path<String>,
) -> Result<Json<LabelCountBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let table = LabelTable::parse(&table)?;
  let counts = state.store().label_counts().await.map_err(ApiError::store)?;
  let count = counts
    .iter()
    .find(|c| c.table == table)
    .map_or(0, |c| c.distinct);
  Ok(Json(LabelCountBody { table, count }))
}

// ─── Flag ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FlagBody {
  pub candid: i64,
  pub added:  bool,
}

/// `POST /labels/{table}/{candid}/incorrect`
///
/// 201 when the flag is new, 200 when it was already in the log.
pub async fn flag_incorrect<S, L>(
  State(state): State<ApiState<S, L>>,
  Path((table, candid)): Path<(String, i64)>,
  reviewer: Option<Extension<Reviewer>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let table = LabelTable::parse(&table)?;
  let memberships = state.store().memberships(candid).await.map_err(ApiError::store)?;
  if !memberships.contains(&table) {
    return Err(ApiError::NotFound(format!("candidate {candid} is not in {table}")));
  }

  let reviewer = reviewer.map(|Extension(r)| r);
  let added = state
    .reclassifier
    .flag(candid, ReviewKind::Incorrect, reviewer.as_ref())
    .await?;

  let status = if added { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(FlagBody { candid, added })))
}
