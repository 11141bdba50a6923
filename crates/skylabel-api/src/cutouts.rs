//! Visualization gallery: decoded cutouts for an arbitrary candid list.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/cutouts` | Body: `{"candids": [..], "page": 1}` |

use axum::{Json, extract::State};
use serde::Deserialize;
use skylabel_core::{review::ReviewLog, store::CandidateStore};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, candidate_page},
};

#[derive(Debug, Deserialize)]
pub struct GalleryBody {
  pub candids: Vec<i64>,
  #[serde(default)]
  pub page:    Option<usize>,
}

/// `POST /cutouts`
pub async fn gallery<S, L>(
  State(state): State<ApiState<S, L>>,
  Json(body): Json<GalleryBody>,
) -> Result<Json<Page<CandidateView>>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  if body.candids.is_empty() {
    return Err(ApiError::BadRequest("no candids given".into()));
  }

  let mut candids = body.candids;
  let mut seen = std::collections::HashSet::new();
  candids.retain(|c| seen.insert(*c));

  let page = candidate_page(
    state.store(),
    &candids,
    body.page.unwrap_or(1),
    state.settings.page_size,
  )
  .await?;
  Ok(Json(page))
}
