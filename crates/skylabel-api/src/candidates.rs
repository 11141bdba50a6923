//! Single-candidate search and actions.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/candidates/{candid}` | Classification, coordinates, link, cutouts |
//! | `POST`   | `/candidates/{candid}/classify` | Body: `{"to":"reals"}`; 409 if duplicated |
//! | `DELETE` | `/candidates/{candid}` | Removes it from its table and the review log |

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use skylabel_core::{
  Error as CoreError,
  label::{Classification, LabelTable},
  reclassify::Reclassification,
  review::ReviewLog,
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, candidate_views},
};

async fn require_candidate<S, L>(state: &ApiState<S, L>, candid: i64) -> Result<(), ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  match state.store().coordinates(candid).await.map_err(ApiError::store)? {
    Some(_) => Ok(()),
    None => Err(ApiError::NotFound(format!("candidate {candid}"))),
  }
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CandidateBody {
  pub classification: Classification,
  #[serde(flatten)]
  pub view:           CandidateView,
}

/// `GET /candidates/{candid}`
pub async fn get_one<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
) -> Result<Json<CandidateBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  require_candidate(&state, candid).await?;
  let classification = state.reclassifier.classification(candid).await?;
  let view = candidate_views(state.store(), &[candid])
    .await?
    .pop()
    .ok_or_else(|| ApiError::Internal("empty view batch".into()))?;
  Ok(Json(CandidateBody { classification, view }))
}

// ─── Classify ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyBody {
  pub to: LabelTable,
}

/// `POST /candidates/{candid}/classify`
pub async fn classify<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
  Json(body): Json<ClassifyBody>,
) -> Result<Json<Reclassification>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  require_candidate(&state, candid).await?;
  let outcome = state.reclassifier.classify(candid, body.to).await?;
  Ok(Json(outcome))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DeleteBody {
  pub candid:  i64,
  pub table:   LabelTable,
  pub removed: u64,
}

/// `DELETE /candidates/{candid}`
pub async fn delete_one<S, L>(
  State(state): State<ApiState<S, L>>,
  Path(candid): Path<i64>,
) -> Result<Json<DeleteBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let table = match state.reclassifier.classification(candid).await? {
    Classification::Unclassified => return Err(CoreError::NotClassified(candid).into()),
    Classification::ClassifiedAs(table) => table,
    Classification::DuplicateIn(tables) => {
      return Err(
        CoreError::AmbiguousClassification { candid, tables: tables.into_iter().collect() }
          .into(),
      );
    }
  };

  let removed = state.reclassifier.delete(candid, table, true).await?;
  Ok(Json(DeleteBody { candid, table, removed }))
}
