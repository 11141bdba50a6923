//! Decoded cutout batches, the payload of every review page.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use skylabel_core::{
  candidate::{Coordinates, CutoutBlobs},
  link::wiseview_url,
  page::{PageInfo, paginate},
  store::CandidateStore,
};
use skylabel_fits::{Triplet, decode_triplet};

use crate::error::ApiError;

/// `?page=N`, 1-based, defaulting to the first page.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page: Option<usize>,
}

impl PageParams {
  pub fn page(&self) -> usize { self.page.unwrap_or(1) }
}

/// One candidate as shown to a reviewer.
#[derive(Debug, Serialize)]
pub struct CandidateView {
  pub candid:      i64,
  pub coordinates: Option<Coordinates>,
  pub wiseview:    Option<String>,
  /// Science, reference and difference images with display ranges.
  pub cutouts:     Option<Triplet>,
  /// Why `cutouts` is missing; one bad blob never fails the page.
  pub error:       Option<String>,
}

/// A page of review items.
#[derive(Debug, Serialize)]
pub struct Page<T> {
  pub page:  PageInfo,
  pub items: Vec<T>,
}

/// Fetch and decode cutouts for `candids`, preserving their order.
///
/// Decoding runs on the blocking pool. Candids without stored cutouts, or
/// whose blobs fail to decode, carry an `error` instead of images.
pub async fn candidate_views<S>(
  store: &Arc<S>,
  candids: &[i64],
) -> Result<Vec<CandidateView>, ApiError>
where
  S: CandidateStore + 'static,
{
  let blobs = store.cutouts(candids, None).await.map_err(ApiError::store)?;
  views_from_blobs(store, candids, blobs).await
}

/// Decode already-fetched `blobs` into views for `candids`, in order.
pub async fn views_from_blobs<S>(
  store: &Arc<S>,
  candids: &[i64],
  blobs: Vec<CutoutBlobs>,
) -> Result<Vec<CandidateView>, ApiError>
where
  S: CandidateStore + 'static,
{
  let mut decoded: HashMap<i64, skylabel_fits::Result<Triplet>> =
    tokio::task::spawn_blocking(move || {
      blobs
        .into_iter()
        .map(|b| (b.candid, decode_triplet(&b.science, &b.reference, &b.difference)))
        .collect()
    })
    .await?;

  let mut views = Vec::with_capacity(candids.len());
  for &candid in candids {
    let coordinates = store.coordinates(candid).await.map_err(ApiError::store)?;
    let (cutouts, error) = match decoded.remove(&candid) {
      Some(Ok(triplet)) => (Some(triplet), None),
      Some(Err(e)) => {
        tracing::warn!(candid, error = %e, "cutout failed to decode");
        (None, Some(e.to_string()))
      }
      None => (None, Some("no cutouts stored".to_owned())),
    };
    views.push(CandidateView {
      candid,
      wiseview: coordinates.map(wiseview_url),
      coordinates,
      cutouts,
      error,
    });
  }
  Ok(views)
}

/// Paginate `candids` and decode the selected page.
pub async fn candidate_page<S>(
  store: &Arc<S>,
  candids: &[i64],
  page: usize,
  per_page: usize,
) -> Result<Page<CandidateView>, ApiError>
where
  S: CandidateStore + 'static,
{
  let (info, slice) = paginate(candids, page, per_page)?;
  let items = candidate_views(store, slice).await?;
  Ok(Page { page: info, items })
}
