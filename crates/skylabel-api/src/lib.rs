//! JSON REST API for skylabel.
//!
//! Exposes an axum [`Router`] backed by any
//! [`skylabel_core::store::CandidateStore`] and
//! [`skylabel_core::review::ReviewLog`]. Auth, role gating and transport
//! concerns are the caller's responsibility; handlers read the acting
//! reviewer from an optional [`skylabel_core::review::Reviewer`] request
//! extension.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", skylabel_api::api_router(state.clone()))
//! ```

pub mod candidates;
pub mod cutouts;
pub mod duplicates;
pub mod error;
pub mod hostless;
pub mod labels;
pub mod maintenance;
pub mod misclassified;
pub mod model;
pub mod stats;
pub mod view;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post},
};
use skylabel_core::{
  page::DEFAULT_PAGE_SIZE, reclassify::Reclassifier, review::ReviewLog,
  store::CandidateStore,
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Tunables for the review API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Candidates per review page.
  pub page_size:  usize,
  /// Directory receiving `{table}_backup.csv` files.
  pub backup_dir: PathBuf,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      page_size:  DEFAULT_PAGE_SIZE,
      backup_dir: PathBuf::from("backups"),
    }
  }
}

/// Shared state threaded through all API handlers.
pub struct ApiState<S, L> {
  pub reclassifier: Reclassifier<S, L>,
  pub settings:     Arc<ApiSettings>,
}

impl<S, L> Clone for ApiState<S, L> {
  fn clone(&self) -> Self {
    Self {
      reclassifier: self.reclassifier.clone(),
      settings:     Arc::clone(&self.settings),
    }
  }
}

impl<S, L> ApiState<S, L>
where
  S: CandidateStore,
  L: ReviewLog,
{
  pub fn new(store: Arc<S>, log: Arc<L>, settings: ApiSettings) -> Self {
    Self {
      reclassifier: Reclassifier::new(store, log),
      settings:     Arc::new(settings),
    }
  }

  pub fn store(&self) -> &Arc<S> { self.reclassifier.store() }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, L>(state: ApiState<S, L>) -> Router<()>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  Router::new()
    // Label review
    .route("/labels/{table}", get(labels::page::<S, L>))
    .route("/labels/{table}/count", get(labels::count::<S, L>))
    .route("/labels/{table}/{candid}/incorrect", post(labels::flag_incorrect::<S, L>))
    // Stats & maintenance
    .route("/stats", get(stats::handler::<S, L>))
    .route("/maintenance/backup", post(maintenance::backup::<S, L>))
    .route("/maintenance/dedupe", post(maintenance::dedupe::<S, L>))
    // Visualization
    .route("/cutouts", post(cutouts::gallery::<S, L>))
    // Hostless scan
    .route("/hostless", get(hostless::scan::<S, L>))
    .route("/hostless/{candid}/classify", post(hostless::classify::<S, L>))
    // Misclassified
    .route("/misclassified", post(misclassified::check_list::<S, L>))
    .route("/misclassified/log", get(misclassified::queue::<S, L>))
    .route("/model", post(model::handler::<S, L>))
    // Duplicates
    .route("/duplicates", get(duplicates::list::<S, L>))
    .route("/duplicates/{candid}", delete(duplicates::discard::<S, L>))
    .route("/duplicates/{candid}/resolve", post(duplicates::resolve::<S, L>))
    // Single search
    .route(
      "/candidates/{candid}",
      get(candidates::get_one::<S, L>).delete(candidates::delete_one::<S, L>),
    )
    .route("/candidates/{candid}/classify", post(candidates::classify::<S, L>))
    .with_state(state)
}
