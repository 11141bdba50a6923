//! Error types for `skylabel-core`.

use thiserror::Error;

use crate::label::LabelTable;

#[derive(Debug, Error)]
pub enum Error {
  #[error("candidate {0} is not in any label table")]
  NotClassified(i64),

  #[error("candidate {candid} is in more than one label table: {tables:?}")]
  AmbiguousClassification {
    candid: i64,
    tables: Vec<LabelTable>,
  },

  #[error("candidate {candid} is not in {table}")]
  NotInTable { candid: i64, table: LabelTable },

  #[error("unknown label table: {0:?}")]
  UnknownLabel(String),

  #[error("candidate list is malformed: {0}")]
  InvalidCandidList(String),

  #[error("prediction data is malformed: {0}")]
  InvalidPredictions(String),

  #[error("invalid filter: {0}")]
  InvalidFilter(String),

  #[error("page {page} is out of range (1..={pages})")]
  PageOutOfRange { page: usize, pages: usize },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("review log error: {0}")]
  ReviewLog(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error as [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Box a review-log backend error as [`Error::ReviewLog`].
  pub fn review_log<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::ReviewLog(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
