//! Error type for `skylabel-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] skylabel_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A label or cutout was written for a candid missing from `candidates`.
  #[error("candidate {0} does not exist")]
  UnknownCandidate(i64),

  #[error("limit {0} is too large")]
  LimitOverflow(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
