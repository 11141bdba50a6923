//! The review log: reviewer flags persisted outside the database.
//!
//! Reviewers flag candidates they believe are misfiled; the flags feed the
//! "misclassified" queue. An entry is cleared once the candidate has been
//! reclassified, deleted or re-confirmed.

use std::{
  convert::Infallible,
  future::Future,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ─── Types ───────────────────────────────────────────────────────────────────

/// Why a candidate was put in the review log.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewKind {
  /// The reviewer believes the current label is wrong.
  Incorrect,
  /// The candidate is filed under more than one label.
  Duplicate,
}

/// One row of the review log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
  pub candid:      i64,
  #[serde(rename = "type")]
  pub kind:        ReviewKind,
  pub reviewer:    Option<String>,
  pub recorded_at: Option<DateTime<Utc>>,
}

impl ReviewEntry {
  /// A new entry stamped with the current time.
  pub fn new(candid: i64, kind: ReviewKind, reviewer: Option<&Reviewer>) -> Self {
    Self {
      candid,
      kind,
      reviewer: reviewer.map(|r| r.0.clone()),
      recorded_at: Some(Utc::now()),
    }
  }
}

/// The authenticated reviewer performing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer(pub String);

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Persistence for the review log.
pub trait ReviewLog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All entries, oldest first.
  fn entries(
    &self,
  ) -> impl Future<Output = Result<Vec<ReviewEntry>, Self::Error>> + Send + '_;

  /// Append `entry` unless an entry with the same candid and kind exists.
  /// Returns `true` if the entry was added.
  fn record(
    &self,
    entry: ReviewEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every entry for `candid`. Returns the number removed.
  fn remove(
    &self,
    candid: i64,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── In-memory log ───────────────────────────────────────────────────────────

/// A review log that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryReviewLog {
  entries: Mutex<Vec<ReviewEntry>>,
}

impl MemoryReviewLog {
  pub fn new() -> Self { Self::default() }
}

impl ReviewLog for MemoryReviewLog {
  type Error = Infallible;

  async fn entries(&self) -> Result<Vec<ReviewEntry>, Infallible> {
    Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
  }

  async fn record(&self, entry: ReviewEntry) -> Result<bool, Infallible> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    if entries
      .iter()
      .any(|e| e.candid == entry.candid && e.kind == entry.kind)
    {
      return Ok(false);
    }
    entries.push(entry);
    Ok(true)
  }

  async fn remove(&self, candid: i64) -> Result<usize, Infallible> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    let before = entries.len();
    entries.retain(|e| e.candid != candid);
    Ok(before - entries.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn record_is_idempotent_per_kind() {
    let log = MemoryReviewLog::new();
    let reviewer = Reviewer("alice".into());

    assert!(log.record(ReviewEntry::new(1, ReviewKind::Incorrect, Some(&reviewer))).await.unwrap());
    assert!(!log.record(ReviewEntry::new(1, ReviewKind::Incorrect, None)).await.unwrap());
    assert!(log.record(ReviewEntry::new(1, ReviewKind::Duplicate, None)).await.unwrap());

    let entries = log.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].reviewer.as_deref(), Some("alice"));
  }

  #[tokio::test]
  async fn remove_clears_every_kind() {
    let log = MemoryReviewLog::new();
    log.record(ReviewEntry::new(1, ReviewKind::Incorrect, None)).await.unwrap();
    log.record(ReviewEntry::new(1, ReviewKind::Duplicate, None)).await.unwrap();
    log.record(ReviewEntry::new(2, ReviewKind::Incorrect, None)).await.unwrap();

    assert_eq!(log.remove(1).await.unwrap(), 2);
    assert_eq!(log.remove(1).await.unwrap(), 0);
    assert_eq!(log.entries().await.unwrap().len(), 1);
  }

  #[test]
  fn entry_serialises_kind_as_type() {
    let entry = ReviewEntry {
      candid:      5,
      kind:        ReviewKind::Incorrect,
      reviewer:    None,
      recorded_at: None,
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["type"], "incorrect");
  }
}
