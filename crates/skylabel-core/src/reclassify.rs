//! The reclassifier: moves candidates between label tables and surfaces
//! membership conflicts.
//!
//! Every operation is a short sequence of store calls. Multi-table writes go
//! through the store's atomic operations ([`CandidateStore::move_label`],
//! [`CandidateStore::resolve_duplicate`]), so a failure leaves the label
//! tables as they were. Nothing is retried; errors go straight back to the
//! reviewer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  label::{Classification, Duplicate, LabelRow, LabelTable, group_duplicates},
  review::{ReviewEntry, ReviewKind, ReviewLog, Reviewer},
  store::CandidateStore,
};

/// What a call to [`Reclassifier::reclassify`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reclassification {
  /// The candidate was unclassified and is now filed under `row.table`.
  Inserted { row: LabelRow },
  /// The candidate moved from `from` to `row.table`.
  Moved { from: LabelTable, row: LabelRow },
  /// The reviewer re-confirmed the existing label; only the review log
  /// changed.
  Confirmed { table: LabelTable },
}

/// Classification workflow over a store and a review log.
pub struct Reclassifier<S, L> {
  store: Arc<S>,
  log:   Arc<L>,
}

impl<S, L> Clone for Reclassifier<S, L> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), log: Arc::clone(&self.log) }
  }
}

impl<S, L> Reclassifier<S, L>
where
  S: CandidateStore,
  L: ReviewLog,
{
  pub fn new(store: Arc<S>, log: Arc<L>) -> Self { Self { store, log } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn log(&self) -> &Arc<L> { &self.log }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The table owning `candid` (first in union order), or `None`.
  pub async fn locate(&self, candid: i64) -> Result<Option<LabelTable>> {
    Ok(self.classification(candid).await?.primary())
  }

  /// Full membership state of `candid`, including duplicates.
  pub async fn classification(&self, candid: i64) -> Result<Classification> {
    let memberships = self
      .store
      .memberships(candid)
      .await
      .map_err(Error::store)?;
    Ok(Classification::from_memberships(memberships))
  }

  /// Candids filed under two or more label tables, sorted by candid.
  pub async fn find_duplicates(&self) -> Result<Vec<Duplicate>> {
    let rows = self.store.all_labels().await.map_err(Error::store)?;
    let duplicates = group_duplicates(rows);
    tracing::debug!(count = duplicates.len(), "scanned label tables for duplicates");
    Ok(duplicates)
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// File `candid` under `to`, given its current table `from`.
  ///
  /// Re-confirming the current label (`from == Some(to)`) touches no label
  /// table; it only clears the candidate from the review log.
  pub async fn reclassify(
    &self,
    candid: i64,
    from: Option<LabelTable>,
    to: LabelTable,
  ) -> Result<Reclassification> {
    let outcome = match from {
      None => {
        let row = self
          .store
          .insert_label(to, candid)
          .await
          .map_err(Error::store)?;
        Reclassification::Inserted { row }
      }
      Some(from) if from == to => {
        self.clear_log(candid).await?;
        Reclassification::Confirmed { table: to }
      }
      Some(from) => {
        let row = self
          .store
          .move_label(candid, from, to)
          .await
          .map_err(Error::store)?
          .ok_or(Error::NotInTable { candid, table: from })?;
        Reclassification::Moved { from, row }
      }
    };

    tracing::info!(candid, ?outcome, "reclassified candidate");
    Ok(outcome)
  }

  /// Reclassify using the candidate's current state as `from`.
  ///
  /// Refuses candidates filed under several tables; those must go through
  /// [`Self::resolve_duplicate`].
  pub async fn classify(
    &self,
    candid: i64,
    to: LabelTable,
  ) -> Result<Reclassification> {
    match self.classification(candid).await? {
      Classification::Unclassified => self.reclassify(candid, None, to).await,
      Classification::ClassifiedAs(from) => {
        self.reclassify(candid, Some(from), to).await
      }
      Classification::DuplicateIn(tables) => Err(Error::AmbiguousClassification {
        candid,
        tables: tables.into_iter().collect(),
      }),
    }
  }

  /// Remove `candid` from `table`. With `clear_log`, also drop it from the
  /// review log.
  pub async fn delete(
    &self,
    candid: i64,
    table: LabelTable,
    clear_log: bool,
  ) -> Result<u64> {
    let removed = self
      .store
      .delete_label(table, candid)
      .await
      .map_err(Error::store)?;

    if clear_log {
      self.clear_log(candid).await?;
    }

    tracing::info!(candid, %table, removed, "deleted candidate from label table");
    Ok(removed)
  }

  /// Remove `candid` from every label table at once and clear it from the
  /// review log. This is how a duplicated candidate is discarded outright.
  pub async fn delete_everywhere(&self, candid: i64) -> Result<u64> {
    let removed = self
      .store
      .delete_everywhere(candid)
      .await
      .map_err(Error::store)?;
    self.clear_log(candid).await?;

    tracing::info!(candid, removed, "deleted candidate from every label table");
    Ok(removed)
  }

  /// Keep `candid` only in `keep`, removing it from the other tables, and
  /// clear it from the review log.
  pub async fn resolve_duplicate(
    &self,
    candid: i64,
    keep: LabelTable,
  ) -> Result<LabelRow> {
    let row = self
      .store
      .resolve_duplicate(candid, keep)
      .await
      .map_err(Error::store)?;
    self.clear_log(candid).await?;

    tracing::info!(candid, %keep, "resolved duplicate");
    Ok(row)
  }

  /// Delete repeated rows of the same candid within `table`, keeping the
  /// lowest surrogate id.
  pub async fn deduplicate_table(&self, table: LabelTable) -> Result<u64> {
    let removed = self
      .store
      .deduplicate_table(table)
      .await
      .map_err(Error::store)?;
    tracing::info!(%table, removed, "deduplicated label table");
    Ok(removed)
  }

  /// [`Self::deduplicate_table`] over every label table.
  pub async fn deduplicate_all(&self) -> Result<Vec<(LabelTable, u64)>> {
    let mut removed = Vec::new();
    for table in LabelTable::all() {
      removed.push((table, self.deduplicate_table(table).await?));
    }
    Ok(removed)
  }

  // ── Review log ────────────────────────────────────────────────────────

  /// Add `candid` to the review log. Returns `false` if already flagged
  /// with the same kind.
  pub async fn flag(
    &self,
    candid: i64,
    kind: ReviewKind,
    reviewer: Option<&Reviewer>,
  ) -> Result<bool> {
    let added = self
      .log
      .record(ReviewEntry::new(candid, kind, reviewer))
      .await
      .map_err(Error::review_log)?;
    tracing::info!(candid, %kind, added, "flagged candidate for review");
    Ok(added)
  }

  async fn clear_log(&self, candid: i64) -> Result<usize> {
    self.log.remove(candid).await.map_err(Error::review_log)
  }
}
