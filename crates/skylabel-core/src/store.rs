//! The `CandidateStore` trait.
//!
//! Implemented by storage backends (e.g. `skylabel-store-sqlite`). The
//! reclassifier and the API depend on this abstraction, never on a concrete
//! backend. A store is an explicit object handed to every caller; backends
//! must not memoize query results.

use std::future::Future;

use crate::{
  candidate::{Candidate, Coordinates, CutoutBlobs, Field, HostlessFilter},
  label::{LabelCount, LabelRow, LabelTable},
};

/// Abstraction over the relational store holding candidates, cutouts and the
/// four label tables.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait CandidateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Cutouts & candidates ──────────────────────────────────────────────

  /// Fetch cutouts for the given candids, at most one row per candid, only
  /// for candids present in `candidates`. Order follows `candids`.
  fn cutouts<'a>(
    &'a self,
    candids: &'a [i64],
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<CutoutBlobs>, Self::Error>> + Send + 'a;

  /// Fetch cutouts for every distinct candid in a label table, ordered by
  /// candid.
  fn label_cutouts(
    &self,
    table: LabelTable,
  ) -> impl Future<Output = Result<Vec<CutoutBlobs>, Self::Error>> + Send + '_;

  /// Sky position of a candidate, `None` if unknown.
  fn coordinates(
    &self,
    candid: i64,
  ) -> impl Future<Output = Result<Option<Coordinates>, Self::Error>> + Send + '_;

  /// Candids passing the hostless-scan cuts, best real/bogus score first.
  fn hostless_candids<'a>(
    &'a self,
    filter: &'a HostlessFilter,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + 'a;

  // ── Label reads ───────────────────────────────────────────────────────

  /// Current maximum surrogate id of a label table; `None` when empty.
  fn max_label_id(
    &self,
    table: LabelTable,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  /// All rows of one label table ordered by surrogate id.
  fn label_rows(
    &self,
    table: LabelTable,
  ) -> impl Future<Output = Result<Vec<LabelRow>, Self::Error>> + Send + '_;

  /// All rows of all four label tables.
  fn all_labels(
    &self,
  ) -> impl Future<Output = Result<Vec<LabelRow>, Self::Error>> + Send + '_;

  /// Every label table containing `candid`, in union order, without
  /// repeats.
  fn memberships(
    &self,
    candid: i64,
  ) -> impl Future<Output = Result<Vec<LabelTable>, Self::Error>> + Send + '_;

  /// Every distinct candid filed under any label table, ascending.
  fn all_classified(
    &self,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  /// Row and distinct-candid counts for each label table, in union order.
  fn label_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<LabelCount>, Self::Error>> + Send + '_;

  // ── Label writes ──────────────────────────────────────────────────────

  /// File `candid` under `table` with the next surrogate id.
  fn insert_label(
    &self,
    table: LabelTable,
    candid: i64,
  ) -> impl Future<Output = Result<LabelRow, Self::Error>> + Send + '_;

  /// Remove every row for `candid` from `table`; returns rows removed.
  fn delete_label(
    &self,
    table: LabelTable,
    candid: i64,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete from `from` and insert into `to` atomically.
  ///
  /// `None` when `candid` has no row in `from`; no table is touched then.
  fn move_label(
    &self,
    candid: i64,
    from: LabelTable,
    to: LabelTable,
  ) -> impl Future<Output = Result<Option<LabelRow>, Self::Error>> + Send + '_;

  /// Remove `candid` from every table except `keep` and make sure it is
  /// filed under `keep`, atomically. Returns the surviving `keep` row.
  fn resolve_duplicate(
    &self,
    candid: i64,
    keep: LabelTable,
  ) -> impl Future<Output = Result<LabelRow, Self::Error>> + Send + '_;

  /// Remove `candid` from every label table in one transaction; returns
  /// rows removed across all tables.
  fn delete_everywhere(
    &self,
    candid: i64,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// For each candid with several rows in `table`, delete all but the row
  /// with the smallest surrogate id. Returns rows removed.
  fn deduplicate_table(
    &self,
    table: LabelTable,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Ingestion ─────────────────────────────────────────────────────────

  fn add_field(
    &self,
    field: Field,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_candidate(
    &self,
    candidate: Candidate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_cutout(
    &self,
    cutout: CutoutBlobs,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
