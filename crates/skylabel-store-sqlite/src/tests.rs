//! Integration tests for `SqliteStore` and the reclassifier against an
//! in-memory database.

use std::sync::Arc;

use skylabel_core::{
  Error as CoreError,
  candidate::{Candidate, CutoutBlobs, Field, HostlessFilter},
  label::{Classification, LabelTable},
  reclassify::{Reclassification, Reclassifier},
  review::{MemoryReviewLog, ReviewKind, ReviewLog as _, Reviewer},
  store::CandidateStore,
};
use skylabel_fits::{Image, decode_cutout, encode_cutout};

use crate::{Error, SqliteStore};

use LabelTable::{Artifact, Echo, HighPm, Reals};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn reclassifier(store: SqliteStore) -> Reclassifier<SqliteStore, MemoryReviewLog> {
  Reclassifier::new(Arc::new(store), Arc::new(MemoryReviewLog::new()))
}

fn candidate(candid: i64) -> Candidate {
  Candidate {
    candid,
    ra: 150.0 + candid as f64 * 1e-3,
    dec: -30.0,
    ..Default::default()
  }
}

/// A candidate passing every hostless cut in epoch 7, field 1.
fn hostless(candid: i64, rbscore: f64) -> Candidate {
  Candidate {
    candid,
    ra: 10.0,
    dec: 20.0,
    field: 1,
    epochid: 7,
    rbscore,
    nmatches: 3,
    scorr_peak: 12.0,
    ispos: true,
    mjd: 60_100.0,
    firstdet: 60_000.0,
    wdist: [12.0; 3],
    w1mag: [15.0; 3],
    distnearbrstar: 20.0,
  }
}

async fn seed(s: &SqliteStore, candids: &[i64]) {
  for &c in candids {
    s.add_candidate(candidate(c)).await.unwrap();
  }
}

async fn rows(s: &SqliteStore, table: LabelTable) -> Vec<(i64, i64)> {
  s.label_rows(table)
    .await
    .unwrap()
    .into_iter()
    .map(|r| (r.label_id, r.candid))
    .collect()
}

// ─── Label ids ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn label_ids_follow_max_plus_one() {
  let s = store().await;
  seed(&s, &[10, 11, 12, 13]).await;

  assert_eq!(s.max_label_id(Echo).await.unwrap(), None);

  for c in [10, 11, 12] {
    s.insert_label(Echo, c).await.unwrap();
  }
  assert_eq!(s.max_label_id(Echo).await.unwrap(), Some(3));

  s.delete_label(Echo, 12).await.unwrap();
  let row = s.insert_label(Echo, 13).await.unwrap();
  assert_eq!(row.label_id, 3);

  // Each table has its own id sequence.
  assert_eq!(s.insert_label(Reals, 10).await.unwrap().label_id, 1);
}

#[tokio::test]
async fn insert_for_unknown_candidate_fails() {
  let s = store().await;
  let err = s.insert_label(Reals, 999).await.unwrap_err();
  assert!(matches!(err, Error::UnknownCandidate(999)));
  assert!(rows(&s, Reals).await.is_empty());
}

// ─── Locate & duplicates ─────────────────────────────────────────────────────

#[tokio::test]
async fn single_membership_locates_and_is_not_a_duplicate() {
  let s = store().await;
  seed(&s, &[1, 2, 3, 4]).await;
  s.insert_label(Reals, 1).await.unwrap();
  s.insert_label(Artifact, 2).await.unwrap();
  s.insert_label(Echo, 3).await.unwrap();
  s.insert_label(HighPm, 4).await.unwrap();

  let r = reclassifier(s);
  assert_eq!(r.locate(1).await.unwrap(), Some(Reals));
  assert_eq!(r.locate(2).await.unwrap(), Some(Artifact));
  assert_eq!(r.locate(3).await.unwrap(), Some(Echo));
  assert_eq!(r.locate(4).await.unwrap(), Some(HighPm));
  assert_eq!(r.locate(5).await.unwrap(), None);
  assert!(r.find_duplicates().await.unwrap().is_empty());
}

#[tokio::test]
async fn cross_table_duplicate_is_reported() {
  let s = store().await;
  seed(&s, &[42, 43]).await;
  s.insert_label(Artifact, 42).await.unwrap();
  s.insert_label(Reals, 42).await.unwrap();
  s.insert_label(Echo, 43).await.unwrap();

  assert_eq!(rows(&s, Artifact).await, vec![(1, 42)]);
  assert_eq!(rows(&s, Reals).await, vec![(1, 42)]);

  let r = reclassifier(s);
  let dups = r.find_duplicates().await.unwrap();
  assert_eq!(dups.len(), 1);
  assert_eq!(dups[0].candid, 42);
  assert_eq!(dups[0].tables.iter().copied().collect::<Vec<_>>(), vec![Reals, Artifact]);

  // Union order puts reals first.
  assert_eq!(r.locate(42).await.unwrap(), Some(Reals));
  assert!(matches!(
    r.classification(42).await.unwrap(),
    Classification::DuplicateIn(t) if t.len() == 2
  ));
}

#[tokio::test]
async fn same_table_repeat_is_not_a_cross_table_duplicate() {
  let s = store().await;
  seed(&s, &[7]).await;
  s.insert_label(Echo, 7).await.unwrap();
  s.insert_label(Echo, 7).await.unwrap();

  assert_eq!(s.memberships(7).await.unwrap(), vec![Echo]);
  assert!(reclassifier(s).find_duplicates().await.unwrap().is_empty());
}

// ─── Reclassify ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn reclassify_artifact_to_reals() {
  let s = store().await;
  seed(&s, &[42]).await;
  let inserted = s.insert_label(Artifact, 42).await.unwrap();
  assert_eq!(inserted.label_id, 1);

  let r = reclassifier(s.clone());
  let outcome = r.reclassify(42, Some(Artifact), Reals).await.unwrap();
  assert!(matches!(outcome, Reclassification::Moved { from: Artifact, .. }));

  assert!(rows(&s, Artifact).await.is_empty());
  assert_eq!(rows(&s, Reals).await, vec![(1, 42)]);
  assert_eq!(r.locate(42).await.unwrap(), Some(Reals));
  assert!(!s.memberships(42).await.unwrap().contains(&Artifact));
}

#[tokio::test]
async fn reconfirming_a_label_changes_no_rows_and_clears_the_log() {
  let s = store().await;
  seed(&s, &[5, 6]).await;
  s.insert_label(HighPm, 5).await.unwrap();
  s.insert_label(Reals, 6).await.unwrap();
  let before = s.label_counts().await.unwrap();

  let r = reclassifier(s.clone());
  r.flag(5, ReviewKind::Incorrect, Some(&Reviewer("ana".into())))
    .await
    .unwrap();

  let outcome = r.reclassify(5, Some(HighPm), HighPm).await.unwrap();
  assert_eq!(outcome, Reclassification::Confirmed { table: HighPm });
  assert_eq!(s.label_counts().await.unwrap(), before);
  assert!(r.log().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn reclassify_unclassified_inserts() {
  let s = store().await;
  seed(&s, &[8]).await;

  let r = reclassifier(s.clone());
  let outcome = r.reclassify(8, None, Echo).await.unwrap();
  assert!(matches!(outcome, Reclassification::Inserted { row } if row.candid == 8));
  assert_eq!(rows(&s, Echo).await, vec![(1, 8)]);
}

#[tokio::test]
async fn failed_move_leaves_tables_untouched() {
  let s = store().await;
  seed(&s, &[1]).await;
  s.insert_label(Artifact, 1).await.unwrap();

  // 2 is not a known candidate: the move aborts before deleting anything.
  let err = s.move_label(2, Artifact, Reals).await.unwrap_err();
  assert!(matches!(err, Error::UnknownCandidate(2)));
  assert_eq!(rows(&s, Artifact).await, vec![(1, 1)]);
  assert!(rows(&s, Reals).await.is_empty());
}

#[tokio::test]
async fn move_from_the_wrong_table_rolls_back() {
  let s = store().await;
  seed(&s, &[42]).await;
  s.insert_label(Echo, 42).await.unwrap();

  assert_eq!(s.move_label(42, Artifact, Reals).await.unwrap(), None);
  assert!(rows(&s, Reals).await.is_empty());

  let r = reclassifier(s.clone());
  let err = r.reclassify(42, Some(Artifact), Reals).await.unwrap_err();
  assert!(matches!(err, CoreError::NotInTable { candid: 42, table: Artifact }));
  assert_eq!(s.memberships(42).await.unwrap(), vec![Echo]);
}

#[tokio::test]
async fn classify_locates_the_source_table() {
  let s = store().await;
  seed(&s, &[1, 2]).await;
  s.insert_label(Echo, 1).await.unwrap();
  s.insert_label(Echo, 2).await.unwrap();
  s.insert_label(Reals, 2).await.unwrap();

  let r = reclassifier(s.clone());
  r.classify(1, Artifact).await.unwrap();
  assert_eq!(s.memberships(1).await.unwrap(), vec![Artifact]);

  let err = r.classify(2, Artifact).await.unwrap_err();
  assert!(matches!(err, CoreError::AmbiguousClassification { candid: 2, .. }));
  assert_eq!(s.memberships(2).await.unwrap(), vec![Reals, Echo]);
}

#[tokio::test]
async fn delete_optionally_clears_the_log() {
  let s = store().await;
  seed(&s, &[3, 4]).await;
  s.insert_label(Reals, 3).await.unwrap();
  s.insert_label(Reals, 4).await.unwrap();

  let r = reclassifier(s.clone());
  r.flag(3, ReviewKind::Incorrect, None).await.unwrap();
  r.flag(4, ReviewKind::Incorrect, None).await.unwrap();

  assert_eq!(r.delete(3, Reals, false).await.unwrap(), 1);
  assert_eq!(r.delete(4, Reals, true).await.unwrap(), 1);

  let remaining: Vec<i64> = r.log().entries().await.unwrap().iter().map(|e| e.candid).collect();
  assert_eq!(remaining, vec![3]);
  assert!(rows(&s, Reals).await.is_empty());
}

#[tokio::test]
async fn delete_everywhere_empties_every_table() {
  let s = store().await;
  seed(&s, &[6, 7]).await;
  s.insert_label(Artifact, 6).await.unwrap();
  s.insert_label(Reals, 6).await.unwrap();
  s.insert_label(Reals, 6).await.unwrap();
  s.insert_label(Reals, 7).await.unwrap();

  let r = reclassifier(s.clone());
  r.flag(6, ReviewKind::Duplicate, None).await.unwrap();

  assert_eq!(r.delete_everywhere(6).await.unwrap(), 3);
  assert!(s.memberships(6).await.unwrap().is_empty());
  assert_eq!(s.memberships(7).await.unwrap(), vec![Reals]);
  assert!(r.log().entries().await.unwrap().is_empty());

  assert_eq!(s.delete_everywhere(6).await.unwrap(), 0);
}

// ─── Duplicate resolution & de-duplication ───────────────────────────────────

#[tokio::test]
async fn resolve_duplicate_keeps_one_table() {
  let s = store().await;
  seed(&s, &[9, 10]).await;
  s.insert_label(Reals, 9).await.unwrap();
  s.insert_label(Echo, 9).await.unwrap();
  s.insert_label(Artifact, 10).await.unwrap();
  s.insert_label(HighPm, 10).await.unwrap();

  let r = reclassifier(s.clone());
  r.flag(9, ReviewKind::Duplicate, None).await.unwrap();

  let kept = r.resolve_duplicate(9, Echo).await.unwrap();
  assert_eq!((kept.table, kept.label_id), (Echo, 1));
  assert_eq!(s.memberships(9).await.unwrap(), vec![Echo]);
  assert!(r.log().entries().await.unwrap().is_empty());

  // Keeping a table the candid is not in files it there.
  let kept = r.resolve_duplicate(10, Reals).await.unwrap();
  assert_eq!(kept.table, Reals);
  assert_eq!(s.memberships(10).await.unwrap(), vec![Reals]);
  assert!(r.find_duplicates().await.unwrap().is_empty());
}

#[tokio::test]
async fn deduplicate_keeps_lowest_id() {
  let s = store().await;
  seed(&s, &[1, 2, 3]).await;
  for c in [1, 2, 1, 3, 1, 2] {
    s.insert_label(Artifact, c).await.unwrap();
  }
  // ids: 1→1, 2→2, 3→1, 4→3, 5→1, 6→2

  let r = reclassifier(s.clone());
  assert_eq!(r.deduplicate_table(Artifact).await.unwrap(), 3);
  assert_eq!(rows(&s, Artifact).await, vec![(1, 1), (2, 2), (4, 3)]);

  assert_eq!(r.deduplicate_table(Artifact).await.unwrap(), 0);
}

#[tokio::test]
async fn deduplicate_all_reports_per_table() {
  let s = store().await;
  seed(&s, &[1]).await;
  s.insert_label(Reals, 1).await.unwrap();
  s.insert_label(Reals, 1).await.unwrap();
  s.insert_label(HighPm, 1).await.unwrap();

  let removed = reclassifier(s.clone()).deduplicate_all().await.unwrap();
  assert_eq!(removed, vec![(Reals, 1), (Artifact, 0), (Echo, 0), (HighPm, 0)]);
  // Cross-table duplicates are left for manual resolution.
  assert_eq!(s.memberships(1).await.unwrap(), vec![Reals, HighPm]);
}

// ─── Counts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn counts_and_classified_set() {
  let s = store().await;
  seed(&s, &[1, 2, 3]).await;
  s.insert_label(Reals, 1).await.unwrap();
  s.insert_label(Reals, 1).await.unwrap();
  s.insert_label(Reals, 2).await.unwrap();
  s.insert_label(Echo, 3).await.unwrap();
  s.insert_label(Echo, 1).await.unwrap();

  let counts = s.label_counts().await.unwrap();
  let reals = counts.iter().find(|c| c.table == Reals).unwrap();
  assert_eq!((reals.rows, reals.distinct, reals.duplicates()), (3, 2, 1));
  assert_eq!(counts.iter().map(|c| c.table).collect::<Vec<_>>(), vec![Reals, Artifact, Echo, HighPm]);

  assert_eq!(s.all_classified().await.unwrap(), vec![1, 2, 3]);
  assert_eq!(s.all_labels().await.unwrap().len(), 5);
}

// ─── Cutouts ─────────────────────────────────────────────────────────────────

fn blobs(candid: i64, value: f64) -> CutoutBlobs {
  let blob = encode_cutout(&Image::filled(4, 4, value)).unwrap();
  CutoutBlobs {
    candid,
    science: blob.clone(),
    reference: blob.clone(),
    difference: blob,
  }
}

#[tokio::test]
async fn cutouts_follow_request_order() {
  let s = store().await;
  seed(&s, &[1, 2, 3]).await;
  for c in [1, 2, 3] {
    s.add_cutout(blobs(c, c as f64)).await.unwrap();
  }

  let got = s.cutouts(&[3, 99, 1, 3, 2], None).await.unwrap();
  assert_eq!(got.iter().map(|b| b.candid).collect::<Vec<_>>(), vec![3, 1, 2]);

  let limited = s.cutouts(&[2, 1, 3], Some(2)).await.unwrap();
  assert_eq!(limited.iter().map(|b| b.candid).collect::<Vec<_>>(), vec![2, 1]);

  assert!(s.cutouts(&[], None).await.unwrap().is_empty());
}

#[tokio::test]
async fn stored_constant_cutout_decodes_flat() {
  let s = store().await;
  seed(&s, &[5]).await;
  s.add_cutout(blobs(5, 17.0)).await.unwrap();

  let fetched = s.cutouts(&[5], None).await.unwrap();
  let cutout = decode_cutout(&fetched[0].difference).unwrap();
  assert!(cutout.image.pixels.iter().all(|&p| p == 17.0));
  assert_eq!((cutout.range.vmin, cutout.range.vmax), (17.0, 17.0));
}

#[tokio::test]
async fn cutout_for_unknown_candidate_is_rejected() {
  let s = store().await;
  assert!(matches!(
    s.add_cutout(blobs(1, 0.0)).await,
    Err(Error::UnknownCandidate(1))
  ));
}

#[tokio::test]
async fn label_cutouts_cover_distinct_members() {
  let s = store().await;
  seed(&s, &[1, 2, 3]).await;
  for c in [1, 2, 3] {
    s.add_cutout(blobs(c, 0.0)).await.unwrap();
  }
  s.insert_label(HighPm, 3).await.unwrap();
  s.insert_label(HighPm, 1).await.unwrap();
  s.insert_label(HighPm, 3).await.unwrap();

  let got = s.label_cutouts(HighPm).await.unwrap();
  assert_eq!(got.iter().map(|b| b.candid).collect::<Vec<_>>(), vec![1, 3]);
}

#[tokio::test]
async fn coordinates_of_known_and_unknown() {
  let s = store().await;
  seed(&s, &[1]).await;
  let c = s.coordinates(1).await.unwrap().unwrap();
  assert_eq!((c.ra, c.dec), (candidate(1).ra, -30.0));
  assert!(s.coordinates(2).await.unwrap().is_none());
}

// ─── Hostless scan ───────────────────────────────────────────────────────────

#[tokio::test]
async fn hostless_applies_cuts_and_orders_by_score() {
  let s = store().await;
  s.add_field(Field { field: 1, gallat: -30.0 }).await.unwrap();
  s.add_field(Field { field: 2, gallat: 5.0 }).await.unwrap();

  s.add_candidate(hostless(1, 0.7)).await.unwrap();
  s.add_candidate(hostless(2, 0.95)).await.unwrap();
  s.add_candidate(hostless(3, 0.8)).await.unwrap();
  // Each of these fails exactly one cut.
  s.add_candidate(Candidate { rbscore: 0.4, ..hostless(10, 0.0) }).await.unwrap();
  s.add_candidate(Candidate { epochid: 8, ..hostless(11, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { field: 2, ..hostless(12, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { ispos: false, ..hostless(13, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { firstdet: 60_095.0, ..hostless(14, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { wdist: [12.0, 2.0, 12.0], ..hostless(15, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { wdist: [12.0, 5.0, 12.0], w1mag: [15.0, 6.0, 15.0], ..hostless(16, 0.9) })
    .await
    .unwrap();
  s.add_candidate(Candidate { distnearbrstar: 10.0, ..hostless(17, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { nmatches: 1, ..hostless(18, 0.9) }).await.unwrap();
  s.add_candidate(Candidate { scorr_peak: 9.5, ..hostless(19, 0.9) }).await.unwrap();

  // Near host but faint: passes the bright-star clause.
  s.add_candidate(Candidate { wdist: [12.0, 5.0, 12.0], ..hostless(20, 0.6) }).await.unwrap();

  let filter = HostlessFilter { epoch: 7, gallat_min: 20.0, gallat_max: 90.0, limit: 100 };
  assert_eq!(s.hostless_candids(&filter).await.unwrap(), vec![2, 3, 1, 20]);

  let limited = HostlessFilter { limit: 2, ..filter };
  assert_eq!(s.hostless_candids(&limited).await.unwrap(), vec![2, 3]);

  // |gallat| = 30 falls outside a band whose upper bound is 30.
  let low_band = HostlessFilter { gallat_min: 0.0, gallat_max: 30.0, ..filter };
  assert_eq!(s.hostless_candids(&low_band).await.unwrap(), vec![12]);
}

#[tokio::test]
async fn hostless_rejects_invalid_band() {
  let s = store().await;
  let filter = HostlessFilter { epoch: 7, gallat_min: 40.0, gallat_max: 20.0, limit: 10 };
  assert!(matches!(
    s.hostless_candids(&filter).await,
    Err(Error::Core(CoreError::InvalidFilter(_)))
  ));
}
