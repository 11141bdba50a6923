//! Label tables (the four classification categories a candidate can be
//! filed under) and the membership states derived from them.
//!
//! Every label table has the same shape: `{name}id` surrogate key plus a
//! `candid` column. [`LabelTable`] is the single source of truth for table
//! and column names; nothing else formats an identifier into SQL.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};

// ─── LabelTable ──────────────────────────────────────────────────────────────

/// One of the four label tables.
///
/// Declaration order is the union order used by [`Classification`] lookups:
/// `reals`, `artifact`, `echo`, `highpm`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LabelTable {
  Reals,
  Artifact,
  Echo,
  #[serde(rename = "highpm")]
  #[strum(serialize = "highpm")]
  HighPm,
}

impl LabelTable {
  /// Every label table in union order.
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }

  /// The SQL table name.
  pub fn table_name(self) -> &'static str {
    match self {
      Self::Reals => "reals",
      Self::Artifact => "artifact",
      Self::Echo => "echo",
      Self::HighPm => "highpm",
    }
  }

  /// The surrogate-key column, `{table}id`.
  pub fn id_column(self) -> &'static str {
    match self {
      Self::Reals => "realsid",
      Self::Artifact => "artifactid",
      Self::Echo => "echoid",
      Self::HighPm => "highpmid",
    }
  }

  /// Parse a table name, mapping failures to [`crate::Error::UnknownLabel`].
  pub fn parse(s: &str) -> crate::Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| crate::Error::UnknownLabel(s.to_owned()))
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A single `(label_id, candid)` row of a label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
  pub table:    LabelTable,
  pub label_id: i64,
  pub candid:   i64,
}

/// Row statistics for one label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
  pub table:    LabelTable,
  /// Total number of rows, including repeated candids.
  pub rows:     u64,
  /// Number of distinct candids.
  pub distinct: u64,
}

impl LabelCount {
  /// Rows beyond the first for each candid: same candid filed twice in the
  /// same table.
  pub fn duplicates(&self) -> u64 { self.rows.saturating_sub(self.distinct) }
}

// ─── Classification state ────────────────────────────────────────────────────

/// Where a candidate currently sits across the label tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "tables", rename_all = "snake_case")]
pub enum Classification {
  Unclassified,
  ClassifiedAs(LabelTable),
  /// Present in more than one label table; needs a manual pick.
  DuplicateIn(BTreeSet<LabelTable>),
}

impl Classification {
  /// Build the state from the list of tables holding a candid.
  pub fn from_memberships(
    memberships: impl IntoIterator<Item = LabelTable>,
  ) -> Self {
    let tables: BTreeSet<LabelTable> = memberships.into_iter().collect();
    let mut iter = tables.iter();
    match (iter.next(), iter.next()) {
      (None, _) => Self::Unclassified,
      (Some(&only), None) => Self::ClassifiedAs(only),
      _ => Self::DuplicateIn(tables),
    }
  }

  /// The first owning table in union order, if any.
  pub fn primary(&self) -> Option<LabelTable> {
    match self {
      Self::Unclassified => None,
      Self::ClassifiedAs(t) => Some(*t),
      Self::DuplicateIn(ts) => ts.iter().next().copied(),
    }
  }
}

// ─── Duplicates ──────────────────────────────────────────────────────────────

/// A candid filed under more than one label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duplicate {
  pub candid: i64,
  pub tables: BTreeSet<LabelTable>,
}

/// Group label rows by candid and keep those with more than one owning
/// table. Repeats within the same table do not count. Sorted by candid.
pub fn group_duplicates(
  rows: impl IntoIterator<Item = LabelRow>,
) -> Vec<Duplicate> {
  let mut memberships: BTreeMap<i64, BTreeSet<LabelTable>> = BTreeMap::new();
  for row in rows {
    memberships.entry(row.candid).or_default().insert(row.table);
  }

  memberships
    .into_iter()
    .filter(|(_, tables)| tables.len() > 1)
    .map(|(candid, tables)| Duplicate { candid, tables })
    .collect()
}
