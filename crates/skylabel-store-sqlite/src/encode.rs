//! Mapping between SQLite rows and domain types.
//!
//! Label table names are only ever interpolated from [`LabelTable`]; every
//! value goes through a bound parameter.

use rusqlite::Row;
use skylabel_core::{
  candidate::{Candidate, CutoutBlobs},
  label::{LabelRow, LabelTable},
};

// ─── Label rows ──────────────────────────────────────────────────────────────

/// `SELECT {id}, candid FROM {table}` in surrogate-id order.
pub fn select_label_rows(table: LabelTable) -> String {
  format!(
    "SELECT {id}, candid FROM {table} ORDER BY {id}",
    id = table.id_column(),
    table = table.table_name(),
  )
}

pub fn label_row(table: LabelTable, row: &Row<'_>) -> rusqlite::Result<LabelRow> {
  Ok(LabelRow {
    table,
    label_id: row.get(0)?,
    candid:   row.get(1)?,
  })
}

// ─── Cutouts ─────────────────────────────────────────────────────────────────

pub const CUTOUT_COLUMNS: &str = "c.candid, c.sci_image, c.ref_image, c.diff_image";

pub fn cutout_blobs(row: &Row<'_>) -> rusqlite::Result<CutoutBlobs> {
  Ok(CutoutBlobs {
    candid:     row.get(0)?,
    science:    row.get(1)?,
    reference:  row.get(2)?,
    difference: row.get(3)?,
  })
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// Positional values for an `INSERT INTO candidates` with columns in schema
/// order.
pub struct RawCandidate {
  pub candid:         i64,
  pub ra:             f64,
  pub dec:            f64,
  pub field:          i64,
  pub epochid:        i64,
  pub rbscore:        f64,
  pub nmatches:       i64,
  pub scorr_peak:     f64,
  pub ispos:          i64,
  pub mjd:            f64,
  pub firstdet:       f64,
  pub wdist:          [f64; 3],
  pub w1mag:          [f64; 3],
  pub distnearbrstar: f64,
}

impl From<Candidate> for RawCandidate {
  fn from(c: Candidate) -> Self {
    Self {
      candid:         c.candid,
      ra:             c.ra,
      dec:            c.dec,
      field:          c.field,
      epochid:        c.epochid,
      rbscore:        c.rbscore,
      nmatches:       c.nmatches,
      scorr_peak:     c.scorr_peak,
      ispos:          i64::from(c.ispos),
      mjd:            c.mjd,
      firstdet:       c.firstdet,
      wdist:          c.wdist,
      w1mag:          c.w1mag,
      distnearbrstar: c.distnearbrstar,
    }
  }
}

pub const INSERT_CANDIDATE: &str = "
INSERT INTO candidates (
    candid, ra, dec, field, epochid, rbscore, nmatches, scorr_peak, ispos,
    mjd, firstdet, wdist1, wdist2, wdist3, w1mag1, w1mag2, w1mag3,
    distnearbrstar
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
          ?16, ?17, ?18)";
