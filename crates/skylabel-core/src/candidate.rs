//! Candidates, their cutouts and the hostless-scan filter.
//!
//! Candidates and cutouts are created by upstream ingestion; this service
//! only reads them. Survey metadata is used for filtering and never shown.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Sky position ────────────────────────────────────────────────────────────

/// Equatorial coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub ra:  f64,
  pub dec: f64,
}

// ─── Candidate ───────────────────────────────────────────────────────────────

/// A survey field and its galactic latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Field {
  pub field:  i64,
  pub gallat: f64,
}

/// A transient detection as stored in the `candidates` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  pub candid:         i64,
  pub ra:             f64,
  pub dec:            f64,
  pub field:          i64,
  pub epochid:        i64,
  /// Real/bogus score in `[0, 1]`.
  pub rbscore:        f64,
  /// Number of survey epochs this detection was matched in.
  pub nmatches:       i64,
  /// Peak detection significance in the difference image.
  pub scorr_peak:     f64,
  /// Positive flux in the difference image.
  pub ispos:          bool,
  pub mjd:            f64,
  /// MJD of the first detection at this position.
  pub firstdet:       f64,
  /// Distance (arcsec) to the nearest catalog source, one per epoch.
  pub wdist:          [f64; 3],
  /// W1 magnitude of that nearest source, one per epoch.
  pub w1mag:          [f64; 3],
  /// Distance (arcsec) to the nearest bright star.
  pub distnearbrstar: f64,
}

// ─── Cutouts ─────────────────────────────────────────────────────────────────

/// The three compressed FITS blobs stored for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoutBlobs {
  pub candid:     i64,
  pub science:    Vec<u8>,
  pub reference:  Vec<u8>,
  pub difference: Vec<u8>,
}

// ─── Candid lists ────────────────────────────────────────────────────────────

/// Parse a reviewer-supplied candid list such as `[123, "456"]`.
///
/// Accepts a JSON array of integers or integer strings. An empty list is
/// rejected: there is nothing to review.
pub fn parse_candid_list(text: &str) -> Result<Vec<i64>> {
  let values: Vec<serde_json::Value> = serde_json::from_str(text.trim())
    .map_err(|e| Error::InvalidCandidList(e.to_string()))?;

  if values.is_empty() {
    return Err(Error::InvalidCandidList("list is empty".to_owned()));
  }

  values
    .into_iter()
    .map(|v| {
      let candid = match &v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
      };
      candid.ok_or_else(|| Error::InvalidCandidList(format!("not a candid: {v}")))
    })
    .collect()
}

// ─── Hostless scan ───────────────────────────────────────────────────────────

/// Parameters of the hostless scan. The quality cuts are fixed; only the
/// epoch, galactic-latitude band and result limit vary per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostlessFilter {
  pub epoch:      i64,
  /// Inclusive lower bound on `|gallat|`, degrees.
  pub gallat_min: f64,
  /// Exclusive upper bound on `|gallat|`, degrees.
  pub gallat_max: f64,
  pub limit:      usize,
}

impl HostlessFilter {
  pub const RB_SCORE_MIN: f64 = 0.5;
  pub const RB_SCORE_MAX: f64 = 1.0;
  pub const MIN_MATCHES: i64 = 2;
  pub const MIN_SCORR_PEAK: f64 = 10.0;
  pub const MIN_AGE_DAYS: f64 = 10.0;
  pub const MAX_AGE_DAYS: f64 = 400.0;
  /// Closest catalog source must be farther than this (arcsec).
  pub const MIN_HOST_DIST: f64 = 3.0;
  /// Bright-star exclusion radius (arcsec).
  pub const BRIGHT_STAR_DIST: f64 = 10.0;
  /// Sources fainter than this magnitude are not "bright".
  pub const BRIGHT_STAR_MAG: f64 = 7.0;

  pub fn validate(&self) -> Result<()> {
    if !(self.gallat_min.is_finite() && self.gallat_max.is_finite()) {
      return Err(Error::InvalidFilter("galactic latitude must be finite".into()));
    }
    if self.gallat_min < 0.0 || self.gallat_max > 90.0 {
      return Err(Error::InvalidFilter(
        "galactic latitude band must lie within [0, 90]".into(),
      ));
    }
    if self.gallat_min >= self.gallat_max {
      return Err(Error::InvalidFilter(format!(
        "empty galactic latitude band [{}, {})",
        self.gallat_min, self.gallat_max
      )));
    }
    if self.limit == 0 {
      return Err(Error::InvalidFilter("limit must be positive".into()));
    }
    Ok(())
  }
}
