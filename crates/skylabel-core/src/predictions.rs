//! Model predictions: selecting likely misclassifications and summarising
//! model performance as a confusion matrix.
//!
//! Predictions arrive as uploaded tables (see `skylabel-api`); this module
//! only holds the parsed rows and the selection rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, label::LabelTable};

/// Class order used by model outputs that encode labels as integers.
pub const MODEL_CLASSES: [LabelTable; 4] = [
  LabelTable::Artifact,
  LabelTable::Reals,
  LabelTable::HighPm,
  LabelTable::Echo,
];

/// Classes of a binary (artifact vs. real) model.
pub const BINARY_CLASSES: [LabelTable; 2] =
  [LabelTable::Artifact, LabelTable::Reals];

/// Parse a model label: either a table name or an integer index into
/// [`MODEL_CLASSES`].
pub fn parse_model_label(s: &str) -> Result<LabelTable> {
  let s = s.trim();
  if let Ok(index) = s.parse::<usize>() {
    return MODEL_CLASSES
      .get(index)
      .copied()
      .ok_or_else(|| Error::UnknownLabel(s.to_owned()));
  }
  LabelTable::parse(s)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One classified candidate from a model run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub candid:        i64,
  pub predicted:     LabelTable,
  /// Reviewer label, when the model was run on labelled data.
  pub truth:         Option<LabelTable>,
  /// Per-class probability; classes absent from the upload are missing.
  pub probabilities: BTreeMap<LabelTable, f64>,
}

impl Prediction {
  pub fn is_misclassified(&self) -> bool {
    self.truth.is_some_and(|t| t != self.predicted)
  }
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Inclusive probability band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRange {
  pub min: f64,
  pub max: f64,
}

impl Default for ProbabilityRange {
  fn default() -> Self { Self { min: 0.0, max: 1.0 } }
}

impl ProbabilityRange {
  pub fn contains(&self, p: f64) -> bool { p >= self.min && p <= self.max }
}

/// Which predictions to surface for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFilter {
  /// Only rows whose reviewer label disagrees with the model.
  pub truth_check: bool,
  /// Binary model: probability bands are not applied in truth-check mode.
  pub binary:      bool,
  /// Only rows predicted as this class (ignored in truth-check mode).
  pub source:      Option<LabelTable>,
  pub ranges:      BTreeMap<LabelTable, ProbabilityRange>,
  pub limit:       usize,
}

impl Default for PredictionFilter {
  fn default() -> Self {
    Self {
      truth_check: false,
      binary:      false,
      source:      None,
      ranges:      BTreeMap::new(),
      limit:       Self::DEFAULT_LIMIT,
    }
  }
}

impl PredictionFilter {
  pub const DEFAULT_LIMIT: usize = 500;
  pub const MAX_LIMIT: usize = 1000;

  /// The class list this filter's model was trained on.
  pub fn classes(&self) -> &'static [LabelTable] {
    if self.binary { &BINARY_CLASSES } else { &MODEL_CLASSES }
  }

  fn in_ranges(&self, prediction: &Prediction) -> bool {
    self.ranges.iter().all(|(class, range)| {
      prediction
        .probabilities
        .get(class)
        .is_none_or(|p| range.contains(*p))
    })
  }

  /// Apply the filter, preserving upload order, capped at `limit`.
  pub fn select<'a>(
    &self,
    predictions: &'a [Prediction],
  ) -> Result<Vec<&'a Prediction>> {
    if self.truth_check && predictions.iter().any(|p| p.truth.is_none()) {
      return Err(Error::InvalidPredictions(
        "truth check requested but some rows have no true label".into(),
      ));
    }

    let limit = self.limit.min(Self::MAX_LIMIT);
    let selected = predictions
      .iter()
      .filter(|p| {
        if self.truth_check {
          p.is_misclassified() && (self.binary || self.in_ranges(p))
        } else {
          self.source.is_none_or(|s| p.predicted == s) && self.in_ranges(p)
        }
      })
      .take(limit)
      .collect();
    Ok(selected)
  }
}

// ─── Confusion matrix ────────────────────────────────────────────────────────

/// Counts of true (row) vs. predicted (column) labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
  pub classes:    Vec<LabelTable>,
  pub counts:     Vec<Vec<u64>>,
  /// Each row divided by its total; rows with no samples are all zero.
  pub normalized: Vec<Vec<f64>>,
}

impl ConfusionMatrix {
  /// Tally labelled predictions over `classes`. Rows without a true label or
  /// with labels outside `classes` are skipped.
  pub fn build(classes: &[LabelTable], predictions: &[Prediction]) -> Self {
    let index = |t: LabelTable| classes.iter().position(|c| *c == t);
    let n = classes.len();
    let mut counts = vec![vec![0u64; n]; n];

    for p in predictions {
      let Some(truth) = p.truth else { continue };
      if let (Some(i), Some(j)) = (index(truth), index(p.predicted)) {
        counts[i][j] += 1;
      }
    }

    let normalized = counts
      .iter()
      .map(|row| {
        let total: u64 = row.iter().sum();
        row
          .iter()
          .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
          .collect()
      })
      .collect();

    Self { classes: classes.to_vec(), counts, normalized }
  }
}
