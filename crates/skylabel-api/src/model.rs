//! Misclassified (model): review candidates a classifier disagrees on.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/model` | Body: predictions CSV; filters in the query string |
//!
//! The CSV needs `candid` and `Predicted_Label` columns, optionally
//! `True_Label`, plus one probability column per class named after its
//! label table (`artifact`, `reals`, `highpm`, `echo`). Labels may be table
//! names or integer class indices.
//!
//! Query: `truth_check`, `binary`, `source`, `limit`, `page`, and
//! `{class}_min` / `{class}_max` probability bounds.

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use skylabel_core::{
  Error as CoreError,
  label::LabelTable,
  page::paginate,
  predictions::{ConfusionMatrix, Prediction, PredictionFilter, ProbabilityRange, parse_model_label},
  review::ReviewLog,
  store::CandidateStore,
};

use crate::{
  ApiState,
  error::ApiError,
  view::{CandidateView, Page, candidate_views},
};

// ─── Upload parsing ──────────────────────────────────────────────────────────

const CANDID_COLUMN: &str = "candid";
const PREDICTED_COLUMN: &str = "Predicted_Label";
const TRUTH_COLUMN: &str = "True_Label";

fn invalid(message: String) -> ApiError { CoreError::InvalidPredictions(message).into() }

/// Parse an uploaded predictions table.
pub fn parse_predictions(text: &str) -> Result<Vec<Prediction>, ApiError> {
  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(text.as_bytes());

  let headers = reader.headers()?.clone();
  let column = |name: &str| headers.iter().position(|h| h == name);

  let candid_col = column(CANDID_COLUMN)
    .ok_or_else(|| invalid(format!("missing {CANDID_COLUMN} column")))?;
  let predicted_col = column(PREDICTED_COLUMN)
    .ok_or_else(|| invalid(format!("missing {PREDICTED_COLUMN} column")))?;
  let truth_col = column(TRUTH_COLUMN);
  let probability_cols: Vec<(LabelTable, usize)> = headers
    .iter()
    .enumerate()
    .filter_map(|(i, h)| LabelTable::parse(h).ok().map(|t| (t, i)))
    .collect();

  let mut predictions = Vec::new();
  for (index, record) in reader.records().enumerate() {
    let record = record?;
    let line = index + 2;
    let field = |i: usize| record.get(i).unwrap_or_default();

    let candid = field(candid_col)
      .parse::<i64>()
      .map_err(|_| invalid(format!("line {line}: bad candid {:?}", field(candid_col))))?;
    let predicted = parse_model_label(field(predicted_col))?;
    let truth = truth_col
      .map(field)
      .filter(|s| !s.is_empty())
      .map(parse_model_label)
      .transpose()?;

    let mut probabilities = BTreeMap::new();
    for &(table, i) in &probability_cols {
      let raw = field(i);
      if raw.is_empty() {
        continue;
      }
      let p = raw
        .parse::<f64>()
        .map_err(|_| invalid(format!("line {line}: bad {table} probability {raw:?}")))?;
      probabilities.insert(table, p);
    }

    predictions.push(Prediction { candid, predicted, truth, probabilities });
  }

  if predictions.is_empty() {
    return Err(invalid("no prediction rows".into()));
  }
  Ok(predictions)
}

// ─── Filter parameters ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ModelParams {
  #[serde(default)]
  pub truth_check:  bool,
  #[serde(default)]
  pub binary:       bool,
  pub source:       Option<LabelTable>,
  pub limit:        Option<usize>,
  pub page:         Option<usize>,
  pub artifact_min: Option<f64>,
  pub artifact_max: Option<f64>,
  pub reals_min:    Option<f64>,
  pub reals_max:    Option<f64>,
  pub echo_min:     Option<f64>,
  pub echo_max:     Option<f64>,
  pub highpm_min:   Option<f64>,
  pub highpm_max:   Option<f64>,
}

impl ModelParams {
  pub fn filter(&self) -> PredictionFilter {
    let bounds = [
      (LabelTable::Artifact, self.artifact_min, self.artifact_max),
      (LabelTable::Reals, self.reals_min, self.reals_max),
      (LabelTable::Echo, self.echo_min, self.echo_max),
      (LabelTable::HighPm, self.highpm_min, self.highpm_max),
    ];
    let ranges = bounds
      .into_iter()
      .filter(|(_, min, max)| min.is_some() || max.is_some())
      .map(|(table, min, max)| {
        let default = ProbabilityRange::default();
        (table, ProbabilityRange {
          min: min.unwrap_or(default.min),
          max: max.unwrap_or(default.max),
        })
      })
      .collect();

    PredictionFilter {
      truth_check: self.truth_check,
      binary: self.binary,
      source: self.source,
      ranges,
      limit: self.limit.unwrap_or(PredictionFilter::DEFAULT_LIMIT),
    }
  }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ModelItem {
  pub prediction: Prediction,
  #[serde(flatten)]
  pub view:       CandidateView,
}

#[derive(Debug, Serialize)]
pub struct ModelBody {
  /// Rows in the upload.
  pub uploaded:         usize,
  /// Rows passing the filter (capped at the limit).
  pub selected:         usize,
  /// How often the model predicted each class, over the whole upload.
  pub predicted_counts: BTreeMap<LabelTable, usize>,
  /// Only in truth-check mode.
  pub confusion:        Option<ConfusionMatrix>,
  #[serde(flatten)]
  pub page:             Page<ModelItem>,
}

/// `POST /model?...`
pub async fn handler<S, L>(
  State(state): State<ApiState<S, L>>,
  Query(params): Query<ModelParams>,
  body: String,
) -> Result<Json<ModelBody>, ApiError>
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  let predictions = parse_predictions(&body)?;
  let filter = params.filter();
  let selected = filter.select(&predictions)?;

  let mut predicted_counts = BTreeMap::new();
  for p in &predictions {
    *predicted_counts.entry(p.predicted).or_insert(0) += 1;
  }

  let confusion = filter
    .truth_check
    .then(|| ConfusionMatrix::build(filter.classes(), &predictions));

  let (info, slice) = paginate(&selected, params.page.unwrap_or(1), state.settings.page_size)?;
  let candids: Vec<i64> = slice.iter().map(|p| p.candid).collect();
  let views = candidate_views(state.store(), &candids).await?;
  let items = slice
    .iter()
    .zip(views)
    .map(|(p, view)| ModelItem { prediction: (*p).clone(), view })
    .collect();

  Ok(Json(ModelBody {
    uploaded: predictions.len(),
    selected: selected.len(),
    predicted_counts,
    confusion,
    page: Page { page: info, items },
  }))
}
