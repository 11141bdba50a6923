//! Error types for the skylabel-fits codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("gzip stream is corrupt: {0}")]
  Gzip(#[from] std::io::Error),

  #[error("not a FITS file: first card is not SIMPLE = T")]
  NotFits,

  #[error("header ends before the END card")]
  MissingEnd,

  #[error("header card {index} is not ASCII")]
  NonAsciiCard { index: usize },

  #[error("missing required keyword {0}")]
  MissingKeyword(&'static str),

  #[error("invalid value for {keyword}: {value:?}")]
  InvalidValue { keyword: String, value: String },

  #[error("unsupported BITPIX {0}")]
  UnsupportedBitpix(i64),

  #[error("unsupported axes: NAXIS = {naxis}, shape {shape:?}")]
  UnsupportedAxes { naxis: i64, shape: Vec<i64> },

  #[error("data section truncated: expected {expected} bytes, found {actual}")]
  TruncatedData { expected: usize, actual: usize },

  #[error("image shapes differ: {0:?}")]
  ShapeMismatch(Vec<(usize, usize)>),

  #[error("image has no finite pixels")]
  NoFinitePixels,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
