//! Sigma-clipped statistics and the display range derived from them.

use serde::Serialize;

use crate::{Error, Result};

/// Rejection threshold, in standard deviations from the median.
pub const CLIP_SIGMA: f64 = 3.0;
/// Upper bound on clipping passes.
pub const MAX_ITERS: usize = 5;

/// Statistics of the pixels surviving the clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClippedStats {
  pub mean:   f64,
  pub median: f64,
  /// Population standard deviation.
  pub std:    f64,
  /// Pixels left after clipping.
  pub kept:   usize,
}

/// Iteratively reject values further than [`CLIP_SIGMA`] standard
/// deviations from the median, then summarize what is left.
///
/// Non-finite values are ignored. Each pass recomputes the median and
/// standard deviation of the surviving values; clipping stops after a pass
/// that rejects nothing or after [`MAX_ITERS`] passes.
pub fn sigma_clipped_stats(values: impl IntoIterator<Item = f64>) -> Result<ClippedStats> {
  let mut data: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
  if data.is_empty() {
    return Err(Error::NoFinitePixels);
  }

  for _ in 0..MAX_ITERS {
    let before = data.len();
    let center = median(&mut data);
    let spread = std_dev(&data);
    let (lo, hi) = (center - CLIP_SIGMA * spread, center + CLIP_SIGMA * spread);
    data.retain(|&v| v >= lo && v <= hi);
    if data.len() == before {
      break;
    }
  }

  // The median always survives its own clip, so `data` is non-empty here.
  Ok(ClippedStats {
    mean:   mean(&data),
    median: median(&mut data),
    std:    std_dev(&data),
    kept:   data.len(),
  })
}

fn mean(data: &[f64]) -> f64 { data.iter().sum::<f64>() / data.len() as f64 }

fn std_dev(data: &[f64]) -> f64 {
  let m = mean(data);
  let var = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
  var.sqrt()
}

/// Median; sorts `data` in place.
fn median(data: &mut [f64]) -> f64 {
  data.sort_unstable_by(f64::total_cmp);
  let n = data.len();
  if n % 2 == 1 {
    data[n / 2]
  } else {
    (data[n / 2 - 1] + data[n / 2]) / 2.0
  }
}

// ─── Display range ───────────────────────────────────────────────────────────

/// Linear stretch limits for rendering a cutout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayRange {
  pub vmin: f64,
  pub vmax: f64,
}

impl DisplayRange {
  pub const LOW_SIGMA: f64 = 1.0;
  pub const HIGH_SIGMA: f64 = 5.0;

  /// `[median - 1σ, median + 5σ]`.
  pub fn from_stats(stats: &ClippedStats) -> Self {
    Self {
      vmin: stats.median - Self::LOW_SIGMA * stats.std,
      vmax: stats.median + Self::HIGH_SIGMA * stats.std,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn constant_values_have_zero_spread() {
    let stats = sigma_clipped_stats(vec![4.5; 25]).unwrap();
    assert_eq!(stats.median, 4.5);
    assert_eq!(stats.std, 0.0);
    assert_eq!(stats.kept, 25);

    let range = DisplayRange::from_stats(&stats);
    assert_eq!(range.vmin, 4.5);
    assert_eq!(range.vmax, 4.5);
  }

  #[test]
  fn outlier_is_clipped() {
    let mut values: Vec<f64> = (0..100).map(|i| (i % 5) as f64).collect();
    values.push(1.0e6);

    let stats = sigma_clipped_stats(values).unwrap();
    assert_eq!(stats.kept, 100);
    assert_eq!(stats.median, 2.0);
    assert!((stats.mean - 2.0).abs() < 1e-12);
    assert!((stats.std - 2f64.sqrt()).abs() < 1e-12);
  }

  #[test]
  fn non_finite_values_are_ignored() {
    let stats = sigma_clipped_stats([1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
    assert_eq!(stats.kept, 2);
    assert_eq!(stats.median, 2.0);

    assert!(matches!(
      sigma_clipped_stats([f64::NAN, f64::NEG_INFINITY]),
      Err(Error::NoFinitePixels)
    ));
  }

  #[test]
  fn display_range_is_asymmetric() {
    let stats = ClippedStats { mean: 10.0, median: 10.0, std: 2.0, kept: 1 };
    let range = DisplayRange::from_stats(&stats);
    assert_eq!((range.vmin, range.vmax), (8.0, 20.0));
  }
}
