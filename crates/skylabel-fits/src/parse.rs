//! Primary-HDU image decoding.

use serde::Serialize;

use crate::{Error, Result, header::Header};

/// A 2-D image in display orientation: row 0 is the top row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
  pub width:  usize,
  pub height: usize,
  /// Row-major, `width * height` values. Blank pixels are `NaN`.
  pub pixels: Vec<f64>,
}

impl Image {
  pub fn new(width: usize, height: usize, pixels: Vec<f64>) -> Self {
    debug_assert_eq!(pixels.len(), width * height);
    Self { width, height, pixels }
  }

  /// An image with every pixel set to `value`.
  pub fn filled(width: usize, height: usize, value: f64) -> Self {
    Self::new(width, height, vec![value; width * height])
  }

  pub fn shape(&self) -> (usize, usize) { (self.width, self.height) }

  /// Pixel at column `x`, row `y` (from the top).
  pub fn get(&self, x: usize, y: usize) -> Option<f64> {
    if x >= self.width || y >= self.height {
      return None;
    }
    self.pixels.get(y * self.width + x).copied()
  }

  /// Rows from top to bottom.
  pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[f64]> {
    self.pixels.chunks(self.width.max(1))
  }

  pub fn finite_pixels(&self) -> impl Iterator<Item = f64> + '_ {
    self.pixels.iter().copied().filter(|p| p.is_finite())
  }
}

const AXIS_KEYWORDS: [&str; 3] = ["NAXIS1", "NAXIS2", "NAXIS3"];

/// Decode the primary image of an uncompressed FITS file.
///
/// Samples are scaled by `BZERO + BSCALE * raw`; integer samples equal to
/// `BLANK` become `NaN`. FITS stores the bottom row first, so rows are
/// reversed on the way out.
pub fn decode_image(bytes: &[u8]) -> Result<Image> {
  let header = Header::parse(bytes)?;

  let bitpix = header.integer("BITPIX")?;
  let sample_len = match bitpix {
    8 => 1,
    16 => 2,
    32 | -32 => 4,
    64 | -64 => 8,
    other => return Err(Error::UnsupportedBitpix(other)),
  };

  let naxis = header.integer("NAXIS")?;
  let (width, height) = image_shape(&header, naxis)?;

  let expected = width
    .checked_mul(height)
    .and_then(|n| n.checked_mul(sample_len))
    .ok_or(Error::TruncatedData { expected: usize::MAX, actual: bytes.len() })?;
  let data = bytes.get(header.data_offset..).unwrap_or_default();
  if data.len() < expected {
    return Err(Error::TruncatedData { expected, actual: data.len() });
  }
  let data = &data[..expected];

  let bscale = header.real_or("BSCALE", 1.0)?;
  let bzero = header.real_or("BZERO", 0.0)?;
  let blank = if bitpix > 0 { header.integer_opt("BLANK")? } else { None };

  let physical = |raw: f64| bzero + bscale * raw;
  let integer = |raw: i64| {
    if blank == Some(raw) { f64::NAN } else { physical(raw as f64) }
  };

  let samples: Vec<f64> = match bitpix {
    8 => data.iter().map(|&b| integer(i64::from(b))).collect(),
    16 => data
      .chunks_exact(2)
      .map(|c| integer(i64::from(i16::from_be_bytes(be(c)))))
      .collect(),
    32 => data
      .chunks_exact(4)
      .map(|c| integer(i64::from(i32::from_be_bytes(be(c)))))
      .collect(),
    64 => data
      .chunks_exact(8)
      .map(|c| integer(i64::from_be_bytes(be(c))))
      .collect(),
    -32 => data
      .chunks_exact(4)
      .map(|c| physical(f64::from(f32::from_be_bytes(be(c)))))
      .collect(),
    _ => data
      .chunks_exact(8)
      .map(|c| physical(f64::from_be_bytes(be(c))))
      .collect(),
  };

  let pixels = if width == 0 {
    samples
  } else {
    samples.chunks(width).rev().flatten().copied().collect()
  };

  tracing::trace!(width, height, bitpix, "decoded FITS image");
  Ok(Image { width, height, pixels })
}

/// `(NAXIS1, NAXIS2)`. A third axis is accepted only when it has length 1.
fn image_shape(header: &Header, naxis: i64) -> Result<(usize, usize)> {
  let unsupported = |shape: Vec<i64>| Error::UnsupportedAxes { naxis, shape };

  if !(2..=3).contains(&naxis) {
    return Err(unsupported(Vec::new()));
  }

  let shape = AXIS_KEYWORDS[..naxis as usize]
    .iter()
    .map(|&k| header.integer(k))
    .collect::<Result<Vec<_>>>()?;

  if shape.iter().any(|&n| n < 0) || shape.get(2).is_some_and(|&n| n != 1) {
    return Err(unsupported(shape));
  }

  Ok((shape[0] as usize, shape[1] as usize))
}

fn be<const N: usize>(chunk: &[u8]) -> [u8; N] {
  let mut out = [0u8; N];
  out.copy_from_slice(chunk);
  out
}
