//! Cutout decoder for skylabel.
//!
//! Turns a stored cutout blob (gzip-compressed or raw FITS) into a 2-D
//! pixel array in display orientation plus the `[vmin, vmax]` stretch a
//! viewer should render it with. Pure synchronous; no database or HTTP
//! dependencies.
//!
//! ```no_run
//! use skylabel_fits::decode_cutout;
//!
//! # let blob: Vec<u8> = Vec::new();
//! let cutout = decode_cutout(&blob).unwrap();
//! println!("{}x{} in [{}, {}]", cutout.image.width, cutout.image.height,
//!   cutout.range.vmin, cutout.range.vmax);
//! ```

pub mod error;
mod header;
mod parse;
mod serialize;
mod stats;

use std::{borrow::Cow, io::Read};

use flate2::read::GzDecoder;
use serde::Serialize;

pub use error::{Error, Result};
pub use header::{Header, Value};
pub use parse::{Image, decode_image};
pub use serialize::{encode_cutout, encode_image};
pub use stats::{ClippedStats, DisplayRange, sigma_clipped_stats};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ─── Public types ────────────────────────────────────────────────────────────

/// A decoded cutout, ready to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cutout {
  pub image: Image,
  pub stats: ClippedStats,
  pub range: DisplayRange,
}

/// The science, reference and difference cutouts of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triplet {
  pub science:    Cutout,
  pub reference:  Cutout,
  pub difference: Cutout,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Inflate `blob` if it carries the gzip magic; otherwise borrow it as is.
pub fn decompress(blob: &[u8]) -> Result<Cow<'_, [u8]>> {
  if !blob.starts_with(&GZIP_MAGIC) {
    return Ok(Cow::Borrowed(blob));
  }
  let mut out = Vec::new();
  GzDecoder::new(blob).read_to_end(&mut out)?;
  Ok(Cow::Owned(out))
}

/// Decode one stored cutout and compute its display range.
pub fn decode_cutout(blob: &[u8]) -> Result<Cutout> {
  let fits = decompress(blob)?;
  let image = decode_image(&fits)?;
  let stats = sigma_clipped_stats(image.finite_pixels())?;
  let range = DisplayRange::from_stats(&stats);
  Ok(Cutout { image, stats, range })
}

/// Decode all three cutouts of a candidate. They must share a shape.
pub fn decode_triplet(
  science: &[u8],
  reference: &[u8],
  difference: &[u8],
) -> Result<Triplet> {
  let triplet = Triplet {
    science:    decode_cutout(science)?,
    reference:  decode_cutout(reference)?,
    difference: decode_cutout(difference)?,
  };

  let shapes = [
    triplet.science.image.shape(),
    triplet.reference.image.shape(),
    triplet.difference.image.shape(),
  ];
  if shapes.iter().any(|s| *s != shapes[0]) {
    return Err(Error::ShapeMismatch(shapes.to_vec()));
  }

  Ok(triplet)
}
