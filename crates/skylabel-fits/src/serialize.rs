//! FITS encoding, for ingestion tooling and fixtures.

use std::io::Write;

use flate2::{Compression, write::GzEncoder};

use crate::{
  Result,
  header::{BLOCK_LEN, CARD_LEN},
  parse::Image,
};

/// One fixed-format value card: keyword in columns 1–8, value
/// right-justified to column 30.
pub(crate) fn header_card(keyword: &str, value: &str) -> String {
  format!("{:<80}", format!("{keyword:<8}= {value:>20}"))
}

/// Assemble a single-HDU file from value cards and raw big-endian data,
/// padding both sections to whole blocks.
pub(crate) fn fits_bytes(cards: &[String], data: &[u8]) -> Vec<u8> {
  let mut out: Vec<u8> = cards.iter().flat_map(|c| c.bytes()).collect();
  out.extend(format!("{:<CARD_LEN$}", "END").bytes());
  out.resize(out.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, b' ');

  out.extend_from_slice(data);
  out.resize(out.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
  out
}

/// Encode `image` as an uncompressed FITS file with `BITPIX = -32`.
///
/// Rows are written bottom first, so [`crate::decode_image`] gives back the
/// same orientation.
pub fn encode_image(image: &Image) -> Vec<u8> {
  let cards = [
    header_card("SIMPLE", "T"),
    header_card("BITPIX", "-32"),
    header_card("NAXIS", "2"),
    header_card("NAXIS1", &image.width.to_string()),
    header_card("NAXIS2", &image.height.to_string()),
  ];

  let data: Vec<u8> = image
    .rows()
    .rev()
    .flatten()
    .flat_map(|&p| (p as f32).to_be_bytes())
    .collect();

  fits_bytes(&cards, &data)
}

/// [`encode_image`], gzip-compressed: the form cutouts are stored in.
pub fn encode_cutout(image: &Image) -> Result<Vec<u8>> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(&encode_image(image))?;
  Ok(encoder.finish()?)
}
