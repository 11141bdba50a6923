//! FITS header parsing.
//!
//! A header is a sequence of 80-byte ASCII cards packed into 2880-byte
//! blocks and terminated by an `END` card. Only value cards
//! (`KEYWORD = value / comment`) are retained.

use crate::{Error, Result};

pub const BLOCK_LEN: usize = 2880;
pub const CARD_LEN: usize = 80;

/// A decoded header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Logical(bool),
  Integer(i64),
  Real(f64),
  Text(String),
  /// `KEYWORD =` with nothing after it.
  Undefined,
}

/// The value cards of one header, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
  cards:           Vec<(String, Value)>,
  /// Byte offset of the data section: header length rounded up to a whole
  /// block.
  pub data_offset: usize,
}

impl Header {
  /// Parse the header at the start of `bytes`.
  pub fn parse(bytes: &[u8]) -> Result<Self> {
    let mut cards = Vec::new();

    for (index, raw) in bytes.chunks_exact(CARD_LEN).enumerate() {
      let card = std::str::from_utf8(raw)
        .ok()
        .filter(|s| s.is_ascii())
        .ok_or(Error::NonAsciiCard { index })?;

      let keyword = card[..8].trim_end();

      if index == 0 && keyword != "SIMPLE" {
        return Err(Error::NotFits);
      }

      if keyword == "END" {
        let header_len = (index + 1) * CARD_LEN;
        let data_offset = header_len.div_ceil(BLOCK_LEN) * BLOCK_LEN;
        let header = Self { cards, data_offset };
        if header.get("SIMPLE") != Some(&Value::Logical(true)) {
          return Err(Error::NotFits);
        }
        return Ok(header);
      }

      // Commentary cards (COMMENT, HISTORY, blank) carry no value indicator.
      if &card[8..10] != "= " {
        continue;
      }

      let value = parse_value(keyword, &card[10..])?;
      cards.push((keyword.to_owned(), value));
    }

    if cards.is_empty() && bytes.len() < CARD_LEN {
      return Err(Error::NotFits);
    }
    Err(Error::MissingEnd)
  }

  /// The first value recorded for `keyword`.
  pub fn get(&self, keyword: &str) -> Option<&Value> {
    self
      .cards
      .iter()
      .find(|(k, _)| k == keyword)
      .map(|(_, v)| v)
  }

  /// A required integer keyword.
  pub fn integer(&self, keyword: &'static str) -> Result<i64> {
    match self.get(keyword) {
      Some(Value::Integer(i)) => Ok(*i),
      Some(other) => Err(invalid(keyword, other)),
      None => Err(Error::MissingKeyword(keyword)),
    }
  }

  /// An optional integer keyword.
  pub fn integer_opt(&self, keyword: &'static str) -> Result<Option<i64>> {
    match self.get(keyword) {
      None => Ok(None),
      Some(_) => self.integer(keyword).map(Some),
    }
  }

  /// An optional numeric keyword, `default` when absent.
  pub fn real_or(&self, keyword: &'static str, default: f64) -> Result<f64> {
    match self.get(keyword) {
      None => Ok(default),
      Some(Value::Integer(i)) => Ok(*i as f64),
      Some(Value::Real(r)) => Ok(*r),
      Some(other) => Err(invalid(keyword, other)),
    }
  }
}

fn invalid(keyword: &str, value: &Value) -> Error {
  Error::InvalidValue {
    keyword: keyword.to_owned(),
    value:   format!("{value:?}"),
  }
}

/// Decode the value field of a card (columns 11–80).
fn parse_value(keyword: &str, field: &str) -> Result<Value> {
  let field = field.trim_start();

  if let Some(rest) = field.strip_prefix('\'') {
    return parse_string(rest).ok_or_else(|| Error::InvalidValue {
      keyword: keyword.to_owned(),
      value:   field.to_owned(),
    });
  }

  let token = field.split('/').next().unwrap_or_default().trim();
  match token {
    "" => Ok(Value::Undefined),
    "T" => Ok(Value::Logical(true)),
    "F" => Ok(Value::Logical(false)),
    _ => {
      if let Ok(i) = token.parse::<i64>() {
        return Ok(Value::Integer(i));
      }
      token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map(Value::Real)
        .map_err(|_| Error::InvalidValue {
          keyword: keyword.to_owned(),
          value:   token.to_owned(),
        })
    }
  }
}

/// Parse a quoted string body (after the opening quote). `''` is an escaped
/// quote; trailing spaces are not significant.
fn parse_string(rest: &str) -> Option<Value> {
  let mut out = String::new();
  let mut chars = rest.chars().peekable();
  while let Some(c) = chars.next() {
    if c == '\'' {
      if chars.peek() == Some(&'\'') {
        chars.next();
        out.push('\'');
      } else {
        return Some(Value::Text(out.trim_end().to_owned()));
      }
    } else {
      out.push(c);
    }
  }
  None
}
