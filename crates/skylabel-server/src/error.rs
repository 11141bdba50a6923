//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{Role, Section};

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("role {role} may not access {section}")]
  Forbidden { role: Role, section: Section },
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"skylabel\""),
        );
        res
      }
      Error::Forbidden { .. } => {
        (StatusCode::FORBIDDEN, Json(json!({ "error": self.to_string() })))
          .into_response()
      }
    }
  }
}

/// Failures of the file-backed review log.
#[derive(Debug, Error)]
pub enum ReviewLogError {
  #[error("review log io: {0}")]
  Io(#[from] std::io::Error),
  #[error("review log csv: {0}")]
  Csv(#[from] csv::Error),
  #[error("review log task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}
