//! HTTP Basic-auth verification and role-based section access.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};

use crate::error::Error;

// ─── Roles & sections ────────────────────────────────────────────────────────

/// A part of the review dashboard. Every API route belongs to exactly one.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Section {
  Review,
  Stats,
  Maintenance,
  Visualization,
  Hostless,
  Misclassified,
  Model,
  Duplicates,
  Search,
}

impl Section {
  /// The section owning an API path such as `/api/labels/reals`. `None` for
  /// paths open to every authenticated user.
  pub fn for_path(path: &str) -> Option<Self> {
    let rest = path.strip_prefix("/api/")?;
    let first = rest.split('/').next().unwrap_or_default();
    match first {
      "labels" => Some(Section::Review),
      "stats" => Some(Section::Stats),
      "maintenance" => Some(Section::Maintenance),
      "cutouts" => Some(Section::Visualization),
      "hostless" => Some(Section::Hostless),
      "misclassified" => Some(Section::Misclassified),
      "model" => Some(Section::Model),
      "duplicates" => Some(Section::Duplicates),
      "candidates" => Some(Section::Search),
      _ => None,
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  Guest,
  Visitor,
}

impl Role {
  pub fn allows(self, section: Section) -> bool {
    match self {
      Role::Admin => true,
      Role::Guest => {
        matches!(section, Section::Review | Section::Stats | Section::Search)
      }
      Role::Visitor => matches!(
        section,
        Section::Review | Section::Stats | Section::Hostless | Section::Search
      ),
    }
  }

  /// Sections this role may open, in navigation order.
  pub fn sections(self) -> Vec<Section> {
    Section::iter().filter(|s| self.allows(*s)).collect()
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// One login, as listed under `[[users]]` in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

/// The user behind an authenticated request, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
  pub username: String,
  pub role:     Role,
}

/// Verify Basic credentials from `headers` against the configured users.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<CurrentUser, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(CurrentUser { username: user.username.clone(), role: user.role })
}

/// Check that `user` may open the section owning `path`.
pub fn authorize(user: &CurrentUser, path: &str) -> Result<(), Error> {
  match Section::for_path(path) {
    Some(section) if !user.role.allows(section) => {
      Err(Error::Forbidden { role: user.role, section })
    }
    _ => Ok(()),
  }
}
