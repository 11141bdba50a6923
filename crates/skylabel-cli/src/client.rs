//! Async HTTP client wrapping the skylabel JSON API.

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use skylabel_core::{
  candidate::Coordinates,
  label::{Classification, LabelRow, LabelTable},
  reclassify::Reclassification,
};

/// Connection settings for the skylabel API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

// ─── Response bodies ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TableStats {
  pub table:      LabelTable,
  pub count:      u64,
  pub rows:       u64,
  pub percentage: f64,
  pub duplicates: u64,
}

#[derive(Debug, Deserialize)]
pub struct Stats {
  pub tables: Vec<TableStats>,
  pub total:  u64,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
  pub page:  usize,
  pub pages: usize,
  pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateItem {
  pub candid: i64,
  pub tables: BTreeSet<LabelTable>,
}

#[derive(Debug, Deserialize)]
pub struct DuplicatePage {
  pub page:  PageInfo,
  pub items: Vec<DuplicateItem>,
}

#[derive(Debug, Deserialize)]
pub struct BackupFile {
  pub table: LabelTable,
  pub path:  PathBuf,
  pub rows:  usize,
}

#[derive(Debug, Deserialize)]
pub struct DedupeEntry {
  pub table:   LabelTable,
  pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct CandidateInfo {
  pub candid:         i64,
  pub classification: Classification,
  pub coordinates:    Option<Coordinates>,
  pub wiseview:       Option<String>,
  pub error:          Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Deleted {
  pub candid:  i64,
  pub table:   LabelTable,
  pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct Discarded {
  pub candid:  i64,
  pub tables:  Vec<LabelTable>,
  pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct HostlessItem {
  pub candid:      i64,
  pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Deserialize)]
pub struct HostlessPage {
  pub matched: usize,
  pub page:    PageInfo,
  pub items:   Vec<HostlessItem>,
}

/// Query of `GET /api/hostless`.
#[derive(Debug, Serialize)]
pub struct HostlessQuery {
  pub epoch:      i64,
  pub gallat_min: f64,
  pub gallat_max: f64,
  pub limit:      usize,
  pub page:       usize,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async HTTP client for the skylabel JSON REST API.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Send `req` and decode a JSON body, surfacing the server's
  /// `{"error": ...}` message on failure.
  async fn call<T: DeserializeOwned>(&self, what: &str, req: RequestBuilder) -> Result<T> {
    let resp: Response = self
      .auth(req)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;

    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
        .unwrap_or_default();
      return Err(anyhow!("{what} → {status}: {message}"));
    }
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  // ── Stats & maintenance ───────────────────────────────────────────────────

  /// `GET /api/stats`
  pub async fn stats(&self) -> Result<Stats> {
    self.call("GET /stats", self.client.get(self.url("/stats"))).await
  }

  /// `POST /api/maintenance/backup`
  pub async fn backup(&self) -> Result<Vec<BackupFile>> {
    self
      .call("POST /maintenance/backup", self.client.post(self.url("/maintenance/backup")))
      .await
  }

  /// `POST /api/maintenance/dedupe`
  pub async fn dedupe(&self) -> Result<Vec<DedupeEntry>> {
    self
      .call("POST /maintenance/dedupe", self.client.post(self.url("/maintenance/dedupe")))
      .await
  }

  // ── Duplicates ────────────────────────────────────────────────────────────

  /// `GET /api/duplicates?page=N`
  pub async fn duplicates(&self, page: usize) -> Result<DuplicatePage> {
    let req = self.client.get(self.url("/duplicates")).query(&[("page", page)]);
    self.call("GET /duplicates", req).await
  }

  /// `POST /api/duplicates/{candid}/resolve`
  pub async fn resolve(&self, candid: i64, keep: LabelTable) -> Result<LabelRow> {
    let req = self
      .client
      .post(self.url(&format!("/duplicates/{candid}/resolve")))
      .json(&serde_json::json!({ "keep": keep }));
    self.call("POST /duplicates/{candid}/resolve", req).await
  }

  /// `DELETE /api/duplicates/{candid}`
  pub async fn discard(&self, candid: i64) -> Result<Discarded> {
    let req = self.client.delete(self.url(&format!("/duplicates/{candid}")));
    self.call("DELETE /duplicates/{candid}", req).await
  }

  // ── Candidates ────────────────────────────────────────────────────────────

  /// `GET /api/candidates/{candid}`
  pub async fn candidate(&self, candid: i64) -> Result<CandidateInfo> {
    let req = self.client.get(self.url(&format!("/candidates/{candid}")));
    self.call("GET /candidates/{candid}", req).await
  }

  /// `POST /api/candidates/{candid}/classify`
  pub async fn classify(&self, candid: i64, to: LabelTable) -> Result<Reclassification> {
    let req = self
      .client
      .post(self.url(&format!("/candidates/{candid}/classify")))
      .json(&serde_json::json!({ "to": to }));
    self.call("POST /candidates/{candid}/classify", req).await
  }

  /// `DELETE /api/candidates/{candid}`
  pub async fn delete(&self, candid: i64) -> Result<Deleted> {
    let req = self.client.delete(self.url(&format!("/candidates/{candid}")));
    self.call("DELETE /candidates/{candid}", req).await
  }

  // ── Hostless ──────────────────────────────────────────────────────────────

  /// `GET /api/hostless?...`
  pub async fn hostless(&self, query: &HostlessQuery) -> Result<HostlessPage> {
    let req = self.client.get(self.url("/hostless")).query(query);
    self.call("GET /hostless", req).await
  }
}
