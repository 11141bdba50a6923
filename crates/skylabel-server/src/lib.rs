//! HTTP server for the skylabel review dashboard.
//!
//! Wraps the [`skylabel_api`] router with Basic auth, role-based section
//! gating and request tracing.

pub mod auth;
pub mod error;
pub mod review_log;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Extension, Json, Router,
  extract::{Request, State},
  middleware::{self, Next},
  response::Response,
  routing::get,
};
use serde::{Deserialize, Serialize};
use skylabel_api::{ApiSettings, ApiState};
use skylabel_core::{
  page::DEFAULT_PAGE_SIZE,
  review::{ReviewLog, Reviewer},
  store::CandidateStore,
};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, CurrentUser, Role, Section, UserConfig, authorize, verify_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  pub store_path:      PathBuf,
  pub review_log_path: PathBuf,
  #[serde(default = "default_backup_dir")]
  pub backup_dir:      PathBuf,
  #[serde(default = "default_page_size")]
  pub page_size:       usize,
  #[serde(default)]
  pub users:           Vec<UserConfig>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8501 }
fn default_backup_dir() -> PathBuf { PathBuf::from("backups") }
fn default_page_size() -> usize { DEFAULT_PAGE_SIZE }

impl ServerConfig {
  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      page_size:  self.page_size.max(1),
      backup_dir: self.backup_dir.clone(),
    }
  }

  pub fn auth_config(&self) -> AuthConfig {
    AuthConfig { users: self.users.clone() }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server.
pub struct AppState<S, L> {
  pub api:    ApiState<S, L>,
  pub auth:   Arc<AuthConfig>,
  pub config: Arc<ServerConfig>,
}

impl<S, L> Clone for AppState<S, L> {
  fn clone(&self) -> Self {
    Self {
      api:    self.api.clone(),
      auth:   Arc::clone(&self.auth),
      config: Arc::clone(&self.config),
    }
  }
}

impl<S, L> AppState<S, L>
where
  S: CandidateStore,
  L: ReviewLog,
{
  pub fn new(store: Arc<S>, log: Arc<L>, config: ServerConfig) -> Self {
    Self {
      api:    ApiState::new(store, log, config.api_settings()),
      auth:   Arc::new(config.auth_config()),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: `/api/*` behind auth, traced.
pub fn router<S, L>(state: AppState<S, L>) -> Router
where
  S: CandidateStore + 'static,
  L: ReviewLog + 'static,
{
  Router::new()
    .route("/api/session", get(session))
    .nest("/api", skylabel_api::api_router(state.api))
    .layer(middleware::from_fn_with_state(state.auth, require_access))
    .layer(TraceLayer::new_for_http())
}

/// Authenticate, gate by section, and hand the reviewer to handlers.
async fn require_access(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let user = verify_auth(req.headers(), &auth)?;
  if let Err(e) = authorize(&user, req.uri().path()) {
    tracing::warn!(user = %user.username, path = %req.uri().path(), "section denied");
    return Err(e);
  }

  req.extensions_mut().insert(Reviewer(user.username.clone()));
  req.extensions_mut().insert(user);
  Ok(next.run(req).await)
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
  pub username: String,
  pub role:     Role,
  pub sections: Vec<Section>,
}

/// `GET /api/session`
async fn session(Extension(user): Extension<CurrentUser>) -> Json<SessionBody> {
  Json(SessionBody {
    sections: user.role.sections(),
    username: user.username,
    role:     user.role,
  })
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use serde_json::Value;
  use skylabel_core::{
    candidate::{Candidate, CutoutBlobs, Field},
    label::LabelTable,
    review::MemoryReviewLog,
  };
  use skylabel_fits::{Image, encode_cutout};
  use skylabel_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  const PASSWORD: &str = "secret";

  async fn make_state(backup_dir: PathBuf) -> AppState<SqliteStore, MemoryReviewLog> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(PASSWORD.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let user = |name: &str, role| UserConfig {
      username:      name.to_string(),
      password_hash: hash.clone(),
      role,
    };

    let config = ServerConfig {
      host:            "127.0.0.1".to_string(),
      port:            8501,
      store_path:      PathBuf::from(":memory:"),
      review_log_path: PathBuf::from("review.csv"),
      backup_dir,
      page_size:       2,
      users:           vec![
        user("admin", Role::Admin),
        user("guest", Role::Guest),
        user("visitor", Role::Visitor),
      ],
    };
    AppState::new(Arc::new(store), Arc::new(MemoryReviewLog::new()), config)
  }

  async fn seed(state: &AppState<SqliteStore, MemoryReviewLog>, candid: i64, table: Option<LabelTable>) {
    let store = state.api.store();
    store
      .add_candidate(Candidate { candid, ra: 150.0, dec: -30.0, ..Default::default() })
      .await
      .unwrap();
    let blob = encode_cutout(&Image::filled(4, 4, 2.0)).unwrap();
    store
      .add_cutout(CutoutBlobs {
        candid,
        science:    blob.clone(),
        reference:  blob.clone(),
        difference: blob,
      })
      .await
      .unwrap();
    if let Some(table) = table {
      store.insert_label(table, candid).await.unwrap();
    }
  }

  /// A labelled candidate whose stored blobs are not gzip FITS.
  async fn seed_garbage(state: &AppState<SqliteStore, MemoryReviewLog>, candid: i64, table: LabelTable) {
    let store = state.api.store();
    store
      .add_candidate(Candidate { candid, ra: 150.0, dec: -30.0, ..Default::default() })
      .await
      .unwrap();
    store
      .add_cutout(CutoutBlobs {
        candid,
        science:    b"garbage".to_vec(),
        reference:  b"garbage".to_vec(),
        difference: b"garbage".to_vec(),
      })
      .await
      .unwrap();
    store.insert_label(table, candid).await.unwrap();
  }

  /// Passes every hostless cut for epoch 7 in field 1.
  fn hostless(candid: i64, rbscore: f64) -> Candidate {
    Candidate {
      candid,
      ra: 10.0,
      dec: 20.0,
      field: 1,
      epochid: 7,
      rbscore,
      nmatches: 3,
      scorr_peak: 12.0,
      ispos: true,
      mjd: 60_100.0,
      firstdet: 60_000.0,
      wdist: [12.0; 3],
      w1mag: [15.0; 3],
      distnearbrstar: 20.0,
    }
  }

  fn auth_header(user: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{PASSWORD}")))
  }

  async fn send(
    state:  &AppState<SqliteStore, MemoryReviewLog>,
    method: &str,
    uri:    &str,
    user:   Option<&str>,
    body:   &str,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
      builder = builder.header(header::AUTHORIZATION, auth_header(user));
    }
    let req  = builder.body(Body::from(body.to_string())).unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  // ── Auth & sections ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unauthenticated_requests_return_401() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    let req = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn session_lists_role_sections() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    let (status, body) = send(&state, "GET", "/api/session", Some("visitor"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "visitor");
    assert_eq!(
      body["sections"],
      serde_json::json!(["review", "stats", "hostless", "search"])
    );
  }

  #[tokio::test]
  async fn roles_are_gated_by_section() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;

    let (status, _) = send(&state, "GET", "/api/stats", Some("guest"), "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, "GET", "/api/duplicates", Some("guest"), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, "POST", "/api/maintenance/dedupe", Some("visitor"), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, "POST", "/api/maintenance/dedupe", Some("admin"), "").await;
    assert_eq!(status, StatusCode::OK);
  }

  // ── Review flow ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn label_page_decodes_cutouts() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    for candid in [1, 2, 3] {
      seed(&state, candid, Some(LabelTable::Reals)).await;
    }

    let (status, body) = send(&state, "GET", "/api/labels/reals?page=2", Some("guest"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["pages"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["candid"], 3);
    assert_eq!(items[0]["cutouts"]["science"]["range"]["vmin"], 2.0);

    let (status, body) = send(&state, "GET", "/api/labels/reals/count", Some("guest"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (status, _) = send(&state, "GET", "/api/labels/bogus", Some("guest"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn flag_then_confirm_clears_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 42, Some(LabelTable::Artifact)).await;

    let (status, body) =
      send(&state, "POST", "/api/labels/artifact/42/incorrect", Some("guest"), "").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["added"], true);

    let (_, body) = send(&state, "GET", "/api/misclassified/log", Some("admin"), "").await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["flags"][0]["reviewer"], "guest");

    let classify = r#"{"to": "reals"}"#;
    let (status, _) =
      send(&state, "POST", "/api/candidates/42/classify", Some("admin"), classify).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, "GET", "/api/candidates/42", Some("guest"), "").await;
    assert_eq!(body["classification"]["tables"], "reals");

    // Moving keeps the flag; re-confirming the new label clears it.
    let (_, body) = send(&state, "GET", "/api/misclassified/log", Some("admin"), "").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    send(&state, "POST", "/api/candidates/42/classify", Some("admin"), classify).await;
    let (_, body) = send(&state, "GET", "/api/misclassified/log", Some("admin"), "").await;
    assert!(body["items"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn undecodable_cutouts_fail_only_their_item() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 1, Some(LabelTable::Reals)).await;
    seed_garbage(&state, 2, LabelTable::Reals).await;
    // Members without stored cutouts are not paged.
    let store = state.api.store();
    store.add_candidate(Candidate { candid: 3, ..Default::default() }).await.unwrap();
    store.insert_label(LabelTable::Reals, 3).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/labels/reals", Some("guest"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["total"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["candid"], 1);
    assert!(items[0]["error"].is_null());
    assert_eq!(items[0]["cutouts"]["difference"]["range"]["vmax"], 2.0);
    assert_eq!(items[1]["candid"], 2);
    assert!(items[1]["error"].is_string());
    assert!(items[1]["cutouts"].is_null());
  }

  #[tokio::test]
  async fn gallery_keeps_request_order_and_pages() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 1, None).await;
    seed_garbage(&state, 2, LabelTable::Echo).await;

    let request = r#"{"candids": [2, 1, 2, 3]}"#;
    let (status, body) = send(&state, "POST", "/api/cutouts", Some("admin"), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["total"], 3);
    assert_eq!(body["items"][0]["candid"], 2);
    assert!(body["items"][0]["error"].is_string());
    assert_eq!(body["items"][1]["candid"], 1);
    assert!(body["items"][1]["cutouts"].is_object());

    let request = r#"{"candids": [2, 1, 3], "page": 2}"#;
    let (status, body) = send(&state, "POST", "/api/cutouts", Some("admin"), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["candid"], 3);
    assert_eq!(body["items"][0]["error"], "no cutouts stored");

    let (status, _) =
      send(&state, "POST", "/api/cutouts", Some("admin"), r#"{"candids": []}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn stats_count_distinct_members_and_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 1, Some(LabelTable::Reals)).await;
    seed(&state, 2, Some(LabelTable::Reals)).await;
    seed(&state, 3, Some(LabelTable::Echo)).await;
    state.api.store().insert_label(LabelTable::Reals, 1).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/stats", Some("guest"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);

    let reals = &body["tables"][0];
    assert_eq!(reals["table"], "reals");
    assert_eq!(reals["count"], 2);
    assert_eq!(reals["rows"], 3);
    assert_eq!(reals["duplicates"], 1);
    let share = reals["percentage"].as_f64().unwrap();
    assert!((share - 200.0 / 3.0).abs() < 1e-9);

    let echo = &body["tables"][2];
    assert_eq!(echo["table"], "echo");
    assert_eq!(echo["count"], 1);
    assert_eq!(body["tables"][1]["count"], 0);
  }

  #[tokio::test]
  async fn hostless_scan_offers_only_unclassified() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    let store = state.api.store();
    store.add_field(Field { field: 1, gallat: 45.0 }).await.unwrap();
    store.add_candidate(hostless(10, 0.9)).await.unwrap();
    store.add_candidate(hostless(11, 0.7)).await.unwrap();
    store.insert_label(LabelTable::Reals, 11).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/hostless?epoch=7", Some("visitor"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 2);
    assert_eq!(body["page"]["total"], 1);
    assert_eq!(body["items"][0]["candid"], 10);

    let (status, _) =
      send(&state, "GET", "/api/hostless?epoch=7&gallat_min=50", Some("visitor"), "").await;
    assert_eq!(status, StatusCode::OK);

    let to_echo = r#"{"to": "echo"}"#;
    let (status, body) =
      send(&state, "POST", "/api/hostless/11/classify", Some("visitor"), to_echo).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("reals"));
    assert_eq!(store.memberships(11).await.unwrap(), vec![LabelTable::Reals]);

    let (status, body) =
      send(&state, "POST", "/api/hostless/10/classify", Some("visitor"), to_echo).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "inserted");

    let (_, body) = send(&state, "GET", "/api/hostless?epoch=7", Some("visitor"), "").await;
    assert_eq!(body["matched"], 2);
    assert!(body["items"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn delete_clears_the_review_log() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 5, Some(LabelTable::Echo)).await;
    send(&state, "POST", "/api/labels/echo/5/incorrect", Some("guest"), "").await;

    let (status, body) = send(&state, "DELETE", "/api/candidates/5", Some("admin"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["table"], "echo");
    assert_eq!(body["removed"], 1);

    let (_, body) = send(&state, "GET", "/api/misclassified/log", Some("admin"), "").await;
    assert!(body["items"].as_array().unwrap().is_empty());
    let (_, body) = send(&state, "GET", "/api/candidates/5", Some("admin"), "").await;
    assert_eq!(body["classification"]["state"], "unclassified");

    let (status, _) = send(&state, "DELETE", "/api/candidates/5", Some("admin"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn duplicate_is_discarded_from_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 42, Some(LabelTable::Artifact)).await;
    state.api.store().insert_label(LabelTable::Reals, 42).await.unwrap();
    send(&state, "POST", "/api/labels/artifact/42/incorrect", Some("guest"), "").await;

    let (status, body) = send(&state, "DELETE", "/api/duplicates/42", Some("admin"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert_eq!(body["tables"], serde_json::json!(["reals", "artifact"]));
    assert!(state.api.store().memberships(42).await.unwrap().is_empty());

    let (_, body) = send(&state, "GET", "/api/misclassified/log", Some("admin"), "").await;
    assert!(body["items"].as_array().unwrap().is_empty());
    let (_, body) = send(&state, "GET", "/api/duplicates", Some("admin"), "").await;
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&state, "DELETE", "/api/duplicates/42", Some("admin"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_candidate_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    let (status, body) = send(&state, "GET", "/api/candidates/999", Some("guest"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn duplicates_are_listed_and_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 42, Some(LabelTable::Artifact)).await;
    state.api.store().insert_label(LabelTable::Reals, 42).await.unwrap();

    let (status, body) = send(&state, "GET", "/api/duplicates", Some("admin"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["candid"], 42);

    let (status, _) = send(&state, "DELETE", "/api/candidates/42", Some("admin"), "").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
      &state,
      "POST",
      "/api/duplicates/42/resolve",
      Some("admin"),
      r#"{"keep": "reals"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["table"], "reals");

    let (_, body) = send(&state, "GET", "/api/duplicates", Some("admin"), "").await;
    assert!(body["items"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn manual_list_rejects_malformed_input() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 5, Some(LabelTable::Echo)).await;

    let (status, _) = send(&state, "POST", "/api/misclassified", Some("admin"), "5, 6").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&state, "POST", "/api/misclassified", Some("admin"), "[5]").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["classification"]["tables"], "echo");
  }

  #[tokio::test]
  async fn backup_writes_one_file_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().join("backups")).await;
    seed(&state, 9, Some(LabelTable::HighPm)).await;

    let (status, body) = send(&state, "POST", "/api/maintenance/backup", Some("admin"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);

    let text = std::fs::read_to_string(dir.path().join("backups/highpm_backup.csv")).unwrap();
    assert_eq!(text, "highpmid,candid\n1,9\n");
  }

  #[tokio::test]
  async fn model_upload_reports_confusion() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path().to_path_buf()).await;
    seed(&state, 101, Some(LabelTable::Artifact)).await;

    let csv = "candid,True_Label,Predicted_Label,artifact,reals\n\
               101,artifact,reals,0.2,0.8\n\
               102,reals,reals,0.1,0.9\n";
    let (status, body) =
      send(&state, "POST", "/api/model?truth_check=true&binary=true", Some("admin"), csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"], 1);
    assert_eq!(body["confusion"]["counts"], serde_json::json!([[0, 1], [0, 1]]));
    assert_eq!(body["items"][0]["candid"], 101);
  }
}
