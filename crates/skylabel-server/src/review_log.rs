//! The review log kept as a CSV file next to the database.
//!
//! The file has the header `candid,type,reviewer,recorded_at` and is
//! rewritten in full on every mutation. Files holding only `candid,type`
//! are read with empty reviewer and timestamp. Any other columns (older logs
//! carry `source1,source2`) are kept verbatim after the known ones; entries
//! recorded here leave them empty.

use std::{
  fs::File,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::SecondsFormat;
use csv::StringRecord;
use skylabel_core::review::{ReviewEntry, ReviewLog};
use tokio::sync::Mutex;

use crate::error::ReviewLogError;

const HEADER: [&str; 4] = ["candid", "type", "reviewer", "recorded_at"];

type Result<T, E = ReviewLogError> = std::result::Result<T, E>;

/// File-backed [`ReviewLog`].
#[derive(Debug)]
pub struct CsvReviewLog {
  path: PathBuf,
  /// Serializes read-modify-write cycles.
  lock: Mutex<()>,
}

/// One log line and the values of its unknown columns.
#[derive(Debug)]
struct Row {
  entry: ReviewEntry,
  extra: Vec<String>,
}

/// The whole file as loaded.
#[derive(Debug, Default)]
struct LogFile {
  extra_columns: Vec<String>,
  rows:          Vec<Row>,
}

impl CsvReviewLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), lock: Mutex::new(()) }
  }

  pub fn path(&self) -> &Path { &self.path }

  async fn load(&self) -> Result<LogFile> {
    let path = self.path.clone();
    tokio::task::spawn_blocking(move || read_file(&path)).await?
  }

  async fn save(&self, file: LogFile) -> Result<()> {
    let path = self.path.clone();
    tokio::task::spawn_blocking(move || write_file(&path, &file)).await?
  }
}

fn read_file(path: &Path) -> Result<LogFile> {
  let file = match File::open(path) {
    Ok(f) => f,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogFile::default()),
    Err(e) => return Err(e.into()),
  };
  let mut reader = csv::Reader::from_reader(file);
  let headers = reader.headers()?.clone();

  let extra_at: Vec<usize> = headers
    .iter()
    .enumerate()
    .filter(|(_, name)| !HEADER.contains(name))
    .map(|(i, _)| i)
    .collect();
  let extra_columns = extra_at.iter().map(|&i| headers[i].to_owned()).collect();

  let mut rows = Vec::new();
  for record in reader.records() {
    let record = record?;
    let entry: ReviewEntry = record.deserialize(Some(&headers))?;
    let extra = extra_at
      .iter()
      .map(|&i| record.get(i).unwrap_or_default().to_owned())
      .collect();
    rows.push(Row { entry, extra });
  }
  Ok(LogFile { extra_columns, rows })
}

fn record_of(row: &Row, extra_columns: usize) -> StringRecord {
  let entry = &row.entry;
  let mut record = StringRecord::new();
  record.push_field(&entry.candid.to_string());
  record.push_field(&entry.kind.to_string());
  record.push_field(entry.reviewer.as_deref().unwrap_or_default());
  record.push_field(
    &entry
      .recorded_at
      .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
      .unwrap_or_default(),
  );
  for i in 0..extra_columns {
    record.push_field(row.extra.get(i).map_or("", String::as_str));
  }
  record
}

/// Write to a sibling file, then rename over the log.
fn write_file(path: &Path, file: &LogFile) -> Result<()> {
  let tmp = path.with_extension("csv.tmp");
  {
    let mut writer = csv::Writer::from_path(&tmp)?;
    let header = HEADER
      .iter()
      .copied()
      .chain(file.extra_columns.iter().map(String::as_str));
    writer.write_record(header)?;
    for row in &file.rows {
      writer.write_record(&record_of(row, file.extra_columns.len()))?;
    }
    writer.flush()?;
  }
  std::fs::rename(&tmp, path)?;
  Ok(())
}

impl ReviewLog for CsvReviewLog {
  type Error = ReviewLogError;

  async fn entries(&self) -> Result<Vec<ReviewEntry>> {
    let _guard = self.lock.lock().await;
    let file = self.load().await?;
    Ok(file.rows.into_iter().map(|r| r.entry).collect())
  }

  async fn record(&self, entry: ReviewEntry) -> Result<bool> {
    let _guard = self.lock.lock().await;
    let mut file = self.load().await?;
    if file
      .rows
      .iter()
      .any(|r| r.entry.candid == entry.candid && r.entry.kind == entry.kind)
    {
      return Ok(false);
    }
    tracing::debug!(candid = entry.candid, kind = %entry.kind, "review log entry added");
    file.rows.push(Row { entry, extra: Vec::new() });
    self.save(file).await?;
    Ok(true)
  }

  async fn remove(&self, candid: i64) -> Result<usize> {
    let _guard = self.lock.lock().await;
    let mut file = self.load().await?;
    let before = file.rows.len();
    file.rows.retain(|r| r.entry.candid != candid);
    let removed = before - file.rows.len();
    if removed > 0 {
      self.save(file).await?;
    }
    Ok(removed)
  }
}
