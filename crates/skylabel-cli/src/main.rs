//! `skylabel`: admin command line for the skylabel review server.
//!
//! # Usage
//!
//! ```text
//! skylabel --url http://localhost:8501 --user admin --password secret stats
//! skylabel --config ~/.config/skylabel/config.toml reclassify 42 reals
//! ```

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, HostlessQuery};
use serde::Deserialize;
use skylabel_core::{
  label::{Classification, LabelTable},
  reclassify::Reclassification,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "skylabel", about = "Admin CLI for the skylabel review server")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the skylabel server (default: http://localhost:8501).
  #[arg(long, env = "SKYLABEL_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "SKYLABEL_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "SKYLABEL_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Per-table counts, shares and within-table duplicates.
  Stats,
  /// Candidates filed under more than one label table.
  Duplicates {
    #[arg(long, default_value_t = 1)]
    page: usize,
  },
  /// Keep one label for a duplicated candidate.
  Resolve { candid: i64, keep: LabelTable },
  /// Delete within-table duplicate rows in every label table.
  Dedupe,
  /// Write every label table to `{table}_backup.csv` on the server.
  Backup,
  /// Show where a candidate is filed.
  Locate { candid: i64 },
  /// File a candidate under a label table.
  Reclassify { candid: i64, table: LabelTable },
  /// Remove a candidate from its label table and the review log.
  Delete {
    candid:     i64,
    /// Remove it from every label table, for duplicated candidates.
    #[arg(long)]
    everywhere: bool,
  },
  /// Unclassified candidates passing the hostless cuts.
  Hostless {
    #[arg(long)]
    epoch:      i64,
    #[arg(long, default_value_t = 0.0)]
    gallat_min: f64,
    #[arg(long, default_value_t = 90.0)]
    gallat_max: f64,
    #[arg(long, default_value_t = 1000)]
    limit:      usize,
    #[arg(long, default_value_t = 1)]
    page:       usize,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8501".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  tracing::debug!(command = ?args.command, "running");
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Stats => {
      let stats = client.stats().await?;
      println!("{:<10} {:>8} {:>8} {:>7} {:>6}", "table", "count", "rows", "share", "dups");
      for t in &stats.tables {
        println!(
          "{:<10} {:>8} {:>8} {:>6.1}% {:>6}",
          t.table, t.count, t.rows, t.percentage, t.duplicates
        );
      }
      println!("{:<10} {:>8}", "total", stats.total);
    }
    Command::Duplicates { page } => {
      let dups = client.duplicates(page).await?;
      for item in &dups.items {
        println!("{}\t{}", item.candid, join_tables(item.tables.iter().copied()));
      }
      println!(
        "page {}/{} ({} duplicated candidates)",
        dups.page.page, dups.page.pages, dups.page.total
      );
    }
    Command::Resolve { candid, keep } => {
      let row = client.resolve(candid, keep).await?;
      println!("{candid} kept in {} (id {})", row.table, row.label_id);
    }
    Command::Dedupe => {
      for entry in client.dedupe().await? {
        println!("{:<10} {} rows removed", entry.table, entry.removed);
      }
    }
    Command::Backup => {
      for file in client.backup().await? {
        println!("{:<10} {:>8} rows → {}", file.table, file.rows, file.path.display());
      }
    }
    Command::Locate { candid } => {
      let info = client.candidate(candid).await?;
      println!("{}: {}", info.candid, describe(&info.classification));
      if let Some(c) = info.coordinates {
        println!("ra {:.6} dec {:.6}", c.ra, c.dec);
      }
      if let Some(link) = info.wiseview {
        println!("{link}");
      }
      if let Some(error) = info.error {
        println!("cutouts: {error}");
      }
    }
    Command::Reclassify { candid, table } => match client.classify(candid, table).await? {
      Reclassification::Inserted { row } => {
        println!("{candid} filed under {} (id {})", row.table, row.label_id);
      }
      Reclassification::Moved { from, row } => {
        println!("{candid} moved {from} → {} (id {})", row.table, row.label_id);
      }
      Reclassification::Confirmed { table } => {
        println!("{candid} confirmed as {table}");
      }
    },
    Command::Delete { candid, everywhere: false } => {
      let deleted = client.delete(candid).await?;
      println!("{} removed from {} ({} rows)", deleted.candid, deleted.table, deleted.removed);
    }
    Command::Delete { candid, everywhere: true } => {
      let discarded = client.discard(candid).await?;
      println!(
        "{} removed from {} ({} rows)",
        discarded.candid,
        join_tables(discarded.tables.iter().copied()),
        discarded.removed
      );
    }
    Command::Hostless { epoch, gallat_min, gallat_max, limit, page } => {
      let query = HostlessQuery { epoch, gallat_min, gallat_max, limit, page };
      let scan = client.hostless(&query).await?;
      for item in &scan.items {
        match item.coordinates {
          Some(c) => println!("{}\t{:.6}\t{:.6}", item.candid, c.ra, c.dec),
          None => println!("{}", item.candid),
        }
      }
      println!(
        "page {}/{}: {} unclassified of {} matched",
        scan.page.page, scan.page.pages, scan.page.total, scan.matched
      );
    }
  }
  Ok(())
}

fn join_tables(tables: impl Iterator<Item = LabelTable>) -> String {
  tables.map(|t| t.to_string()).collect::<Vec<_>>().join(",")
}

fn describe(classification: &Classification) -> String {
  match classification {
    Classification::Unclassified => "unclassified".to_string(),
    Classification::ClassifiedAs(table) => table.to_string(),
    Classification::DuplicateIn(tables) => {
      format!("duplicated in {}", join_tables(tables.iter().copied()))
    }
  }
}
