//! [`SqliteStore`]: the SQLite implementation of [`CandidateStore`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use rusqlite::{Connection, OptionalExtension as _};

use skylabel_core::{
  candidate::{Candidate, Coordinates, CutoutBlobs, Field, HostlessFilter},
  label::{LabelCount, LabelRow, LabelTable},
  store::CandidateStore,
};

use crate::{
  Error, Result,
  encode::{
    CUTOUT_COLUMNS, INSERT_CANDIDATE, RawCandidate, cutout_blobs, label_row,
    select_label_rows,
  },
  schema::SCHEMA,
};

/// Candids bound per `IN (...)` query, well under SQLite's variable limit.
const IN_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A candidate store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run inside a `call` closure, usually on a transaction (which derefs
// to `Connection`).

fn candidate_exists(conn: &Connection, candid: i64) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM candidates WHERE candid = ?1)",
    [candid],
    |r| r.get(0),
  )
}

fn contains(conn: &Connection, table: LabelTable, candid: i64) -> rusqlite::Result<bool> {
  let sql = format!(
    "SELECT EXISTS(SELECT 1 FROM {} WHERE candid = ?1)",
    table.table_name()
  );
  conn.query_row(&sql, [candid], |r| r.get(0))
}

fn first_row(
  conn: &Connection,
  table: LabelTable,
  candid: i64,
) -> rusqlite::Result<Option<LabelRow>> {
  let sql = format!(
    "SELECT {id}, candid FROM {table} WHERE candid = ?1 ORDER BY {id} LIMIT 1",
    id = table.id_column(),
    table = table.table_name(),
  );
  conn
    .query_row(&sql, [candid], |r| label_row(table, r))
    .optional()
}

fn insert_into(conn: &Connection, table: LabelTable, candid: i64) -> rusqlite::Result<LabelRow> {
  let sql = format!("INSERT INTO {} (candid) VALUES (?1)", table.table_name());
  conn.execute(&sql, [candid])?;
  Ok(LabelRow { table, label_id: conn.last_insert_rowid(), candid })
}

fn delete_from(conn: &Connection, table: LabelTable, candid: i64) -> rusqlite::Result<usize> {
  let sql = format!("DELETE FROM {} WHERE candid = ?1", table.table_name());
  conn.execute(&sql, [candid])
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── CandidateStore impl ─────────────────────────────────────────────────────

impl CandidateStore for SqliteStore {
  type Error = Error;

  // ── Cutouts & candidates ──────────────────────────────────────────────────

  async fn cutouts<'a>(
    &'a self,
    candids: &'a [i64],
    limit: Option<usize>,
  ) -> Result<Vec<CutoutBlobs>> {
    let mut seen = HashSet::new();
    let wanted: Vec<i64> = candids.iter().copied().filter(|c| seen.insert(*c)).collect();
    let lookup = wanted.clone();

    let mut found: HashMap<i64, CutoutBlobs> = self
      .conn
      .call(move |conn| {
        let mut found = HashMap::new();
        for chunk in lookup.chunks(IN_CHUNK) {
          let sql = format!(
            "SELECT {CUTOUT_COLUMNS}
             FROM cutouts c
             INNER JOIN (SELECT DISTINCT candid FROM candidates) s
               ON c.candid = s.candid
             WHERE c.candid IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk), cutout_blobs)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          found.extend(rows.into_iter().map(|b| (b.candid, b)));
        }
        Ok(found)
      })
      .await?;

    Ok(
      wanted
        .iter()
        .filter_map(|c| found.remove(c))
        .take(limit.unwrap_or(usize::MAX))
        .collect(),
    )
  }

  async fn label_cutouts(&self, table: LabelTable) -> Result<Vec<CutoutBlobs>> {
    let blobs = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {CUTOUT_COLUMNS}
           FROM cutouts c
           WHERE c.candid IN (SELECT DISTINCT candid FROM {})
           ORDER BY c.candid",
          table.table_name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], cutout_blobs)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(blobs)
  }

  async fn coordinates(&self, candid: i64) -> Result<Option<Coordinates>> {
    let coords = self
      .conn
      .call(move |conn| {
        let coords = conn
          .query_row(
            "SELECT ra, dec FROM candidates WHERE candid = ?1",
            [candid],
            |r| Ok(Coordinates { ra: r.get(0)?, dec: r.get(1)? }),
          )
          .optional()?;
        Ok(coords)
      })
      .await?;
    Ok(coords)
  }

  async fn hostless_candids<'a>(&'a self, filter: &'a HostlessFilter) -> Result<Vec<i64>> {
    filter.validate()?;
    let limit = i64::try_from(filter.limit).map_err(|_| Error::LimitOverflow(filter.limit))?;
    let filter = *filter;

    let candids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.candid
           FROM candidates c
           INNER JOIN fields f ON f.field = c.field
           WHERE ABS(f.gallat) >= ?1 AND ABS(f.gallat) < ?2
             AND c.epochid = ?3
             AND c.rbscore >= ?4 AND c.rbscore <= ?5
             AND c.nmatches >= ?6
             AND c.scorr_peak >= ?7
             AND c.ispos = 1
             AND c.mjd - c.firstdet > ?8 AND c.mjd - c.firstdet < ?9
             AND c.wdist1 > ?10 AND c.wdist2 > ?10 AND c.wdist3 > ?10
             AND c.distnearbrstar > ?11
             AND (c.wdist1 > ?11 OR c.w1mag1 > ?12)
             AND (c.wdist2 > ?11 OR c.w1mag2 > ?12)
             AND (c.wdist3 > ?11 OR c.w1mag3 > ?12)
           ORDER BY c.rbscore DESC
           LIMIT ?13",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              filter.gallat_min,
              filter.gallat_max,
              filter.epoch,
              HostlessFilter::RB_SCORE_MIN,
              HostlessFilter::RB_SCORE_MAX,
              HostlessFilter::MIN_MATCHES,
              HostlessFilter::MIN_SCORR_PEAK,
              HostlessFilter::MIN_AGE_DAYS,
              HostlessFilter::MAX_AGE_DAYS,
              HostlessFilter::MIN_HOST_DIST,
              HostlessFilter::BRIGHT_STAR_DIST,
              HostlessFilter::BRIGHT_STAR_MAG,
              limit,
            ],
            |r| r.get(0),
          )?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(candids)
  }

  // ── Label reads ───────────────────────────────────────────────────────────

  async fn max_label_id(&self, table: LabelTable) -> Result<Option<i64>> {
    let max = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT MAX({}) FROM {}", table.id_column(), table.table_name());
        let max: Option<i64> = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(max)
      })
      .await?;
    Ok(max)
  }

  async fn label_rows(&self, table: LabelTable) -> Result<Vec<LabelRow>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&select_label_rows(table))?;
        let rows = stmt
          .query_map([], |r| label_row(table, r))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn all_labels(&self) -> Result<Vec<LabelRow>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut all = Vec::new();
        for table in LabelTable::all() {
          let mut stmt = conn.prepare(&select_label_rows(table))?;
          let rows = stmt
            .query_map([], |r| label_row(table, r))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          all.extend(rows);
        }
        Ok(all)
      })
      .await?;
    Ok(rows)
  }

  async fn memberships(&self, candid: i64) -> Result<Vec<LabelTable>> {
    let tables = self
      .conn
      .call(move |conn| {
        let mut tables = Vec::new();
        for table in LabelTable::all() {
          if contains(conn, table, candid)? {
            tables.push(table);
          }
        }
        Ok(tables)
      })
      .await?;
    Ok(tables)
  }

  async fn all_classified(&self) -> Result<Vec<i64>> {
    let candids = self
      .conn
      .call(|conn| {
        let union = LabelTable::all()
          .map(|t| format!("SELECT candid FROM {}", t.table_name()))
          .collect::<Vec<_>>()
          .join(" UNION ");
        let mut stmt = conn.prepare(&format!("{union} ORDER BY candid"))?;
        let rows = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(candids)
  }

  async fn label_counts(&self) -> Result<Vec<LabelCount>> {
    let counts = self
      .conn
      .call(|conn| {
        let mut counts = Vec::new();
        for table in LabelTable::all() {
          let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT candid) FROM {}",
            table.table_name()
          );
          let (rows, distinct): (i64, i64) =
            conn.query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?)))?;
          counts.push(LabelCount {
            table,
            rows: rows.unsigned_abs(),
            distinct: distinct.unsigned_abs(),
          });
        }
        Ok(counts)
      })
      .await?;
    Ok(counts)
  }

  // ── Label writes ──────────────────────────────────────────────────────────

  async fn insert_label(&self, table: LabelTable, candid: i64) -> Result<LabelRow> {
    let row = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !candidate_exists(&tx, candid)? {
          return Ok(None);
        }
        let row = insert_into(&tx, table, candid)?;
        tx.commit()?;
        Ok(Some(row))
      })
      .await?;
    row.ok_or(Error::UnknownCandidate(candid))
  }

  async fn delete_label(&self, table: LabelTable, candid: i64) -> Result<u64> {
    let removed = self
      .conn
      .call(move |conn| Ok(delete_from(conn, table, candid)?))
      .await?;
    Ok(removed as u64)
  }

  async fn move_label(
    &self,
    candid: i64,
    from: LabelTable,
    to: LabelTable,
  ) -> Result<Option<LabelRow>> {
    enum Moved {
      Row(LabelRow),
      NotInSource,
      UnknownCandidate,
    }

    let moved = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !candidate_exists(&tx, candid)? {
          return Ok(Moved::UnknownCandidate);
        }
        // Dropping `tx` without a commit rolls back.
        if delete_from(&tx, from, candid)? == 0 {
          return Ok(Moved::NotInSource);
        }
        let row = insert_into(&tx, to, candid)?;
        tx.commit()?;
        Ok(Moved::Row(row))
      })
      .await?;

    match moved {
      Moved::Row(row) => Ok(Some(row)),
      Moved::NotInSource => Ok(None),
      Moved::UnknownCandidate => Err(Error::UnknownCandidate(candid)),
    }
  }

  async fn resolve_duplicate(&self, candid: i64, keep: LabelTable) -> Result<LabelRow> {
    let row = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !candidate_exists(&tx, candid)? {
          return Ok(None);
        }
        for table in LabelTable::all().filter(|t| *t != keep) {
          delete_from(&tx, table, candid)?;
        }
        let row = match first_row(&tx, keep, candid)? {
          Some(row) => row,
          None => insert_into(&tx, keep, candid)?,
        };
        tx.commit()?;
        Ok(Some(row))
      })
      .await?;
    row.ok_or(Error::UnknownCandidate(candid))
  }

  async fn delete_everywhere(&self, candid: i64) -> Result<u64> {
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for table in LabelTable::all() {
          removed += delete_from(&tx, table, candid)?;
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed as u64)
  }

  async fn deduplicate_table(&self, table: LabelTable) -> Result<u64> {
    let removed = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "DELETE FROM {table} WHERE {id} NOT IN (
             SELECT MIN({id}) FROM {table} GROUP BY candid
           )",
          id = table.id_column(),
          table = table.table_name(),
        );
        Ok(conn.execute(&sql, [])?)
      })
      .await?;
    Ok(removed as u64)
  }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn add_field(&self, field: Field) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO fields (field, gallat) VALUES (?1, ?2)",
          rusqlite::params![field.field, field.gallat],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_candidate(&self, candidate: Candidate) -> Result<()> {
    let c = RawCandidate::from(candidate);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          INSERT_CANDIDATE,
          rusqlite::params![
            c.candid,
            c.ra,
            c.dec,
            c.field,
            c.epochid,
            c.rbscore,
            c.nmatches,
            c.scorr_peak,
            c.ispos,
            c.mjd,
            c.firstdet,
            c.wdist[0],
            c.wdist[1],
            c.wdist[2],
            c.w1mag[0],
            c.w1mag[1],
            c.w1mag[2],
            c.distnearbrstar,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_cutout(&self, cutout: CutoutBlobs) -> Result<()> {
    let candid = cutout.candid;
    let stored = self
      .conn
      .call(move |conn| {
        if !candidate_exists(conn, cutout.candid)? {
          return Ok(false);
        }
        conn.execute(
          "INSERT OR REPLACE INTO cutouts (candid, sci_image, ref_image, diff_image)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            cutout.candid,
            cutout.science,
            cutout.reference,
            cutout.difference,
          ],
        )?;
        Ok(true)
      })
      .await?;
    if stored { Ok(()) } else { Err(Error::UnknownCandidate(candid)) }
  }
}
