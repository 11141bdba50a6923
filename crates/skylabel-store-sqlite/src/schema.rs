//! SQL schema for the skylabel SQLite store.
//!
//! Executed once at connection startup. Label tables use an
//! `INTEGER PRIMARY KEY` surrogate, which SQLite fills with
//! `max(id) + 1` as part of the insert itself.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS fields (
    field   INTEGER PRIMARY KEY,
    gallat  REAL NOT NULL          -- galactic latitude, degrees
);

CREATE TABLE IF NOT EXISTS candidates (
    candid          INTEGER PRIMARY KEY,
    ra              REAL NOT NULL,
    dec             REAL NOT NULL,
    field           INTEGER NOT NULL,
    epochid         INTEGER NOT NULL,
    rbscore         REAL NOT NULL,
    nmatches        INTEGER NOT NULL,
    scorr_peak      REAL NOT NULL,
    ispos           INTEGER NOT NULL,  -- 0 | 1
    mjd             REAL NOT NULL,
    firstdet        REAL NOT NULL,
    wdist1          REAL NOT NULL,
    wdist2          REAL NOT NULL,
    wdist3          REAL NOT NULL,
    w1mag1          REAL NOT NULL,
    w1mag2          REAL NOT NULL,
    w1mag3          REAL NOT NULL,
    distnearbrstar  REAL NOT NULL
);

-- Gzip-compressed FITS images, one triplet per candidate.
CREATE TABLE IF NOT EXISTS cutouts (
    candid     INTEGER PRIMARY KEY REFERENCES candidates(candid),
    sci_image  BLOB NOT NULL,
    ref_image  BLOB NOT NULL,
    diff_image BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS reals (
    realsid  INTEGER PRIMARY KEY,
    candid   INTEGER NOT NULL REFERENCES candidates(candid)
);

CREATE TABLE IF NOT EXISTS artifact (
    artifactid  INTEGER PRIMARY KEY,
    candid      INTEGER NOT NULL REFERENCES candidates(candid)
);

CREATE TABLE IF NOT EXISTS echo (
    echoid  INTEGER PRIMARY KEY,
    candid  INTEGER NOT NULL REFERENCES candidates(candid)
);

CREATE TABLE IF NOT EXISTS highpm (
    highpmid  INTEGER PRIMARY KEY,
    candid    INTEGER NOT NULL REFERENCES candidates(candid)
);

CREATE INDEX IF NOT EXISTS candidates_epoch_idx ON candidates(epochid);
CREATE INDEX IF NOT EXISTS reals_candid_idx     ON reals(candid);
CREATE INDEX IF NOT EXISTS artifact_candid_idx  ON artifact(candid);
CREATE INDEX IF NOT EXISTS echo_candid_idx      ON echo(candid);
CREATE INDEX IF NOT EXISTS highpm_candid_idx    ON highpm(candid);

PRAGMA user_version = 1;
";
