// tests/common/mod.rs
#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use lanefind::store::{SqliteStore, SCHEMA};
use rusqlite::{params, Connection};
use tempfile::TempDir;

/// A tracking database plus storage and symlink trees in a temp dir.
pub struct Fixture {
    pub dir: TempDir,
    pub db: PathBuf,
    conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("tracking.sqlite");
        let conn = Connection::open(&db).expect("create db");
        conn.execute_batch(SCHEMA).expect("schema");
        conn.execute_batch(
            "INSERT INTO study VALUES (1, 607, 'Salmonella survey');
             INSERT INTO sample VALUES (1, 1, 'sampleA', 'ERS000001', 'Salmonella enterica');
             INSERT INTO library VALUES (1, 1, 'libA');",
        )
        .expect("seed");
        Self { dir, db, conn }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage_dir(&self, lane: &str) -> PathBuf {
        self.root().join("storage").join(lane)
    }

    pub fn symlink_dir(&self, lane: &str) -> PathBuf {
        self.root().join("links").join(lane)
    }

    /// Insert a lane and create both of its directories.
    pub fn add_lane(&self, id: i64, name: &str, processed: u32, paired: bool) {
        let storage = self.storage_dir(name);
        let symlink = self.symlink_dir(name);
        fs::create_dir_all(&storage).unwrap();
        fs::create_dir_all(&symlink).unwrap();
        self.conn
            .execute(
                "INSERT INTO lane VALUES (?1, 1, ?2, ?3, ?4, 'passed', ?5, ?6)",
                params![
                    id,
                    name,
                    processed,
                    paired as i64,
                    storage.to_string_lossy(),
                    symlink.to_string_lossy()
                ],
            )
            .unwrap();
    }

    pub fn set_qc(&self, lane_id: i64, status: &str) {
        self.conn
            .execute(
                "UPDATE lane SET qc_status = ?1 WHERE lane_id = ?2",
                params![status, lane_id],
            )
            .unwrap();
    }

    pub fn add_run(&self, id: i64, lane_id: i64, mapper: &str, reference: &str, changed: &str, is_qc: bool) {
        self.conn
            .execute(
                "INSERT INTO mapstats VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, lane_id, format!("_{id}_"), mapper, reference, is_qc as i64, changed],
            )
            .unwrap();
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::open(&self.db).expect("open store")
    }
}

pub fn write_file<P: AsRef<Path>>(path: P, content: &str) {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(path).expect("Unable to create file");
    f.write_all(content.as_bytes()).expect("Unable to write data to file");
}

/// A job-status marker whose modification time is `secs` after the epoch.
pub fn write_marker<P: AsRef<Path>>(path: P, config: &str, status: &str, secs: u64) {
    let path = path.as_ref();
    write_file(path, &format!("{config}\n{status}\n1\n"));
    let f = File::options().write(true).open(path).unwrap();
    f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}
