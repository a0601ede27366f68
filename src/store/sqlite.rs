// src/store/sqlite.rs
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OpenFlags};

use super::{IdType, LaneFilter, LaneRow, TrackingStore};
use crate::error::{FindError, Result};
use crate::lane::PipelineRun;

const CHANGED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LANE_SELECT: &str = "
    SELECT lane.lane_id, lane.name, study.name, sample.name, lane.processed,
           lane.is_paired, lane.qc_status, lane.storage_path, lane.symlink_path
    FROM lane
    JOIN library ON library.library_id = lane.library_id
    JOIN sample  ON sample.sample_id   = library.sample_id
    JOIN study   ON study.study_id     = sample.study_id
";

/// The tracking database, opened read-only.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FindError::Config(format!(
                "tracking database '{}' does not exist",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!("opened tracking database {}", path.display());
        Ok(Self { conn })
    }

    /// Wrap an existing connection (used by tests with in-memory fixtures).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn id_clause(id_type: IdType) -> &'static str {
        match id_type {
            // a plain lane id also matches its tagged lanes: 12345_1 -> 12345_1#7
            IdType::Lane => {
                "(lane.name = ?1 OR substr(lane.name, 1, length(?1) + 1) = ?1 || '#')"
            }
            IdType::Library => "library.name = ?1",
            IdType::Sample => "(sample.name = ?1 OR sample.accession = ?1)",
            IdType::Species => "instr(lower(sample.species), lower(?1)) > 0",
            IdType::Study => "(study.name = ?1 OR CAST(study.ssid AS TEXT) = ?1)",
        }
    }
}

impl TrackingStore for SqliteStore {
    fn lanes(&self, id: &str, id_type: IdType, filter: &LaneFilter) -> Result<Vec<LaneRow>> {
        let sql = format!(
            "{LANE_SELECT}
             WHERE {}
               AND (?2 IS NULL OR lane.qc_status = ?2)
               AND (lane.processed & ?3) = ?3
             ORDER BY lane.name, lane.lane_id",
            Self::id_clause(id_type)
        );
        let qc = filter.qc.map(|q| q.as_str());
        let bit = filter.required.map(|p| p.bit()).unwrap_or(0);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id, qc, bit], |row| {
            Ok(LaneRow {
                id: row.get(0)?,
                name: row.get(1)?,
                study: row.get(2)?,
                sample: row.get(3)?,
                processed: row.get(4)?,
                paired: row.get::<_, i64>(5)? != 0,
                qc_status: row.get(6)?,
                storage_path: PathBuf::from(row.get::<_, String>(7)?),
                symlink_path: PathBuf::from(row.get::<_, String>(8)?),
            })
        })?;

        let lanes = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!("{} '{}' matched {} lane(s)", id_type, id, lanes.len());
        Ok(lanes)
    }

    fn pipeline_runs(&self, lane_id: i64, is_qc: bool) -> Result<Vec<Result<PipelineRun>>> {
        let mut stmt = self.conn.prepare(
            "SELECT mapstats.mapstats_id, mapstats.prefix, mapstats.mapper, mapstats.reference,
                    mapstats.changed, mapstats.is_qc, lane.is_paired
             FROM mapstats
             JOIN lane ON lane.lane_id = mapstats.lane_id
             WHERE mapstats.lane_id = ?1 AND mapstats.is_qc = ?2
             ORDER BY mapstats.mapstats_id",
        )?;
        let rows = stmt.query_map(params![lane_id, is_qc as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)? != 0,
                row.get::<_, i64>(6)? != 0,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, prefix, mapper, reference, changed, is_qc, paired) = row?;
            let run = NaiveDateTime::parse_from_str(&changed, CHANGED_FORMAT)
                .map(|changed| PipelineRun {
                    id,
                    prefix,
                    mapper: mapper.unwrap_or_default(),
                    reference: reference.unwrap_or_default(),
                    changed,
                    is_qc,
                    paired,
                })
                .map_err(|e| {
                    FindError::Config(format!(
                        "mapstats {id}: bad changed timestamp '{changed}': {e}"
                    ))
                });
            runs.push(run);
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pipeline;
    use crate::store::{QcStatus, SCHEMA};

    fn fixture() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO study VALUES (1, 607, 'Salmonella survey');
             INSERT INTO sample VALUES (1, 1, 'sampleA', 'ERS000001', 'Salmonella enterica');
             INSERT INTO sample VALUES (2, 1, 'sampleB', 'ERS000002', 'Escherichia coli');
             INSERT INTO library VALUES (1, 1, 'libA');
             INSERT INTO library VALUES (2, 2, 'libB');
             INSERT INTO lane VALUES (1, 1, '12345_1#2', 5, 1, 'passed', '/s/a', '/l/a');
             INSERT INTO lane VALUES (2, 1, '12345_1#1', 1, 1, 'failed', '/s/b', '/l/b');
             INSERT INTO lane VALUES (3, 2, '12345_11#1', 7, 0, 'passed', '/s/c', '/l/c');
             INSERT INTO mapstats VALUES (10, 1, '_', 'bwa', 'Ref_A', 0, '2015-01-02 03:04:05');
             INSERT INTO mapstats VALUES (11, 1, '_', 'smalt', 'Ref_A', 1, '2015-01-03 03:04:05');",
        )
        .unwrap();
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn lane_id_matches_tags_but_not_longer_lanes() {
        let store = fixture();
        let lanes = store.lanes("12345_1", IdType::Lane, &LaneFilter::default()).unwrap();
        let names: Vec<_> = lanes.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["12345_1#1", "12345_1#2"]);
    }

    #[test]
    fn filters_on_qc_and_processed_bit() {
        let store = fixture();
        let filter = LaneFilter {
            qc: Some(QcStatus::Passed),
            required: Some(Pipeline::Mapped),
        };
        let lanes = store.lanes("Salmonella survey", IdType::Study, &filter).unwrap();
        let names: Vec<_> = lanes.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["12345_1#2", "12345_11#1"]);

        let by_ssid = store.lanes("607", IdType::Study, &LaneFilter::default()).unwrap();
        assert_eq!(by_ssid.len(), 3);
    }

    #[test]
    fn species_is_a_case_insensitive_substring() {
        let store = fixture();
        let lanes = store.lanes("coli", IdType::Species, &LaneFilter::default()).unwrap();
        assert_eq!(lanes.len(), 1);
        assert!(!lanes[0].paired);
        assert_eq!(lanes[0].sample, "sampleB");
    }

    #[test]
    fn runs_are_split_by_qc_flag() {
        let store = fixture();
        let runs = store.pipeline_runs(1, false).unwrap();
        assert_eq!(runs.len(), 1);
        let run = runs[0].as_ref().unwrap();
        assert_eq!(run.mapper, "bwa");
        assert_eq!(run.changed.to_string(), "2015-01-02 03:04:05");
        let qc = store.pipeline_runs(1, true).unwrap();
        assert_eq!(qc[0].as_ref().unwrap().mapper, "smalt");
    }

    #[test]
    fn bad_timestamp_fails_only_its_own_run() {
        let store = fixture();
        store
            .conn
            .execute_batch(
                "INSERT INTO mapstats VALUES (12, 1, '_', 'bwa', 'Ref_B', 0, 'yesterday');",
            )
            .unwrap();
        let runs = store.pipeline_runs(1, false).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].is_ok());
        assert!(matches!(runs[1], Err(FindError::Config(_))));
    }
}
