// src/lane/status.rs
use std::fmt;

use chrono::{DateTime, Local};

use super::{Lane, StatusFile};
use crate::config::Pipeline;

/// What the status listing shows for one pipeline of one lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayStatus {
    /// the pipeline name is not one we track
    NA,
    Done,
    /// no marker for this pipeline, shown as `-`
    Unknown,
    Reported {
        status: String,
        updated: DateTime<Local>,
    },
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayStatus::NA => f.write_str("NA"),
            DisplayStatus::Done => f.write_str("Done"),
            DisplayStatus::Unknown => f.write_str("-"),
            DisplayStatus::Reported { status, updated } => {
                write!(f, "{} ({})", capitalize(status), updated.format("%d/%m/%Y"))
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Combine the `processed` bitmask with job-status markers for one pipeline.
///
/// A set bit always wins. Otherwise the most recently updated marker for the
/// pipeline is reported; on equal timestamps the first one found is kept.
pub fn pipeline_status(processed: u32, markers: &[StatusFile], name: &str) -> DisplayStatus {
    let pipeline = match Pipeline::from_name(name) {
        Some(p) => p,
        None => return DisplayStatus::NA,
    };
    if pipeline.is_done(processed) {
        return DisplayStatus::Done;
    }
    if markers.is_empty() {
        return DisplayStatus::Unknown;
    }

    let mut latest: Option<&StatusFile> = None;
    for sf in markers.iter().filter(|sf| sf.pipeline == name) {
        match latest {
            Some(best) if best.last_update >= sf.last_update => {}
            _ => latest = Some(sf),
        }
    }

    match latest {
        Some(sf) => DisplayStatus::Reported {
            status: sf.status.clone(),
            updated: sf.last_update,
        },
        None => DisplayStatus::Unknown,
    }
}

/// A short-lived status view borrowing one lane.
pub struct LaneStatus<'a> {
    lane: &'a Lane,
}

impl<'a> LaneStatus<'a> {
    pub fn new(lane: &'a Lane) -> Self {
        Self { lane }
    }

    pub fn status(&self, name: &str) -> DisplayStatus {
        pipeline_status(self.lane.row.processed, self.lane.status_files(), name)
    }

    pub fn header() -> Vec<String> {
        let mut h = vec!["Name".to_string()];
        h.extend(Pipeline::all().map(|p| p.column().to_string()));
        h
    }

    /// Lane name followed by one cell per tracked pipeline.
    pub fn row(&self) -> Vec<String> {
        let mut row = vec![self.lane.name().to_string()];
        row.extend(Pipeline::all().map(|p| self.status(p.name()).to_string()));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn marker(pipeline: &str, status: &str, day: u32) -> StatusFile {
        StatusFile {
            path: PathBuf::from(format!("/l/_{pipeline}_{day}_job_status")),
            pipeline: pipeline.to_string(),
            config_file: format!("/conf/{pipeline}.conf"),
            status: status.to_string(),
            attempts: Some(1),
            last_update: Local.with_ymd_and_hms(2016, 2, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn unknown_pipeline_is_na() {
        assert_eq!(pipeline_status(u32::MAX, &[], "sequencing"), DisplayStatus::NA);
    }

    #[test]
    fn processed_bit_outranks_markers() {
        let markers = vec![marker("mapped", "failed", 3)];
        for processed in [4u32, 5, 4 | 1024, u32::MAX] {
            assert_eq!(pipeline_status(processed, &markers, "mapped"), DisplayStatus::Done);
        }
    }

    #[test]
    fn no_markers_is_unknown() {
        assert_eq!(pipeline_status(0, &[], "assembled"), DisplayStatus::Unknown);
        let markers = vec![marker("mapped", "failed", 3)];
        assert_eq!(pipeline_status(0, &markers, "assembled"), DisplayStatus::Unknown);
        assert_eq!(DisplayStatus::Unknown.to_string(), "-");
    }

    #[test]
    fn latest_marker_wins_regardless_of_order() {
        let a = marker("mapped", "failed", 3);
        let b = marker("mapped", "running", 9);
        let c = marker("mapped", "pending", 5);
        let forward = pipeline_status(0, &[a.clone(), b.clone(), c.clone()], "mapped");
        let backward = pipeline_status(0, &[c, b, a], "mapped");
        assert_eq!(forward, backward);
        assert_eq!(forward.to_string(), "Running (09/02/2016)");
    }

    #[test]
    fn equal_timestamps_keep_the_first_marker() {
        let a = marker("mapped", "failed", 3);
        let b = marker("mapped", "running", 3);
        match pipeline_status(0, &[a, b], "mapped") {
            DisplayStatus::Reported { status, .. } => assert_eq!(status, "failed"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
