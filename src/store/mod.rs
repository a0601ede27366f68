// src/store/mod.rs
//! Read-only access to the sequencing tracking database.
pub mod sqlite;

pub use sqlite::SqliteStore;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::Pipeline;
use crate::error::{FindError, Result};
use crate::lane::PipelineRun;

/// Table definitions of the tracking database, used to build fixtures.
pub const SCHEMA: &str = include_str!("schema.sql");

/// How an identifier given on the command line is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    Lane,
    Library,
    Sample,
    Species,
    Study,
}

impl FromStr for IdType {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lane" => Ok(IdType::Lane),
            "library" => Ok(IdType::Library),
            "sample" => Ok(IdType::Sample),
            "species" => Ok(IdType::Species),
            "study" => Ok(IdType::Study),
            other => Err(FindError::Config(format!(
                "unknown id type '{other}', expected lane, library, sample, species or study"
            ))),
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdType::Lane => "lane",
            IdType::Library => "library",
            IdType::Sample => "sample",
            IdType::Species => "species",
            IdType::Study => "study",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QcStatus {
    Passed,
    Failed,
    Pending,
}

impl QcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Passed => "passed",
            QcStatus::Failed => "failed",
            QcStatus::Pending => "pending",
        }
    }
}

impl FromStr for QcStatus {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "passed" => Ok(QcStatus::Passed),
            "failed" => Ok(QcStatus::Failed),
            "pending" => Ok(QcStatus::Pending),
            other => Err(FindError::Config(format!("unknown QC status '{other}'"))),
        }
    }
}

/// Store-level restrictions applied before any file is looked at.
#[derive(Debug, Clone, Default)]
pub struct LaneFilter {
    pub qc: Option<QcStatus>,
    pub required: Option<Pipeline>,
}

impl LaneFilter {
}

/// One lane record as the tracking store reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneRow {
    pub id: i64,
    pub name: String,
    pub study: String,
    pub sample: String,
    pub processed: u32,
    pub paired: bool,
    pub qc_status: String,
    pub storage_path: PathBuf,
    pub symlink_path: PathBuf,
}

pub trait TrackingStore {
    /// Lanes matching `id` interpreted as `id_type`, in store order.
    fn lanes(&self, id: &str, id_type: IdType, filter: &LaneFilter) -> Result<Vec<LaneRow>>;

    /// Mapping/assembly runs recorded for a lane with the given QC flag.
    ///
    /// The outer error is a failed query; an inner error is one unreadable run
    /// row, which leaves the other runs usable.
    fn pipeline_runs(&self, lane_id: i64, is_qc: bool) -> Result<Vec<Result<PipelineRun>>>;
}
