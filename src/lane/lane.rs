// src/lane/lane.rs
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::{PipelineRun, StatusFile};
use crate::config::PipelineKind;
use crate::store::LaneRow;

/// Where a run-derived file came from; printed with `--details`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDetail {
    pub run_id: i64,
    pub reference: String,
    pub mapper: String,
    pub changed: NaiveDateTime,
}

impl RunDetail {
    pub fn from_run(run: &PipelineRun) -> Self {
        Self {
            run_id: run.id,
            reference: run.reference.clone(),
            mapper: run.mapper.clone(),
            changed: run.changed,
        }
    }
}

/// One output file matched for a lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// path handed back to the caller (symlink tier)
    pub path: PathBuf,
    /// the same file on the storage tier, where existence was checked
    pub storage: PathBuf,
    /// assembler that produced the file, for assembly and annotation output
    pub program: Option<String>,
    pub detail: Option<RunDetail>,
}

impl ResolvedFile {
    pub fn plain(path: PathBuf, storage: PathBuf) -> Self {
        Self {
            path,
            storage,
            program: None,
            detail: None,
        }
    }
}

/// A lane from the tracking store plus everything resolved for it in this run.
#[derive(Debug)]
pub struct Lane {
    pub row: LaneRow,
    pub kind: PipelineKind,
    pub files: Vec<ResolvedFile>,
    pub warnings: Vec<String>,
    status_files: OnceCell<Vec<StatusFile>>,
}

impl Lane {
    pub fn new(row: LaneRow, kind: PipelineKind) -> Self {
        Self {
            row,
            kind,
            files: Vec::new(),
            warnings: Vec::new(),
            status_files: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.row.name
    }

    pub fn storage_root(&self) -> &Path {
        &self.row.storage_path
    }

    pub fn storage_file<P: AsRef<Path>>(&self, rel: P) -> PathBuf {
        self.row.storage_path.join(rel)
    }

    pub fn symlink_file<P: AsRef<Path>>(&self, rel: P) -> PathBuf {
        self.row.symlink_path.join(rel)
    }

    /// Map a storage-tier path below this lane onto the symlink tier.
    pub fn to_symlink_tier(&self, storage: &Path) -> PathBuf {
        match storage.strip_prefix(&self.row.storage_path) {
            Ok(rel) => self.row.symlink_path.join(rel),
            Err(_) => storage.to_path_buf(),
        }
    }

    /// A run is finished once its job-status marker is gone from the storage tier.
    pub fn job_finished(&self, run: &PipelineRun) -> bool {
        !self.storage_file(run.job_status_name()).exists()
    }

    /// Record a non-fatal problem against this lane and report it right away.
    pub fn warn<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        tracing::warn!(lane = %self.row.name, "{msg}");
        self.warnings.push(msg);
    }

    pub fn add_file(&mut self, file: ResolvedFile) {
        if self.files.iter().any(|f| f.path == file.path) {
            tracing::debug!("{}: duplicate file {} ignored", self.row.name, file.path.display());
            return;
        }
        self.files.push(file);
    }

    /// Job-status markers in the lane's symlink-tier directory, read once.
    pub fn status_files(&self) -> &[StatusFile] {
        self.status_files
            .get_or_init(|| StatusFile::scan(&self.row.symlink_path))
    }
}
