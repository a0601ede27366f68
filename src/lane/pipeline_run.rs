// src/lane/pipeline_run.rs
use chrono::NaiveDateTime;

/// One mapping/assembly run recorded against a lane (a mapstats row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub id: i64,
    /// file-name prefix of the run's job-status marker
    pub prefix: String,
    pub mapper: String,
    pub reference: String,
    pub changed: NaiveDateTime,
    pub is_qc: bool,
    pub paired: bool,
}

impl PipelineRun {
    pub fn pairing(&self) -> &'static str {
        if self.paired {
            "pe"
        } else {
            "se"
        }
    }

    /// `<id>.<pe|se>`, the stem every run artifact is named after.
    pub fn file_stem(&self) -> String {
        format!("{}.{}", self.id, self.pairing())
    }

    /// `<prefix>job_status`; present while the run is in progress or failed.
    pub fn job_status_name(&self) -> String {
        format!("{}job_status", self.prefix)
    }

    pub fn matches_mapper(&self, mappers: &std::collections::BTreeSet<String>) -> bool {
        mappers.is_empty() || mappers.contains(&self.mapper)
    }

    pub fn matches_reference(&self, reference: Option<&str>) -> bool {
        reference.map_or(true, |r| r == self.reference)
    }
}
