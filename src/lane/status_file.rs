// src/lane/status_file.rs
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{FindError, Result};

pub const JOB_STATUS_SUFFIX: &str = "job_status";

/// Config-file name words and the pipeline they belong to. First hit wins.
///
/// Names are split on `_`, `.` and `-`; a word containing `_` must match
/// consecutive tokens.
const CONFIG_PIPELINES: &[(&[&str], &str)] = &[
    (&["rna_seq", "rnaseq"], "rna_seq_expression"),
    (&["snp", "snps"], "snp_called"),
    (&["annotate", "annotation"], "annotated"),
    (&["improvement", "improve"], "improved"),
    (&["assembly", "assemble"], "assembled"),
    (&["mapping", "map"], "mapped"),
    (&["archive", "archiving", "stored"], "stored"),
    (&["import"], "import"),
    (&["qc"], "qc"),
];

/// A job-status marker left next to a lane's data by a pipeline run.
///
/// The file holds the pipeline config path, the current status and the
/// number of attempts, one per line. The modification time is the last update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFile {
    pub path: PathBuf,
    pub pipeline: String,
    pub config_file: String,
    pub status: String,
    pub attempts: Option<u32>,
    pub last_update: DateTime<Local>,
}

impl StatusFile {
    pub fn is_marker(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(JOB_STATUS_SUFFIX))
            .unwrap_or(false)
    }

    pub fn parse(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FindError::io(path, e))?;
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| FindError::io(path, e))?;

        let mut lines = text.lines().map(str::trim);
        let config_file = lines.next().unwrap_or_default().to_string();
        let status = lines.next().unwrap_or_default().to_string();
        if status.is_empty() {
            return Err(FindError::Parse {
                path: path.to_path_buf(),
                line: 2,
                message: "job status marker has no status line".to_string(),
            });
        }
        let attempts = lines.next().and_then(|l| l.parse().ok());

        let pipeline = Self::pipeline_from_config(&config_file)
            .or_else(|| {
                let name = path.file_name()?.to_str()?;
                Self::pipeline_from_config(name)
            })
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            pipeline,
            config_file,
            status,
            attempts,
            last_update: DateTime::<Local>::from(modified),
        })
    }

    /// Every marker directly inside `dir`, in file-name order.
    ///
    /// An unreadable or missing directory yields no markers rather than an error.
    pub fn scan(dir: &Path) -> Vec<StatusFile> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("no job status markers read from {}: {e}", dir.display());
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && Self::is_marker(p))
            .collect();
        paths.sort();

        paths
            .iter()
            .filter_map(|p| match Self::parse(p) {
                Ok(sf) => Some(sf),
                Err(e) => {
                    tracing::debug!("skipping job status marker: {e}");
                    None
                }
            })
            .collect()
    }

    fn pipeline_from_config(config: &str) -> Option<String> {
        let base = Path::new(config)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(config)
            .to_ascii_lowercase();
        if base.is_empty() {
            return None;
        }
        let tokens: Vec<&str> = base
            .split(['_', '.', '-'])
            .filter(|t| !t.is_empty())
            .collect();
        CONFIG_PIPELINES
            .iter()
            .find(|(words, _)| {
                words.iter().any(|w| {
                    let want: Vec<&str> = w.split('_').collect();
                    tokens.windows(want.len()).any(|win| win == want.as_slice())
                })
            })
            .map(|(_, name)| name.to_string())
    }
}
