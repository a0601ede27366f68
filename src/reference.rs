// src/reference.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FindError, Result};

/// Named reference genomes and their sequence files.
///
/// Loaded from a tab-separated index, one `name<TAB>path` pair per line.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: Vec<(String, PathBuf)>,
}

impl ReferenceIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| FindError::io(path, e))?;

        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, file) = line.split_once('\t').ok_or_else(|| FindError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                message: "expected '<name>\\t<path>'".to_string(),
            })?;
            entries.push((name.trim().to_string(), PathBuf::from(file.trim())));
        }
        Ok(Self { entries })
    }

    pub fn from_entries<I, S, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(n, p)| (n.into(), p.into()))
                .collect(),
        }
    }

    /// Candidates for `name`: exact matches, else every entry the name is a prefix of.
    fn candidates(&self, name: &str) -> Vec<&PathBuf> {
        let exact: Vec<&PathBuf> = self
            .entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, p)| p)
            .collect();
        let mut found = if exact.is_empty() {
            let lower = name.to_ascii_lowercase();
            self.entries
                .iter()
                .filter(|(n, _)| n.to_ascii_lowercase().starts_with(&lower))
                .map(|(_, p)| p)
                .collect()
        } else {
            exact
        };
        found.sort();
        found.dedup();
        found
    }

    /// Exactly one sequence file per name, with its extension swapped for
    /// `extension` when one is given.
    pub fn resolve_reference_paths(
        &self,
        names: &[String],
        extension: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let found = self.candidates(name);
            match found.len() {
                0 => return Err(FindError::MissingReference { name: name.clone() }),
                1 => {
                    let path = match extension {
                        Some(ext) => found[0].with_extension(ext.trim_start_matches('.')),
                        None => found[0].clone(),
                    };
                    out.push(path);
                }
                count => {
                    return Err(FindError::AmbiguousReference {
                        name: name.clone(),
                        count,
                    })
                }
            }
        }
        Ok(out)
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut paths = self.resolve_reference_paths(&[name.to_string()], None)?;
        Ok(paths.remove(0))
    }
}
