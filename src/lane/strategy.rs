// src/lane/strategy.rs
//! Per-pipeline file resolution.
//!
//! Mapping and SNP output share one algorithm over the lane's pipeline runs and
//! differ only in the [`RunLayout`] naming their artifacts. Assembly, annotation
//! and plain data files are found by looking inside the lane directory.
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::{Lane, ResolvedFile, RunDetail};
use crate::config::{Config, FileType, PipelineKind, ANNOTATION_SEARCH_DEPTH};
use crate::error::{FindError, Result};
use crate::store::TrackingStore;

pub const MARKDUP_BAM: &str = ".markdup.bam";
pub const RAW_SORTED_BAM: &str = ".raw.sorted.bam";
pub const UNFILTERED_VCF: &str = ".markdup.snp/mpileup.unfilt.vcf.gz";
pub const PSEUDOGENOME: &str = ".markdup.snp/pseudo_genome.fasta";

pub const SCAFFOLD_FILE: &str = "contigs.fa";
pub const CONTIGS_FILE: &str = "unscaffolded_contigs.fa";

/// Restrictions on which runs or programs contribute files.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub mappers: BTreeSet<String>,
    pub reference: Option<String>,
    /// assemblers searched by the assembly and annotation strategies
    pub programs: BTreeSet<String>,
}

/// Names of one run artifact, relative to the lane directory.
///
/// Each candidate is appended to `<run id>.<pe|se>`. The first candidate present
/// on the storage tier wins; when none is, the last one is returned anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLayout {
    pub candidates: &'static [&'static str],
}

impl RunLayout {
    pub const BAM: RunLayout = RunLayout {
        candidates: &[MARKDUP_BAM, RAW_SORTED_BAM],
    };
    pub const VCF: RunLayout = RunLayout {
        candidates: &[UNFILTERED_VCF],
    };
    pub const PSEUDOGENOME: RunLayout = RunLayout {
        candidates: &[PSEUDOGENOME],
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Runs(RunLayout),
    Assembly(&'static [&'static str]),
    Annotation(FileType),
    Generic(FileType),
}

impl Strategy {
    /// Pick the resolver for `filetype` within `kind`.
    ///
    /// A filetype the pipeline never produces is a caller error and fails here,
    /// before any lane is touched.
    pub fn for_kind(kind: PipelineKind, filetype: FileType) -> Result<Self> {
        use FileType::*;
        let strategy = match (kind, filetype) {
            (PipelineKind::Data, Fastq | Bam | Pacbio | Corrected) => Strategy::Generic(filetype),
            (PipelineKind::Mapping, Bam) => Strategy::Runs(RunLayout::BAM),
            (PipelineKind::Snp, Vcf) => Strategy::Runs(RunLayout::VCF),
            (PipelineKind::Snp, Pseudogenome) => Strategy::Runs(RunLayout::PSEUDOGENOME),
            (PipelineKind::Assembly, Scaffold) => Strategy::Assembly(&[SCAFFOLD_FILE]),
            (PipelineKind::Assembly, Contigs) => Strategy::Assembly(&[CONTIGS_FILE]),
            (PipelineKind::Assembly, AllAssembly) => {
                Strategy::Assembly(&[SCAFFOLD_FILE, CONTIGS_FILE])
            }
            (PipelineKind::Annotation, Gff | Faa | Ffn | Fna | Gbk) => {
                Strategy::Annotation(filetype)
            }
            _ => {
                return Err(FindError::UnsupportedFileType {
                    kind: kind.to_string(),
                    filetype: filetype.to_string(),
                })
            }
        };
        Ok(strategy)
    }

    /// Resolve this strategy's files for one lane into `lane.files`.
    ///
    /// Missing files become lane warnings; only store failures are errors.
    pub fn resolve(
        &self,
        lane: &mut Lane,
        store: &dyn TrackingStore,
        filters: &Filters,
        config: &Config,
    ) -> Result<()> {
        match self {
            Strategy::Runs(layout) => resolve_runs(lane, store, *layout, filters),
            Strategy::Assembly(names) => {
                resolve_assembly(lane, names, &assemblers(filters, config));
                Ok(())
            }
            Strategy::Annotation(ft) => {
                resolve_annotation(lane, *ft, &assemblers(filters, config));
                Ok(())
            }
            Strategy::Generic(ft) => {
                resolve_generic(lane, *ft, config.search_depth);
                Ok(())
            }
        }
    }
}

fn assemblers(filters: &Filters, config: &Config) -> Vec<String> {
    config
        .assemblers
        .iter()
        .filter(|a| filters.programs.is_empty() || filters.programs.contains(*a))
        .cloned()
        .collect()
}

fn resolve_runs(
    lane: &mut Lane,
    store: &dyn TrackingStore,
    layout: RunLayout,
    filters: &Filters,
) -> Result<()> {
    let runs = store.pipeline_runs(lane.row.id, false)?;

    for run in runs {
        let run = match run {
            Ok(run) => run,
            Err(e) => {
                lane.warn(format!("run skipped: {e}"));
                continue;
            }
        };
        if !lane.job_finished(&run) {
            tracing::debug!("{}: run {} still has a job status marker", lane.name(), run.id);
            continue;
        }
        if !run.matches_mapper(&filters.mappers) {
            continue;
        }
        if !run.matches_reference(filters.reference.as_deref()) {
            continue;
        }

        let stem = run.file_stem();
        let names: Vec<String> = layout
            .candidates
            .iter()
            .map(|c| format!("{stem}{c}"))
            .collect();

        let found = names.iter().position(|n| lane.storage_file(n).exists());
        let chosen = match found {
            Some(0) => &names[0],
            Some(i) => {
                lane.warn(format!("{} not found, using {}", names[0], names[i]));
                &names[i]
            }
            None => {
                let fallback = &names[names.len() - 1];
                let missing = lane.storage_file(fallback);
                lane.warn(format!("expected file {} is missing", missing.display()));
                fallback
            }
        };

        let file = ResolvedFile {
            path: lane.symlink_file(chosen),
            storage: lane.storage_file(chosen),
            program: None,
            detail: Some(RunDetail::from_run(&run)),
        };
        lane.add_file(file);
    }
    Ok(())
}

fn resolve_assembly(lane: &mut Lane, names: &[&str], assemblers: &[String]) {
    for asm in assemblers {
        let dir = PathBuf::from(format!("{asm}_assembly"));
        for name in names {
            let rel = dir.join(name);
            let storage = lane.storage_file(&rel);
            if !storage.is_file() {
                continue;
            }
            lane.add_file(ResolvedFile {
                path: lane.symlink_file(&rel),
                storage,
                program: Some(asm.clone()),
                detail: None,
            });
        }
    }
}

/// Walk the lane's storage directory down to `depth` and hand every file's
/// lane-relative path to `pick`, which returns the producing program if wanted.
fn walk_lane<F>(lane: &mut Lane, depth: usize, pick: F)
where
    F: Fn(&Path) -> Option<Option<String>>,
{
    let root = lane.storage_root().to_path_buf();
    if !root.is_dir() {
        lane.warn(format!("lane directory {} is missing", root.display()));
        return;
    }

    for entry in WalkDir::new(&root)
        .max_depth(depth)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                lane.warn(format!("cannot read below {}: {e}", root.display()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        if let Some(program) = pick(rel) {
            let mut file = ResolvedFile::plain(lane.to_symlink_tier(entry.path()), entry.path().to_path_buf());
            file.program = program;
            lane.add_file(file);
        }
    }
}

fn has_suffix(rel: &Path, ft: FileType) -> bool {
    rel.file_name()
        .and_then(|n| n.to_str())
        .map(|n| ft.suffixes().iter().any(|s| n.ends_with(s)))
        .unwrap_or(false)
}

fn resolve_generic(lane: &mut Lane, ft: FileType, depth: usize) {
    walk_lane(lane, depth, |rel| has_suffix(rel, ft).then_some(None));
}

/// Files in `<assembler>_assembly/annotation/` for every allowed assembler.
fn resolve_annotation(lane: &mut Lane, ft: FileType, assemblers: &[String]) {
    walk_lane(lane, ANNOTATION_SEARCH_DEPTH, |rel| {
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => os.to_str(),
                _ => None,
            })
            .collect();
        if parts.len() != 3 || parts[1] != "annotation" || !has_suffix(rel, ft) {
            return None;
        }
        let asm = parts[0].strip_suffix("_assembly")?;
        assemblers
            .iter()
            .any(|a| a == asm)
            .then(|| Some(asm.to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetypes_outside_the_pipeline_fail_fast() {
        let err = Strategy::for_kind(PipelineKind::Mapping, FileType::Vcf).unwrap_err();
        assert!(matches!(err, FindError::UnsupportedFileType { .. }));
        assert!(Strategy::for_kind(PipelineKind::Annotation, FileType::Scaffold).is_err());
    }

    #[test]
    fn bam_layout_prefers_markdup() {
        assert_eq!(
            Strategy::for_kind(PipelineKind::Mapping, FileType::Bam).unwrap(),
            Strategy::Runs(RunLayout::BAM)
        );
        assert_eq!(RunLayout::BAM.candidates, &[".markdup.bam", ".raw.sorted.bam"]);
    }

    #[test]
    fn assembler_filter_narrows_the_config_list() {
        let config = Config::new("db");
        let mut filters = Filters::default();
        assert_eq!(assemblers(&filters, &config).len(), config.assemblers.len());
        filters.programs.insert("spades".to_string());
        assert_eq!(assemblers(&filters, &config), vec!["spades".to_string()]);
    }
}
