// src/config.rs
//! Static pipeline tables and the immutable run configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::FindError;

/// Pipelines tracked by the `processed` bitmask of a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pipeline {
    Import,
    Qc,
    Mapped,
    Stored,
    Improved,
    SnpCalled,
    RnaSeqExpression,
    Assembled,
    Annotated,
}

/// (pipeline, bit, canonical name, status column header)
const PIPELINE_TABLE: &[(Pipeline, u32, &str, &str)] = &[
    (Pipeline::Import, 1, "import", "Import"),
    (Pipeline::Qc, 2, "qc", "QC"),
    (Pipeline::Mapped, 4, "mapped", "Mapping"),
    (Pipeline::Stored, 8, "stored", "Archive"),
    (Pipeline::Improved, 128, "improved", "Improve"),
    (Pipeline::SnpCalled, 256, "snp_called", "SNP call"),
    (Pipeline::RnaSeqExpression, 512, "rna_seq_expression", "RNASeq"),
    (Pipeline::Assembled, 1024, "assembled", "Assembly"),
    (Pipeline::Annotated, 2048, "annotated", "Annotation"),
];

impl Pipeline {
    pub fn all() -> impl Iterator<Item = Pipeline> {
        PIPELINE_TABLE.iter().map(|(p, ..)| *p)
    }

    fn entry(&self) -> &'static (Pipeline, u32, &'static str, &'static str) {
        // table rows are in declaration order
        &PIPELINE_TABLE[*self as usize]
    }

    pub fn bit(&self) -> u32 {
        self.entry().1
    }

    pub fn name(&self) -> &'static str {
        self.entry().2
    }

    pub fn column(&self) -> &'static str {
        self.entry().3
    }

    pub fn from_name(name: &str) -> Option<Pipeline> {
        PIPELINE_TABLE
            .iter()
            .find(|(_, _, n, _)| *n == name)
            .map(|(p, ..)| *p)
    }

    pub fn is_done(&self, processed: u32) -> bool {
        processed & self.bit() != 0
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The assemblers whose `<name>_assembly/` directories are searched.
pub const ASSEMBLERS: &[&str] = &["velvet", "spades", "iva", "pacbio", "canu"];

pub const DEFAULT_SEARCH_DEPTH: usize = 1;
pub const ANNOTATION_SEARCH_DEPTH: usize = 3;

/// Kinds of output file the resolver can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Fastq,
    Bam,
    Pacbio,
    Corrected,
    Vcf,
    Pseudogenome,
    Scaffold,
    Contigs,
    AllAssembly,
    Gff,
    Faa,
    Ffn,
    Fna,
    Gbk,
}

impl FileType {
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Fastq => "fastq",
            FileType::Bam => "bam",
            FileType::Pacbio => "pacbio",
            FileType::Corrected => "corrected",
            FileType::Vcf => "vcf",
            FileType::Pseudogenome => "pseudogenome",
            FileType::Scaffold => "scaffold",
            FileType::Contigs => "contigs",
            FileType::AllAssembly => "all",
            FileType::Gff => "gff",
            FileType::Faa => "faa",
            FileType::Ffn => "ffn",
            FileType::Fna => "fna",
            FileType::Gbk => "gbk",
        }
    }

    /// Filename suffixes matched by the generic and annotation walkers.
    pub fn suffixes(&self) -> &'static [&'static str] {
        match self {
            FileType::Fastq => &[".fastq.gz"],
            FileType::Bam => &[".bam"],
            FileType::Pacbio => &[".h5", ".subreads.bam"],
            FileType::Corrected => &[".corrected.fastq.gz"],
            FileType::Vcf => &[".vcf.gz"],
            FileType::Pseudogenome => &["pseudo_genome.fasta"],
            FileType::Scaffold => &["contigs.fa"],
            FileType::Contigs => &["unscaffolded_contigs.fa"],
            FileType::AllAssembly => &["contigs.fa", "unscaffolded_contigs.fa"],
            FileType::Gff => &[".gff"],
            FileType::Faa => &[".faa"],
            FileType::Ffn => &[".ffn"],
            FileType::Fna => &[".fna"],
            FileType::Gbk => &[".gbk"],
        }
    }
}

impl FromStr for FileType {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ft = match s.to_ascii_lowercase().as_str() {
            "fastq" => FileType::Fastq,
            "bam" => FileType::Bam,
            "pacbio" => FileType::Pacbio,
            "corrected" => FileType::Corrected,
            "vcf" => FileType::Vcf,
            "pseudogenome" => FileType::Pseudogenome,
            "scaffold" => FileType::Scaffold,
            "contigs" => FileType::Contigs,
            "all" => FileType::AllAssembly,
            "gff" => FileType::Gff,
            "faa" => FileType::Faa,
            "ffn" => FileType::Ffn,
            "fna" => FileType::Fna,
            "gbk" => FileType::Gbk,
            other => return Err(FindError::Config(format!("unknown filetype '{other}'"))),
        };
        Ok(ft)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which pipeline's outputs a lane is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Data,
    Mapping,
    Snp,
    Assembly,
    Annotation,
}

impl PipelineKind {
    /// The `processed` bit a lane needs before this kind's outputs are trusted.
    pub fn required_pipeline(&self) -> Pipeline {
        match self {
            PipelineKind::Data => Pipeline::Import,
            PipelineKind::Mapping => Pipeline::Mapped,
            PipelineKind::Snp => Pipeline::SnpCalled,
            PipelineKind::Assembly => Pipeline::Assembled,
            PipelineKind::Annotation => Pipeline::Annotated,
        }
    }

    pub fn default_filetype(&self) -> FileType {
        match self {
            PipelineKind::Data => FileType::Fastq,
            PipelineKind::Mapping => FileType::Bam,
            PipelineKind::Snp => FileType::Vcf,
            PipelineKind::Assembly => FileType::Scaffold,
            PipelineKind::Annotation => FileType::Gff,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Data => "data",
            PipelineKind::Mapping => "mapping",
            PipelineKind::Snp => "snp",
            PipelineKind::Assembly => "assembly",
            PipelineKind::Annotation => "annotation",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run configuration, assembled once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub reference_index: Option<PathBuf>,
    pub search_depth: usize,
    pub assemblers: Vec<String>,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(database: P) -> Self {
        Self {
            database: database.into(),
            reference_index: None,
            search_depth: DEFAULT_SEARCH_DEPTH,
            assemblers: ASSEMBLERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_reference_index<P: Into<PathBuf>>(mut self, index: P) -> Self {
        self.reference_index = Some(index.into());
        self
    }

    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth.max(1);
        self
    }

    /// Restrict the searched assemblers; unknown names are a startup error.
    pub fn with_assemblers(mut self, assemblers: &[String]) -> Result<Self, FindError> {
        if assemblers.is_empty() {
            return Ok(self);
        }
        for a in assemblers {
            if !ASSEMBLERS.contains(&a.as_str()) {
                return Err(FindError::Config(format!(
                    "unknown assembler '{a}', expected one of {ASSEMBLERS:?}"
                )));
            }
        }
        self.assemblers = assemblers.to_vec();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_bits_and_names() {
        assert_eq!(Pipeline::Mapped.bit(), 4);
        assert_eq!(Pipeline::Annotated.bit(), 2048);
        assert_eq!(Pipeline::from_name("snp_called"), Some(Pipeline::SnpCalled));
        assert_eq!(Pipeline::from_name("bogus"), None);
        assert!(Pipeline::Assembled.is_done(1024 | 1));
        assert!(!Pipeline::Assembled.is_done(2048));
    }

    #[test]
    fn table_follows_declaration_order() {
        for (i, p) in Pipeline::all().enumerate() {
            assert_eq!(p as usize, i);
        }
    }

    #[test]
    fn unknown_assembler_is_rejected() {
        let cfg = Config::new("db.sqlite").with_assemblers(&["megahit".to_string()]);
        assert!(matches!(cfg, Err(FindError::Config(_))));
    }
}
