use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use lanefind::aggregate::{stats, Concatenation, StatsWriter};
use lanefind::config::{Config, FileType, PipelineKind};
use lanefind::finder::{FindOptions, Finder};
use lanefind::genes::{GeneQuery, GeneSearch, GffGeneSearch};
use lanefind::lane::{Lane, LaneStatus};
use lanefind::reference::ReferenceIndex;
use lanefind::sink::{self, ArchiveFormat, Archivist, Linker};
use lanefind::store::{IdType, LaneFilter, QcStatus, SqliteStore};
use lanefind::FindError;

/// Finds the files sequencing pipelines produced for lanes in the tracking database.
///
/// Lanes are looked up by lane, library, sample, species or study. Results are
/// listed, symlinked into a directory or packed into a tar.gz / zip archive.
#[derive(Parser)]
#[clap(version = "1.0.0")]
struct Opts {
    /// the tracking database (SQLite)
    #[clap(long, env = "LANEFIND_DB", default_value = "tracking.sqlite")]
    database: PathBuf,

    /// debug logging (RUST_LOG overrides)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Raw data files of lanes (fastq, bam, pacbio, corrected)
    Data(DataOpts),
    /// Mapped BAM files
    Map(MapOpts),
    /// SNP calls and pseudogenomes
    Snp(SnpOpts),
    /// Assemblies
    Assembly(AssemblyOpts),
    /// Annotation files, optionally searched for a gene or product
    Annotation(AnnotationOpts),
    /// Pipeline status of every lane
    Status(Common),
}

#[derive(Args)]
struct Common {
    /// lane, library, sample, species, study, or file
    #[clap(short = 't', long = "type")]
    id_type: String,

    /// the identifier, or the path of an id list with --type file
    #[clap(short, long)]
    id: String,

    /// type of the identifiers listed in a --type file list
    #[clap(long)]
    file_id_type: Option<String>,

    /// only lanes with this QC status (passed, failed, pending)
    #[clap(short, long)]
    qc: Option<String>,

    /// also show lanes whose pipeline is not marked as processed
    #[clap(long)]
    ignore_processed_flag: bool,
}

#[derive(Args)]
struct Output {
    /// show reference, mapper and date for every file
    #[clap(short, long)]
    details: bool,

    /// create symlinks to the files in this directory
    #[clap(short = 'l', long)]
    symlink: Option<PathBuf>,

    /// write the files into this archive (tar.gz unless --zip or a .zip name)
    #[clap(short, long)]
    archive: Option<PathBuf>,

    /// zip archive instead of tar.gz
    #[clap(short, long)]
    zip: bool,

    /// replace '#' with '_' in link and archive names
    #[clap(short, long)]
    rename: bool,

    /// overwrite existing output
    #[clap(short = 'F', long)]
    force: bool,
}

#[derive(Args)]
struct DataOpts {
    #[clap(flatten)]
    common: Common,
    #[clap(flatten)]
    output: Output,

    /// fastq, bam, pacbio or corrected
    #[clap(short, long, default_value = "fastq")]
    filetype: String,

    /// how many directory levels below the lane to search
    #[clap(long, default_value = "1")]
    search_depth: usize,
}

#[derive(Args)]
struct RunFilterOpts {
    /// only runs made with this mapper (repeatable)
    #[clap(short = 'M', long = "mapper", multiple_occurrences = true)]
    mappers: Vec<String>,

    /// only runs against this reference
    #[clap(short = 'R', long)]
    reference: Option<String>,
}

#[derive(Args)]
struct MapOpts {
    #[clap(flatten)]
    common: Common,
    #[clap(flatten)]
    output: Output,
    #[clap(flatten)]
    runs: RunFilterOpts,

    /// write mapping statistics to this file
    #[clap(short, long)]
    stats: Option<PathBuf>,

    /// field separator of the statistics file
    #[clap(long, default_value = ",")]
    delimiter: char,
}

#[derive(Args)]
struct SnpOpts {
    #[clap(flatten)]
    common: Common,
    #[clap(flatten)]
    output: Output,
    #[clap(flatten)]
    runs: RunFilterOpts,

    /// vcf or pseudogenome
    #[clap(short, long, default_value = "vcf")]
    filetype: String,

    /// concatenate pseudogenomes into one alignment per reference
    #[clap(short, long)]
    pseudogenome: bool,

    /// leave the reference sequence out of the alignments
    #[clap(short = 'x', long)]
    exclude_reference: bool,

    /// tab-separated index of reference names and fasta files
    #[clap(long, env = "LANEFIND_REFERENCES")]
    reference_index: Option<PathBuf>,

    /// directory for the alignment files
    #[clap(short, long, default_value = ".")]
    outdir: PathBuf,
}

#[derive(Args)]
struct AssemblyOpts {
    #[clap(flatten)]
    common: Common,
    #[clap(flatten)]
    output: Output,

    /// scaffold, contigs or all
    #[clap(short, long, default_value = "scaffold")]
    filetype: String,

    /// only assemblies made by this assembler (repeatable)
    #[clap(short = 'P', long = "program", multiple_occurrences = true)]
    programs: Vec<String>,

    /// write assembly statistics to this file
    #[clap(short, long)]
    stats: Option<PathBuf>,

    /// field separator of the statistics file
    #[clap(long, default_value = ",")]
    delimiter: char,
}

#[derive(Args)]
struct AnnotationOpts {
    #[clap(flatten)]
    common: Common,
    #[clap(flatten)]
    output: Output,

    /// gff, faa, ffn, fna or gbk
    #[clap(short, long, default_value = "gff")]
    filetype: String,

    /// only annotations of assemblies made by this assembler (repeatable)
    #[clap(short = 'P', long = "program", multiple_occurrences = true)]
    programs: Vec<String>,

    /// search the annotations for this gene
    #[clap(short, long)]
    gene: Option<String>,

    /// search the annotations for this product
    #[clap(long)]
    product: Option<String>,

    /// write nucleotide instead of protein sequences
    #[clap(short, long)]
    nucleotides: bool,

    /// fasta file for the search hits
    #[clap(short, long)]
    output_file: Option<PathBuf>,
}

// ---------- shared helpers ----------

/// Identifiers and their type. A `file` list without `--file-id-type` is
/// rejected here, before the database is opened.
fn resolve_ids(common: &Common) -> Result<(Vec<String>, IdType)> {
    if common.id_type.eq_ignore_ascii_case("file") {
        let Some(ft) = common.file_id_type.as_deref() else {
            return Err(FindError::Config(
                "--type file needs --file-id-type to say what the listed ids are".to_string(),
            )
            .into());
        };
        let id_type: IdType = ft.parse()?;
        let ids = lanefind::read_ids(&common.id)?;
        return Ok((ids, id_type));
    }
    Ok((vec![common.id.clone()], common.id_type.parse()?))
}

fn find_options(common: &Common, kind: PipelineKind, filetype: &str) -> Result<FindOptions> {
    let mut opts = FindOptions::new(kind);
    opts.filetype = filetype.parse::<FileType>()?;
    opts.qc = common.qc.as_deref().map(str::parse::<QcStatus>).transpose()?;
    opts.ignore_processed = common.ignore_processed_flag;
    Ok(opts)
}

fn archive_format(output: &Output, archive: &Path) -> ArchiveFormat {
    let is_zip = archive
        .extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if output.zip || is_zip {
        ArchiveFormat::Zip
    } else {
        ArchiveFormat::TarGz
    }
}

fn delimiter(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("the statistics delimiter must be a single ASCII character, got '{c}'");
    }
    Ok(c as u8)
}

/// Hand the resolved files to the requested sink, or list them.
fn emit(lanes: &[Lane], output: &Output, list_by_default: bool) -> Result<()> {
    if lanes.is_empty() {
        eprintln!("No files found.");
        return Ok(());
    }
    let entries = sink::entries(lanes, output.rename);

    if let Some(dir) = &output.symlink {
        let n = Linker::new(output.force).link(&entries, dir)?;
        println!("{n} symlink(s) created in {}", dir.display());
    }
    if let Some(archive) = &output.archive {
        let format = archive_format(output, archive);
        let n = Archivist::new(format, output.force).write(&entries, archive)?;
        println!("{n} file(s) archived in {}", archive.display());
    }
    if output.symlink.is_none() && output.archive.is_none() && list_by_default {
        let stdout = io::stdout();
        let mut w = stdout.lock();
        sink::write_listing(&mut w, lanes, output.details)?;
        w.flush()?;
    }
    Ok(())
}

fn open_store(database: &Path) -> Result<SqliteStore> {
    SqliteStore::open(database)
        .with_context(|| format!("cannot open tracking database {}", database.display()))
}

// ---------- commands ----------

fn data(database: &Path, o: &DataOpts) -> Result<()> {
    let (ids, id_type) = resolve_ids(&o.common)?;
    let find = find_options(&o.common, PipelineKind::Data, &o.filetype)?;
    let config = Config::new(database).with_search_depth(o.search_depth);

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).find_lanes(&ids, id_type, &find)?;
    emit(&lanes, &o.output, true)
}

fn map(database: &Path, o: &MapOpts) -> Result<()> {
    let (ids, id_type) = resolve_ids(&o.common)?;
    let mut find = find_options(&o.common, PipelineKind::Mapping, "bam")?;
    find.filters.mappers = o.runs.mappers.iter().cloned().collect();
    find.filters.reference = o.runs.reference.clone();
    let config = Config::new(database);

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).find_lanes(&ids, id_type, &find)?;

    if let Some(out) = &o.stats {
        let rows = stats::mapping_rows(&lanes)?;
        StatsWriter::new(delimiter(o.delimiter)?, o.output.force).write(
            out,
            &stats::mapping_header(),
            &rows,
        )?;
    }
    emit(&lanes, &o.output, o.stats.is_none())
}

fn snp(database: &Path, o: &SnpOpts) -> Result<()> {
    let (ids, id_type) = resolve_ids(&o.common)?;
    let filetype = if o.pseudogenome { "pseudogenome" } else { o.filetype.as_str() };
    let mut find = find_options(&o.common, PipelineKind::Snp, filetype)?;
    find.filters.mappers = o.runs.mappers.iter().cloned().collect();
    find.filters.reference = o.runs.reference.clone();

    let mut config = Config::new(database);
    if let Some(index) = &o.reference_index {
        config = config.with_reference_index(index);
    }
    if o.pseudogenome && !o.exclude_reference && config.reference_index.is_none() {
        bail!(FindError::Config(
            "--pseudogenome needs --reference-index unless --exclude-reference is given"
                .to_string()
        ));
    }
    let references = match &config.reference_index {
        Some(path) if o.pseudogenome && !o.exclude_reference => Some(ReferenceIndex::load(path)?),
        _ => None,
    };

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).find_lanes(&ids, id_type, &find)?;

    if !o.pseudogenome {
        return emit(&lanes, &o.output, true);
    }
    if lanes.is_empty() {
        eprintln!("No pseudogenomes found.");
        return Ok(());
    }

    let results = Concatenation {
        id: &o.common.id,
        out_dir: &o.outdir,
        references: references.as_ref(),
        exclude_reference: o.exclude_reference,
        force: o.output.force,
    }
    .run(&lanes)?;

    let mut failed = 0;
    for (reference, result) in &results {
        match result {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                eprintln!("{reference}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} pseudogenome alignment(s) could not be written", results.len());
    }
    Ok(())
}

fn assembly(database: &Path, o: &AssemblyOpts) -> Result<()> {
    let (ids, id_type) = resolve_ids(&o.common)?;
    let mut find = find_options(&o.common, PipelineKind::Assembly, &o.filetype)?;
    find.filters.programs = o.programs.iter().cloned().collect();
    let config = Config::new(database).with_assemblers(&o.programs)?;

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).find_lanes(&ids, id_type, &find)?;

    if let Some(out) = &o.stats {
        let rows = stats::assembly_rows(&lanes)?;
        StatsWriter::new(delimiter(o.delimiter)?, o.output.force).write(
            out,
            &stats::assembly_header(),
            &rows,
        )?;
    }
    emit(&lanes, &o.output, o.stats.is_none())
}

fn annotation(database: &Path, o: &AnnotationOpts) -> Result<()> {
    let (ids, id_type) = resolve_ids(&o.common)?;
    let mut find = find_options(&o.common, PipelineKind::Annotation, &o.filetype)?;
    find.filters.programs = o.programs.iter().cloned().collect();
    let searching = o.gene.is_some() || o.product.is_some();
    if searching && find.filetype != FileType::Gff {
        bail!(FindError::Config("gene and product searches need --filetype gff".to_string()));
    }
    let config = Config::new(database).with_assemblers(&o.programs)?;

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).find_lanes(&ids, id_type, &find)?;

    if !searching {
        return emit(&lanes, &o.output, true);
    }
    let query = GeneQuery::new(o.gene.as_deref(), o.product.as_deref())?;
    let out = o
        .output_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.fasta", query.query.replace('/', "_"))));
    let gffs: Vec<PathBuf> = lanes
        .iter()
        .flat_map(|l| l.files.iter().map(|f| f.storage.clone()))
        .collect();

    let outcome = GffGeneSearch::new(&out, o.output.force).search(&gffs, &query, o.nucleotides)?;
    println!(
        "{} match(es) for '{}' in {} file(s), {} file(s) without a match; sequences written to {}",
        outcome.hits,
        query.query,
        gffs.len(),
        outcome.misses,
        outcome.output.display()
    );
    Ok(())
}

fn status(database: &Path, common: &Common) -> Result<()> {
    let (ids, id_type) = resolve_ids(common)?;
    let filter = LaneFilter {
        qc: common.qc.as_deref().map(str::parse::<QcStatus>).transpose()?,
        required: None,
    };
    let config = Config::new(database);

    let store = open_store(database)?;
    let lanes = Finder::new(&store, &config).lanes(&ids, id_type, PipelineKind::Data, &filter)?;
    if lanes.is_empty() {
        eprintln!("No lanes found.");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut w = stdout.lock();
    writeln!(w, "{}", LaneStatus::header().join("\t"))?;
    for lane in &lanes {
        writeln!(w, "{}", LaneStatus::new(lane).row().join("\t"))?;
    }
    w.flush()?;
    Ok(())
}

fn run(opts: Opts) -> Result<()> {
    let db = opts.database.as_path();
    match &opts.command {
        Command::Data(o) => data(db, o),
        Command::Map(o) => map(db, o),
        Command::Snp(o) => snp(db, o),
        Command::Assembly(o) => assembly(db, o),
        Command::Annotation(o) => annotation(db, o),
        Command::Status(c) => status(db, c),
    }
}

fn main() {
    let opts = Opts::parse();
    lanefind::init_tracing(opts.verbose);

    if let Err(e) = run(opts) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
