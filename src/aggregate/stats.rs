// src/aggregate/stats.rs
//! Per-lane statistics rows built from assembly-stats and bamcheck reports.
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FindError, Result};
use crate::lane::Lane;

/// Contig-size percentiles reported by assembly-stats.
pub const NXX: &[u32] = &[50, 60, 70, 80, 90, 100];

/// Bamcheck file written next to each assembly's read-mapping BAM.
pub const ASSEMBLY_BAMCHECK: &str = "contigs.mapped.sorted.bam.bc";

// ---------- assembly-stats ----------

/// Parsed `assembly-stats` output:
///
/// ```text
/// sum = 4812353, n = 115, ave = 41846.55, largest = 319024
/// N50 = 152234, n = 11
/// N_count = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyStats {
    pub total_length: Option<u64>,
    pub contigs: Option<u64>,
    pub average: Option<f64>,
    pub largest: Option<u64>,
    /// Nxx -> (contig length, contig count)
    pub nxx: BTreeMap<u32, (u64, u64)>,
    pub n_count: Option<u64>,
}

fn parse_num<T: std::str::FromStr>(path: &Path, line: usize, v: &str) -> Result<T> {
    v.trim().parse().map_err(|_| FindError::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("'{}' is not a number", v.trim()),
    })
}

fn pairs(line: &str) -> Vec<(&str, &str)> {
    line.split(',')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

impl AssemblyStats {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut stats = AssemblyStats::default();
        for (i, line) in text.lines().enumerate() {
            let ln = i + 1;
            let kv = pairs(line);
            let Some(&(key, value)) = kv.first() else {
                continue;
            };
            match key {
                "sum" => {
                    stats.total_length = Some(parse_num(path, ln, value)?);
                    for &(k, v) in &kv[1..] {
                        match k {
                            "n" => stats.contigs = Some(parse_num(path, ln, v)?),
                            "ave" => stats.average = Some(parse_num(path, ln, v)?),
                            "largest" => stats.largest = Some(parse_num(path, ln, v)?),
                            _ => {}
                        }
                    }
                }
                "N_count" => stats.n_count = Some(parse_num(path, ln, value)?),
                k if k.starts_with('N') => {
                    let Ok(pct) = k[1..].parse::<u32>() else {
                        continue;
                    };
                    let len = parse_num(path, ln, value)?;
                    let count = match kv.get(1) {
                        Some(&("n", v)) => parse_num(path, ln, v)?,
                        _ => 0,
                    };
                    stats.nxx.insert(pct, (len, count));
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    pub fn read(path: &Path) -> Result<Option<Self>> {
        match read_optional(path)? {
            Some(text) => Ok(Some(Self::parse(path, &text)?)),
            None => Ok(None),
        }
    }
}

// ---------- bamcheck ----------

/// Summary numbers (`SN` lines) and the insert-size histogram (`IS` lines)
/// from a bamcheck report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingReport {
    values: BTreeMap<String, String>,
    /// (insert size, pair count)
    insert_sizes: Vec<(u64, u64)>,
}

impl MappingReport {
    pub fn parse(text: &str) -> Self {
        let mut report = Self::default();
        for line in text.lines() {
            if let Some(l) = line.strip_prefix("SN\t") {
                let mut cols = l.split('\t');
                if let (Some(key), Some(value)) = (cols.next(), cols.next()) {
                    report.values.insert(
                        key.trim().trim_end_matches(':').to_string(),
                        value.trim().to_string(),
                    );
                }
            } else if let Some(l) = line.strip_prefix("IS\t") {
                let mut cols = l.split('\t').map(|c| c.trim().parse::<u64>());
                if let (Some(Ok(size)), Some(Ok(count))) = (cols.next(), cols.next()) {
                    report.insert_sizes.push((size, count));
                }
            }
        }
        report
    }

    pub fn read(path: &Path) -> Result<Option<Self>> {
        Ok(read_optional(path)?.map(|t| Self::parse(&t)))
    }

    pub fn get<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|v| v.parse().ok())
    }

    pub fn sequences(&self) -> Option<u64> {
        self.get("raw total sequences")
    }

    pub fn reads_mapped(&self) -> Option<u64> {
        self.get("reads mapped")
    }

    pub fn reads_paired(&self) -> Option<u64> {
        self.get("reads paired")
    }

    /// `SN` insert size average, else the mean of the `IS` histogram.
    pub fn insert_size_average(&self) -> Option<f64> {
        self.get("insert size average")
            .or_else(|| self.histogram_moments().map(|(mean, _)| mean))
    }

    pub fn insert_size_sd(&self) -> Option<f64> {
        self.get("insert size standard deviation")
            .or_else(|| self.histogram_moments().map(|(_, sd)| sd))
    }

    fn histogram_moments(&self) -> Option<(f64, f64)> {
        let pairs: u64 = self.insert_sizes.iter().map(|(_, n)| n).sum();
        if pairs == 0 {
            return None;
        }
        let total = pairs as f64;
        let mean = self
            .insert_sizes
            .iter()
            .map(|&(size, n)| size as f64 * n as f64)
            .sum::<f64>()
            / total;
        let var = self
            .insert_sizes
            .iter()
            .map(|&(size, n)| n as f64 * (size as f64 - mean).powi(2))
            .sum::<f64>()
            / total;
        Some((mean, var.sqrt()))
    }

    fn percent_of_sequences(&self, n: Option<u64>) -> Option<f64> {
        match (n, self.sequences()) {
            (Some(n), Some(total)) if total > 0 => Some(n as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|e| FindError::io(path, e))
}

fn cell<T: Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn pct_cell(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.1}")).unwrap_or_default()
}

fn float_cell(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_default()
}

// ---------- rows ----------

pub fn assembly_header() -> Vec<String> {
    let mut h: Vec<String> = [
        "Lane",
        "Assembly Type",
        "File",
        "Contig Number",
        "Total Length",
        "Average Contig Length",
        "Largest Contig",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for n in NXX {
        h.push(format!("N{n}"));
        h.push(format!("N{n} n"));
    }
    h.extend(
        [
            "N Count",
            "Sequences",
            "Reads Mapped",
            "Reads Unmapped",
            "Reads Paired",
            "Total Raw Bases",
            "Bases Mapped",
            "Average Read Length",
            "Average Quality",
            "Insert Size Average",
            "Insert Size Std Dev",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    h
}

/// One row per resolved assembly file. Missing reports leave their cells empty.
pub fn assembly_rows(lanes: &[Lane]) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    for lane in lanes {
        for file in &lane.files {
            let stats_path = PathBuf::from(format!("{}.stats", file.storage.display()));
            let stats = AssemblyStats::read(&stats_path)?.unwrap_or_default();
            let bc = match file.storage.parent() {
                Some(dir) => MappingReport::read(&dir.join(ASSEMBLY_BAMCHECK))?,
                None => None,
            }
            .unwrap_or_default();

            let mut row = vec![
                lane.name().to_string(),
                file.program.clone().unwrap_or_default(),
                file.storage
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                cell(stats.contigs),
                cell(stats.total_length),
                float_cell(stats.average),
                cell(stats.largest),
            ];
            for n in NXX {
                let v = stats.nxx.get(n);
                row.push(cell(v.map(|(len, _)| len)));
                row.push(cell(v.map(|(_, count)| count)));
            }
            row.extend([
                cell(stats.n_count),
                cell(bc.sequences()),
                cell(bc.reads_mapped()),
                cell(bc.get::<u64>("reads unmapped")),
                cell(bc.reads_paired()),
                cell(bc.get::<u64>("total length")),
                cell(bc.get::<u64>("bases mapped")),
                cell(bc.get::<f64>("average length")),
                cell(bc.get::<f64>("average quality")),
                float_cell(bc.insert_size_average()),
                float_cell(bc.insert_size_sd()),
            ]);
            rows.push(row);
        }
    }
    Ok(rows)
}

pub fn mapping_header() -> Vec<String> {
    [
        "Lane",
        "Study",
        "Sample",
        "Reference",
        "Mapper",
        "Sequences",
        "Total Raw Bases",
        "Reads Mapped",
        "Mapped %",
        "Reads Paired",
        "Paired %",
        "Bases Mapped",
        "Error Rate",
        "Insert Size Average",
        "Insert Size Std Dev",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// One row per resolved mapping BAM, read from `<bam>.bc` on the storage tier.
pub fn mapping_rows(lanes: &[Lane]) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    for lane in lanes {
        for file in &lane.files {
            let bc_path = PathBuf::from(format!("{}.bc", file.storage.display()));
            let bc = MappingReport::read(&bc_path)?.unwrap_or_default();
            let (reference, mapper) = file
                .detail
                .as_ref()
                .map(|d| (d.reference.clone(), d.mapper.clone()))
                .unwrap_or_default();

            rows.push(vec![
                lane.name().to_string(),
                lane.row.study.clone(),
                lane.row.sample.clone(),
                reference,
                mapper,
                cell(bc.sequences()),
                cell(bc.get::<u64>("total length")),
                cell(bc.reads_mapped()),
                pct_cell(bc.percent_of_sequences(bc.reads_mapped())),
                cell(bc.reads_paired()),
                pct_cell(bc.percent_of_sequences(bc.reads_paired())),
                cell(bc.get::<u64>("bases mapped")),
                cell(bc.get::<f64>("error rate")),
                float_cell(bc.insert_size_average()),
                float_cell(bc.insert_size_sd()),
            ]);
        }
    }
    Ok(rows)
}

// ---------- writer ----------

/// Writes header + rows as delimited text to a single destination.
pub struct StatsWriter {
    delimiter: u8,
    force: bool,
}

impl StatsWriter {
    pub fn new(delimiter: u8, force: bool) -> Self {
        Self { delimiter, force }
    }

    pub fn write<P: AsRef<Path>>(
        &self,
        out: P,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<()> {
        let out = out.as_ref();
        if out.exists() && !self.force {
            return Err(FindError::DestinationExists {
                path: out.to_path_buf(),
            });
        }
        let mut w = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(out)?;
        w.write_record(header)?;
        for row in rows {
            w.write_record(row)?;
        }
        w.flush().map_err(|e| FindError::io(out, e))?;
        tracing::info!("wrote {} statistics row(s) to {}", rows.len(), out.display());
        Ok(())
    }
}
