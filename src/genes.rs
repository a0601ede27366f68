// src/genes.rs
//! Gene and product search over annotation GFF files.
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{FindError, Result};

/// The value searched for and the GFF qualifiers it is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneQuery {
    pub query: String,
    pub qualifiers: Vec<String>,
}

impl GeneQuery {
    /// Gene alone searches `gene` and `ID`, product alone searches `product`.
    ///
    /// With both given, the gene value is searched in both the `gene` and
    /// `product` qualifiers; the product value itself is not used.
    pub fn new(gene: Option<&str>, product: Option<&str>) -> Result<Self> {
        let (query, qualifiers): (&str, &[&str]) = match (gene, product) {
            (Some(g), Some(_)) => (g, &["gene", "product"][..]),
            (Some(g), None) => (g, &["gene", "ID"][..]),
            (None, Some(p)) => (p, &["product"][..]),
            (None, None) => {
                return Err(FindError::Config(
                    "a gene or product name is needed for an annotation search".to_string(),
                ))
            }
        };
        Ok(Self {
            query: query.to_string(),
            qualifiers: qualifiers.iter().map(|q| q.to_string()).collect(),
        })
    }

    fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        let needle = self.query.to_ascii_lowercase();
        self.qualifiers.iter().any(|q| {
            attrs
                .get(q)
                .map(|v| v.to_ascii_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneSearchOutcome {
    pub output: PathBuf,
    /// matching features across all files
    pub hits: usize,
    /// files without a single match
    pub misses: usize,
}

pub trait GeneSearch {
    fn search(
        &self,
        gff_files: &[PathBuf],
        query: &GeneQuery,
        want_nucleotide: bool,
    ) -> Result<GeneSearchOutcome>;
}

/// Searches CDS features of GFF3 files carrying a trailing `##FASTA` section
/// and writes the matching sequences as FASTA.
pub struct GffGeneSearch {
    output: PathBuf,
    force: bool,
}

struct Feature {
    seqid: String,
    start: usize,
    end: usize,
    reverse: bool,
    attrs: HashMap<String, String>,
}

struct Gff {
    features: Vec<Feature>,
    sequences: HashMap<String, String>,
}

impl Gff {
    fn parse(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FindError::io(path, e))?;
        let mut features = Vec::new();
        let mut sequences: HashMap<String, String> = HashMap::new();
        let mut in_fasta = false;
        let mut current: Option<String> = None;

        for (i, line) in text.lines().enumerate() {
            if in_fasta {
                if let Some(header) = line.strip_prefix('>') {
                    let id = header.split_whitespace().next().unwrap_or_default().to_string();
                    sequences.entry(id.clone()).or_default();
                    current = Some(id);
                } else if let Some(id) = &current {
                    if let Some(seq) = sequences.get_mut(id) {
                        seq.push_str(line.trim());
                    }
                }
                continue;
            }
            if line.starts_with("##FASTA") {
                in_fasta = true;
                continue;
            }
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() != 9 {
                return Err(FindError::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    message: format!("expected 9 GFF columns, found {}", cols.len()),
                });
            }
            if cols[2] != "CDS" {
                continue;
            }
            let coord = |v: &str| {
                v.parse::<usize>().map_err(|_| FindError::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    message: format!("bad coordinate '{v}'"),
                })
            };
            let attrs = cols[8]
                .split(';')
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            features.push(Feature {
                seqid: cols[0].to_string(),
                start: coord(cols[3])?,
                end: coord(cols[4])?,
                reverse: cols[6] == "-",
                attrs,
            });
        }
        Ok(Self {
            features,
            sequences,
        })
    }

    fn feature_sequence(&self, f: &Feature) -> Option<String> {
        let seq = self.sequences.get(&f.seqid)?;
        if f.start == 0 || f.end > seq.len() || f.start > f.end {
            return None;
        }
        let region = &seq[f.start - 1..f.end];
        Some(if f.reverse {
            reverse_complement(region)
        } else {
            region.to_ascii_uppercase()
        })
    }
}

fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c.to_ascii_uppercase() {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            _ => 'N',
        })
        .collect()
}

/// Standard genetic code, codons ordered T, C, A, G at each position.
const CODON_TABLE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

pub fn translate(seq: &str) -> String {
    let base = |b: u8| match b.to_ascii_uppercase() {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    };
    let protein: String = seq
        .as_bytes()
        .chunks_exact(3)
        .map(|c| match (base(c[0]), base(c[1]), base(c[2])) {
            (Some(a), Some(b), Some(d)) => CODON_TABLE[a * 16 + b * 4 + d] as char,
            _ => 'X',
        })
        .collect();
    protein.trim_end_matches('*').to_string()
}

impl GffGeneSearch {
    pub fn new<P: Into<PathBuf>>(output: P, force: bool) -> Self {
        Self {
            output: output.into(),
            force,
        }
    }
}

impl GeneSearch for GffGeneSearch {
    fn search(
        &self,
        gff_files: &[PathBuf],
        query: &GeneQuery,
        want_nucleotide: bool,
    ) -> Result<GeneSearchOutcome> {
        if self.output.exists() && !self.force {
            return Err(FindError::DestinationExists {
                path: self.output.clone(),
            });
        }
        let out = File::create(&self.output).map_err(|e| FindError::io(&self.output, e))?;
        let mut w = BufWriter::new(out);

        let mut hits = 0;
        let mut misses = 0;
        for gff_path in gff_files {
            let gff = Gff::parse(gff_path)?;
            let label = gff_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let mut found = 0;
            for feature in gff.features.iter().filter(|f| query.matches(&f.attrs)) {
                let Some(nt) = gff.feature_sequence(feature) else {
                    tracing::warn!("{}: no sequence for matching feature on {}", gff_path.display(), feature.seqid);
                    continue;
                };
                let seq = if want_nucleotide { nt } else { translate(&nt) };
                let name = feature
                    .attrs
                    .get("ID")
                    .or_else(|| feature.attrs.get("gene"))
                    .cloned()
                    .unwrap_or_else(|| query.query.clone());
                writeln!(w, ">{label}|{name}\n{seq}").map_err(|e| FindError::io(&self.output, e))?;
                found += 1;
            }
            if found == 0 {
                misses += 1;
            }
            hits += found;
        }
        w.flush().map_err(|e| FindError::io(&self.output, e))?;

        Ok(GeneSearchOutcome {
            output: self.output.clone(),
            hits,
            misses,
        })
    }
}
