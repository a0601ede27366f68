// src/aggregate/pseudogenome.rs
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{FindError, Result};
use crate::lane::{Lane, ResolvedFile};
use crate::reference::ReferenceIndex;

/// `<id>_<reference>_concatenated.aln`
pub fn output_name(id: &str, reference: &str) -> String {
    format!(
        "{}_{}_concatenated.aln",
        id.replace('/', "_"),
        reference.replace('/', "_")
    )
}

/// Pseudogenome files to concatenate, grouped by reference name.
///
/// Each lane contributes its most recent file per reference; on equal
/// timestamps the first one seen is kept. Files missing on the storage tier
/// are passed over, so an older existing file stands in for a missing newer one.
pub fn group_by_reference(lanes: &[Lane]) -> BTreeMap<String, Vec<&ResolvedFile>> {
    let mut groups: BTreeMap<String, Vec<(&str, &ResolvedFile)>> = BTreeMap::new();

    for lane in lanes {
        for file in &lane.files {
            let Some(detail) = file.detail.as_ref() else {
                continue;
            };
            if !file.storage.is_file() {
                tracing::warn!(
                    lane = %lane.name(),
                    "{} is missing, left out of the {} alignment",
                    file.storage.display(),
                    detail.reference
                );
                continue;
            }
            let group = groups.entry(detail.reference.clone()).or_default();
            match group.iter_mut().find(|(name, _)| *name == lane.name()) {
                Some(slot) => {
                    let kept = slot.1.detail.as_ref().map(|d| d.changed);
                    if kept.map_or(true, |t| detail.changed > t) {
                        slot.1 = file;
                    }
                }
                None => group.push((lane.name(), file)),
            }
        }
    }

    groups
        .into_iter()
        .map(|(r, files)| (r, files.into_iter().map(|(_, f)| f).collect()))
        .collect()
}

/// Options for one concatenation pass.
#[derive(Debug, Clone)]
pub struct Concatenation<'a> {
    pub id: &'a str,
    pub out_dir: &'a Path,
    pub references: Option<&'a ReferenceIndex>,
    pub exclude_reference: bool,
    pub force: bool,
}

impl<'a> Concatenation<'a> {
    /// Write one alignment file per reference.
    ///
    /// Existing outputs abort the whole pass before anything is written unless
    /// `force` is set. After that, a reference that fails (ambiguous or missing
    /// in the index, unreadable input) only loses its own output.
    pub fn run(&self, lanes: &[Lane]) -> Result<Vec<(String, Result<PathBuf>)>> {
        let groups = group_by_reference(lanes);

        if !self.force {
            for reference in groups.keys() {
                let out = self.out_dir.join(output_name(self.id, reference));
                if out.exists() {
                    return Err(FindError::DestinationExists { path: out });
                }
            }
        }

        let mut results = Vec::with_capacity(groups.len());
        for (reference, files) in &groups {
            let result = self.write_reference(reference, files);
            match &result {
                Ok(p) => tracing::info!(
                    "wrote {} pseudogenome(s) for {} to {}",
                    files.len(),
                    reference,
                    p.display()
                ),
                Err(e) => tracing::error!("pseudogenome for {reference} not written: {e}"),
            }
            results.push((reference.clone(), result));
        }
        Ok(results)
    }

    fn write_reference(&self, reference: &str, files: &[&ResolvedFile]) -> Result<PathBuf> {
        let reference_fasta = if self.exclude_reference {
            None
        } else {
            let index = self.references.ok_or_else(|| {
                FindError::Config("a reference index is needed to add the reference sequence".into())
            })?;
            Some(index.resolve(reference)?)
        };

        let out = self.out_dir.join(output_name(self.id, reference));
        let tmp = out.with_extension("aln.tmp");

        let written = self.write_alignment(&tmp, reference, reference_fasta.as_deref(), files);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &out).map_err(|e| FindError::io(&out, e))?;
        Ok(out)
    }

    fn write_alignment(
        &self,
        tmp: &Path,
        reference: &str,
        reference_fasta: Option<&Path>,
        files: &[&ResolvedFile],
    ) -> Result<()> {
        let f = File::create(tmp).map_err(|e| FindError::io(tmp, e))?;
        let mut w = BufWriter::new(f);
        let io = |e| FindError::io(tmp, e);

        if let Some(fasta) = reference_fasta {
            writeln!(w, ">{reference}").map_err(io)?;
            let rf = File::open(fasta).map_err(|e| FindError::io(fasta, e))?;
            for line in BufReader::new(rf).lines() {
                let line = line.map_err(|e| FindError::io(fasta, e))?;
                if line.starts_with('>') {
                    continue;
                }
                writeln!(w, "{line}").map_err(io)?;
            }
        }

        for file in files {
            let text = fs::read_to_string(&file.storage).map_err(|e| FindError::io(&file.storage, e))?;
            w.write_all(text.as_bytes()).map_err(io)?;
            if !text.is_empty() && !text.ends_with('\n') {
                writeln!(w).map_err(io)?;
            }
        }
        w.flush().map_err(io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_follow_the_convention() {
        assert_eq!(
            output_name("12345_1", "Ref_A"),
            "12345_1_Ref_A_concatenated.aln"
        );
        assert_eq!(output_name("ids/batch", "R"), "ids_batch_R_concatenated.aln");
        assert_eq!(
            output_name("12345_1", "../Ref/B"),
            "12345_1_.._Ref_B_concatenated.aln"
        );
    }
}
