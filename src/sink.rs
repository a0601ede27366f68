// src/sink.rs
//! Where resolved files end up: a listing, a directory of symlinks, or an archive.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::{FindError, Result};
use crate::lane::Lane;

pub const CHECKSUM_MANIFEST: &str = "md5sums.txt";

/// One file to collect, and the name it gets at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// symlink-tier path, the link target
    pub path: PathBuf,
    /// storage-tier path, read when archiving
    pub storage: PathBuf,
    pub name: String,
}

/// Destination names for every resolved file, in lane order.
///
/// Names are prefixed with the lane (and producing program) unless the file
/// name already starts with the lane name. With `rename`, `#` becomes `_`.
pub fn entries(lanes: &[Lane], rename: bool) -> Vec<Entry> {
    let mut out = Vec::new();
    for lane in lanes {
        for file in &lane.files {
            let base = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut name = if base.starts_with(lane.name()) {
                base
            } else {
                match &file.program {
                    Some(p) => format!("{}_{}_{}", lane.name(), p, base),
                    None => format!("{}_{}", lane.name(), base),
                }
            };
            if rename {
                name = name.replace('#', "_");
            }
            out.push(Entry {
                path: file.path.clone(),
                storage: file.storage.clone(),
                name,
            });
        }
    }
    out
}

/// Print one resolved path per line; with `details`, add reference, mapper and
/// run timestamp where the pipeline recorded them.
pub fn write_listing<W: Write>(w: &mut W, lanes: &[Lane], details: bool) -> io::Result<()> {
    for lane in lanes {
        for file in &lane.files {
            match (&file.detail, details) {
                (Some(d), true) => writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    file.path.display(),
                    d.reference,
                    d.mapper,
                    d.changed.format("%d-%m-%Y")
                )?,
                _ => writeln!(w, "{}", file.path.display())?,
            }
        }
    }
    Ok(())
}

/// Fails when two entries share a destination name.
pub fn check_unique(entries: &[Entry]) -> Result<()> {
    let mut seen = HashSet::new();
    for e in entries {
        if !seen.insert(e.name.as_str()) {
            return Err(FindError::DuplicateDestination {
                name: e.name.clone(),
            });
        }
    }
    Ok(())
}

pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

// ---------- symlinks ----------

pub struct Linker {
    force: bool,
}

impl Linker {
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Link every entry into `dest`. Existing links are only replaced with `force`,
    /// and a collision is reported before any link is made.
    pub fn link(&self, entries: &[Entry], dest: &Path) -> Result<usize> {
        check_unique(entries)?;
        if !self.force {
            for e in entries {
                let target = dest.join(&e.name);
                if target.symlink_metadata().is_ok() {
                    return Err(FindError::DestinationExists { path: target });
                }
            }
        }
        fs::create_dir_all(dest).map_err(|e| FindError::io(dest, e))?;

        for e in entries {
            let target = dest.join(&e.name);
            if self.force && target.symlink_metadata().is_ok() {
                fs::remove_file(&target).map_err(|err| FindError::io(&target, err))?;
            }
            make_link(&e.path, &target)?;
        }
        tracing::info!("linked {} file(s) into {}", entries.len(), dest.display());
        Ok(entries.len())
    }
}

#[cfg(unix)]
fn make_link(src: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, target).map_err(|e| FindError::io(target, e))
}

#[cfg(not(unix))]
fn make_link(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target)
        .map(|_| ())
        .map_err(|e| FindError::io(target, e))
}

// ---------- archives ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

pub struct Archivist {
    format: ArchiveFormat,
    force: bool,
}

impl Archivist {
    pub fn new(format: ArchiveFormat, force: bool) -> Self {
        Self { format, force }
    }

    /// Top-level folder inside the archive: the file name without its extension.
    fn folder_name(&self, dest: &Path) -> String {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());
        let suffix = format!(".{}", self.format.extension());
        name.strip_suffix(&suffix).unwrap_or(&name).to_string()
    }

    /// Write all readable entries plus an md5 manifest to `dest`.
    ///
    /// Entries missing on the storage tier are skipped with a warning.
    /// Returns the number of files archived.
    pub fn write(&self, entries: &[Entry], dest: &Path) -> Result<usize> {
        check_unique(entries)?;
        if dest.exists() && !self.force {
            return Err(FindError::DestinationExists {
                path: dest.to_path_buf(),
            });
        }
        if let Some(par) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(par).map_err(|e| FindError::io(par, e))?;
        }

        let present: Vec<&Entry> = entries
            .iter()
            .filter(|e| {
                let ok = e.storage.is_file();
                if !ok {
                    tracing::warn!("{} is missing, not archived", e.storage.display());
                }
                ok
            })
            .collect();

        let mut manifest = String::new();
        for e in &present {
            let sum = md5_file(&e.storage).map_err(|err| FindError::io(&e.storage, err))?;
            manifest.push_str(&format!("{}\t{}\n", e.name, sum));
        }

        // write to tmp then rename, so a failed run leaves no partial archive
        let tmp = PathBuf::from(format!("{}.tmp", dest.display()));
        let folder = self.folder_name(dest);
        let written = match self.format {
            ArchiveFormat::TarGz => write_tar(&tmp, &folder, &present, &manifest),
            ArchiveFormat::Zip => write_zip(&tmp, &folder, &present, &manifest),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        let _ = fs::remove_file(dest);
        fs::rename(&tmp, dest).map_err(|e| FindError::io(dest, e))?;

        tracing::info!("archived {} file(s) to {}", present.len(), dest.display());
        Ok(present.len())
    }
}

fn write_tar(tmp: &Path, folder: &str, entries: &[&Entry], manifest: &str) -> Result<()> {
    let io_err = |e| FindError::io(tmp, e);
    let f = File::create(tmp).map_err(io_err)?;
    let mut builder = tar::Builder::new(GzEncoder::new(f, Compression::default()));
    builder.follow_symlinks(true);

    for e in entries {
        builder
            .append_path_with_name(&e.storage, format!("{folder}/{}", e.name))
            .map_err(|err| FindError::io(&e.storage, err))?;
    }

    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("{folder}/{CHECKSUM_MANIFEST}"),
            manifest.as_bytes(),
        )
        .map_err(io_err)?;

    let gz = builder.into_inner().map_err(io_err)?;
    gz.finish().map_err(io_err)?;
    Ok(())
}

fn write_zip(tmp: &Path, folder: &str, entries: &[&Entry], manifest: &str) -> Result<()> {
    let opts = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let f = File::create(tmp).map_err(|e| FindError::io(tmp, e))?;
    let mut zw = zip::ZipWriter::new(f);

    for e in entries {
        zw.start_file(format!("{folder}/{}", e.name), opts)?;
        let mut rf = File::open(&e.storage).map_err(|err| FindError::io(&e.storage, err))?;
        io::copy(&mut rf, &mut zw).map_err(|err| FindError::io(&e.storage, err))?;
    }

    zw.start_file(format!("{folder}/{CHECKSUM_MANIFEST}"), opts)?;
    zw.write_all(manifest.as_bytes())
        .map_err(|e| FindError::io(tmp, e))?;
    zw.finish()?;
    Ok(())
}
