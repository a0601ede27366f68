pub mod aggregate;
pub mod config;
pub mod error;
pub mod finder;
pub mod genes;
pub mod lane;
pub mod reference;
pub mod sink;
pub mod store;

pub use config::{Config, FileType, Pipeline, PipelineKind};
pub use error::{FindError, Result};
pub use finder::{FindOptions, Finder};
pub use lane::{Filters, Lane, ResolvedFile};
pub use store::{IdType, SqliteStore, TrackingStore};

use std::fs;
use std::path::Path;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Log to stderr; `RUST_LOG` overrides the default level.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        let default = if verbose { "debug" } else { "info" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Identifiers listed one per line in `path`; blank lines and `#` comments are skipped.
pub fn read_ids<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| FindError::io(path, e))?;
    let ids: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect();
    if ids.is_empty() {
        return Err(FindError::Config(format!(
            "no identifiers found in {}",
            path.display()
        )));
    }
    Ok(ids)
}
