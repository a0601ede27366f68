// src/finder.rs
use std::collections::HashSet;

use crate::config::{Config, FileType, PipelineKind};
use crate::error::Result;
use crate::lane::{Filters, Lane, Strategy};
use crate::store::{IdType, LaneFilter, QcStatus, TrackingStore};

/// What to look for, beyond the identifiers themselves.
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub kind: PipelineKind,
    pub filetype: FileType,
    pub filters: Filters,
    pub qc: Option<QcStatus>,
    /// list lanes even when the pipeline's processed bit is not set yet
    pub ignore_processed: bool,
}

impl FindOptions {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            filetype: kind.default_filetype(),
            filters: Filters::default(),
            qc: None,
            ignore_processed: false,
        }
    }

    pub fn lane_filter(&self) -> LaneFilter {
        LaneFilter {
            qc: self.qc,
            required: (!self.ignore_processed).then(|| self.kind.required_pipeline()),
        }
    }
}

/// Turns identifiers into lanes and drives file resolution over them.
pub struct Finder<'a> {
    store: &'a dyn TrackingStore,
    config: &'a Config,
}

impl<'a> Finder<'a> {
    pub fn new(store: &'a dyn TrackingStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Lanes for all `ids`, in store order, each lane once.
    pub fn lanes(
        &self,
        ids: &[String],
        id_type: IdType,
        kind: PipelineKind,
        filter: &LaneFilter,
    ) -> Result<Vec<Lane>> {
        let mut seen = HashSet::new();
        let mut lanes = Vec::new();
        for id in ids {
            let rows = self.store.lanes(id, id_type, filter)?;
            if rows.is_empty() {
                tracing::info!("no lanes found for {id_type} '{id}'");
            }
            for row in rows {
                if seen.insert(row.id) {
                    lanes.push(Lane::new(row, kind));
                }
            }
        }
        Ok(lanes)
    }

    /// Lanes for `ids` with their files resolved.
    ///
    /// A lane whose resolution fails keeps the failure as a warning and the
    /// batch carries on. Lanes left without files are dropped from the result.
    pub fn find_lanes(
        &self,
        ids: &[String],
        id_type: IdType,
        opts: &FindOptions,
    ) -> Result<Vec<Lane>> {
        let strategy = Strategy::for_kind(opts.kind, opts.filetype)?;
        let lanes = self.lanes(ids, id_type, opts.kind, &opts.lane_filter())?;

        let mut found = Vec::with_capacity(lanes.len());
        for mut lane in lanes {
            if let Err(e) = strategy.resolve(&mut lane, self.store, &opts.filters, self.config) {
                lane.warn(format!("file resolution failed: {e}"));
            }
            if lane.files.is_empty() {
                tracing::info!("{}: no {} files found", lane.name(), opts.filetype);
                continue;
            }
            found.push(lane);
        }
        Ok(found)
    }
}
