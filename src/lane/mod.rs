// src/lane/mod.rs
pub mod lane;
pub mod pipeline_run;
pub mod status;
pub mod status_file;
pub mod strategy;

pub use lane::{Lane, ResolvedFile, RunDetail};
pub use pipeline_run::PipelineRun;
pub use status::{pipeline_status, DisplayStatus, LaneStatus};
pub use status_file::StatusFile;
pub use strategy::{Filters, Strategy};
