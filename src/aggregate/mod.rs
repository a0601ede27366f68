// src/aggregate/mod.rs
pub mod pseudogenome;
pub mod stats;

pub use pseudogenome::{group_by_reference, output_name, Concatenation};
pub use stats::{AssemblyStats, MappingReport, StatsWriter};
