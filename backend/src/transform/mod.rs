//! Transformation module.
//!
//! - Cleaner: POSDATA scaling, tenure, PNAME merge
//! - Pivot: group-by and unstack primitives
//! - Grouper: the eleven RDPAC tables
//! - Custom: user-chosen group-bys
//! - Pipeline: orchestration with progress logs

pub mod cleaner;
pub mod custom;
pub mod grouper;
pub mod pipeline;
pub mod pivot;

pub use cleaner::{CleanOptions, CleanStats, Cleaned};
pub use custom::{AggregationMode, CustomRequest, Method};
pub use grouper::{group_rdpac, RdpacReport, RDPAC_SHEET_NAMES};
pub use pivot::{group_aggregate, pivot, summarize, Aggregation};
