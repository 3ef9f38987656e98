//! Contact merging.
//!
//! - Grouper: group records by key, finalize into summaries
//! - Dedup: first-seen deduplication and the destination key
//! - Diagnostics: non-fatal anomalies and where they go
//! - Parallel: order-preserving parallel ingestion
//! - Pipeline: decode, validate and merge in one call

pub mod dedup;
pub mod diagnostics;
pub mod grouper;
pub mod parallel;
pub mod pipeline;

pub use dedup::{destination_key, unique_stable};
pub use diagnostics::{Diagnostic, DiagnosticSink, Discard, LogSink, Tee};
pub use grouper::{aggregate, finalize, group, Accumulators, Contribution, GroupAccumulator};
pub use parallel::group_parallel;
pub use pipeline::*;
