//! # unique-contact - merge duplicate contact rows
//!
//! Takes the rows of a decoded CSV table, groups them by one field, and
//! merges every group into a single contact: distinct labels, distinct
//! destinations, and last-write-wins variables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Grouper   │────▶│  Contacts   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (2 passes)  │     │  (by key)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                          diagnostics ─▶ stdout + SSE
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use unique_contact::{aggregate, Discard, Record, Selectors};
//!
//! let selectors = Selectors::new("name", "code", "destination")
//!     .with_labels(["code", "destination"])
//!     .with_variables(["name"]);
//!
//! let records: Vec<Record> = load_rows();
//! let contacts = aggregate(&records, &selectors, &mut Discard);
//! println!("{} unique contacts", contacts.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Records, selectors, summaries
//! - [`merge`] - Grouping, dedup, diagnostics, pipeline
//! - [`parser`] - CSV parsing with auto-detection
//! - [`validation`] - Merge request validation
//! - [`presets`] - Stored selector sets
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Merging
pub mod merge;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Presets
pub mod presets;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ArgumentError,
    CsvError,
    PipelineError,
    PresetError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Destination,
    MergeResult,
    Record,
    Selectors,
    Summary,
};

// =============================================================================
// Re-exports - Merge
// =============================================================================

pub use merge::{
    aggregate,
    finalize,
    group,
    group_parallel,
    Accumulators,
    Diagnostic,
    DiagnosticSink,
    Discard,
    LogSink,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use merge::pipeline::{
    merge_bytes,
    merge_bytes_with_best_preset,
    merge_csv,
    merge_csv_with_best_preset,
    merge_records,
    merge_request,
    merge_request_file,
    CsvInfo,
    MergeOptions,
    PipelineOutcome,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_file_auto,
    parse_str,
    ParseResult,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid_request,
    parse_request,
    validate_request,
    MergeRequest,
};

// =============================================================================
// Re-exports - Presets
// =============================================================================

pub use presets::{PresetRegistry, StoredPreset};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, MergeResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
