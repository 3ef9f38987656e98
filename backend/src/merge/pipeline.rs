//! High-level pipeline API: decode, validate, group, finalize.
//!
//! # Example
//!
//! ```rust,ignore
//! use unique_contact::{merge_csv, MergeOptions, Selectors};
//! use std::path::Path;
//!
//! let selectors = Selectors::new("name", "code", "destination")
//!     .with_labels(["code", "destination"])
//!     .with_variables(["name"]);
//!
//! let outcome = merge_csv(Path::new("contacts.csv"), &selectors, &MergeOptions::default())?;
//! println!("Merged {} contacts", outcome.groups.len());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::diagnostics::{Diagnostic, LogSink, Tee};
use super::grouper::finalize;
use super::parallel::group_parallel;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{MergeResult, Record, Selectors};
use crate::parser::{parse_bytes_auto, parse_file_auto, ParseResult};
use crate::presets::{PresetRegistry, DEFAULT_PRESET_DIR};
use crate::validation::{parse_request, validate_selectors};

/// Environment variable overriding [`MergeOptions::workers`].
pub const ENV_WORKERS: &str = "UNIQUE_CONTACT_WORKERS";

/// Environment variable overriding [`MergeOptions::preset_dir`].
pub const ENV_PRESET_DIR: &str = "UNIQUE_CONTACT_PRESET_DIR";

/// Options for the merge pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Threads used to read records; 1 keeps everything on the caller thread
    pub workers: usize,

    /// Where selector presets live
    pub preset_dir: PathBuf,

    /// Skip the selector check (already done by the caller)
    pub skip_validation: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            preset_dir: PathBuf::from(DEFAULT_PRESET_DIR),
            skip_validation: false,
        }
    }
}

impl MergeOptions {
    /// Defaults overridden by `UNIQUE_CONTACT_*` environment variables.
    ///
    /// Unparseable or zero worker counts are ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(workers) = std::env::var(ENV_WORKERS)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            options.workers = workers;
        }
        if let Ok(dir) = std::env::var(ENV_PRESET_DIR) {
            if !dir.trim().is_empty() {
                options.preset_dir = PathBuf::from(dir);
            }
        }

        options
    }
}

/// Result of a complete merge run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Group key to merged summary
    pub groups: MergeResult,

    /// Records dropped for a blank group key
    pub skipped_rows: usize,

    /// Everything the aggregator reported, in input order
    pub diagnostics: Vec<Diagnostic>,

    /// CSV metadata, when the records came from CSV
    pub csv_info: Option<CsvInfo>,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.records.len(),
        }
    }
}

/// Merge the contacts of a CSV file.
///
/// 1. Parses the CSV with encoding and delimiter auto-detection
/// 2. Groups the records by the selectors
/// 3. Finalizes each group
pub fn merge_csv(
    path: &Path,
    selectors: &Selectors,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_file_auto(path)?;
    merge_parsed(parsed, selectors, options)
}

/// Same as [`merge_csv`] for CSV bytes.
pub fn merge_bytes(
    bytes: &[u8],
    selectors: &Selectors,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_info(format!("📖 Reading {} bytes of CSV...", bytes.len()));
    let parsed = parse_bytes_auto(bytes)?;
    merge_parsed(parsed, selectors, options)
}

/// Merge already-decoded CSV data.
pub fn merge_parsed(
    parsed: ParseResult,
    selectors: &Selectors,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.records.len()));

    let csv_info = CsvInfo::from(&parsed);

    let missing: Vec<&str> = selectors
        .referenced_fields()
        .into_iter()
        .filter(|f| !parsed.headers.iter().any(|h| h == f))
        .collect();
    if !missing.is_empty() {
        // Not an error: missing fields read as empty strings.
        log_warning(format!("Columns not in CSV header: {}", missing.join(", ")));
    }

    let mut outcome = merge_records(&parsed.records, selectors, options)?;
    outcome.csv_info = Some(csv_info);
    Ok(outcome)
}

/// Merge CSV bytes with the stored preset that best fits their header.
pub fn merge_bytes_with_best_preset(
    bytes: &[u8],
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_info(format!("📖 Reading {} bytes of CSV...", bytes.len()));
    let parsed = parse_bytes_auto(bytes)?;
    merge_parsed_with_best_preset(parsed, options)
}

/// Same as [`merge_bytes_with_best_preset`] for a CSV file.
pub fn merge_csv_with_best_preset(
    path: &Path,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_file_auto(path)?;
    merge_parsed_with_best_preset(parsed, options)
}

/// Pick the best compatible preset for `parsed.headers` and merge with it.
pub fn merge_parsed_with_best_preset(
    parsed: ParseResult,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    log_info("Looking for a compatible preset...");
    let mut registry = PresetRegistry::with_dir(&options.preset_dir);
    let (preset, score) = match registry.select_for(&parsed.headers) {
        Ok(found) => found,
        Err(e) => {
            log_error(e.to_string());
            return Err(e.into());
        }
    };
    log_success(format!(
        "Using preset {} ({}, {:.0}% of fields present)",
        preset.name,
        preset.id,
        score * 100.0
    ));

    merge_parsed(parsed, &preset.selectors, options)
}

/// Merge records that are already in memory.
pub fn merge_records(
    records: &[Record],
    selectors: &Selectors,
    options: &MergeOptions,
) -> PipelineResult<PipelineOutcome> {
    if !options.skip_validation {
        validate_selectors(selectors)?;
    }

    log_info(format!("📦 Grouping {} records by '{}'...", records.len(), selectors.group_by_field));
    log_info_indent(format!("labels: [{}]", selectors.label_fields.join(", ")), 1);
    log_info_indent(format!("variables: [{}]", selectors.variable_fields.join(", ")), 1);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let accumulators = {
        let mut sink = Tee(LogSink, &mut diagnostics);
        group_parallel(records, selectors, options.workers, &mut sink)
    };
    let groups = finalize(&accumulators);

    if accumulators.skipped() > 0 {
        log_warning(format!("{} rows skipped (empty group key)", accumulators.skipped()));
    }
    log_success(format!("{} unique contacts", groups.len()));

    Ok(PipelineOutcome {
        groups,
        skipped_rows: accumulators.skipped(),
        diagnostics,
        csv_info: None,
    })
}

/// Validate a JSON merge request and merge it.
pub fn merge_request(data: &Value, options: &MergeOptions) -> PipelineResult<PipelineOutcome> {
    let request = parse_request(data)?;
    let options = MergeOptions {
        skip_validation: true,
        ..options.clone()
    };
    merge_records(&request.records, &request.selectors, &options)
}

/// Read a JSON merge request from a file and merge it.
pub fn merge_request_file(path: &Path, options: &MergeOptions) -> PipelineResult<PipelineOutcome> {
    let content = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&content)?;
    merge_request(&data, options)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
