//! Error types for the unique-contact pipeline.
//!
//! The aggregation core itself never fails: anomalies in the data are
//! reported as diagnostics (see [`crate::merge::diagnostics`]). Everything
//! around it returns one of these errors:
//!
//! - [`CsvError`] - CSV decoding errors
//! - [`ArgumentError`] - rejected merge arguments (null, empty, malformed)
//! - [`PresetError`] - selector preset registry errors
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Conversion is automatic via `From` implementations, so `?` works across
//! layers.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV decoding.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the input.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Input could not be decoded with the detected encoding.
    #[error("Failed to decode content as {encoding}: {message}")]
    EncodingError { encoding: String, message: String },

    /// Malformed CSV content.
    #[error("Invalid CSV at line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Nothing to read.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header row missing or blank.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::IoError(io),
            kind => CsvError::ParseError {
                line,
                message: format!("{:?}", kind),
            },
        }
    }
}

// =============================================================================
// Argument Errors
// =============================================================================

/// Errors raised at the argument boundary, before any record is merged.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// A required argument was absent or explicitly null.
    #[error("Invalid value for \"{name}\" parameter (position {position}): argument must not be null")]
    Null { name: String, position: usize },

    /// A single-field selector is empty or whitespace.
    #[error("Selector '{0}' must name a field")]
    EmptySelector(String),

    /// Request failed JSON Schema validation.
    #[error("Request does not match schema: {}", .errors.join("; "))]
    Schema { errors: Vec<String> },

    /// Request could not be deserialized.
    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// Preset Registry Errors
// =============================================================================

/// Errors from the selector preset registry.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Preset not found.
    #[error("Preset not found: {0}")]
    NotFound(String),

    /// Stored preset has unusable selectors.
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    /// No stored preset references enough of the CSV columns.
    #[error("No stored preset matches columns: {}", .columns.join(", "))]
    NoCompatible { columns: Vec<String> },

    /// IO error.
    #[error("Preset IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Preset JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Returned by the functions in [`crate::merge::pipeline`]. Wraps the
/// lower-level errors; the merge step itself contributes none.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Argument rejected.
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    /// Preset registry error.
    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),

    /// IO error outside CSV decoding (request files, output).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error outside request parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Bind or serve failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for argument validation.
pub type ArgumentResult<T> = Result<T, ArgumentError>;

/// Result type for preset registry operations.
pub type PresetResult<T> = Result<T, PresetError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // ArgumentError -> PipelineError -> ServerError
        let arg_err = ArgumentError::EmptySelector("group_by_field".into());
        let pipeline_err: PipelineError = arg_err.into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("group_by_field"));
    }

    #[test]
    fn test_no_compatible_lists_columns() {
        let err = PresetError::NoCompatible {
            columns: vec!["phone".into(), "email".into()],
        };
        assert_eq!(err.to_string(), "No stored preset matches columns: phone, email");
    }

    #[test]
    fn test_null_argument_message() {
        let err = ArgumentError::Null {
            name: "csv".into(),
            position: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"csv\""));
        assert!(msg.contains("argument must not be null"));
    }

    #[test]
    fn test_schema_errors_joined() {
        let err = ArgumentError::Schema {
            errors: vec!["first".into(), "second".into()],
        };
        assert!(err.to_string().contains("first; second"));
    }
}
