//! REST API types.
//!
//! Groups are returned exactly as the pipeline produced them: group key to
//! `{ labels, variables, destinations }`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::merge::pipeline::PipelineOutcome;
use crate::merge::Diagnostic;
use crate::models::MergeResult;

/// Response sent after a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" when nothing was reported, "warning" otherwise
    pub status: String,

    /// Group key to merged contact
    pub groups: MergeResult,

    pub metadata: ResponseMetadata,
}

/// Metadata about the merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_groups: usize,

    /// Rows dropped for a blank group key
    pub skipped_rows: usize,

    /// Diagnostics reported while grouping
    pub warnings: Vec<Diagnostic>,

    /// Present when the input was a CSV upload
    pub csv_info: Option<CsvMetadata>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<PipelineOutcome> for MergeResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        let status = if outcome.diagnostics.is_empty() {
            "ready"
        } else {
            "warning"
        };

        MergeResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: ResponseMetadata {
                total_groups: outcome.groups.len(),
                skipped_rows: outcome.skipped_rows,
                warnings: outcome.diagnostics,
                csv_info: outcome.csv_info.map(|info| CsvMetadata {
                    encoding: info.encoding,
                    delimiter: info.delimiter.to_string(),
                    row_count: info.row_count,
                    columns: info.headers,
                }),
            },
            groups: outcome.groups,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "groups": {},
        "metadata": {
            "totalGroups": 0,
            "skippedRows": 0,
            "warnings": [],
            "csvInfo": null
        }
    })
}
