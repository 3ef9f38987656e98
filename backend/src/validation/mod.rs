//! Argument validation for merge requests.
//!
//! The aggregator assumes well-formed input. This module is the boundary
//! that makes sure it gets it:
//!
//! 1. [`reject_null_arguments`] - each of the six arguments is present and
//!    not null
//! 2. [`validate_request`] - the request matches the embedded JSON Schema
//!    (`schemas/merge-request.json`, draft 7)
//! 3. [`parse_request`] - both checks, then deserialization into a
//!    [`MergeRequest`]
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use unique_contact::validation::parse_request;
//!
//! let request = parse_request(&json!({
//!     "csv": [{ "name": "foo1", "code": "1", "destination": "ami-54d2a63b" }],
//!     "group_by_field": "name",
//!     "code_field": "code",
//!     "destination_field": "destination",
//!     "label_fields": ["code", "destination"],
//!     "variable_fields": ["name"]
//! }))?;
//! assert_eq!(request.records.len(), 1);
//! ```

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArgumentError, ArgumentResult};
use crate::models::{Record, Selectors};

/// Argument names in call order.
pub const ARGUMENTS: [&str; 6] = [
    "csv",
    "group_by_field",
    "code_field",
    "destination_field",
    "label_fields",
    "variable_fields",
];

static REQUEST_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/merge-request.json"))
        .expect("Invalid embedded schema")
});

/// The six merge arguments: decoded rows plus selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(rename = "csv")]
    pub records: Vec<Record>,
    #[serde(flatten)]
    pub selectors: Selectors,
}

/// Validate a JSON value against a JSON Schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Like [`validate`] but only answers yes or no.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Reject a request whose arguments are missing or null.
///
/// Reports the first offending argument in call order.
pub fn reject_null_arguments(data: &Value) -> ArgumentResult<()> {
    let object = data.as_object().ok_or_else(|| ArgumentError::Schema {
        errors: vec!["request must be a JSON object".to_string()],
    })?;

    for (position, name) in ARGUMENTS.iter().enumerate() {
        match object.get(*name) {
            None | Some(Value::Null) => {
                return Err(ArgumentError::Null {
                    name: name.to_string(),
                    position,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate a request against the merge request schema.
pub fn validate_request(data: &Value) -> Result<(), Vec<String>> {
    validate(&REQUEST_SCHEMA, data)
}

/// Quick check against the merge request schema.
pub fn is_valid_request(data: &Value) -> bool {
    is_valid(&REQUEST_SCHEMA, data)
}

/// Run every check and deserialize the request.
pub fn parse_request(data: &Value) -> ArgumentResult<MergeRequest> {
    reject_null_arguments(data)?;
    validate_request(data).map_err(|errors| ArgumentError::Schema { errors })?;

    let request: MergeRequest = serde_json::from_value(data.clone())?;
    request.selectors.validate()?;
    Ok(request)
}

/// Check selectors that did not come through a JSON request (CLI, presets).
pub fn validate_selectors(selectors: &Selectors) -> ArgumentResult<()> {
    selectors.validate()
}
