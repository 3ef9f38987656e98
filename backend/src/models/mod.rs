//! Domain models for contact merging.
//!
//! - [`Record`] - one decoded CSV row
//! - [`Selectors`] - which fields drive grouping, labels, variables and destinations
//! - [`Destination`] - a (code, destination) pair
//! - [`Summary`] - the merged view of one group
//! - [`MergeResult`] - group key to summary

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ArgumentError, ArgumentResult};

// =============================================================================
// Record
// =============================================================================

/// One input row: field name to field value.
pub type Record = HashMap<String, String>;

/// Look up `field` in `record`, treating a missing field as the empty string.
pub fn field<'a>(record: &'a Record, field: &str) -> &'a str {
    record.get(field).map(String::as_str).unwrap_or("")
}

// =============================================================================
// Selectors
// =============================================================================

/// Field names that drive one aggregation run.
///
/// Selectors are not checked against the records: a field that a record does
/// not carry reads as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// Field whose trimmed value is the group key.
    pub group_by_field: String,
    /// Field copied into `Destination::code`.
    pub code_field: String,
    /// Field copied into `Destination::destination`.
    pub destination_field: String,
    /// Fields whose values are flattened into the group's labels.
    #[serde(default)]
    pub label_fields: Vec<String>,
    /// Fields merged per group with last-write-wins.
    #[serde(default)]
    pub variable_fields: Vec<String>,
}

impl Selectors {
    pub fn new(
        group_by_field: impl Into<String>,
        code_field: impl Into<String>,
        destination_field: impl Into<String>,
    ) -> Self {
        Self {
            group_by_field: group_by_field.into(),
            code_field: code_field.into(),
            destination_field: destination_field.into(),
            label_fields: Vec::new(),
            variable_fields: Vec::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variables<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the three single-field selectors name something.
    pub fn validate(&self) -> ArgumentResult<()> {
        for (name, value) in [
            ("group_by_field", &self.group_by_field),
            ("code_field", &self.code_field),
            ("destination_field", &self.destination_field),
        ] {
            if value.trim().is_empty() {
                return Err(ArgumentError::EmptySelector(name.to_string()));
            }
        }
        Ok(())
    }

    /// Every distinct field name these selectors read, in first-mention order.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        let all = [
            self.group_by_field.as_str(),
            self.code_field.as_str(),
            self.destination_field.as_str(),
        ]
        .into_iter()
        .chain(self.label_fields.iter().map(String::as_str))
        .chain(self.variable_fields.iter().map(String::as_str));

        for f in all {
            if !fields.contains(&f) {
                fields.push(f);
            }
        }
        fields
    }
}

// =============================================================================
// Destination
// =============================================================================

/// A (code, destination) pair contributed by one row.
///
/// Deduplication compares only the destination value, see
/// [`crate::merge::dedup::destination_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub code: String,
    pub destination: String,
}

impl Destination {
    pub fn new(code: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            destination: destination.into(),
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// The merged view of every row sharing one group key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Distinct label values in first-seen order.
    pub labels: Vec<String>,
    /// Variable field to the last value written by the group's rows.
    pub variables: BTreeMap<String, String>,
    /// Destinations with distinct destination values, first-seen order.
    pub destinations: Vec<Destination>,
}

/// Group key to merged summary.
pub type MergeResult = BTreeMap<String, Summary>;
