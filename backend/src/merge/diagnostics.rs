//! Non-fatal anomalies reported while grouping.
//!
//! The aggregator never fails on data. It reports what it skipped or
//! overwrote to a [`DiagnosticSink`] and keeps going.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::logs::{LogEntry, LOG_BROADCASTER};

/// A data anomaly found while grouping, with enough context to trace the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The row's group-by value was blank after trimming; the row was skipped.
    EmptyGroupKey {
        /// 0-based position of the row in the input.
        row: usize,
        /// The untrimmed value that was read.
        raw: String,
    },

    /// A variable field already held a different value in this group.
    VariableOverwrite {
        row: usize,
        group: String,
        field: String,
        previous: String,
        value: String,
    },
}

impl Diagnostic {
    pub fn row(&self) -> usize {
        match self {
            Diagnostic::EmptyGroupKey { row, .. } | Diagnostic::VariableOverwrite { row, .. } => {
                *row
            }
        }
    }

    /// Convert into a warning-level log entry carrying the structured context.
    pub fn to_log_entry(&self) -> LogEntry {
        let entry = LogEntry::warning(self.to_string()).with_row(self.row());
        match self {
            Diagnostic::EmptyGroupKey { .. } => entry,
            Diagnostic::VariableOverwrite { group, field, .. } => {
                entry.with_group(group.clone()).with_field(field.clone())
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EmptyGroupKey { row, raw } => {
                write!(f, "Row {} has an empty group key ({:?}), skipped", row, raw)
            }
            Diagnostic::VariableOverwrite {
                row,
                group,
                field,
                previous,
                value,
            } => write!(
                f,
                "Row {}: variable '{}' of '{}' overwritten ({:?} -> {:?})",
                row, field, group, previous, value
            ),
        }
    }
}

/// Receives diagnostics from the aggregator.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Forwards every diagnostic to the global log broadcaster as a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        LOG_BROADCASTER.log(diagnostic.to_log_entry());
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl DiagnosticSink for Discard {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// Reports to two sinks, first `A` then `B`.
#[derive(Debug, Default)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for Tee<A, B> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.0.report(diagnostic.clone());
        self.1.report(diagnostic);
    }
}
