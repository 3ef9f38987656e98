//! Group flat contact rows by key and merge each group into a [`Summary`].
//!
//! # Architecture
//!
//! ```text
//! Records (flat rows)                      Merged output
//! ┌──────────────────────────────┐        ┌───────────────────────────────┐
//! │ name: foo1, code: 1, dst: A  │        │ foo1                          │
//! │ name: foo1, code: 1, dst: B  │   →    │   labels: [1, A, B, 2]        │
//! │ name: foo1, code: 2, dst: A  │        │   destinations: [1/A, 1/B]    │
//! │ name: bar1, code: m3, dst: A │        ├───────────────────────────────┤
//! └──────────────────────────────┘        │ bar1                          │
//!                                         │   labels: [m3, A]             │
//!                                         │   destinations: [m3/A]        │
//!                                         └───────────────────────────────┘
//! ```
//!
//! Grouping runs in two passes. [`group`] walks the records in input order
//! and appends everything each row contributes to its group's
//! [`GroupAccumulator`], without deduplicating. [`finalize`] then turns each
//! accumulator into a [`Summary`]: labels and destinations are deduplicated
//! keeping the first occurrence, variables are already last-write-wins.
//!
//! Order inside a group is the input order. Nothing here locks: the
//! sequential pass is the only writer, and [`super::parallel`] keeps it that
//! way by only parallelizing [`Contribution::extract`].

use std::collections::{BTreeMap, HashMap};

use super::dedup::{unique_destinations, unique_stable};
use super::diagnostics::{Diagnostic, DiagnosticSink};
use crate::models::{field, Destination, MergeResult, Record, Selectors, Summary};

/// Everything one record adds to its group, read before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    /// 0-based position of the record in the input.
    pub row: usize,
    /// Trimmed group-by value. Empty means the record is skipped.
    pub key: String,
    /// Raw group-by value, kept for the empty-key diagnostic.
    pub raw_key: String,
    /// One value per label field, in selector order.
    pub labels: Vec<String>,
    pub destination: Destination,
    /// One `(field, value)` per variable field, in selector order.
    pub variables: Vec<(String, String)>,
}

impl Contribution {
    /// Read one record through the selectors. Missing fields read as "".
    pub fn extract(row: usize, record: &Record, selectors: &Selectors) -> Self {
        let raw_key = field(record, &selectors.group_by_field);

        Self {
            row,
            key: raw_key.trim().to_string(),
            raw_key: raw_key.to_string(),
            labels: selectors
                .label_fields
                .iter()
                .map(|f| field(record, f).to_string())
                .collect(),
            destination: Destination::new(
                field(record, &selectors.code_field),
                field(record, &selectors.destination_field),
            ),
            variables: selectors
                .variable_fields
                .iter()
                .map(|f| (f.clone(), field(record, f).to_string()))
                .collect(),
        }
    }

    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }
}

/// Last value written to a variable, and the row that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    pub value: String,
    pub row: usize,
}

/// Ordered, not yet deduplicated view of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAccumulator {
    labels: Vec<String>,
    destinations: Vec<Destination>,
    variables: BTreeMap<String, VariableValue>,
    rows: usize,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records merged into this group.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn variable(&self, field: &str) -> Option<&VariableValue> {
        self.variables.get(field)
    }

    /// Append one record's contribution. Overwriting a variable with a
    /// different value is reported; the new value is stored either way.
    fn add(&mut self, group: &str, contribution: Contribution, sink: &mut dyn DiagnosticSink) {
        let Contribution {
            row,
            labels,
            destination,
            variables,
            ..
        } = contribution;

        self.labels.extend(labels);
        self.destinations.push(destination);

        for (name, value) in variables {
            if let Some(previous) = self.variables.get(&name) {
                if previous.value != value {
                    sink.report(Diagnostic::VariableOverwrite {
                        row,
                        group: group.to_string(),
                        field: name.clone(),
                        previous: previous.value.clone(),
                        value: value.clone(),
                    });
                }
            }
            self.variables.insert(name, VariableValue { value, row });
        }

        self.rows += 1;
    }

    /// Deduplicate into the final summary. Does not consume the accumulator.
    pub fn build(&self) -> Summary {
        Summary {
            labels: unique_stable(&self.labels),
            destinations: unique_destinations(&self.destinations),
            variables: self
                .variables
                .iter()
                .map(|(name, v)| (name.clone(), v.value.clone()))
                .collect(),
        }
    }
}

/// One accumulator per distinct non-empty group key.
#[derive(Debug, Clone, Default)]
pub struct Accumulators {
    groups: HashMap<String, GroupAccumulator>,
    skipped: usize,
}

impl Accumulators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Records dropped because their group key was blank.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn get(&self, key: &str) -> Option<&GroupAccumulator> {
        self.groups.get(key)
    }

    /// Return the accumulator for `key`, creating an empty one on first sight.
    pub fn get_or_create(&mut self, key: &str) -> &mut GroupAccumulator {
        self.groups
            .entry(key.to_string())
            .or_insert_with(GroupAccumulator::new)
    }

    /// Apply one record's contribution to its group.
    ///
    /// A contribution with a blank key is counted as skipped and reported.
    pub fn absorb(&mut self, contribution: Contribution, sink: &mut dyn DiagnosticSink) {
        if !contribution.has_key() {
            self.skipped += 1;
            sink.report(Diagnostic::EmptyGroupKey {
                row: contribution.row,
                raw: contribution.raw_key,
            });
            return;
        }

        let key = contribution.key.clone();
        self.get_or_create(&key).add(&key, contribution, sink);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GroupAccumulator)> {
        self.groups.iter()
    }
}

/// First pass: walk `records` in order and accumulate each group.
pub fn group(
    records: &[Record],
    selectors: &Selectors,
    sink: &mut dyn DiagnosticSink,
) -> Accumulators {
    let mut acc = Accumulators::new();
    for (row, record) in records.iter().enumerate() {
        acc.absorb(Contribution::extract(row, record, selectors), sink);
    }
    acc
}

/// Second pass: deduplicate every accumulator into its summary.
pub fn finalize(accumulators: &Accumulators) -> MergeResult {
    accumulators
        .iter()
        .map(|(key, group)| (key.clone(), group.build()))
        .collect()
}

/// [`group`] then [`finalize`].
pub fn aggregate(
    records: &[Record],
    selectors: &Selectors,
    sink: &mut dyn DiagnosticSink,
) -> MergeResult {
    finalize(&group(records, selectors, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::diagnostics::Discard;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn contacts_selectors() -> Selectors {
        Selectors::new("name", "code", "destination")
            .with_labels(["code", "destination"])
            .with_variables(["name"])
    }

    fn contacts() -> Vec<Record> {
        vec![
            record(&[("name", "foo1"), ("code", "1"), ("destination", "ami-54d2a63b")]),
            record(&[("name", "foo1"), ("code", "1"), ("destination", "ami-54d2a63c")]),
            record(&[("name", "foo1"), ("code", "2"), ("destination", "ami-54d2a63b")]),
            record(&[("name", "bar1"), ("code", "m3.large"), ("destination", "ami-54d2a63b")]),
        ]
    }

    #[test]
    fn test_contacts_grouped_and_merged() {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let result = aggregate(&contacts(), &contacts_selectors(), &mut diagnostics);

        assert_eq!(result.len(), 2);

        let foo = &result["foo1"];
        assert_eq!(foo.labels, vec!["1", "ami-54d2a63b", "ami-54d2a63c", "2"]);
        assert_eq!(
            foo.destinations,
            vec![
                Destination::new("1", "ami-54d2a63b"),
                Destination::new("1", "ami-54d2a63c"),
            ]
        );
        assert_eq!(foo.variables.len(), 1);
        assert_eq!(foo.variables["name"], "foo1");

        let bar = &result["bar1"];
        assert_eq!(bar.labels, vec!["m3.large", "ami-54d2a63b"]);
        assert_eq!(bar.destinations, vec![Destination::new("m3.large", "ami-54d2a63b")]);
        assert_eq!(bar.variables["name"], "bar1");

        // Same name in every row of a group: nothing was overwritten.
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_same_destination_different_code_kept_once() {
        let records = vec![
            record(&[("name", "a"), ("code", "1"), ("destination", "555")]),
            record(&[("name", "a"), ("code", "2"), ("destination", "555")]),
        ];
        let result = aggregate(&records, &contacts_selectors(), &mut Discard);

        assert_eq!(result["a"].destinations, vec![Destination::new("1", "555")]);
    }

    #[test]
    fn test_empty_input() {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let result = aggregate(&[], &contacts_selectors(), &mut diagnostics);

        assert!(result.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_blank_keys_skipped_and_reported() {
        let records = vec![
            record(&[("name", ""), ("code", "1"), ("destination", "x")]),
            record(&[("name", "   "), ("code", "2"), ("destination", "y")]),
            record(&[("code", "3"), ("destination", "z")]),
            record(&[("name", "ok"), ("code", "4"), ("destination", "w")]),
        ];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let acc = group(&records, &contacts_selectors(), &mut diagnostics);

        assert_eq!(acc.len(), 1);
        assert_eq!(acc.skipped(), 3);
        assert!(acc.get("").is_none());
        assert_eq!(
            diagnostics.iter().map(Diagnostic::row).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(matches!(
            &diagnostics[1],
            Diagnostic::EmptyGroupKey { raw, .. } if raw == "   "
        ));
    }

    #[test]
    fn test_group_key_trimmed() {
        let records = vec![
            record(&[("name", "  foo "), ("code", "1"), ("destination", "x")]),
            record(&[("name", "foo"), ("code", "2"), ("destination", "y")]),
        ];
        let result = aggregate(&records, &contacts_selectors(), &mut Discard);

        assert_eq!(result.len(), 1);
        assert_eq!(result["foo"].destinations.len(), 2);
        // The variable keeps the raw field value, not the trimmed key.
        assert_eq!(result["foo"].variables["name"], "foo");
    }

    #[test]
    fn test_last_write_wins_and_overwrite_reported() {
        let selectors = Selectors::new("name", "code", "destination").with_variables(["team"]);
        let records = vec![
            record(&[("name", "a"), ("team", "red")]),
            record(&[("name", "b"), ("team", "green")]),
            record(&[("name", "a"), ("team", "red")]),
            record(&[("name", "a"), ("team", "blue")]),
        ];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let acc = group(&records, &selectors, &mut diagnostics);
        let result = finalize(&acc);

        assert_eq!(result["a"].variables["team"], "blue");
        assert_eq!(result["b"].variables["team"], "green");
        assert_eq!(acc.get("a").unwrap().variable("team").unwrap().row, 3);

        // Rewriting "red" with "red" is not an overwrite.
        assert_eq!(
            diagnostics,
            vec![Diagnostic::VariableOverwrite {
                row: 3,
                group: "a".into(),
                field: "team".into(),
                previous: "red".into(),
                value: "blue".into(),
            }]
        );
    }

    #[test]
    fn test_missing_variable_field_written_as_empty() {
        let selectors = Selectors::new("name", "code", "destination").with_variables(["team"]);
        let records = vec![
            record(&[("name", "a"), ("team", "red")]),
            record(&[("name", "a")]),
        ];
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let result = aggregate(&records, &selectors, &mut diagnostics);

        assert_eq!(result["a"].variables["team"], "");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_labels_dedup_across_flattened_tuples() {
        let selectors = Selectors::new("name", "code", "destination").with_labels(["x", "y"]);
        let records = vec![
            record(&[("name", "a"), ("x", "one"), ("y", "two")]),
            record(&[("name", "a"), ("x", "two"), ("y", "one")]),
            record(&[("name", "a"), ("x", "three"), ("y", "three")]),
        ];
        let result = aggregate(&records, &selectors, &mut Discard);

        assert_eq!(result["a"].labels, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_missing_label_field_contributes_empty_string() {
        let selectors = Selectors::new("name", "code", "destination").with_labels(["x", "absent"]);
        let records = vec![record(&[("name", "a"), ("x", "one")])];
        let result = aggregate(&records, &selectors, &mut Discard);

        assert_eq!(result["a"].labels, vec!["one", ""]);
        assert_eq!(result["a"].destinations, vec![Destination::new("", "")]);
    }

    #[test]
    fn test_order_independent_of_other_groups() {
        let selectors = contacts_selectors();
        let interleaved = vec![
            record(&[("name", "a"), ("code", "1"), ("destination", "d1")]),
            record(&[("name", "b"), ("code", "9"), ("destination", "d9")]),
            record(&[("name", "a"), ("code", "2"), ("destination", "d2")]),
        ];
        let separated = vec![
            record(&[("name", "b"), ("code", "9"), ("destination", "d9")]),
            record(&[("name", "a"), ("code", "1"), ("destination", "d1")]),
            record(&[("name", "a"), ("code", "2"), ("destination", "d2")]),
        ];

        let left = aggregate(&interleaved, &selectors, &mut Discard);
        let right = aggregate(&separated, &selectors, &mut Discard);
        assert_eq!(left, right);
        assert_eq!(left["a"].labels, vec!["1", "d1", "2", "d2"]);
    }

    #[test]
    fn test_finalize_idempotent() {
        let acc = group(&contacts(), &contacts_selectors(), &mut Discard);

        let first = finalize(&acc);
        let second = finalize(&acc);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_accumulator_keeps_raw_sequences() {
        let acc = group(&contacts(), &contacts_selectors(), &mut Discard);
        let foo = acc.get("foo1").unwrap();

        assert_eq!(foo.rows(), 3);
        assert_eq!(foo.labels().len(), 6);
        assert_eq!(foo.destinations().len(), 3);
    }

    #[test]
    fn test_extract_reads_selectors_in_order() {
        let selectors = Selectors::new("name", "code", "destination")
            .with_labels(["destination", "code"])
            .with_variables(["name", "missing"]);
        let c = Contribution::extract(
            5,
            &record(&[("name", " x "), ("code", "c"), ("destination", "d")]),
            &selectors,
        );

        assert_eq!(c.row, 5);
        assert_eq!(c.key, "x");
        assert_eq!(c.raw_key, " x ");
        assert_eq!(c.labels, vec!["d", "c"]);
        assert_eq!(
            c.variables,
            vec![
                ("name".to_string(), " x ".to_string()),
                ("missing".to_string(), String::new())
            ]
        );
    }
}
