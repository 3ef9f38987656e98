//! Parallel ingestion for large record sets.
//!
//! Only the read side runs in parallel: every record is turned into a
//! [`Contribution`] on a rayon pool, and the contributions come back in input
//! order. They are then absorbed one by one on the calling thread, so group
//! order, last-write-wins and the diagnostic sequence are exactly those of
//! [`super::grouper::group`].

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::diagnostics::DiagnosticSink;
use super::grouper::{group, Accumulators, Contribution};
use crate::api::logs::log_warning;
use crate::models::{Record, Selectors};

/// Below this many records the pool is not worth starting.
pub const MIN_PARALLEL_RECORDS: usize = 1024;

/// Like [`group`], extracting contributions on `workers` threads.
///
/// Falls back to the sequential pass for `workers <= 1`, small inputs, or
/// when the pool cannot be built.
pub fn group_parallel(
    records: &[Record],
    selectors: &Selectors,
    workers: usize,
    sink: &mut dyn DiagnosticSink,
) -> Accumulators {
    if workers <= 1 || records.len() < MIN_PARALLEL_RECORDS {
        return group(records, selectors, sink);
    }

    let pool = match ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool,
        Err(e) => {
            log_warning(format!("Cannot start {} workers ({}), grouping sequentially", workers, e));
            return group(records, selectors, sink);
        }
    };

    let contributions = pool.install(|| extract_all(records, selectors));

    let mut acc = Accumulators::new();
    for contribution in contributions {
        acc.absorb(contribution, sink);
    }
    acc
}

/// Extract every record in parallel; the output is in input order.
pub fn extract_all(records: &[Record], selectors: &Selectors) -> Vec<Contribution> {
    records
        .par_iter()
        .enumerate()
        .map(|(row, record)| Contribution::extract(row, record, selectors))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::diagnostics::{Diagnostic, Discard};
    use crate::merge::grouper::finalize;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                let name = if i % 97 == 0 {
                    " ".to_string()
                } else {
                    format!("contact-{}", i % 13)
                };
                r.insert("name".into(), name);
                r.insert("code".into(), (i % 5).to_string());
                r.insert("destination".into(), format!("+1555{}", i % 29));
                r.insert("team".into(), format!("team-{}", i % 3));
                r
            })
            .collect()
    }

    fn selectors() -> Selectors {
        Selectors::new("name", "code", "destination")
            .with_labels(["code", "team"])
            .with_variables(["team", "name"])
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input = records(MIN_PARALLEL_RECORDS * 3);

        let mut seq_diag: Vec<Diagnostic> = Vec::new();
        let sequential = group(&input, &selectors(), &mut seq_diag);

        let mut par_diag: Vec<Diagnostic> = Vec::new();
        let parallel = group_parallel(&input, &selectors(), 4, &mut par_diag);

        assert_eq!(finalize(&sequential), finalize(&parallel));
        assert_eq!(sequential.skipped(), parallel.skipped());
        assert_eq!(seq_diag, par_diag);
        assert!(!par_diag.is_empty());
    }

    #[test]
    fn test_extract_all_keeps_input_order() {
        let input = records(200);
        let contributions = extract_all(&input, &selectors());

        assert_eq!(contributions.len(), 200);
        assert!(contributions.iter().enumerate().all(|(i, c)| c.row == i));
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let input = records(10);
        let mut diag: Vec<Diagnostic> = Vec::new();
        let acc = group_parallel(&input, &selectors(), 1, &mut diag);

        assert_eq!(finalize(&acc), finalize(&group(&input, &selectors(), &mut Discard)));
    }
}
