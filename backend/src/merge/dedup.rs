//! Stable deduplication used by finalize.

use std::collections::HashSet;
use std::hash::Hash;

use crate::models::Destination;

/// Key two destinations are compared on when deduplicating a group.
///
/// Only the destination value counts: rows that share a destination but
/// carry different codes collapse into the first one seen. Keying on
/// `(code, destination)` instead means changing this one function.
pub fn destination_key(destination: &Destination) -> &str {
    &destination.destination
}

/// Keep the first occurrence of each element, preserving order.
pub fn unique_stable<T>(items: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    unique_stable_by(items, |item| item)
}

/// Keep the first element for each distinct key, preserving order.
pub fn unique_stable_by<T, K, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash + ?Sized,
    F: Fn(&T) -> &K,
{
    let mut seen: HashSet<&K> = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(key(item)) {
            out.push(item.clone());
        }
    }
    out
}

/// Deduplicate a group's destinations by [`destination_key`].
pub fn unique_destinations(destinations: &[Destination]) -> Vec<Destination> {
    unique_stable_by(destinations, destination_key)
}
