//! Link list merging.

use std::collections::HashSet;

/// Combine link sources into one list without duplicates.
///
/// Each distinct link appears once, in first-seen order across
/// `existing`, then `submitted`, then `generated`. Pass an empty slice for
/// a source that is not available.
pub fn merge_and_deduplicate_links(
    existing: &[String],
    submitted: &[String],
    generated: &[String],
) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(submitted)
        .chain(generated)
        .filter(|link| seen.insert(link.as_str()))
        .cloned()
        .collect()
}
