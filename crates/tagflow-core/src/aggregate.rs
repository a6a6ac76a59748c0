use std::collections::BTreeSet;

use crate::types::MatchSet;

/// Union any number of collections into one ordered set, keeping each item
/// exactly once no matter how many inputs contain it.
pub fn merge_unique<T, I, S>(sets: I) -> BTreeSet<T>
where
    T: Ord,
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = T>,
{
    sets.into_iter().flatten().collect()
}

/// Combine per-condition results of a disjunctive run.
pub fn combine<I>(sets: I) -> MatchSet
where
    I: IntoIterator<Item = MatchSet>,
{
    merge_unique(sets.into_iter().map(MatchSet::into_ids))
        .into_iter()
        .collect()
}
