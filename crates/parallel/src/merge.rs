//! Partition execution and merging of keyed partial results

use std::collections::HashMap;
use std::hash::Hash;

/// How partition work is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    Sequential,
    /// Use the global worker pool (sequential without the `parallel` feature)
    #[default]
    Parallel,
}

/// Run `f` over every partition and return the results in partition order.
pub fn map_partitions<P, R, F>(partitions: Vec<P>, mode: ProcessingMode, f: F) -> Vec<R>
where
    P: Send,
    R: Send,
    F: Fn(P) -> R + Sync + Send,
{
    match mode {
        ProcessingMode::Sequential => partitions.into_iter().map(f).collect(),
        ProcessingMode::Parallel => par_map(partitions, f),
    }
}

#[cfg(feature = "parallel")]
fn par_map<P, R, F>(partitions: Vec<P>, f: F) -> Vec<R>
where
    P: Send,
    R: Send,
    F: Fn(P) -> R + Sync + Send,
{
    use rayon::prelude::*;
    partitions.into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn par_map<P, R, F>(partitions: Vec<P>, f: F) -> Vec<R>
where
    F: Fn(P) -> R,
{
    partitions.into_iter().map(f).collect()
}

/// Accumulator that can absorb another partition's partial state
pub trait Mergeable {
    fn merge(&mut self, other: Self);
}

/// Fold per-partition keyed partial maps into one map.
///
/// This is the reduction barrier after a partitioned aggregation: entries
/// with the same key are combined with [`Mergeable::merge`].
pub fn merge_keyed<K, V>(partials: impl IntoIterator<Item = HashMap<K, V>>) -> HashMap<K, V>
where
    K: Eq + Hash,
    V: Mergeable,
{
    let mut merged: HashMap<K, V> = HashMap::new();
    for partial in partials {
        for (key, value) in partial {
            match merged.get_mut(&key) {
                Some(existing) => existing.merge(value),
                None => {
                    merged.insert(key, value);
                }
            }
        }
    }
    merged
}
