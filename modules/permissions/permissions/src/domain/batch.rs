//! Splitting of large id collections into backend-sized chunks.

use std::collections::HashSet;
use std::hash::Hash;

/// Splits id lists into chunks no larger than the backend accepts in a
/// single query, and merges per-chunk results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batcher {
    max_chunk_size: usize,
}

impl Batcher {
    /// A chunk size below 1 is treated as 1.
    #[must_use]
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Borrowing, order-preserving chunk iterator.
    pub fn chunks<'a, T>(&self, ids: &'a [T]) -> std::slice::Chunks<'a, T> {
        ids.chunks(self.max_chunk_size)
    }

    /// Owned chunks, for work that outlives the borrowed input.
    #[must_use]
    pub fn split<T: Clone>(&self, ids: &[T]) -> Vec<Vec<T>> {
        chunk(ids, self.max_chunk_size)
    }
}

/// Splits `ids` into consecutive chunks of at most `max_chunk_size` elements.
///
/// Concatenating the chunks yields `ids` unchanged. An empty input yields no
/// chunks.
#[must_use]
pub fn chunk<T: Clone>(ids: &[T], max_chunk_size: usize) -> Vec<Vec<T>> {
    ids.chunks(max_chunk_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

/// Union of per-chunk result sets. Insensitive to chunk order and to
/// elements repeated across chunks.
pub fn merge_unique<T, I, C>(results: I) -> HashSet<T>
where
    T: Eq + Hash,
    I: IntoIterator<Item = C>,
    C: IntoIterator<Item = T>,
{
    results.into_iter().flatten().collect()
}

/// Drops repeated ids, keeping the first occurrence.
#[must_use]
pub fn distinct<T: Eq + Hash + Copy>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
