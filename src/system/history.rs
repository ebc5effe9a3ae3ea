use std::collections::VecDeque;

/// Graphs keep two samples per terminal column.
pub const SAMPLES_PER_COLUMN: usize = 2;

/// Per-core graphs are short regardless of width.
pub const CORE_HISTORY: usize = 40;

/// Sample capacity of a graph that is `width` columns wide.
pub fn graph_capacity(width: usize) -> usize {
    width.max(1) * SAMPLES_PER_COLUMN
}

/// Append `value`, dropping the oldest entries until `ring` holds at most
/// `capacity` samples.
pub fn push_bounded<T>(ring: &mut VecDeque<T>, value: T, capacity: usize) {
    ring.push_back(value);
    trim(ring, capacity);
}

pub fn trim<T>(ring: &mut VecDeque<T>, capacity: usize) {
    let capacity = capacity.max(1);
    while ring.len() > capacity {
        ring.pop_front();
    }
}

/// Mean of the newest `n` samples, or `None` when fewer than `n` exist.
pub fn mean_of_newest(ring: &VecDeque<u64>, n: usize) -> Option<u64> {
    if n == 0 || ring.len() < n {
        return None;
    }
    let sum: u128 = ring.iter().rev().take(n).map(|&v| v as u128).sum();
    Some((sum / n as u128) as u64)
}
