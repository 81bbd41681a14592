//! Bounded top-k selection with deterministic tie-breaking

use super::{SimilarityFunction, TrajectoryShape};
use crate::types::TrajectoryId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Upper bound on the slots reserved up front; `k` comes from requests
const MAX_PREALLOCATED: usize = 1024;

/// A scored trajectory. Orders by distance, then by ascending id.
#[derive(Debug, Clone, Copy)]
pub struct Ranked {
    pub id: TrajectoryId,
    pub distance: f64,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the k best (smallest) candidates seen so far
#[derive(Debug)]
pub struct TopKHeap {
    k: usize,
    // max-heap: the worst retained candidate sits on top
    heap: BinaryHeap<Ranked>,
}

impl TopKHeap {
    pub fn new(k: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k.min(MAX_PREALLOCATED) + 1) }
    }

    pub fn offer(&mut self, candidate: Ranked) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Distance of the k-th best candidate, once k candidates are held
    pub fn kth_distance(&self) -> Option<f64> {
        if self.is_full() {
            self.heap.peek().map(|r| r.distance)
        } else {
            None
        }
    }

    /// Whether a candidate with this lower bound could still enter the result.
    /// Equality is admitted: an equal distance with a smaller id wins the tie.
    pub fn admits(&self, lower_bound: f64) -> bool {
        match self.kth_distance() {
            Some(kth) => lower_bound <= kth,
            None => true,
        }
    }

    /// Ascending by (distance, id)
    pub fn into_sorted_vec(self) -> Vec<Ranked> {
        self.heap.into_sorted_vec()
    }
}

/// Reference ranking: score every candidate and keep the k best
pub fn full_scan_top_k<'a, I>(
    candidates: I,
    query: &TrajectoryShape,
    k: usize,
    function: SimilarityFunction,
) -> Vec<Ranked>
where
    I: IntoIterator<Item = (TrajectoryId, &'a TrajectoryShape)>,
{
    let mut heap = TopKHeap::new(k);
    for (id, shape) in candidates {
        heap.offer(Ranked { id, distance: function.shape_distance(query, shape) });
    }
    heap.into_sorted_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: TrajectoryId, distance: f64) -> Ranked {
        Ranked { id, distance }
    }

    #[test]
    fn test_keeps_k_smallest() {
        let mut heap = TopKHeap::new(3);
        for (id, d) in [(1, 5.0), (2, 1.0), (3, 4.0), (4, 0.5), (5, 9.0)] {
            heap.offer(r(id, d));
        }
        let ids: Vec<_> = heap.into_sorted_vec().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
    }

    #[test]
    fn test_ties_prefer_smaller_id() {
        let mut heap = TopKHeap::new(2);
        for id in [9, 3, 7, 1] {
            heap.offer(r(id, 2.0));
        }
        let ids: Vec<_> = heap.into_sorted_vec().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_admits() {
        let mut heap = TopKHeap::new(1);
        assert!(heap.admits(f64::INFINITY));
        heap.offer(r(1, 3.0));
        assert!(heap.admits(3.0));
        assert!(!heap.admits(3.5));
    }

    #[test]
    fn test_huge_k_reserves_little() {
        let mut heap = TopKHeap::new(usize::MAX);
        for (id, d) in [(2, 2.0), (1, 1.0)] {
            heap.offer(r(id, d));
        }
        assert!(!heap.is_full());
        assert!(heap.admits(f64::INFINITY));
        let ids: Vec<_> = heap.into_sorted_vec().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_zero_k() {
        let mut heap = TopKHeap::new(0);
        heap.offer(r(1, 1.0));
        assert!(heap.is_empty());
        assert!(heap.into_sorted_vec().is_empty());
    }
}
