//! Dynamic time warping over planar point sequences

use crate::types::Point;

/// DTW distance: minimum total ground distance over all monotone alignments
///
/// Runs in O(n·m) time with two rolling rows of O(m) memory.
pub fn dtw_distance(a: &[Point], b: &[Point]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 0.0,
        (true, false) | (false, true) => return f64::INFINITY,
        _ => {}
    }

    let m = b.len();
    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for p in a {
        curr[0] = f64::INFINITY;
        for (j, q) in b.iter().enumerate() {
            let best = prev[j].min(prev[j + 1]).min(curr[j]);
            curr[j + 1] = p.distance(q) + best;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}
