//! Discrete Fréchet distance

use crate::types::Point;

/// Discrete Fréchet distance: the smallest achievable maximum pairwise
/// distance over all monotone couplings of the two sequences.
pub fn frechet_distance(a: &[Point], b: &[Point]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 0.0,
        (true, false) | (false, true) => return f64::INFINITY,
        _ => {}
    }

    let m = b.len();
    let mut prev = vec![f64::INFINITY; m];
    let mut curr = vec![f64::INFINITY; m];

    for (i, p) in a.iter().enumerate() {
        for (j, q) in b.iter().enumerate() {
            let d = p.distance(q);
            curr[j] = match (i, j) {
                (0, 0) => d,
                (0, _) => curr[j - 1].max(d),
                (_, 0) => prev[0].max(d),
                _ => prev[j].min(prev[j - 1]).min(curr[j - 1]).max(d),
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m - 1]
}
