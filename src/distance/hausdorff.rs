//! Symmetric Hausdorff distance

use crate::types::Point;

fn directed(from: &[Point], to: &[Point]) -> f64 {
    from.iter()
        .map(|p| to.iter().map(|q| p.distance(q)).fold(f64::INFINITY, f64::min))
        .fold(0.0, f64::max)
}

/// Largest distance from a point of either sequence to the nearest point of the other
pub fn hausdorff_distance(a: &[Point], b: &[Point]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 0.0,
        (true, false) | (false, true) => f64::INFINITY,
        _ => directed(a, b).max(directed(b, a)),
    }
}
