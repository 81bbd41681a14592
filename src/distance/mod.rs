//! Trajectory distance measures for similarity ranking
//!
//! All measures work on planar point sequences with Euclidean ground
//! distance. Conventions shared by every measure:
//! - `distance(x, x) == 0`
//! - both inputs empty → 0, exactly one empty → `f64::INFINITY`

pub mod dtw;
pub mod frechet;
pub mod hausdorff;
pub mod ranking;

pub use dtw::dtw_distance;
pub use frechet::frechet_distance;
pub use hausdorff::hausdorff_distance;
pub use ranking::{full_scan_top_k, Ranked, TopKHeap};

use crate::network::RoadNetwork;
use crate::types::{BoundingBox, Point, Token};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance measure trait
pub trait TrajectoryDistance: Send + Sync {
    /// Compute the distance between two point sequences
    fn distance(&self, a: &[Point], b: &[Point]) -> f64;

    /// A value never larger than `distance(a, b)`, cheap to compute
    fn lower_bound(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64;
}

/// Dynamic time warping
#[derive(Debug, Clone, Copy)]
pub struct Dtw;

impl TrajectoryDistance for Dtw {
    #[inline]
    fn distance(&self, a: &[Point], b: &[Point]) -> f64 {
        dtw_distance(a, b)
    }

    fn lower_bound(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64 {
        match endpoint_distances(a, b) {
            EndpointBound::Empty(v) => v,
            // both corner cells of the warping matrix lie on every path;
            // they are distinct cells unless both sequences have one point
            EndpointBound::Ends { first, last, single } => {
                let ends = if single { first } else { first + last };
                ends.max(a.gap(b))
            }
        }
    }
}

/// Discrete Fréchet distance
#[derive(Debug, Clone, Copy)]
pub struct Frechet;

impl TrajectoryDistance for Frechet {
    #[inline]
    fn distance(&self, a: &[Point], b: &[Point]) -> f64 {
        frechet_distance(a, b)
    }

    fn lower_bound(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64 {
        match endpoint_distances(a, b) {
            EndpointBound::Empty(v) => v,
            EndpointBound::Ends { first, last, .. } => first.max(last).max(a.gap(b)),
        }
    }
}

/// Symmetric Hausdorff distance
#[derive(Debug, Clone, Copy)]
pub struct Hausdorff;

impl TrajectoryDistance for Hausdorff {
    #[inline]
    fn distance(&self, a: &[Point], b: &[Point]) -> f64 {
        hausdorff_distance(a, b)
    }

    fn lower_bound(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64 {
        match endpoint_distances(a, b) {
            EndpointBound::Empty(v) => v,
            EndpointBound::Ends { .. } => a.gap(b),
        }
    }
}

enum EndpointBound {
    Empty(f64),
    Ends { first: f64, last: f64, single: bool },
}

fn endpoint_distances(a: &TrajectoryShape, b: &TrajectoryShape) -> EndpointBound {
    match (a.points.first(), a.points.last(), b.points.first(), b.points.last()) {
        (Some(a0), Some(an), Some(b0), Some(bn)) => EndpointBound::Ends {
            first: a0.distance(b0),
            last: an.distance(bn),
            single: a.points.len() == 1 && b.points.len() == 1,
        },
        _ if a.points.is_empty() && b.points.is_empty() => EndpointBound::Empty(0.0),
        _ => EndpointBound::Empty(f64::INFINITY),
    }
}

/// Supported similarity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureType {
    #[serde(rename = "DTW")]
    Dtw,
    #[serde(rename = "Frechet")]
    Frechet,
    #[serde(rename = "Hausdorff")]
    Hausdorff,
}

impl MeasureType {
    pub const ALL: [MeasureType; 3] = [MeasureType::Dtw, MeasureType::Frechet, MeasureType::Hausdorff];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Dtw => "DTW",
            MeasureType::Frechet => "Frechet",
            MeasureType::Hausdorff => "Hausdorff",
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dtw" => Ok(MeasureType::Dtw),
            "frechet" => Ok(MeasureType::Frechet),
            "hausdorff" => Ok(MeasureType::Hausdorff),
            _ => Err(EngineError::UnknownMeasure(s.to_string())),
        }
    }
}

/// A selected measure. Cheap to copy; handlers and LEVI each hold their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityFunction {
    measure: MeasureType,
}

impl SimilarityFunction {
    pub fn new(measure: MeasureType) -> Self {
        Self { measure }
    }

    pub fn measure(&self) -> MeasureType {
        self.measure
    }

    fn metric(&self) -> &'static dyn TrajectoryDistance {
        match self.measure {
            MeasureType::Dtw => &Dtw,
            MeasureType::Frechet => &Frechet,
            MeasureType::Hausdorff => &Hausdorff,
        }
    }

    #[inline]
    pub fn distance(&self, a: &[Point], b: &[Point]) -> f64 {
        self.metric().distance(a, b)
    }

    #[inline]
    pub fn shape_distance(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64 {
        self.metric().distance(&a.points, &b.points)
    }

    #[inline]
    pub fn lower_bound(&self, a: &TrajectoryShape, b: &TrajectoryShape) -> f64 {
        self.metric().lower_bound(a, b)
    }

    /// Distance between two edge sequences, resolved through the network
    pub fn token_distance(&self, network: &RoadNetwork, a: &[Token], b: &[Token]) -> Result<f64> {
        let a = network.shape_of_edges(a)?;
        let b = network.shape_of_edges(b)?;
        Ok(self.shape_distance(&a, &b))
    }
}

impl From<MeasureType> for SimilarityFunction {
    fn from(measure: MeasureType) -> Self {
        Self::new(measure)
    }
}

/// Planar polyline with its bounding box precomputed
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryShape {
    pub points: Vec<Point>,
    pub bbox: Option<BoundingBox>,
}

impl TrajectoryShape {
    pub fn new(points: Vec<Point>) -> Self {
        let bbox = BoundingBox::of_points(&points);
        Self { points, bbox }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding-box gap, 0 if either shape is empty
    pub fn gap(&self, other: &TrajectoryShape) -> f64 {
        match (&self.bbox, &other.bbox) {
            (Some(a), Some(b)) => a.gap(b),
            _ => 0.0,
        }
    }
}
