//! Trajectory identifiers and token sequences

use super::Coordinate;
use serde::{Deserialize, Serialize};

/// Trajectory identifier (unique within a corpus)
pub type TrajectoryId = u32;

/// Road-network token: an edge id or a vertex id depending on context
pub type Token = u32;

/// Result of mapping a query onto the road network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedTrajectory {
    /// Edge path, in travel order
    pub edges: Vec<Token>,
    /// Vertex path, in travel order
    pub vertices: Vec<Token>,
}

impl MappedTrajectory {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Query trajectory as supplied by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrajectoryInput {
    /// Raw GPS samples, mapped through the road-network mapper
    Raw(Vec<Coordinate>),
    /// Already map-matched edge sequence
    Edges(Vec<Token>),
}

/// A trajectory materialized to coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrajectory {
    pub id: TrajectoryId,
    pub coordinates: Vec<Coordinate>,
}
