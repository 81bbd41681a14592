//! Query layer
//!
//! One handler per query family, all sharing read-only indexes:
//! - [`PathQuery`]: trajectories containing a given edge path
//! - [`RangeQuery`]: trajectories passing through a lat/lng window
//! - [`TopKQuery`]: the k most similar trajectories under a measure
//!
//! Requests are JSON, internally tagged by `queryType`:
//! ```text
//! {"queryType":"PathQ","trajectory":{"edges":[1000,1002]}}
//! {"queryType":"RangeQ","window":{"minLat":..,"minLng":..,"maxLat":..,"maxLng":..}}
//! {"queryType":"TopK","trajectory":{"raw":[{"lat":..,"lng":..}]},"k":5,"measure":"DTW"}
//! ```

mod encoder;
mod path;
mod range;
mod topk;

pub use encoder::{IdResponse, ResultObj};
pub use path::PathQuery;
pub use range::RangeQuery;
pub use topk::{TopKQuery, TopKStrategy};

use crate::distance::MeasureType;
use crate::network::{RoadNetwork, RoadNetworkMapper};
use crate::storage::TrajectoryStore;
use crate::types::{Coordinate, MappedTrajectory, QueryWindow, ResolvedTrajectory, TrajectoryId, TrajectoryInput};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query families, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueryType {
    #[serde(rename = "PathQ")]
    Path,
    #[serde(rename = "RangeQ")]
    Range,
    #[serde(rename = "TopK")]
    TopK,
}

impl QueryType {
    pub const ALL: [QueryType; 3] = [QueryType::Path, QueryType::Range, QueryType::TopK];

    /// Request key
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Path => "PathQ",
            QueryType::Range => "RangeQ",
            QueryType::TopK => "TopK",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        QueryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown query type '{}'", s)))
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "queryType")]
pub enum QueryRequest {
    #[serde(rename = "PathQ")]
    Path { trajectory: TrajectoryInput },

    #[serde(rename = "RangeQ")]
    Range { window: QueryWindow },

    #[serde(rename = "TopK")]
    TopK {
        trajectory: TrajectoryInput,
        k: usize,
        /// Overrides the configured measure for this request only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        measure: Option<MeasureType>,
    },
}

impl QueryRequest {
    /// Parse a request; a bad payload is a per-request error
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidArgument(format!("malformed request: {}", e)))
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            QueryRequest::Path { .. } => QueryType::Path,
            QueryRequest::Range { .. } => QueryType::Range,
            QueryRequest::TopK { .. } => QueryType::TopK,
        }
    }
}

/// Executes one query family over shared, read-only indexes
pub trait QueryHandler: Send + Sync {
    fn query_type(&self) -> QueryType;

    /// An `Err` is a per-request failure; the engine keeps serving
    fn execute(&self, request: &QueryRequest) -> Result<QueryResult>;
}

/// Internal query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query_type: QueryType,
    pub mapping_succeed: bool,
    /// Coordinates of the mapped query; empty for range queries
    pub mapped_query: Vec<Coordinate>,
    pub ret_size: usize,
    pub id_array: Vec<TrajectoryId>,
    is_resolved: bool,
    resolved: Vec<ResolvedTrajectory>,
}

impl QueryResult {
    /// The query could not be aligned to the road network
    pub fn unmapped(query_type: QueryType) -> Self {
        Self {
            query_type,
            mapping_succeed: false,
            mapped_query: Vec::new(),
            ret_size: 0,
            id_array: Vec::new(),
            is_resolved: false,
            resolved: Vec::new(),
        }
    }

    pub fn found(query_type: QueryType, mapped_query: Vec<Coordinate>, ids: Vec<TrajectoryId>) -> Self {
        Self {
            query_type,
            mapping_succeed: true,
            mapped_query,
            ret_size: ids.len(),
            id_array: ids,
            is_resolved: false,
            resolved: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.is_resolved
    }

    /// Full trajectories, in id order; empty until [`resolve`](Self::resolve)
    pub fn resolved(&self) -> &[ResolvedTrajectory] {
        &self.resolved
    }

    /// Materialize every returned id into its vertex coordinates.
    ///
    /// A resolved result is for in-process callers only; it can't be encoded.
    pub fn resolve(mut self, store: &TrajectoryStore, network: &RoadNetwork) -> Result<Self> {
        let mut resolved = Vec::with_capacity(self.id_array.len());
        for id in &self.id_array {
            let edges = store
                .get(*id)
                .ok_or_else(|| EngineError::Query(format!("trajectory {} not in store", id)))?;
            let vertices = network.vertex_path(edges)?;
            resolved.push(ResolvedTrajectory {
                id: *id,
                coordinates: network.vertex_coordinates(&vertices),
            });
        }
        self.resolved = resolved;
        self.is_resolved = true;
        Ok(self)
    }
}

/// Align a query to the network. Raw samples go through the mapper, edge
/// paths are validated against the network.
pub(crate) fn map_input(
    input: &TrajectoryInput,
    mapper: &dyn RoadNetworkMapper,
    network: &RoadNetwork,
) -> Option<MappedTrajectory> {
    match input {
        TrajectoryInput::Raw(coords) => {
            if coords.is_empty() || !coords.iter().all(Coordinate::is_valid) {
                return None;
            }
            mapper.map(coords).filter(|m| !m.is_empty())
        }
        TrajectoryInput::Edges(edges) => network.map_edge_path(edges),
    }
}

pub(crate) fn misrouted(expected: QueryType, request: &QueryRequest) -> EngineError {
    EngineError::Query(format!(
        "{} request routed to the {} handler",
        request.query_type(),
        expected
    ))
}
