//! Path containment query
//!
//! Finds trajectories whose edge sequence contains the query's edge path as a
//! consecutive run. The edge postings intersection gives the candidates; each
//! candidate is then checked against its stored sequence.

use super::{map_input, misrouted, QueryHandler, QueryRequest, QueryResult, QueryType};
use crate::index::EdgeInvertedIndex;
use crate::network::{RoadNetwork, RoadNetworkMapper};
use crate::storage::{RawEdgeGeometryLookup, TrajectoryStore};
use crate::types::{Token, TrajectoryId};
use crate::Result;
use std::sync::Arc;

pub struct PathQuery {
    mapper: Arc<dyn RoadNetworkMapper>,
    network: Arc<RoadNetwork>,
    store: Arc<TrajectoryStore>,
    edge_index: Arc<EdgeInvertedIndex>,
    geometry: Arc<RawEdgeGeometryLookup>,
}

impl PathQuery {
    pub fn new(
        mapper: Arc<dyn RoadNetworkMapper>,
        network: Arc<RoadNetwork>,
        store: Arc<TrajectoryStore>,
        edge_index: Arc<EdgeInvertedIndex>,
        geometry: Arc<RawEdgeGeometryLookup>,
    ) -> Self {
        Self { mapper, network, store, edge_index, geometry }
    }

    /// Ids (ascending) of trajectories containing `edges` contiguously
    pub fn matching(&self, edges: &[Token]) -> Vec<TrajectoryId> {
        if edges.is_empty() {
            return Vec::new();
        }
        self.edge_index
            .intersection(edges)
            .iter()
            .filter(|id| {
                self.store
                    .get(*id)
                    .is_some_and(|sequence| contains_run(sequence, edges))
            })
            .collect()
    }
}

impl QueryHandler for PathQuery {
    fn query_type(&self) -> QueryType {
        QueryType::Path
    }

    fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let QueryRequest::Path { trajectory } = request else {
            return Err(misrouted(QueryType::Path, request));
        };

        let Some(mapped) = map_input(trajectory, self.mapper.as_ref(), &self.network) else {
            return Ok(QueryResult::unmapped(QueryType::Path));
        };

        let coordinates = self.geometry.polyline(&mapped.edges)?;
        let ids = self.matching(&mapped.edges);
        tracing::debug!(edges = mapped.edges.len(), hits = ids.len(), "path query");
        Ok(QueryResult::found(QueryType::Path, coordinates, ids))
    }
}

#[inline]
fn contains_run(sequence: &[Token], run: &[Token]) -> bool {
    run.len() <= sequence.len() && sequence.windows(run.len()).any(|w| w == run)
}
