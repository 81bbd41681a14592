//! Spatial window query over LEVI

use super::{misrouted, QueryHandler, QueryRequest, QueryResult, QueryType};
use crate::index::CombinedSimilarityIndex;
use crate::{EngineError, Result};
use std::sync::Arc;

/// Trajectories passing through a closed lat/lng window. The response never
/// carries mapped coordinates.
pub struct RangeQuery {
    levi: Arc<CombinedSimilarityIndex>,
}

impl RangeQuery {
    pub fn new(levi: Arc<CombinedSimilarityIndex>) -> Self {
        Self { levi }
    }
}

impl QueryHandler for RangeQuery {
    fn query_type(&self) -> QueryType {
        QueryType::Range
    }

    fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let QueryRequest::Range { window } = request else {
            return Err(misrouted(QueryType::Range, request));
        };
        if !window.is_well_formed() {
            return Err(EngineError::InvalidArgument(format!(
                "malformed window {:?}",
                window
            )));
        }

        let ids = self.levi.range_query(window);
        tracing::debug!(hits = ids.len(), "range query");
        Ok(QueryResult::found(QueryType::Range, Vec::new(), ids))
    }
}
