//! Response encoding
//!
//! ```text
//! { formatCorrect, retObj?: { mappingSucceed, mappedTrajectory?, retSize, ids? } }
//! ```
//! `mappedTrajectory` is never sent for range queries, and `ids` only when
//! something matched.

use super::{QueryResult, QueryType};
use crate::types::{Coordinate, TrajectoryId};
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultObj {
    pub mapping_succeed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_trajectory: Option<Vec<Coordinate>>,
    pub ret_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<TrajectoryId>>,
}

/// Wire response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdResponse {
    pub format_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret_obj: Option<ResultObj>,
}

impl IdResponse {
    /// Placeholder for a request that could not be parsed or dispatched
    pub fn failed() -> Self {
        Self { format_correct: false, ret_obj: None }
    }

    /// Encode a query result.
    ///
    /// # Panics
    /// If the result has been resolved. Resolved results carry full
    /// trajectories and must not reach the wire.
    pub fn successful(result: &QueryResult) -> Self {
        assert!(
            !result.is_resolved(),
            "resolved {} result handed to the encoder",
            result.query_type
        );

        let mut obj = ResultObj {
            mapping_succeed: result.mapping_succeed,
            mapped_trajectory: None,
            ret_size: 0,
            ids: None,
        };

        if result.query_type != QueryType::Range {
            if !result.mapping_succeed {
                return Self::with_obj(obj);
            }
            obj.mapped_trajectory = Some(result.mapped_query.clone());
        }

        obj.ret_size = result.ret_size;
        if result.ret_size > 0 {
            obj.ids = Some(result.id_array.clone());
        }
        Self::with_obj(obj)
    }

    fn with_obj(obj: ResultObj) -> Self {
        Self { format_correct: true, ret_obj: Some(obj) }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
