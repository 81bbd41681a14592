//! Request dispatch: parse, route by query type, encode

use super::IndexLifecycleManager;
use crate::config::EngineConfig;
use crate::network::{MapperFactory, NearestVertexFactory};
use crate::query::{IdResponse, QueryRequest, QueryResult};
use crate::{EngineError, Result};
use std::sync::Arc;

const FAILED_JSON: &str = r#"{"formatCorrect":false}"#;

/// Serving façade over a fully initialized [`IndexLifecycleManager`]
pub struct QueryEngine {
    manager: IndexLifecycleManager,
}

impl QueryEngine {
    pub fn new(config: EngineConfig, factory: Arc<dyn MapperFactory>) -> Result<Self> {
        Ok(Self { manager: IndexLifecycleManager::new(config, factory)? })
    }

    /// Engine with the built-in nearest-vertex mapper
    pub fn open(config: EngineConfig) -> Result<Self> {
        Self::new(config, Arc::new(NearestVertexFactory::default()))
    }

    pub fn manager(&self) -> &IndexLifecycleManager {
        &self.manager
    }

    /// Run a request without encoding it
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let query_type = request.query_type();
        let handler = self.manager.get(query_type).ok_or_else(|| {
            EngineError::Query(format!("query type {} is not enabled", query_type))
        })?;
        handler.execute(request)
    }

    /// Run a request and attach the full trajectories of every hit
    pub fn execute_resolved(&self, request: &QueryRequest) -> Result<QueryResult> {
        let result = self.execute(request)?;
        let store = self.manager.ensure_store()?;
        let network = self.manager.ensure_network()?;
        result.resolve(&store, &network)
    }

    /// Run and encode. Per-request failures become `formatCorrect: false`.
    pub fn dispatch(&self, request: &QueryRequest) -> IdResponse {
        match self.execute(request) {
            Ok(result) => IdResponse::successful(&result),
            Err(e) => {
                tracing::warn!(query_type = %request.query_type(), error = %e, "request failed");
                IdResponse::failed()
            }
        }
    }

    /// Parse, run and encode a JSON request
    pub fn dispatch_json(&self, raw: &str) -> String {
        let response = match QueryRequest::from_json(raw) {
            Ok(request) => self.dispatch(&request),
            Err(e) => {
                tracing::warn!(error = %e, "rejected request");
                IdResponse::failed()
            }
        };
        response.to_json().unwrap_or_else(|e| {
            tracing::error!(error = %e, "response encoding failed");
            FAILED_JSON.to_string()
        })
    }
}
