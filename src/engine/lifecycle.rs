//! Index lifecycle: builds only what the active query types need, each
//! structure at most once, and registers one handler per query type.

use crate::config::{DataPaths, EngineConfig, PreferredIndex};
use crate::index::{
    BuildCell, BuildLog, BuildStep, CombinedSimilarityIndex, EdgeInvertedIndex, SpatialGridIndex,
    VertexInvertedIndex,
};
use crate::network::{MapperFactory, MetaInfo, RoadNetwork, RoadNetworkMapper};
use crate::query::{PathQuery, QueryHandler, QueryType, RangeQuery, TopKQuery, TopKStrategy};
use crate::storage::{RawEdgeGeometryLookup, TrajectoryStore};
use crate::{EngineError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query type → handler. Filled once during init, read-only afterwards.
#[derive(Default)]
struct HandlerRegistry {
    handlers: BTreeMap<QueryType, Arc<dyn QueryHandler>>,
}

impl HandlerRegistry {
    fn register(&mut self, handler: Arc<dyn QueryHandler>) {
        self.handlers.insert(handler.query_type(), handler);
    }

    fn get(&self, query_type: QueryType) -> Option<&dyn QueryHandler> {
        self.handlers.get(&query_type).map(|h| h.as_ref())
    }

    fn query_types(&self) -> Vec<QueryType> {
        self.handlers.keys().copied().collect()
    }
}

pub struct IndexLifecycleManager {
    config: EngineConfig,
    paths: DataPaths,
    factory: Arc<dyn MapperFactory>,
    log: BuildLog,

    network: BuildCell<RoadNetwork>,
    mapper: BuildCell<dyn RoadNetworkMapper>,
    store: BuildCell<TrajectoryStore>,
    edge_index: BuildCell<EdgeInvertedIndex>,
    raw_edges: BuildCell<RawEdgeGeometryLookup>,
    levi: BuildCell<CombinedSimilarityIndex>,

    registry: HandlerRegistry,
}

impl IndexLifecycleManager {
    /// Validate `config`, build everything the active query types need and
    /// register their handlers. Any missing or malformed input fails the
    /// whole construction.
    pub fn new(config: EngineConfig, factory: Arc<dyn MapperFactory>) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        let mut manager = Self {
            config,
            paths,
            factory,
            log: BuildLog::new(),
            network: BuildCell::new(BuildStep::RoadNetwork),
            mapper: BuildCell::new(BuildStep::Mapper),
            store: BuildCell::new(BuildStep::TrajectoryStore),
            edge_index: BuildCell::new(BuildStep::EdgeInvertedIndex),
            raw_edges: BuildCell::new(BuildStep::RawEdgeLookup),
            levi: BuildCell::new(BuildStep::Levi),
            registry: HandlerRegistry::default(),
        };
        manager.init()?;
        Ok(manager)
    }

    fn init(&mut self) -> Result<()> {
        tracing::info!(
            data_dir = %self.config.data_dir.display(),
            dataset = ?self.config.dataset,
            query_types = ?self.config.query_types,
            "initializing query engine"
        );

        let mapper = self.ensure_mapper()?;
        let network = self.ensure_network()?;
        let store = self.ensure_store()?;

        for query_type in QueryType::ALL {
            if !self.config.is_active(query_type) {
                continue;
            }
            let handler: Arc<dyn QueryHandler> = match query_type {
                QueryType::Path => {
                    let (edge_index, raw_edges) = self.ensure_edge_lookup()?;
                    Arc::new(PathQuery::new(
                        Arc::clone(&mapper),
                        Arc::clone(&network),
                        Arc::clone(&store),
                        edge_index,
                        raw_edges,
                    ))
                }
                QueryType::Range => Arc::new(RangeQuery::new(self.ensure_levi()?)),
                QueryType::TopK => {
                    let strategy = match self.config.preferred_index {
                        PreferredIndex::EdgeInvertedIndex => {
                            let (edge_index, _) = self.ensure_edge_lookup()?;
                            TopKStrategy::edge_postings(edge_index, &store, &network)?
                        }
                        PreferredIndex::Levi => TopKStrategy::Levi(self.ensure_levi()?),
                    };
                    tracing::info!(strategy = strategy.name(), "top-k strategy selected");
                    Arc::new(TopKQuery::new(
                        Arc::clone(&mapper),
                        Arc::clone(&network),
                        Arc::clone(&store),
                        strategy,
                        self.config.measure()?,
                    ))
                }
            };
            self.registry.register(handler);
        }

        tracing::info!(
            handlers = ?self.registry.query_types(),
            memory_bytes = self.log.total_memory(),
            "query engine ready"
        );
        Ok(())
    }

    pub fn ensure_network(&self) -> Result<Arc<RoadNetwork>> {
        self.network.get_or_try_build(
            &self.log,
            || RoadNetwork::load(&self.paths.vertices, &self.paths.edges).map(Arc::new),
            RoadNetwork::memory_usage,
        )
    }

    /// Build the mapper from the meta file; a no-op once built
    pub fn ensure_mapper(&self) -> Result<Arc<dyn RoadNetworkMapper>> {
        self.mapper.get_or_try_build(
            &self.log,
            || {
                let meta = MetaInfo::load(&self.paths.meta)?;
                let network = self.ensure_network()?;
                self.factory.build(&meta, network)
            },
            |_| 0,
        )
    }

    pub fn ensure_store(&self) -> Result<Arc<TrajectoryStore>> {
        self.store.get_or_try_build(
            &self.log,
            || TrajectoryStore::load(&self.paths.trajectories).map(Arc::new),
            TrajectoryStore::memory_usage,
        )
    }

    /// Edge postings and raw edge geometry, shared by path and edge-mode top-k
    pub fn ensure_edge_lookup(&self) -> Result<(Arc<EdgeInvertedIndex>, Arc<RawEdgeGeometryLookup>)> {
        let edge_index = self.edge_index.get_or_try_build(
            &self.log,
            || EdgeInvertedIndex::build(&self.paths.edge_postings).map(Arc::new),
            |index| index.memory_usage(),
        )?;
        let raw_edges = self.raw_edges.get_or_try_build(
            &self.log,
            || {
                let network = self.ensure_network()?;
                let lookup = RawEdgeGeometryLookup::load(&self.paths.raw_edges)?;
                // every network edge needs geometry or mapped paths can't be drawn
                if let Some(edge) = network.edges().find(|e| lookup.get(e.id).is_none()) {
                    return Err(EngineError::Corruption(format!(
                        "edge {} has no raw geometry in {}",
                        edge.id,
                        self.paths.raw_edges.display()
                    )));
                }
                Ok(Arc::new(lookup))
            },
            RawEdgeGeometryLookup::memory_usage,
        )?;
        Ok((edge_index, raw_edges))
    }

    /// Vertex postings, grid and the configured measure composed into LEVI,
    /// shared by range and vertex-mode top-k
    pub fn ensure_levi(&self) -> Result<Arc<CombinedSimilarityIndex>> {
        self.levi.get_or_try_build(
            &self.log,
            || {
                let measure = self.config.measure()?;
                let network = self.ensure_network()?;
                let store = self.ensure_store()?;
                let vertex_index = self.log.timed(
                    BuildStep::VertexInvertedIndex,
                    || VertexInvertedIndex::build(&self.paths.vertex_postings),
                    |index: &VertexInvertedIndex| index.memory_usage(),
                )?;
                let grid = self.log.timed(
                    BuildStep::GridIndex,
                    || SpatialGridIndex::build(&self.paths.grid, self.config.grid_cell_size),
                    SpatialGridIndex::memory_usage,
                )?;
                tracing::info!(measure = %measure, "similarity measure selected");
                CombinedSimilarityIndex::new(vertex_index, grid, measure, store, network).map(Arc::new)
            },
            CombinedSimilarityIndex::memory_usage,
        )
    }

    /// Handler registered for `query_type`, if that type is active
    pub fn get(&self, query_type: QueryType) -> Option<&dyn QueryHandler> {
        self.registry.get(query_type)
    }

    /// Registered query types, in registration order
    pub fn query_types(&self) -> Vec<QueryType> {
        self.registry.query_types()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build_log(&self) -> &BuildLog {
        &self.log
    }
}
