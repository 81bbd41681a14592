//! Top-k similarity query
//!
//! Two interchangeable strategies return the same answer as a full scan:
//! - edge postings: trajectories sharing an edge with the query seed the
//!   result, the rest of the corpus is visited in lower-bound order and
//!   skipped once no remaining bound can beat the k-th distance
//! - LEVI: grid ring expansion over vertex postings

use super::{map_input, misrouted, QueryHandler, QueryRequest, QueryResult, QueryType};
use crate::distance::{MeasureType, Ranked, SimilarityFunction, TopKHeap, TrajectoryShape};
use crate::index::{CombinedSimilarityIndex, EdgeInvertedIndex};
use crate::network::{RoadNetwork, RoadNetworkMapper};
use crate::storage::TrajectoryStore;
use crate::types::{Token, TrajectoryId};
use crate::Result;
use ahash::AHashMap;
use rayon::prelude::*;
use std::sync::Arc;

/// Candidate generation for top-k
pub enum TopKStrategy {
    EdgePostings {
        edge_index: Arc<EdgeInvertedIndex>,
        /// Planar shape of every stored trajectory, keyed by id
        shapes: AHashMap<TrajectoryId, TrajectoryShape>,
    },
    Levi(Arc<CombinedSimilarityIndex>),
}

impl TopKStrategy {
    /// Edge-postings strategy; precomputes every trajectory's shape
    pub fn edge_postings(
        edge_index: Arc<EdgeInvertedIndex>,
        store: &TrajectoryStore,
        network: &RoadNetwork,
    ) -> Result<Self> {
        let shapes = store
            .iter()
            .map(|(id, edges)| network.shape_of_edges(edges).map(|shape| (id, shape)))
            .collect::<Result<AHashMap<_, _>>>()?;
        Ok(TopKStrategy::EdgePostings { edge_index, shapes })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopKStrategy::EdgePostings { .. } => "edge",
            TopKStrategy::Levi(_) => "levi",
        }
    }
}

pub struct TopKQuery {
    mapper: Arc<dyn RoadNetworkMapper>,
    network: Arc<RoadNetwork>,
    store: Arc<TrajectoryStore>,
    strategy: TopKStrategy,
    measure: MeasureType,
}

impl TopKQuery {
    pub fn new(
        mapper: Arc<dyn RoadNetworkMapper>,
        network: Arc<RoadNetwork>,
        store: Arc<TrajectoryStore>,
        strategy: TopKStrategy,
        measure: MeasureType,
    ) -> Self {
        Self { mapper, network, store, strategy, measure }
    }

    /// Configured measure
    pub fn measure(&self) -> MeasureType {
        self.measure
    }

    /// Rank the corpus against a mapped edge path
    pub fn rank(&self, edges: &[Token], query: &TrajectoryShape, k: usize, measure: MeasureType) -> Vec<Ranked> {
        match &self.strategy {
            TopKStrategy::Levi(levi) => levi.top_k(query, k, measure),
            TopKStrategy::EdgePostings { edge_index, shapes } => {
                self.rank_by_edges(edge_index, shapes, edges, query, k, measure)
            }
        }
    }

    fn rank_by_edges(
        &self,
        edge_index: &EdgeInvertedIndex,
        shapes: &AHashMap<TrajectoryId, TrajectoryShape>,
        edges: &[Token],
        query: &TrajectoryShape,
        k: usize,
        measure: MeasureType,
    ) -> Vec<Ranked> {
        let k = k.min(self.store.len());
        if k == 0 {
            return Vec::new();
        }
        let function = SimilarityFunction::new(measure);
        let shortlist = edge_index.union(edges);

        let mut heap = TopKHeap::new(k);
        let seeded: Vec<Ranked> = shortlist
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .filter_map(|id| {
                shapes.get(id).map(|shape| Ranked {
                    id: *id,
                    distance: function.shape_distance(query, shape),
                })
            })
            .collect();
        for candidate in seeded {
            heap.offer(candidate);
        }

        // everything else, cheapest bound first
        let mut rest: Vec<(f64, TrajectoryId, &TrajectoryShape)> = self
            .store
            .ids()
            .par_iter()
            .filter(|id| !shortlist.contains(**id))
            .filter_map(|id| shapes.get(id).map(|shape| (function.lower_bound(query, shape), *id, shape)))
            .collect();
        rest.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut pruned = 0usize;
        for (i, (bound, id, shape)) in rest.iter().enumerate() {
            if !heap.admits(*bound) {
                pruned = rest.len() - i;
                break;
            }
            heap.offer(Ranked { id: *id, distance: function.shape_distance(query, shape) });
        }

        tracing::debug!(
            k,
            measure = %measure,
            shortlist = shortlist.len(),
            pruned,
            "edge top-k"
        );
        heap.into_sorted_vec()
    }
}

impl QueryHandler for TopKQuery {
    fn query_type(&self) -> QueryType {
        QueryType::TopK
    }

    fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let QueryRequest::TopK { trajectory, k, measure } = request else {
            return Err(misrouted(QueryType::TopK, request));
        };

        let Some(mapped) = map_input(trajectory, self.mapper.as_ref(), &self.network) else {
            return Ok(QueryResult::unmapped(QueryType::TopK));
        };

        let measure = measure.unwrap_or(self.measure);
        let query = self.network.shape_of_vertices(&mapped.vertices)?;
        let ranked = self.rank(&mapped.edges, &query, *k, measure);
        let ids = ranked.iter().map(|r| r.id).collect();

        Ok(QueryResult::found(
            QueryType::TopK,
            self.network.vertex_coordinates(&mapped.vertices),
            ids,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::full_scan_top_k;
    use crate::index::{SpatialGridIndex, VertexInvertedIndex};
    use crate::network::NearestVertexMapper;
    use crate::test_support::{vertex_coordinate, vertex_id, Fixture};
    use crate::types::TrajectoryInput;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn mapper(fixture: &Fixture) -> Arc<dyn RoadNetworkMapper> {
        Arc::new(NearestVertexMapper::new(Arc::clone(fixture.network()), 100.0, 500.0))
    }

    fn edge_handler(fixture: &Fixture, measure: MeasureType) -> TopKQuery {
        let store = fixture.store();
        let edge_index = Arc::new(EdgeInvertedIndex::build(&fixture.paths().edge_postings).unwrap());
        let strategy = TopKStrategy::edge_postings(edge_index, &store, fixture.network()).unwrap();
        TopKQuery::new(mapper(fixture), Arc::clone(fixture.network()), Arc::new(store), strategy, measure)
    }

    fn levi_handler(fixture: &Fixture, measure: MeasureType) -> TopKQuery {
        let paths = fixture.paths();
        let store = Arc::new(fixture.store());
        let levi = CombinedSimilarityIndex::new(
            VertexInvertedIndex::build(&paths.vertex_postings).unwrap(),
            SpatialGridIndex::build(&paths.grid, 100.0).unwrap(),
            measure,
            Arc::clone(&store),
            Arc::clone(fixture.network()),
        )
        .unwrap();
        TopKQuery::new(
            mapper(fixture),
            Arc::clone(fixture.network()),
            store,
            TopKStrategy::Levi(Arc::new(levi)),
            measure,
        )
    }

    fn full_scan(fixture: &Fixture, query: &TrajectoryShape, k: usize, measure: MeasureType) -> Vec<TrajectoryId> {
        let network = fixture.network();
        let shapes: Vec<(TrajectoryId, TrajectoryShape)> = fixture
            .trajectories()
            .iter()
            .map(|(id, edges)| (*id, network.shape_of_edges(edges).unwrap()))
            .collect();
        full_scan_top_k(
            shapes.iter().map(|(id, s)| (*id, s)),
            query,
            k,
            SimilarityFunction::new(measure),
        )
        .iter()
        .map(|r| r.id)
        .collect()
    }

    fn request(edges: Vec<Token>, k: usize, measure: Option<MeasureType>) -> QueryRequest {
        QueryRequest::TopK { trajectory: TrajectoryInput::Edges(edges), k, measure }
    }

    #[test]
    fn test_strategies_agree_with_full_scan() {
        let fixture = Fixture::random(11, 80);
        let mut rng = StdRng::seed_from_u64(3);

        for measure in MeasureType::ALL {
            let by_edges = edge_handler(&fixture, measure);
            let by_levi = levi_handler(&fixture, measure);

            for _ in 0..6 {
                let (_, query_edges) = &fixture.trajectories()[rng.gen_range(0..80)];
                let k = rng.gen_range(1..=80);
                let shape = fixture.network().shape_of_edges(query_edges).unwrap();
                let expected = full_scan(&fixture, &shape, k, measure);

                let req = request(query_edges.clone(), k, None);
                let edge_ids = by_edges.execute(&req).unwrap().id_array;
                let levi_ids = by_levi.execute(&req).unwrap().id_array;
                assert_eq!(edge_ids, expected, "edge {} k={}", measure, k);
                assert_eq!(levi_ids, expected, "levi {} k={}", measure, k);
            }
        }
    }

    #[test]
    fn test_query_away_from_corpus() {
        // no stored trajectory shares an edge with the query
        let fixture = Fixture::new();
        let query = fixture.edges_of(&[(5, 0), (5, 1), (5, 2)]);
        let shape = fixture.network().shape_of_edges(&query).unwrap();

        for measure in MeasureType::ALL {
            let expected = full_scan(&fixture, &shape, 3, measure);
            let req = request(query.clone(), 3, None);
            assert_eq!(edge_handler(&fixture, measure).execute(&req).unwrap().id_array, expected);
            assert_eq!(levi_handler(&fixture, measure).execute(&req).unwrap().id_array, expected);
        }
    }

    #[test]
    fn test_exact_match_ranks_first_and_ties_by_id() {
        // 7 and 3 are identical; the smaller id wins the tie
        let walk = vec![(1, 1), (1, 2), (2, 2)];
        let fixture = Fixture::with_walks(vec![
            (7, walk.clone()),
            (3, walk.clone()),
            (9, vec![(4, 4), (4, 5)]),
        ]);
        let query = fixture.edges_of(&walk);

        for handler in [edge_handler(&fixture, MeasureType::Dtw), levi_handler(&fixture, MeasureType::Dtw)] {
            let result = handler.execute(&request(query.clone(), 2, None)).unwrap();
            assert_eq!(result.id_array, vec![3, 7]);
            assert_eq!(result.ret_size, 2);
            assert_eq!(result.mapped_query.len(), 3);
        }
    }

    #[test]
    fn test_zero_k_and_unmapped() {
        let fixture = Fixture::new();
        let handler = edge_handler(&fixture, MeasureType::Frechet);
        let query = fixture.edges_of(&[(0, 0), (0, 1)]);

        let empty = handler.execute(&request(query, 0, None)).unwrap();
        assert!(empty.mapping_succeed);
        assert_eq!(empty.ret_size, 0);

        let unmapped = handler.execute(&request(vec![7], 3, None)).unwrap();
        assert!(!unmapped.mapping_succeed);
    }

    #[test]
    fn test_measure_override() {
        let fixture = Fixture::random(5, 40);
        let handler = levi_handler(&fixture, MeasureType::Dtw);
        assert_eq!(handler.measure(), MeasureType::Dtw);

        let (_, query) = &fixture.trajectories()[4];
        let shape = fixture.network().shape_of_edges(query).unwrap();
        let expected = full_scan(&fixture, &shape, 10, MeasureType::Hausdorff);
        let result = handler
            .execute(&request(query.clone(), 10, Some(MeasureType::Hausdorff)))
            .unwrap();
        assert_eq!(result.id_array, expected);
    }

    #[test]
    fn test_k_beyond_corpus_returns_everything() {
        let fixture = Fixture::random(17, 30);
        let (_, query) = &fixture.trajectories()[2];
        let shape = fixture.network().shape_of_edges(query).unwrap();

        for measure in [MeasureType::Dtw, MeasureType::Hausdorff] {
            let expected = full_scan(&fixture, &shape, 30, measure);
            assert_eq!(expected.len(), 30);
            for (label, handler) in [("edge", edge_handler(&fixture, measure)), ("levi", levi_handler(&fixture, measure))] {
                for k in [35, usize::MAX / 4, usize::MAX] {
                    let result = handler.execute(&request(query.clone(), k, None)).unwrap();
                    assert_eq!(result.id_array, expected, "{} k={}", label, k);
                    assert_eq!(result.ret_size, 30);
                }
            }
        }
    }

    #[test]
    fn test_raw_query() {
        let fixture = Fixture::new();
        let handler = edge_handler(&fixture, MeasureType::Dtw);
        let raw = [(3, 3), (3, 4)]
            .iter()
            .map(|(r, c)| vertex_coordinate(vertex_id(*r, *c)))
            .collect();
        let req = QueryRequest::TopK { trajectory: TrajectoryInput::Raw(raw), k: 1, measure: None };
        assert_eq!(handler.execute(&req).unwrap().id_array, vec![6]);
    }
}
