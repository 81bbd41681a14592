//! LEVI: combined similarity index
//!
//! Vertex postings + spatial grid + a selected similarity measure over the
//! trajectory store. Serves range queries and vertex-mode top-k.
//!
//! # Top-k search
//! Rings of grid cells are expanded around every query point in lockstep.
//! After ring `r` has been visited for all query points, any trajectory not
//! yet seen keeps all of its vertices farther than `r · cell_size` from every
//! query point, and each supported measure is at least that large. The search
//! stops as soon as the current k-th distance is below that radius.

use super::{SpatialGridIndex, VertexInvertedIndex};
use crate::distance::{MeasureType, Ranked, SimilarityFunction, TopKHeap, TrajectoryShape};
use crate::network::RoadNetwork;
use crate::storage::TrajectoryStore;
use crate::types::{BoundingBox, QueryWindow, Token, TrajectoryId};
use crate::{EngineError, Result};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use std::sync::Arc;

pub struct CombinedSimilarityIndex {
    vertex_index: VertexInvertedIndex,
    grid: SpatialGridIndex,
    measure: MeasureType,
    store: Arc<TrajectoryStore>,
    network: Arc<RoadNetwork>,
    vertex_paths: AHashMap<TrajectoryId, Vec<Token>>,
    shapes: AHashMap<TrajectoryId, TrajectoryShape>,
}

impl CombinedSimilarityIndex {
    /// Compose the index. Fails when the snapshots disagree with the network
    /// or the trajectory store.
    pub fn new(
        vertex_index: VertexInvertedIndex,
        grid: SpatialGridIndex,
        measure: MeasureType,
        store: Arc<TrajectoryStore>,
        network: Arc<RoadNetwork>,
    ) -> Result<Self> {
        if grid.len() != network.vertex_count() {
            return Err(EngineError::Corruption(format!(
                "grid indexes {} vertices but the network has {}",
                grid.len(),
                network.vertex_count()
            )));
        }

        let mut vertex_paths = AHashMap::with_capacity(store.len());
        let mut shapes = AHashMap::with_capacity(store.len());
        for (id, edges) in store.iter() {
            let path = network.vertex_path(edges).map_err(|e| {
                EngineError::Corruption(format!("trajectory {}: {}", id, e))
            })?;
            if let Some(vertex) = path
                .iter()
                .find(|v| !vertex_index.get(**v).is_some_and(|ids| ids.contains(id)))
            {
                return Err(EngineError::Corruption(format!(
                    "vertex postings do not list trajectory {} under vertex {}",
                    id, vertex
                )));
            }
            let shape = network.shape_of_vertices(&path)?;
            vertex_paths.insert(id, path);
            shapes.insert(id, shape);
        }

        Ok(Self { vertex_index, grid, measure, store, network, vertex_paths, shapes })
    }

    /// Measure selected at construction
    pub fn measure(&self) -> MeasureType {
        self.measure
    }

    pub fn grid(&self) -> &SpatialGridIndex {
        &self.grid
    }

    pub fn vertex_path(&self, id: TrajectoryId) -> Option<&[Token]> {
        self.vertex_paths.get(&id).map(Vec::as_slice)
    }

    pub fn shape(&self, id: TrajectoryId) -> Option<&TrajectoryShape> {
        self.shapes.get(&id)
    }

    /// Trajectories with at least one vertex inside the closed window, ascending
    pub fn range_query(&self, window: &QueryWindow) -> Vec<TrajectoryId> {
        let sw = self.network.project(&window.south_west());
        let ne = self.network.project(&window.north_east());
        let bbox = BoundingBox::new(sw.x.min(ne.x), sw.y.min(ne.y), sw.x.max(ne.x), sw.y.max(ne.y));

        let inside = |vertex: &Token| {
            self.network
                .vertex(*vertex)
                .is_some_and(|v| window.contains(&v.coordinate))
        };

        let vertices: Vec<Token> = self
            .grid
            .candidates_in_bbox(&bbox)
            .into_iter()
            .filter(|v| inside(v))
            .collect();

        self.vertex_index
            .union(&vertices)
            .iter()
            .filter(|id| {
                self.vertex_path(*id)
                    .is_some_and(|path| path.iter().any(|v| inside(v)))
            })
            .collect()
    }

    /// k most similar trajectories, ascending by (distance, id)
    pub fn top_k(&self, query: &TrajectoryShape, k: usize, measure: MeasureType) -> Vec<Ranked> {
        if k == 0 || self.store.is_empty() {
            return Vec::new();
        }
        let k = k.min(self.store.len());
        let function = SimilarityFunction::new(measure);
        if query.is_empty() {
            return crate::distance::full_scan_top_k(
                self.store.ids().iter().filter_map(|id| self.shape(*id).map(|s| (*id, s))),
                query,
                k,
                function,
            );
        }

        let mut centers: Vec<_> = query.points.iter().map(|p| self.grid.cell_of(p)).collect();
        centers.sort_unstable_by_key(|c| (c.row(), c.col()));
        centers.dedup();
        let min_ring = centers.iter().map(|c| self.grid.min_ring(*c)).min().unwrap_or(0);
        let max_ring = centers.iter().map(|c| self.grid.max_ring(*c)).max().unwrap_or(0);

        let mut heap = TopKHeap::new(k);
        let mut seen: AHashSet<TrajectoryId> = AHashSet::new();
        let mut settled = false;

        for radius in min_ring..=max_ring {
            let mut fresh = Vec::new();
            for center in &centers {
                for vertex in self.grid.ring(*center, radius) {
                    if let Some(ids) = self.vertex_index.get(vertex) {
                        fresh.extend(ids.iter().filter(|id| seen.insert(*id)));
                    }
                }
            }

            let scored: Vec<Ranked> = fresh
                .par_iter()
                .filter_map(|id| {
                    self.shape(*id).map(|shape| Ranked {
                        id: *id,
                        distance: function.shape_distance(query, shape),
                    })
                })
                .collect();
            for candidate in scored {
                heap.offer(candidate);
            }

            if seen.len() >= self.store.len() {
                settled = true;
                break;
            }
            if let Some(kth) = heap.kth_distance() {
                // strict: an unseen trajectory at exactly the radius may still win a tie on id
                if kth < radius as f64 * self.grid.cell_size() {
                    settled = true;
                    break;
                }
            }
        }

        if !settled {
            // trajectories the grid can't reach, e.g. empty ones
            for id in self.store.ids() {
                if seen.contains(id) {
                    continue;
                }
                if let Some(shape) = self.shape(*id) {
                    if heap.admits(function.lower_bound(query, shape)) {
                        heap.offer(Ranked { id: *id, distance: function.shape_distance(query, shape) });
                    }
                }
            }
        }

        tracing::debug!(k, measure = %measure, scored = seen.len(), "levi top-k");
        heap.into_sorted_vec()
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let paths: usize = self.vertex_paths.values().map(|p| p.len() * std::mem::size_of::<Token>()).sum();
        let shapes: usize = self
            .shapes
            .values()
            .map(|s| s.points.len() * std::mem::size_of::<crate::types::Point>())
            .sum();
        self.vertex_index.memory_usage() + self.grid.memory_usage() + paths + shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::full_scan_top_k;
    use crate::test_support::{vertex_coordinate, vertex_id, Fixture};

    fn levi(fixture: &Fixture, measure: MeasureType) -> CombinedSimilarityIndex {
        let paths = fixture.paths();
        CombinedSimilarityIndex::new(
            VertexInvertedIndex::build(&paths.vertex_postings).unwrap(),
            SpatialGridIndex::build(&paths.grid, 100.0).unwrap(),
            measure,
            Arc::new(fixture.store()),
            Arc::clone(fixture.network()),
        )
        .unwrap()
    }

    #[test]
    fn test_range_inside_and_outside() {
        let fixture = Fixture::new();
        let index = levi(&fixture, MeasureType::Dtw);

        // around vertex (2,1) only
        let c = vertex_coordinate(vertex_id(2, 1));
        let window = QueryWindow::new(c.lat - 0.0002, c.lng - 0.0002, c.lat + 0.0002, c.lng + 0.0002);
        assert_eq!(index.range_query(&window), vec![4]);

        // between vertices, touching none
        let window = QueryWindow::new(c.lat + 0.0003, c.lng + 0.0003, c.lat + 0.0006, c.lng + 0.0006);
        assert!(index.range_query(&window).is_empty());
    }

    #[test]
    fn test_range_boundary_is_inclusive() {
        let fixture = Fixture::new();
        let index = levi(&fixture, MeasureType::Dtw);

        // vertex (0,3) sits exactly on the south-west corner
        let c = vertex_coordinate(vertex_id(0, 3));
        let window = QueryWindow::new(c.lat, c.lng, c.lat + 0.0005, c.lng + 0.0005);
        assert_eq!(index.range_query(&window), vec![1, 2]);
    }

    #[test]
    fn test_top_k_matches_full_scan() {
        let fixture = Fixture::random(7, 60);
        let store = fixture.store();
        let network = fixture.network();

        for measure in MeasureType::ALL {
            let index = levi(&fixture, measure);
            let function = SimilarityFunction::new(measure);
            for (query_id, k) in [(1, 1), (5, 5), (17, 10), (42, 60)] {
                let query = network.shape_of_edges(store.get(query_id).unwrap()).unwrap();
                let expected = full_scan_top_k(
                    store.ids().iter().map(|id| (*id, index.shape(*id).unwrap())),
                    &query,
                    k,
                    function,
                );
                let actual = index.top_k(&query, k, measure);
                let ids = |r: &[Ranked]| r.iter().map(|x| x.id).collect::<Vec<_>>();
                assert_eq!(ids(&actual[..]), ids(&expected[..]), "{} k={}", measure, k);
                assert_eq!(actual[0].distance, 0.0);
            }
        }
    }

    #[test]
    fn test_top_k_reaches_empty_trajectories() {
        let fixture = Fixture::new();
        let index = levi(&fixture, MeasureType::Hausdorff);
        let query = fixture
            .network()
            .shape_of_edges(&fixture.edges_of(&[(3, 3), (3, 4)]))
            .unwrap();

        let all = index.top_k(&query, 10, MeasureType::Hausdorff);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].id, 6);
        // the empty trajectory is infinitely far and ranks last
        assert_eq!(all[5].id, 5);
        assert!(all[5].distance.is_infinite());

        assert!(index.top_k(&query, 0, MeasureType::Hausdorff).is_empty());
    }

    #[test]
    fn test_grid_must_cover_network() {
        let fixture = Fixture::new();
        let paths = fixture.paths();
        let grid = SpatialGridIndex::from_points(100.0, vec![(0, crate::types::Point::new(0.0, 0.0))]);
        let err = CombinedSimilarityIndex::new(
            VertexInvertedIndex::build(&paths.vertex_postings).unwrap(),
            grid,
            MeasureType::Dtw,
            Arc::new(fixture.store()),
            Arc::clone(fixture.network()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Corruption(_)));
    }

    #[test]
    fn test_postings_must_list_every_vertex() {
        let fixture = Fixture::new();
        let store = fixture.store();
        let network = fixture.network();

        // trajectory 1 loses its final vertex (0,3); its first vertex is still listed
        let mut paths: Vec<(TrajectoryId, Vec<Token>)> = store
            .iter()
            .map(|(id, edges)| (id, network.vertex_path(edges).unwrap()))
            .collect();
        let (_, path) = paths.iter_mut().find(|(id, _)| *id == 1).unwrap();
        assert_eq!(path.pop(), Some(vertex_id(0, 3)));

        let postings = VertexInvertedIndex::from_vertex_paths(paths.iter().map(|(id, p)| (*id, p.as_slice())));
        let err = CombinedSimilarityIndex::new(
            postings,
            SpatialGridIndex::build(&fixture.paths().grid, 100.0).unwrap(),
            MeasureType::Dtw,
            Arc::new(store),
            Arc::clone(network),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Corruption(ref msg) if msg.contains("trajectory 1")));
    }
}
