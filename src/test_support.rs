//! Shared test fixture: a small grid road network and a trajectory corpus
//! written to a temporary data directory, snapshots included.

use crate::config::{DataPaths, DatasetFlavor, EngineConfig};
use crate::index::{offline, DEFAULT_CELL_SIZE};
use crate::network::{NetworkEdge, NetworkVertex, RoadNetwork};
use crate::storage::TrajectoryStore;
use crate::types::{Coordinate, Token, TrajectoryId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Vertices per grid side
pub(crate) const SIDE: u32 = 6;

const BASE_LAT: f64 = 30.0;
const BASE_LNG: f64 = 120.0;
/// ~111m of latitude, ~96m of longitude at the base latitude
const STEP: f64 = 0.001;

pub(crate) fn vertex_id(row: u32, col: u32) -> Token {
    row * SIDE + col
}

pub(crate) fn vertex_coordinate(id: Token) -> Coordinate {
    Coordinate::new(
        BASE_LAT + (id / SIDE) as f64 * STEP,
        BASE_LNG + (id % SIDE) as f64 * STEP,
    )
}

/// SIDE × SIDE lattice with edges in both directions between neighbours
pub(crate) fn grid_network() -> RoadNetwork {
    let vertices: Vec<NetworkVertex> = (0..SIDE * SIDE)
        .map(|id| NetworkVertex { id, coordinate: vertex_coordinate(id) })
        .collect();

    let mut edges = Vec::new();
    let mut next_id = 1000;
    for row in 0..SIDE {
        for col in 0..SIDE {
            let from = vertex_id(row, col);
            let mut neighbours = Vec::new();
            if col + 1 < SIDE {
                neighbours.push(vertex_id(row, col + 1));
            }
            if row + 1 < SIDE {
                neighbours.push(vertex_id(row + 1, col));
            }
            for to in neighbours {
                edges.push(NetworkEdge { id: next_id, from, to });
                edges.push(NetworkEdge { id: next_id + 1, from: to, to: from });
                next_id += 2;
            }
        }
    }
    RoadNetwork::from_parts(vertices, edges).unwrap()
}

/// Edge path of a vertex walk given as (row, col) pairs
pub(crate) fn walk_edges(network: &RoadNetwork, walk: &[(u32, u32)]) -> Vec<Token> {
    walk.windows(2)
        .map(|w| {
            let from = vertex_id(w[0].0, w[0].1);
            let to = vertex_id(w[1].0, w[1].1);
            network
                .edge_between(from, to)
                .unwrap_or_else(|| panic!("no edge {} -> {}", from, to))
        })
        .collect()
}

/// Hand-written corpus used by most tests
pub(crate) fn default_walks() -> Vec<(TrajectoryId, Vec<(u32, u32)>)> {
    vec![
        (1, vec![(0, 0), (0, 1), (0, 2), (0, 3)]),
        (2, vec![(0, 1), (0, 2), (0, 3), (1, 3)]),
        (3, vec![(5, 5), (4, 5), (3, 5)]),
        (4, vec![(2, 0), (2, 1), (2, 2), (3, 2)]),
        (5, vec![]),
        (6, vec![(3, 3), (3, 4)]),
    ]
}

/// `count` random walks of 1 to 6 edges
pub(crate) fn random_walks(seed: u64, count: u32) -> Vec<(TrajectoryId, Vec<(u32, u32)>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=count)
        .map(|id| {
            let mut at = (rng.gen_range(0..SIDE), rng.gen_range(0..SIDE));
            let mut walk = vec![at];
            for _ in 0..rng.gen_range(1..=6) {
                let (row, col) = at;
                let mut options = Vec::with_capacity(4);
                if row > 0 {
                    options.push((row - 1, col));
                }
                if row + 1 < SIDE {
                    options.push((row + 1, col));
                }
                if col > 0 {
                    options.push((row, col - 1));
                }
                if col + 1 < SIDE {
                    options.push((row, col + 1));
                }
                at = options[rng.gen_range(0..options.len())];
                walk.push(at);
            }
            (id, walk)
        })
        .collect()
}

pub(crate) struct Fixture {
    dir: TempDir,
    network: Arc<RoadNetwork>,
    trajectories: Vec<(TrajectoryId, Vec<Token>)>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_walks(default_walks())
    }

    pub fn random(seed: u64, count: u32) -> Self {
        Self::with_walks(random_walks(seed, count))
    }

    pub fn with_walks(walks: Vec<(TrajectoryId, Vec<(u32, u32)>)>) -> Self {
        crate::telemetry::init_test_logging();
        let network = Arc::new(grid_network());
        let trajectories = walks
            .iter()
            .map(|(id, walk)| (*id, walk_edges(&network, walk)))
            .collect();
        let fixture = Self { dir: tempfile::tempdir().unwrap(), network, trajectories };
        fixture.write();
        fixture
    }

    fn write(&self) {
        let paths = self.paths();
        std::fs::create_dir_all(paths.trajectories.parent().unwrap()).unwrap();
        std::fs::write(&paths.meta, "car\n/osm/fixture.osm.pbf\n").unwrap();

        let mut vertices = String::new();
        for id in 0..SIDE * SIDE {
            let c = vertex_coordinate(id);
            writeln!(vertices, "{};{};{}", id, c.lat, c.lng).unwrap();
        }
        std::fs::write(&paths.vertices, vertices).unwrap();

        let mut edges = String::new();
        let mut raw = String::new();
        let mut sorted: Vec<&NetworkEdge> = self.network.edges().collect();
        sorted.sort_unstable_by_key(|e| e.id);
        for edge in sorted {
            let (a, b) = (vertex_coordinate(edge.from), vertex_coordinate(edge.to));
            writeln!(edges, "{};{};{}", edge.id, edge.from, edge.to).unwrap();
            writeln!(raw, "{};{},{};{},{}", edge.id, a.lat, b.lat, a.lng, b.lng).unwrap();
        }
        std::fs::write(&paths.edges, edges).unwrap();
        std::fs::write(&paths.raw_edges, raw).unwrap();

        let mut corpus = String::new();
        for (id, tokens) in &self.trajectories {
            let tokens: Vec<String> = tokens.iter().map(ToString::to_string).collect();
            writeln!(corpus, "{}\t{}", id, tokens.join(",")).unwrap();
        }
        std::fs::write(&paths.trajectories, corpus).unwrap();

        let store = TrajectoryStore::from_records(self.trajectories.clone());
        offline::write_from_parts(&self.network, &store, &paths, DEFAULT_CELL_SIZE).unwrap();
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(self.dir(), DatasetFlavor::Full)
    }

    /// Every query type, default measure and index
    pub fn config(&self) -> EngineConfig {
        EngineConfig::all_queries(self.dir())
    }

    pub fn network(&self) -> &Arc<RoadNetwork> {
        &self.network
    }

    pub fn trajectories(&self) -> &[(TrajectoryId, Vec<Token>)] {
        &self.trajectories
    }

    pub fn store(&self) -> TrajectoryStore {
        TrajectoryStore::from_records(self.trajectories.clone())
    }

    pub fn edges_of(&self, walk: &[(u32, u32)]) -> Vec<Token> {
        walk_edges(&self.network, walk)
    }
}
