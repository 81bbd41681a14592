//! Offline snapshot writer
//!
//! Produces the persisted postings and grid snapshots from the road network
//! and a trajectory snapshot, so the serving side can load them with
//! `build(path)`.

use super::{EdgeInvertedIndex, SpatialGridIndex, VertexInvertedIndex};
use crate::config::DataPaths;
use crate::network::RoadNetwork;
use crate::storage::TrajectoryStore;
use crate::Result;
use std::time::Instant;

/// What the writer produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    pub trajectories: usize,
    pub edge_tokens: usize,
    pub vertex_tokens: usize,
    pub grid_cells: usize,
    pub elapsed_ms: u64,
}

/// Write edge postings, vertex postings and the grid for `paths`
pub fn write_index_snapshots(paths: &DataPaths, cell_size: f64) -> Result<SnapshotReport> {
    let start = Instant::now();
    let network = RoadNetwork::load(&paths.vertices, &paths.edges)?;
    let store = TrajectoryStore::load(&paths.trajectories)?;

    let mut report = write_from_parts(&network, &store, paths, cell_size)?;
    report.elapsed_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        trajectories = report.trajectories,
        edge_tokens = report.edge_tokens,
        vertex_tokens = report.vertex_tokens,
        grid_cells = report.grid_cells,
        elapsed_ms = report.elapsed_ms,
        "index snapshots written"
    );
    Ok(report)
}

/// Same as [`write_index_snapshots`] over already-loaded inputs
pub fn write_from_parts(
    network: &RoadNetwork,
    store: &TrajectoryStore,
    paths: &DataPaths,
    cell_size: f64,
) -> Result<SnapshotReport> {
    let edge_index = EdgeInvertedIndex::from_store(store);
    edge_index.save(&paths.edge_postings)?;

    let vertex_paths = store
        .iter()
        .map(|(id, edges)| network.vertex_path(edges).map(|path| (id, path)))
        .collect::<Result<Vec<_>>>()?;
    let vertex_index =
        VertexInvertedIndex::from_vertex_paths(vertex_paths.iter().map(|(id, p)| (*id, p.as_slice())));
    vertex_index.save(&paths.vertex_postings)?;

    let grid = SpatialGridIndex::from_points(
        cell_size,
        network.vertices().map(|v| (v.id, network.project(&v.coordinate))),
    );
    grid.save(&paths.grid)?;

    Ok(SnapshotReport {
        trajectories: store.len(),
        edge_tokens: edge_index.len(),
        vertex_tokens: vertex_index.len(),
        grid_cells: grid.cell_count(),
        elapsed_ms: 0,
    })
}
