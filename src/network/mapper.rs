//! Map-matching capability
//!
//! The engine only depends on [`RoadNetworkMapper`]; how raw GPS is aligned
//! to the network is up to the implementation a [`MapperFactory`] returns.
//! [`NearestVertexMapper`] is the built-in baseline.

use super::{MetaInfo, RoadNetwork};
use crate::index::SpatialGridIndex;
use crate::types::{Coordinate, MappedTrajectory};
use crate::{EngineError, Result};
use std::sync::Arc;

/// Converts raw coordinates into a network-token path
pub trait RoadNetworkMapper: Send + Sync {
    /// `None` when the trajectory cannot be aligned to the network
    fn map(&self, raw: &[Coordinate]) -> Option<MappedTrajectory>;

    fn name(&self) -> &str;
}

/// Builds the mapper once from the meta file and the loaded network
pub trait MapperFactory: Send + Sync {
    fn build(&self, meta: &MetaInfo, network: Arc<RoadNetwork>) -> Result<Arc<dyn RoadNetworkMapper>>;
}

/// Factory for [`NearestVertexMapper`]
#[derive(Debug, Clone, Copy)]
pub struct NearestVertexFactory {
    /// Samples farther than this from every vertex fail the mapping (metres)
    pub max_snap_distance: f64,
    /// Cell size of the mapper's private lookup grid (metres)
    pub cell_size: f64,
}

impl Default for NearestVertexFactory {
    fn default() -> Self {
        Self {
            max_snap_distance: 500.0,
            cell_size: 100.0,
        }
    }
}

impl MapperFactory for NearestVertexFactory {
    fn build(&self, meta: &MetaInfo, network: Arc<RoadNetwork>) -> Result<Arc<dyn RoadNetworkMapper>> {
        if meta.vehicle_type.chars().any(char::is_whitespace) {
            return Err(EngineError::InvalidConfig(format!(
                "vehicle type '{}' is not a single token",
                meta.vehicle_type
            )));
        }
        tracing::debug!(
            vehicle = %meta.vehicle_type,
            osm = %meta.osm_path.display(),
            "building nearest-vertex mapper"
        );
        Ok(Arc::new(NearestVertexMapper::new(
            network,
            self.cell_size,
            self.max_snap_distance,
        )))
    }
}

/// Snaps every sample to its nearest vertex and joins consecutive vertices
/// with the directed edge between them. Any sample out of snapping range or
/// any missing edge fails the whole mapping.
pub struct NearestVertexMapper {
    network: Arc<RoadNetwork>,
    grid: SpatialGridIndex,
    max_snap_distance: f64,
}

impl NearestVertexMapper {
    pub fn new(network: Arc<RoadNetwork>, cell_size: f64, max_snap_distance: f64) -> Self {
        let grid = SpatialGridIndex::from_points(
            cell_size,
            network
                .vertices()
                .map(|v| (v.id, network.project(&v.coordinate))),
        );
        Self { network, grid, max_snap_distance }
    }
}

impl RoadNetworkMapper for NearestVertexMapper {
    fn map(&self, raw: &[Coordinate]) -> Option<MappedTrajectory> {
        let mut vertices = Vec::with_capacity(raw.len());
        for coord in raw {
            if !coord.is_valid() {
                return None;
            }
            let point = self.network.project(coord);
            let (vertex, _) = self.grid.nearest(&point, self.max_snap_distance, |id| {
                self.network.vertex_point(id)
            })?;
            if vertices.last() != Some(&vertex) {
                vertices.push(vertex);
            }
        }

        if vertices.len() < 2 {
            return None;
        }

        let edges = vertices
            .windows(2)
            .map(|pair| self.network.edge_between(pair[0], pair[1]))
            .collect::<Option<Vec<_>>>()?;

        Some(MappedTrajectory { edges, vertices })
    }

    fn name(&self) -> &str {
        "nearest-vertex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkEdge, NetworkVertex};
    use std::path::PathBuf;

    fn network() -> Arc<RoadNetwork> {
        // 0 -> 1 -> 2 along the equator, ~111m apart
        let vertices = (0..3)
            .map(|i| NetworkVertex {
                id: i,
                coordinate: Coordinate::new(0.0, i as f64 * 0.001),
            })
            .collect();
        let edges = vec![
            NetworkEdge { id: 10, from: 0, to: 1 },
            NetworkEdge { id: 11, from: 1, to: 2 },
        ];
        Arc::new(RoadNetwork::from_parts(vertices, edges).unwrap())
    }

    fn meta() -> MetaInfo {
        MetaInfo { vehicle_type: "car".into(), osm_path: PathBuf::from("city.osm") }
    }

    #[test]
    fn test_map_snaps_and_joins() {
        let mapper = NearestVertexFactory::default().build(&meta(), network()).unwrap();
        let mapped = mapper
            .map(&[
                Coordinate::new(0.0001, 0.0),
                Coordinate::new(0.0, 0.0002),
                Coordinate::new(0.0, 0.00098),
                Coordinate::new(0.0, 0.0021),
            ])
            .unwrap();
        assert_eq!(mapped.vertices, vec![0, 1, 2]);
        assert_eq!(mapped.edges, vec![10, 11]);
    }

    #[test]
    fn test_map_failures() {
        let mapper = NearestVertexFactory::default().build(&meta(), network()).unwrap();

        // single vertex: no edge
        assert!(mapper.map(&[Coordinate::new(0.0, 0.0)]).is_none());
        // against edge direction
        assert!(mapper.map(&[Coordinate::new(0.0, 0.002), Coordinate::new(0.0, 0.001)]).is_none());
        // far away
        assert!(mapper.map(&[Coordinate::new(1.0, 1.0), Coordinate::new(1.0, 1.001)]).is_none());
        assert!(mapper.map(&[]).is_none());
    }

    #[test]
    fn test_vehicle_type_must_be_token() {
        let meta = MetaInfo { vehicle_type: "fast car".into(), osm_path: PathBuf::from("x") };
        assert!(NearestVertexFactory::default().build(&meta, network()).is_err());
    }
}
