//! Road network graph
//!
//! Owns the vertex and edge tables that every index refers to by id, plus the
//! planar projection used for all metric work (grid cells, distances).
//!
//! Snapshot formats:
//! ```text
//! meta:      <vehicle type>\n<osm source path>
//! vertices:  <vertex id>;<lat>;<lng>
//! edges:     <edge id>;<from vertex>;<to vertex>
//! ```

mod mapper;

pub use mapper::{MapperFactory, NearestVertexFactory, NearestVertexMapper, RoadNetworkMapper};

use crate::distance::TrajectoryShape;
use crate::storage::snapshot;
use crate::types::{Coordinate, MappedTrajectory, Point, Token};
use crate::{EngineError, Result};
use ahash::AHashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meta file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub vehicle_type: String,
    pub osm_path: PathBuf,
}

impl MetaInfo {
    /// Read the two-line meta file. Both lines are required.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(snapshot::open(path)?);
        let mut lines = reader.lines();

        let mut next_line = |what: &str, line_no: usize| -> Result<String> {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    let line = line.trim();
                    if line.is_empty() {
                        Err(EngineError::malformed(path, line_no, format!("empty {}", what)))
                    } else {
                        Ok(line.to_string())
                    }
                }
                None => Err(EngineError::malformed(path, line_no, format!("missing {}", what))),
            }
        };

        let vehicle_type = next_line("vehicle type", 1)?;
        let osm_path = PathBuf::from(next_line("OSM source path", 2)?);
        Ok(Self { vehicle_type, osm_path })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkVertex {
    pub id: Token,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkEdge {
    pub id: Token,
    pub from: Token,
    pub to: Token,
}

/// Equirectangular projection around a fixed reference latitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    ref_lat_cos: f64,
}

impl Projection {
    pub fn new(ref_lat: f64) -> Self {
        Self { ref_lat_cos: ref_lat.to_radians().cos() }
    }

    #[inline]
    pub fn project(&self, coord: &Coordinate) -> Point {
        Point::new(
            EARTH_RADIUS_M * coord.lng.to_radians() * self.ref_lat_cos,
            EARTH_RADIUS_M * coord.lat.to_radians(),
        )
    }
}

/// Immutable road graph
#[derive(Debug)]
pub struct RoadNetwork {
    vertices: AHashMap<Token, NetworkVertex>,
    edges: AHashMap<Token, NetworkEdge>,
    /// (from, to) → edge id
    adjacency: AHashMap<(Token, Token), Token>,
    projection: Projection,
}

impl RoadNetwork {
    /// Load vertex and edge snapshots
    pub fn load(vertices_path: &Path, edges_path: &Path) -> Result<Self> {
        let mut vertices = Vec::new();
        snapshot::for_each_record(vertices_path, |line_no, line| {
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() != 3 {
                return Err(EngineError::malformed(
                    vertices_path,
                    line_no,
                    "expected '<id>;<lat>;<lng>'",
                ));
            }
            let id = snapshot::parse_field(vertices_path, line_no, "vertex id", fields[0])?;
            let lat = snapshot::parse_field(vertices_path, line_no, "latitude", fields[1])?;
            let lng = snapshot::parse_field(vertices_path, line_no, "longitude", fields[2])?;
            let coordinate = Coordinate::new(lat, lng);
            if !coordinate.is_valid() {
                return Err(EngineError::malformed(
                    vertices_path,
                    line_no,
                    format!("coordinate out of range ({}, {})", lat, lng),
                ));
            }
            vertices.push(NetworkVertex { id, coordinate });
            Ok(())
        })?;

        let mut edges = Vec::new();
        snapshot::for_each_record(edges_path, |line_no, line| {
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() != 3 {
                return Err(EngineError::malformed(
                    edges_path,
                    line_no,
                    "expected '<edge id>;<from>;<to>'",
                ));
            }
            edges.push(NetworkEdge {
                id: snapshot::parse_field(edges_path, line_no, "edge id", fields[0])?,
                from: snapshot::parse_field(edges_path, line_no, "from vertex", fields[1])?,
                to: snapshot::parse_field(edges_path, line_no, "to vertex", fields[2])?,
            });
            Ok(())
        })?;

        Self::from_parts(vertices, edges)
    }

    /// Assemble a network, rejecting edges that reference unknown vertices
    pub fn from_parts(vertices: Vec<NetworkVertex>, edges: Vec<NetworkEdge>) -> Result<Self> {
        let (min_lat, max_lat) = vertices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), v| {
            (lo.min(v.coordinate.lat), hi.max(v.coordinate.lat))
        });
        let ref_lat = if vertices.is_empty() { 0.0 } else { (min_lat + max_lat) / 2.0 };

        let vertices: AHashMap<Token, NetworkVertex> =
            vertices.into_iter().map(|v| (v.id, v)).collect();

        let mut edge_table = AHashMap::with_capacity(edges.len());
        let mut adjacency = AHashMap::with_capacity(edges.len());
        for edge in edges {
            for endpoint in [edge.from, edge.to] {
                if !vertices.contains_key(&endpoint) {
                    return Err(EngineError::Corruption(format!(
                        "edge {} references unknown vertex {}",
                        edge.id, endpoint
                    )));
                }
            }
            adjacency.entry((edge.from, edge.to)).or_insert(edge.id);
            if edge_table.insert(edge.id, edge).is_some() {
                return Err(EngineError::Corruption(format!("duplicate edge id {}", edge.id)));
            }
        }

        Ok(Self {
            vertices,
            edges: edge_table,
            adjacency,
            projection: Projection::new(ref_lat),
        })
    }

    pub fn vertex(&self, id: Token) -> Option<&NetworkVertex> {
        self.vertices.get(&id)
    }

    pub fn edge(&self, id: Token) -> Option<&NetworkEdge> {
        self.edges.get(&id)
    }

    /// Directed edge from `from` to `to`
    pub fn edge_between(&self, from: Token, to: Token) -> Option<Token> {
        self.adjacency.get(&(from, to)).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &NetworkVertex> + '_ {
        self.vertices.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &NetworkEdge> + '_ {
        self.edges.values()
    }

    pub fn project(&self, coord: &Coordinate) -> Point {
        self.projection.project(coord)
    }

    pub fn vertex_point(&self, id: Token) -> Option<Point> {
        self.vertex(id).map(|v| self.project(&v.coordinate))
    }

    /// Vertex walk of an edge path. A vertex is not repeated where one edge
    /// ends at the next edge's start.
    pub fn vertex_path(&self, edges: &[Token]) -> Result<Vec<Token>> {
        let mut path = Vec::with_capacity(edges.len() + 1);
        for id in edges {
            let edge = self
                .edge(*id)
                .ok_or_else(|| EngineError::Index(format!("unknown edge {}", id)))?;
            if path.last() != Some(&edge.from) {
                path.push(edge.from);
            }
            path.push(edge.to);
        }
        Ok(path)
    }

    pub fn vertex_coordinates(&self, vertices: &[Token]) -> Vec<Coordinate> {
        vertices
            .iter()
            .filter_map(|id| self.vertex(*id).map(|v| v.coordinate))
            .collect()
    }

    /// Planar shape of a vertex path
    pub fn shape_of_vertices(&self, vertices: &[Token]) -> Result<TrajectoryShape> {
        let points = vertices
            .iter()
            .map(|id| {
                self.vertex_point(*id)
                    .ok_or_else(|| EngineError::Index(format!("unknown vertex {}", id)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TrajectoryShape::new(points))
    }

    /// Planar shape of an edge path
    pub fn shape_of_edges(&self, edges: &[Token]) -> Result<TrajectoryShape> {
        self.shape_of_vertices(&self.vertex_path(edges)?)
    }

    /// Validate a caller-supplied edge path. `None` when empty or when any
    /// edge is unknown to the network.
    pub fn map_edge_path(&self, edges: &[Token]) -> Option<MappedTrajectory> {
        if edges.is_empty() {
            return None;
        }
        let vertices = self.vertex_path(edges).ok()?;
        Some(MappedTrajectory { edges: edges.to_vec(), vertices })
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<(Token, NetworkVertex)>()
            + self.edges.len() * std::mem::size_of::<(Token, NetworkEdge)>()
            + self.adjacency.len() * std::mem::size_of::<((Token, Token), Token)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_network() -> RoadNetwork {
        let vertices = (0..4)
            .map(|i| NetworkVertex {
                id: i,
                coordinate: Coordinate::new(0.0, i as f64 * 0.001),
            })
            .collect();
        let edges = (0..3)
            .map(|i| NetworkEdge { id: 100 + i, from: i, to: i + 1 })
            .collect();
        RoadNetwork::from_parts(vertices, edges).unwrap()
    }

    #[test]
    fn test_meta_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta");

        std::fs::write(&path, "car\n/data/city.osm.pbf\n").unwrap();
        let meta = MetaInfo::load(&path).unwrap();
        assert_eq!(meta.vehicle_type, "car");
        assert_eq!(meta.osm_path, PathBuf::from("/data/city.osm.pbf"));

        std::fs::write(&path, "car\n").unwrap();
        assert!(matches!(
            MetaInfo::load(&path),
            Err(EngineError::MalformedRecord { line: 2, .. })
        ));

        assert!(matches!(
            MetaInfo::load(&dir.path().join("absent")),
            Err(EngineError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_vertex_path() {
        let network = line_network();
        assert_eq!(network.vertex_path(&[100, 101, 102]).unwrap(), vec![0, 1, 2, 3]);
        // non-contiguous edges keep both endpoints
        assert_eq!(network.vertex_path(&[100, 102]).unwrap(), vec![0, 1, 2, 3]);
        assert!(network.vertex_path(&[100, 999]).is_err());
    }

    #[test]
    fn test_edge_between_is_directed() {
        let network = line_network();
        assert_eq!(network.edge_between(1, 2), Some(101));
        assert_eq!(network.edge_between(2, 1), None);
    }

    #[test]
    fn test_unknown_vertex_rejected() {
        let vertices = vec![NetworkVertex { id: 1, coordinate: Coordinate::new(0.0, 0.0) }];
        let edges = vec![NetworkEdge { id: 1, from: 1, to: 2 }];
        assert!(matches!(
            RoadNetwork::from_parts(vertices, edges),
            Err(EngineError::Corruption(_))
        ));
    }

    #[test]
    fn test_projection_metres() {
        let projection = Projection::new(0.0);
        let a = projection.project(&Coordinate::new(0.0, 0.0));
        let b = projection.project(&Coordinate::new(0.0, 0.001));
        // ~111m per 0.001 degree at the equator
        assert!((a.distance(&b) - 111.19).abs() < 0.5);
    }

    #[test]
    fn test_load_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let vertices = dir.path().join("vertices.txt");
        let edges = dir.path().join("edges.txt");
        std::fs::write(&vertices, "1;-37.81;144.96\n2;-37.82;144.97\n").unwrap();
        std::fs::write(&edges, "10;1;2\n11;2;1\n").unwrap();

        let network = RoadNetwork::load(&vertices, &edges).unwrap();
        assert_eq!(network.vertex_count(), 2);
        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.edge_between(2, 1), Some(11));

        std::fs::write(&vertices, "1;-137.81;144.96\n").unwrap();
        assert!(RoadNetwork::load(&vertices, &edges).is_err());
    }
}
