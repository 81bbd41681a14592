//! Raw edge geometry lookup: edge id → polyline
//!
//! Snapshot format, one edge per line:
//! ```text
//! <edge id>;<lat>,<lat>,...;<lng>,<lng>,...
//! ```

use super::snapshot;
use crate::types::{Coordinate, Token};
use crate::{EngineError, Result};
use ahash::AHashMap;
use std::path::Path;

/// Polyline of a single road edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeometry {
    pub lats: Vec<f64>,
    pub lngs: Vec<f64>,
}

impl EdgeGeometry {
    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.lats
            .iter()
            .zip(self.lngs.iter())
            .map(|(lat, lng)| Coordinate::new(*lat, *lng))
    }

    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }
}

/// Immutable edge id → geometry table
#[derive(Debug, Default)]
pub struct RawEdgeGeometryLookup {
    edges: AHashMap<Token, EdgeGeometry>,
}

impl RawEdgeGeometryLookup {
    /// Load the semicolon-separated raw edge snapshot
    pub fn load(path: &Path) -> Result<Self> {
        let mut edges = AHashMap::new();

        snapshot::for_each_record(path, |line_no, line| {
            let mut fields = line.split(';');
            let (id, lats, lngs) = match (fields.next(), fields.next(), fields.next()) {
                (Some(id), Some(lats), Some(lngs)) => (id, lats, lngs),
                _ => {
                    return Err(EngineError::malformed(
                        path,
                        line_no,
                        "expected '<edge id>;<lats>;<lngs>'",
                    ))
                }
            };
            let id: Token = snapshot::parse_field(path, line_no, "edge id", id)?;
            let lats: Vec<f64> = snapshot::parse_list(path, line_no, "latitude", lats)?;
            let lngs: Vec<f64> = snapshot::parse_list(path, line_no, "longitude", lngs)?;
            if lats.len() != lngs.len() {
                return Err(EngineError::malformed(
                    path,
                    line_no,
                    format!("{} latitudes but {} longitudes", lats.len(), lngs.len()),
                ));
            }
            edges.insert(id, EdgeGeometry { lats, lngs });
            Ok(())
        })?;

        Ok(Self { edges })
    }

    pub fn get(&self, edge: Token) -> Option<&EdgeGeometry> {
        self.edges.get(&edge)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Concatenate the polylines of an edge path, dropping the repeated
    /// joint where one edge ends exactly where the next begins.
    pub fn polyline(&self, edges: &[Token]) -> Result<Vec<Coordinate>> {
        let mut out: Vec<Coordinate> = Vec::new();
        for edge in edges {
            let geometry = self
                .get(*edge)
                .ok_or_else(|| EngineError::Index(format!("edge {} has no raw geometry", edge)))?;
            for coord in geometry.coordinates() {
                if out.last() != Some(&coord) {
                    out.push(coord);
                }
            }
        }
        Ok(out)
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        self.edges
            .values()
            .map(|g| (g.lats.len() + g.lngs.len()) * std::mem::size_of::<f64>())
            .sum::<usize>()
            + self.edges.len() * std::mem::size_of::<(Token, EdgeGeometry)>()
    }
}
