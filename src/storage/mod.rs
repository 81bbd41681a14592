//! Snapshot-backed immutable tables

pub(crate) mod snapshot;
mod trajectory_store;
mod edge_geometry;

pub use trajectory_store::TrajectoryStore;
pub use edge_geometry::{EdgeGeometry, RawEdgeGeometryLookup};
