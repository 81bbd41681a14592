//! Data types shared by the stores, indexes and query handlers

mod spatial;
mod trajectory;

pub use spatial::{BoundingBox, Coordinate, Point, QueryWindow};
pub use trajectory::{MappedTrajectory, ResolvedTrajectory, Token, TrajectoryId, TrajectoryInput};
