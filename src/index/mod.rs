//! Index layer
//!
//! Postings (edge and vertex), the spatial grid and the combined similarity
//! index (LEVI), plus the build-once machinery shared by all of them.

mod builder;
pub mod grid;
pub mod levi;
pub mod offline;
pub mod postings;

pub use builder::{BuildCell, BuildLog, BuildStats, BuildStep};
pub use grid::{GridCellId, SpatialGridIndex, DEFAULT_CELL_SIZE};
pub use levi::CombinedSimilarityIndex;
pub use offline::{write_index_snapshots, SnapshotReport};
pub use postings::{EdgeInvertedIndex, Postings, PostingsKind, VertexInvertedIndex};
