//! trajdb Query Engine
//!
//! 面向路网轨迹数据的相似性查询引擎
//!
//! ## 核心特性
//! - Path queries: trajectories containing a given edge path
//! - Range queries: trajectories passing through a lat/lng window
//! - Top-k similarity under DTW, discrete Fréchet or Hausdorff distance
//!
//! ## 架构
//! - 存储层: trajectory store + raw edge geometry, loaded once from snapshots
//! - 索引层: edge/vertex postings (Roaring Bitmaps) + uniform grid + LEVI
//! - 查询层: one handler per query family, dispatched by query type
//! - 生命周期: every index is built lazily, at most once, only when an
//!   active query type needs it

pub mod config;
pub mod distance;
pub mod engine;
pub mod index;
pub mod network;
pub mod query;
pub mod storage;
pub mod telemetry;
pub mod types;

mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DataPaths, DatasetFlavor, EngineConfig, PreferredIndex};
pub use distance::MeasureType;
pub use engine::{IndexLifecycleManager, QueryEngine};
pub use error::{EngineError, Result};
pub use query::{IdResponse, QueryRequest, QueryResult, QueryType};
