//! Engine configuration
//!
//! Selects the dataset, which query families to serve, the similarity
//! measure and the preferred top-k index. Everything here is validated once
//! at startup; nothing is re-read while serving.

use crate::distance::MeasureType;
use crate::index::DEFAULT_CELL_SIZE;
use crate::query::QueryType;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// 数据集选择（Dataset flavor）
///
/// Road-network files are shared; trajectory-derived snapshots live in a
/// per-flavor subdirectory of the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFlavor {
    /// Complete map-matched corpus
    #[default]
    Full,
    /// Down-sampled corpus for development and smoke tests
    Sample,
}

impl DatasetFlavor {
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetFlavor::Full => "full",
            DatasetFlavor::Sample => "sample",
        }
    }
}

/// Index family used by top-k queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PreferredIndex {
    /// Shortlist through the edge inverted index
    #[serde(rename = "edge")]
    EdgeInvertedIndex,
    /// Grid + vertex postings (LEVI)
    #[default]
    #[serde(rename = "levi")]
    Levi,
}

/// Snapshot locations derived from the data directory and flavor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub meta: PathBuf,
    pub vertices: PathBuf,
    pub edges: PathBuf,
    pub raw_edges: PathBuf,
    pub grid: PathBuf,
    pub trajectories: PathBuf,
    pub edge_postings: PathBuf,
    pub vertex_postings: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path, flavor: DatasetFlavor) -> Self {
        let dataset = data_dir.join(flavor.dir_name());
        Self {
            meta: data_dir.join("meta"),
            vertices: data_dir.join("vertices.txt"),
            edges: data_dir.join("edges.txt"),
            raw_edges: data_dir.join("edges_raw.txt"),
            grid: data_dir.join("grid.bin"),
            trajectories: dataset.join("trajectories.txt"),
            edge_postings: dataset.join("edge_postings.bin"),
            vertex_postings: dataset.join("vertex_postings.bin"),
        }
    }
}

/// 查询引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Root directory of all snapshots
    pub data_dir: PathBuf,

    pub dataset: DatasetFlavor,

    /// Query families to serve. Indexes only they need are never built.
    pub query_types: BTreeSet<QueryType>,

    /// "DTW", "Frechet" or "Hausdorff" (case-insensitive)
    pub similarity_measure: String,

    pub preferred_index: PreferredIndex,

    /// Grid resolution in metres; must match the grid snapshot
    pub grid_cell_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            dataset: DatasetFlavor::default(),
            query_types: QueryType::ALL.into_iter().collect(),
            similarity_measure: MeasureType::Dtw.as_str().to_string(),
            preferred_index: PreferredIndex::default(),
            grid_cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl EngineConfig {
    /// Serve every query family
    pub fn all_queries(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Path queries only: no vertex postings, grid or LEVI are built
    pub fn for_path_queries(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            query_types: [QueryType::Path].into_iter().collect(),
            ..Default::default()
        }
    }

    /// Top-k similarity only, with the given measure and index
    pub fn for_similarity(
        data_dir: impl Into<PathBuf>,
        measure: MeasureType,
        preferred_index: PreferredIndex,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            query_types: [QueryType::TopK].into_iter().collect(),
            similarity_measure: measure.as_str().to_string(),
            preferred_index,
            ..Default::default()
        }
    }

    pub fn with_query_types<I: IntoIterator<Item = QueryType>>(mut self, types: I) -> Self {
        self.query_types = types.into_iter().collect();
        self
    }

    pub fn with_dataset(mut self, dataset: DatasetFlavor) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.grid_cell_size = cell_size;
        self
    }

    pub fn is_active(&self, query_type: QueryType) -> bool {
        self.query_types.contains(&query_type)
    }

    /// Resolve the configured measure
    pub fn measure(&self) -> Result<MeasureType> {
        self.similarity_measure.parse()
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir, self.dataset)
    }

    /// Startup validation; any error here is fatal
    pub fn validate(&self) -> Result<()> {
        if self.query_types.is_empty() {
            return Err(EngineError::InvalidConfig("no query types enabled".into()));
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "grid cell size must be positive, got {}",
                self.grid_cell_size
            )));
        }
        if self.is_active(QueryType::Range) || self.is_active(QueryType::TopK) {
            self.measure()?;
        }
        Ok(())
    }
}
