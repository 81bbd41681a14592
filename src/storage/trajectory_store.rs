//! Trajectory store: immutable id → edge sequence table
//!
//! Snapshot format, one trajectory per line:
//! ```text
//! <trajectory id>\t<edge>,<edge>,...
//! ```

use super::snapshot;
use crate::types::{Token, TrajectoryId};
use crate::{EngineError, Result};
use ahash::AHashMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable table of map-matched trajectories
#[derive(Debug, Default)]
pub struct TrajectoryStore {
    trajectories: AHashMap<TrajectoryId, Arc<[Token]>>,
    /// Ascending ids, for deterministic scans
    ids: Vec<TrajectoryId>,
}

impl TrajectoryStore {
    /// Load the tab-separated trajectory snapshot
    pub fn load(path: &Path) -> Result<Self> {
        let mut records = Vec::new();

        snapshot::for_each_record(path, |line_no, line| {
            let (id, tokens) = line.split_once('\t').ok_or_else(|| {
                EngineError::malformed(path, line_no, "expected '<id>\\t<tokens>'")
            })?;
            let id: TrajectoryId = snapshot::parse_field(path, line_no, "trajectory id", id)?;
            let tokens: Vec<Token> = snapshot::parse_list(path, line_no, "token", tokens)?;
            records.push((line_no, id, tokens));
            Ok(())
        })?;

        let mut store = Self::default();
        for (line_no, id, tokens) in records {
            if store.trajectories.insert(id, tokens.into()).is_some() {
                return Err(EngineError::malformed(
                    path,
                    line_no,
                    format!("duplicate trajectory id {}", id),
                ));
            }
        }
        store.rebuild_order();
        Ok(store)
    }

    /// Build an in-memory store (duplicate ids keep the last sequence)
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (TrajectoryId, Vec<Token>)>,
    {
        let mut store = Self::default();
        for (id, tokens) in records {
            store.trajectories.insert(id, tokens.into());
        }
        store.rebuild_order();
        store
    }

    fn rebuild_order(&mut self) {
        self.ids = self.trajectories.keys().copied().collect();
        self.ids.sort_unstable();
    }

    pub fn get(&self, id: TrajectoryId) -> Option<&[Token]> {
        self.trajectories.get(&id).map(|t| t.as_ref())
    }

    pub fn contains(&self, id: TrajectoryId) -> bool {
        self.trajectories.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> &[TrajectoryId] {
        &self.ids
    }

    /// `(id, tokens)` in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (TrajectoryId, &[Token])> + '_ {
        self.ids
            .iter()
            .filter_map(move |id| self.get(*id).map(|tokens| (*id, tokens)))
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let tokens: usize = self.trajectories.values().map(|t| t.len()).sum();
        tokens * std::mem::size_of::<Token>()
            + self.trajectories.len()
                * (std::mem::size_of::<TrajectoryId>() * 2 + std::mem::size_of::<Arc<[Token]>>())
    }
}
