//! 构建记录与一次性构建单元
//!
//! Every heavyweight structure is built through a `BuildCell`, which runs
//! its builder at most once and records the build in a shared `BuildLog`.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Heavyweight construction steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildStep {
    RoadNetwork,
    Mapper,
    TrajectoryStore,
    EdgeInvertedIndex,
    RawEdgeLookup,
    VertexInvertedIndex,
    GridIndex,
    Levi,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 构建统计信息
#[derive(Debug, Default, Clone)]
pub struct BuildStats {
    /// 完成的构建次数
    pub count: usize,

    /// 构建耗时（毫秒），累计
    pub build_time_ms: u64,

    /// 最近一次构建的近似内存占用（字节）
    pub index_size_bytes: usize,
}

/// Shared record of completed builds
#[derive(Debug, Default)]
pub struct BuildLog {
    steps: Mutex<BTreeMap<BuildStep, BuildStats>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, step: BuildStep, build_time_ms: u64, size_bytes: usize) {
        let mut steps = self.steps.lock();
        let stats = steps.entry(step).or_default();
        stats.count += 1;
        stats.build_time_ms += build_time_ms;
        stats.index_size_bytes = size_bytes;
    }

    /// Completed builds of `step`
    pub fn count(&self, step: BuildStep) -> usize {
        self.steps.lock().get(&step).map_or(0, |s| s.count)
    }

    pub fn stats(&self, step: BuildStep) -> Option<BuildStats> {
        self.steps.lock().get(&step).cloned()
    }

    pub fn is_built(&self, step: BuildStep) -> bool {
        self.count(step) > 0
    }

    /// Run one build step and record it. `size` reports the footprint of the
    /// built value.
    pub fn timed<T, F, S>(&self, step: BuildStep, build: F, size: S) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
        S: FnOnce(&T) -> usize,
    {
        let start = Instant::now();
        let value = build().map_err(|e| {
            tracing::error!(step = %step, error = %e, "build failed");
            e
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let bytes = size(&value);

        self.record(step, elapsed_ms, bytes);
        tracing::info!(step = %step, elapsed_ms, bytes, "built");
        Ok(value)
    }

    /// Sum of the latest footprint of every step
    pub fn total_memory(&self) -> usize {
        self.steps.lock().values().map(|s| s.index_size_bytes).sum()
    }
}

/// Build-at-most-once slot
///
/// The first caller builds while holding the lock; concurrent callers wait
/// and then share the same `Arc`. A failed build leaves the cell empty.
pub struct BuildCell<T: ?Sized> {
    step: BuildStep,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized> BuildCell<T> {
    pub fn new(step: BuildStep) -> Self {
        Self { step, slot: Mutex::new(None) }
    }

    pub fn step(&self) -> BuildStep {
        self.step
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().clone()
    }

    pub fn is_built(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Return the cached value or run `build`. `size` reports the footprint
    /// of a freshly built value for the log.
    pub fn get_or_try_build<F, S>(&self, log: &BuildLog, build: F, size: S) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
        S: FnOnce(&T) -> usize,
    {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }

        let value = log.timed(self.step, build, |v: &Arc<T>| size(&**v))?;
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }
}

impl<T: ?Sized> fmt::Debug for BuildCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildCell")
            .field("step", &self.step)
            .field("built", &self.is_built())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builds_once() {
        let log = BuildLog::new();
        let cell: BuildCell<Vec<u32>> = BuildCell::new(BuildStep::GridIndex);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cell
                .get_or_try_build(
                    &log,
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(vec![1, 2, 3]))
                    },
                    |v| v.len() * 4,
                )
                .unwrap();
            assert_eq!(v.len(), 3);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.count(BuildStep::GridIndex), 1);
        assert_eq!(log.stats(BuildStep::GridIndex).unwrap().index_size_bytes, 12);
        assert!(!log.is_built(BuildStep::Levi));
    }

    #[test]
    fn test_failed_build_leaves_cell_empty() {
        let log = BuildLog::new();
        let cell: BuildCell<u32> = BuildCell::new(BuildStep::Levi);

        let err = cell
            .get_or_try_build(&log, || Err(EngineError::Index("boom".into())), |_| 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::Index(_)));
        assert!(!cell.is_built());
        assert_eq!(log.count(BuildStep::Levi), 0);

        let v = cell.get_or_try_build(&log, || Ok(Arc::new(7)), |_| 4).unwrap();
        assert_eq!(*v, 7);
        assert_eq!(log.count(BuildStep::Levi), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_build() {
        let log = BuildLog::new();
        let cell: BuildCell<u64> = BuildCell::new(BuildStep::EdgeInvertedIndex);
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    cell.get_or_try_build(
                        &log,
                        || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Arc::new(42))
                        },
                        |_| 8,
                    )
                    .unwrap();
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.count(BuildStep::EdgeInvertedIndex), 1);
    }
}
