//! Uniform spatial grid over network vertices
//!
//! Cells are `cell_size` metres square in the network projection, anchored at
//! the projection origin, so a cell id is stable regardless of which vertices
//! exist. Only occupied cells are stored.

use crate::storage::snapshot;
use crate::types::{BoundingBox, Point, Token};
use crate::{EngineError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reference resolution (metres)
pub const DEFAULT_CELL_SIZE: f64 = 100.0;

/// Grid cell id: (row, col) packed into a u64
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridCellId(u64);

impl GridCellId {
    #[inline]
    pub fn new(row: i32, col: i32) -> Self {
        Self(((row as u32 as u64) << 32) | (col as u32 as u64))
    }

    #[inline]
    pub fn row(&self) -> i32 {
        (self.0 >> 32) as u32 as i32
    }

    #[inline]
    pub fn col(&self) -> i32 {
        (self.0 & 0xFFFF_FFFF) as u32 as i32
    }
}

#[derive(Serialize, Deserialize)]
struct GridSnapshot {
    cell_size: f64,
    cells: Vec<(GridCellId, Vec<Token>)>,
}

/// Occupied-cell bounds, inclusive
#[derive(Debug, Clone, Copy)]
struct Extent {
    min_row: i32,
    max_row: i32,
    min_col: i32,
    max_col: i32,
}

#[derive(Debug)]
pub struct SpatialGridIndex {
    cell_size: f64,
    cells: AHashMap<GridCellId, Vec<Token>>,
    extent: Option<Extent>,
    vertex_count: usize,
}

impl SpatialGridIndex {
    /// Build in memory from projected vertex positions
    pub fn from_points<I>(cell_size: f64, points: I) -> Self
    where
        I: IntoIterator<Item = (Token, Point)>,
    {
        let mut cells: AHashMap<GridCellId, Vec<Token>> = AHashMap::new();
        for (id, point) in points {
            cells.entry(cell_of(cell_size, &point)).or_default().push(id);
        }
        for ids in cells.values_mut() {
            ids.sort_unstable();
        }
        Self::assemble(cell_size, cells)
    }

    /// Load a persisted grid. The snapshot's cell size must match the
    /// configured one.
    pub fn build(path: &Path, cell_size: f64) -> Result<Self> {
        let snapshot: GridSnapshot = snapshot::read_binary(path)?;
        if (snapshot.cell_size - cell_size).abs() > f64::EPSILON {
            return Err(EngineError::InvalidConfig(format!(
                "grid snapshot {} has cell size {}, configured {}",
                path.display(),
                snapshot.cell_size,
                cell_size
            )));
        }
        Ok(Self::assemble(snapshot.cell_size, snapshot.cells.into_iter().collect()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut cells: Vec<(GridCellId, Vec<Token>)> =
            self.cells.iter().map(|(id, v)| (*id, v.clone())).collect();
        cells.sort_unstable_by_key(|(id, _)| (id.row(), id.col()));
        snapshot::write_binary(path, &GridSnapshot { cell_size: self.cell_size, cells })
    }

    fn assemble(cell_size: f64, cells: AHashMap<GridCellId, Vec<Token>>) -> Self {
        let extent = cells.keys().fold(None, |acc: Option<Extent>, id| {
            Some(match acc {
                None => Extent {
                    min_row: id.row(),
                    max_row: id.row(),
                    min_col: id.col(),
                    max_col: id.col(),
                },
                Some(e) => Extent {
                    min_row: e.min_row.min(id.row()),
                    max_row: e.max_row.max(id.row()),
                    min_col: e.min_col.min(id.col()),
                    max_col: e.max_col.max(id.col()),
                },
            })
        });
        let vertex_count = cells.values().map(Vec::len).sum();
        Self { cell_size, cells, extent, vertex_count }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    pub fn cell_of(&self, point: &Point) -> GridCellId {
        cell_of(self.cell_size, point)
    }

    pub fn vertices_in(&self, cell: GridCellId) -> &[Token] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vertices in every cell overlapping `bbox`
    pub fn candidates_in_bbox(&self, bbox: &BoundingBox) -> Vec<Token> {
        let Some(extent) = self.extent else {
            return Vec::new();
        };
        let lo = self.cell_of(&Point::new(bbox.min_x, bbox.min_y));
        let hi = self.cell_of(&Point::new(bbox.max_x, bbox.max_y));
        let min_row = lo.row().max(extent.min_row);
        let max_row = hi.row().min(extent.max_row);
        let min_col = lo.col().max(extent.min_col);
        let max_col = hi.col().min(extent.max_col);
        if min_row > max_row || min_col > max_col {
            return Vec::new();
        }

        let span = (max_row - min_row + 1) as u64 * (max_col - min_col + 1) as u64;
        let mut out = Vec::new();
        if span > self.cells.len() as u64 {
            // sparse grid: cheaper to filter occupied cells
            for (id, ids) in &self.cells {
                if (min_row..=max_row).contains(&id.row()) && (min_col..=max_col).contains(&id.col()) {
                    out.extend_from_slice(ids);
                }
            }
        } else {
            for row in min_row..=max_row {
                for col in min_col..=max_col {
                    out.extend_from_slice(self.vertices_in(GridCellId::new(row, col)));
                }
            }
        }
        out
    }

    /// Vertices in cells at Chebyshev distance exactly `radius` from `center`.
    /// Only the part of the ring overlapping occupied cells is visited.
    pub fn ring(&self, center: GridCellId, radius: u32) -> Vec<Token> {
        let mut out = Vec::new();
        let Some(e) = self.extent else {
            return out;
        };
        let (row, col, r) = (center.row() as i64, center.col() as i64, radius as i64);
        let (min_row, max_row) = (e.min_row as i64, e.max_row as i64);
        let (min_col, max_col) = (e.min_col as i64, e.max_col as i64);
        let mut visit = |rr: i64, cc: i64| {
            out.extend_from_slice(self.vertices_in(GridCellId::new(rr as i32, cc as i32)));
        };

        if r == 0 {
            if (min_row..=max_row).contains(&row) && (min_col..=max_col).contains(&col) {
                visit(row, col);
            }
            return out;
        }

        // top and bottom sides, corners included
        let (c_lo, c_hi) = ((col - r).max(min_col), (col + r).min(max_col));
        for rr in [row - r, row + r] {
            if (min_row..=max_row).contains(&rr) {
                for cc in c_lo..=c_hi {
                    visit(rr, cc);
                }
            }
        }
        // left and right sides
        let (r_lo, r_hi) = ((row - r + 1).max(min_row), (row + r - 1).min(max_row));
        for cc in [col - r, col + r] {
            if (min_col..=max_col).contains(&cc) {
                for rr in r_lo..=r_hi {
                    visit(rr, cc);
                }
            }
        }
        out
    }

    /// Smallest ring radius around `center` that touches an occupied cell's row and column span
    pub fn min_ring(&self, center: GridCellId) -> u32 {
        match self.extent {
            None => 0,
            Some(e) => {
                let (row, col) = (center.row() as i64, center.col() as i64);
                let dr = (e.min_row as i64 - row).max(row - e.max_row as i64).max(0);
                let dc = (e.min_col as i64 - col).max(col - e.max_col as i64).max(0);
                dr.max(dc).min(u32::MAX as i64) as u32
            }
        }
    }

    /// Smallest ring radius around `center` that reaches every occupied cell
    pub fn max_ring(&self, center: GridCellId) -> u32 {
        match self.extent {
            None => 0,
            Some(e) => {
                let (row, col) = (center.row() as i64, center.col() as i64);
                let dr = (row - e.min_row as i64).abs().max((e.max_row as i64 - row).abs());
                let dc = (col - e.min_col as i64).abs().max((e.max_col as i64 - col).abs());
                dr.max(dc).min(u32::MAX as i64) as u32
            }
        }
    }

    /// Nearest vertex to `point` no farther than `max_distance`. `locate`
    /// resolves vertex ids to positions.
    ///
    /// A vertex within `r · cell_size` of `point` always lies within ring `r`,
    /// and one outside ring `r` is at least `r · cell_size` away.
    pub fn nearest<F>(&self, point: &Point, max_distance: f64, locate: F) -> Option<(Token, f64)>
    where
        F: Fn(Token) -> Option<Point>,
    {
        let center = self.cell_of(point);
        let mut best: Option<(Token, f64)> = None;

        for radius in self.min_ring(center)..=self.max_ring(center) {
            if radius.saturating_sub(1) as f64 * self.cell_size > max_distance {
                break;
            }
            for id in self.ring(center, radius) {
                if let Some(p) = locate(id) {
                    let d = point.distance(&p);
                    let better = match best {
                        None => true,
                        Some((best_id, best_d)) => d < best_d || (d == best_d && id < best_id),
                    };
                    if better {
                        best = Some((id, d));
                    }
                }
            }
            if let Some((_, d)) = best {
                if d <= radius as f64 * self.cell_size {
                    break;
                }
            }
        }
        best.filter(|(_, d)| *d <= max_distance)
    }

    /// Number of indexed vertices
    pub fn len(&self) -> usize {
        self.vertex_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        self.vertex_count * std::mem::size_of::<Token>()
            + self.cells.len() * std::mem::size_of::<(GridCellId, Vec<Token>)>()
    }
}

#[inline]
fn cell_of(cell_size: f64, point: &Point) -> GridCellId {
    let clamp = |v: f64| v.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    GridCellId::new(
        clamp((point.y / cell_size).floor()),
        clamp((point.x / cell_size).floor()),
    )
}
