use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// A contiguous range of positions `[start, end]` of one diagonal, the unit of dispatch.
///
/// Positions are 1-based: position `p` of diagonal `d` is the cell `(p - 1, p - 1 + d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkUnit {
    pub diag: usize,
    pub start: usize,
    pub end: usize,
}

impl WorkUnit {
    /// The amount of positions in this unit.
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Truncates this unit to a diagonal of length `diag_len`.
    ///
    /// # Returns
    /// `None` if the unit starts past the end of the diagonal.
    pub fn clamped(self, diag_len: usize) -> Option<Self> {
        let start = self.start.max(1);
        let end = self.end.min(diag_len);

        (start <= end).then_some(Self {
            diag: self.diag,
            start,
            end,
        })
    }

    /// The `(row, col)` cells covered by this unit, in position order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let diag = self.diag;
        (self.start..=self.end).map(move |p| (p - 1, p - 1 + diag))
    }
}

/// How a diagonal is split into work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Partition {
    /// Every unit has `ceil(L / W)` positions, except possibly the last one.
    /// With `max_chunk` set the size is capped and more units than workers may be issued.
    Static { max_chunk: Option<NonZeroUsize> },
    /// Each unit has `ceil(remaining / idle_workers)` positions, recomputed after
    /// every assignment.
    Dynamic,
}

impl Default for Partition {
    fn default() -> Self {
        Self::Static { max_chunk: None }
    }
}

/// Tracks the diagonal being computed in a matrix of side `len`.
///
/// Diagonal `0` is the seeded main diagonal, diagonal `d` has `len - d` cells.
#[derive(Debug, Clone)]
pub struct DiagonalCursor {
    len: usize,
    diag: usize,
}

impl DiagonalCursor {
    /// Creates a cursor resting on the main diagonal.
    pub fn new(len: usize) -> Self {
        Self { len, diag: 0 }
    }

    /// The side length of the matrix.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current diagonal.
    pub fn diag(&self) -> usize {
        self.diag
    }

    /// The amount of cells of the current diagonal.
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.diag)
    }

    /// The amount of diagonals above the main one, the advances a full run makes.
    pub fn diagonals(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Returns whether the current diagonal is the single corner cell.
    pub fn is_last(&self) -> bool {
        self.diag + 1 >= self.len
    }

    /// Moves to the next diagonal.
    ///
    /// # Returns
    /// The new diagonal, `None` if the cursor already rests on the last one.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_last() {
            return None;
        }

        self.diag += 1;
        Some(self.diag)
    }

    /// Splits the current diagonal into work units.
    ///
    /// # Arguments
    /// * `partition` - The partition policy.
    /// * `workers` - The amount of workers the units are meant for.
    pub fn chunks(&self, partition: Partition, workers: NonZeroUsize) -> Chunks {
        Chunks::new(self.diag, self.remaining(), partition, workers)
    }
}

/// The sequence of work units for one diagonal.
///
/// Units are disjoint, in position order, never empty, and together cover
/// `[1, diag_len]` exactly.
#[derive(Debug, Clone)]
pub struct Chunks {
    diag: usize,
    next: usize,
    remaining: usize,
    idle: usize,
    partition: Partition,
    fixed: usize,
}

impl Chunks {
    fn new(diag: usize, diag_len: usize, partition: Partition, workers: NonZeroUsize) -> Self {
        let workers = workers.get();
        let fixed = match partition {
            Partition::Static { max_chunk } => {
                let size = diag_len.div_ceil(workers).max(1);
                max_chunk.map_or(size, |cap| size.min(cap.get()))
            }
            Partition::Dynamic => 0,
        };

        Self {
            diag,
            next: 1,
            remaining: diag_len,
            idle: workers,
            partition,
            fixed,
        }
    }

    /// The size every unit but the last has under a static partition.
    pub fn chunk_size(&self) -> Option<usize> {
        matches!(self.partition, Partition::Static { .. }).then_some(self.fixed)
    }
}

impl Iterator for Chunks {
    type Item = WorkUnit;

    fn next(&mut self) -> Option<WorkUnit> {
        if self.remaining == 0 {
            return None;
        }

        let size = match self.partition {
            Partition::Static { .. } => self.fixed,
            Partition::Dynamic => self.remaining.div_ceil(self.idle.max(1)),
        }
        .clamp(1, self.remaining);

        let unit = WorkUnit {
            diag: self.diag,
            start: self.next,
            end: self.next + size - 1,
        };

        self.next += size;
        self.remaining -= size;
        self.idle = self.idle.saturating_sub(1);

        Some(unit)
    }
}
