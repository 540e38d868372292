use std::{marker::PhantomData, ops::Range};

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

/// Read access to the cells of a square matrix, indexed locally from `0` to `len() - 1`.
pub trait Cells {
    /// The side length of the matrix.
    fn len(&self) -> usize;

    /// Returns the value at `(row, col)`.
    ///
    /// # Panics
    /// If either index is out of range.
    fn get(&self, row: usize, col: usize) -> f64;
}

/// A square block of the global matrix, stored row-major in a single buffer.
///
/// The block starts at global row/column `origin` of a `dim` x `dim` matrix, the
/// whole matrix is the block with origin `0` and length `dim`. At creation the
/// main diagonal holds `(origin + i + 1) / dim` and every other cell is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMtx {
    len: usize,
    origin: usize,
    dim: usize,
    data: Box<[f64]>,
}

impl SquareMtx {
    /// Creates the whole `len` x `len` matrix with its main diagonal seeded.
    ///
    /// # Arguments
    /// * `len` - The side length of the matrix.
    pub fn new(len: usize) -> Self {
        Self::with_origin(len, 0, len)
    }

    /// Creates a seeded block of the global matrix.
    ///
    /// # Arguments
    /// * `len` - The side length of the block.
    /// * `origin` - The global index of the block's first row.
    /// * `dim` - The side length of the global matrix.
    ///
    /// # Panics
    /// If the block doesn't fit inside the global matrix.
    pub fn with_origin(len: usize, origin: usize, dim: usize) -> Self {
        assert!(
            origin + len <= dim,
            "block [{origin}, {}) outside of a matrix of length {dim}",
            origin + len
        );

        let mut data = vec![0.; len * len].into_boxed_slice();
        for m in 0..len {
            data[m * len + m] = (origin + m + 1) as f64 / dim as f64;
        }

        Self {
            len,
            origin,
            dim,
            data,
        }
    }

    /// The side length of this block.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The global index of this block's first row.
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// The side length of the global matrix this block belongs to.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The global rows covered by this block.
    pub fn rows(&self) -> Range<usize> {
        self.origin..self.origin + self.len
    }

    /// The raw row-major cells.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Returns the value at local `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[self.index(row, col)]
    }

    /// Stores `value` at local `(row, col)` and at its mirror `(col, row)`.
    pub fn set_pair(&mut self, row: usize, col: usize, value: f64) {
        let (at, mirror) = (self.index(row, col), self.index(col, row));
        self.data[at] = value;
        self.data[mirror] = value;
    }

    /// Returns whether the global block `[origin, origin + len)` lies inside this one.
    pub fn covers(&self, origin: usize, len: usize) -> bool {
        origin >= self.origin && origin + len <= self.origin + self.len
    }

    /// Creates a larger block with the same origin holding a copy of this one.
    ///
    /// # Arguments
    /// * `len` - The side length of the new block, at least `self.len()`.
    pub fn extended(&self, len: usize) -> Self {
        let mut out = Self::with_origin(len, self.origin, self.dim);
        out.embed(self);
        out
    }

    /// Copies `other` into this block at its global position.
    ///
    /// # Panics
    /// If `other` isn't covered by this block.
    pub fn embed(&mut self, other: &SquareMtx) {
        self.embed_cells(other.origin, other.len, &other.data);
    }

    /// Copies a raw row-major block into this block at its global position.
    ///
    /// # Arguments
    /// * `origin` - The global index of the incoming block's first row.
    /// * `len` - The side length of the incoming block.
    /// * `cells` - Exactly `len * len` cells.
    ///
    /// # Panics
    /// If the incoming block isn't covered by this block or `cells` has the wrong size.
    pub fn embed_cells(&mut self, origin: usize, len: usize, cells: &[f64]) {
        assert!(self.covers(origin, len), "block doesn't fit in the target");
        assert_eq!(cells.len(), len * len, "cells don't match the block length");

        let offset = origin - self.origin;
        for (i, row) in cells.chunks_exact(len.max(1)).enumerate() {
            let at = self.index(offset + i, offset);
            self.data[at..at + len].copy_from_slice(row);
        }
    }

    /// Hands out a lock-free view for concurrent disjoint writes.
    pub(crate) fn shared(&mut self) -> SharedMtx<'_> {
        SharedMtx::new(self)
    }

    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.len && col < self.len,
            "cell ({row}, {col}) outside of a block of length {}",
            self.len
        );

        row * self.len + col
    }
}

impl Cells for SquareMtx {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        SquareMtx::get(self, row, col)
    }
}

/// A view over a `SquareMtx` shared by the farm's threads.
///
/// Reads and writes go through a raw pointer, no locking is involved. Soundness
/// relies on the scheduling discipline: within one diagonal every cell is handed
/// to exactly one thread, and cells are only read once their diagonal has been
/// acknowledged. Debug builds check the write-once half of that contract.
pub(crate) struct SharedMtx<'a> {
    ptr: *mut f64,
    len: usize,
    #[cfg(debug_assertions)]
    written: Box<[AtomicBool]>,
    _mtx: PhantomData<&'a mut SquareMtx>,
}

// SAFETY: the view only allows element-wise reads and `store_pair`, whose contract
// forbids two threads touching the same cell concurrently.
unsafe impl Send for SharedMtx<'_> {}
unsafe impl Sync for SharedMtx<'_> {}

impl<'a> SharedMtx<'a> {
    fn new(mtx: &'a mut SquareMtx) -> Self {
        Self {
            ptr: mtx.data.as_mut_ptr(),
            len: mtx.len,
            #[cfg(debug_assertions)]
            written: (0..mtx.data.len()).map(|_| AtomicBool::new(false)).collect(),
            _mtx: PhantomData,
        }
    }

    /// Stores `value` at `(row, col)` and at its mirror `(col, row)`.
    ///
    /// # Safety
    /// No other thread may access `(row, col)` or `(col, row)` while this call runs,
    /// and the pair must not have been stored before through this view.
    pub(crate) unsafe fn store_pair(&self, row: usize, col: usize, value: f64) {
        let (at, mirror) = (self.index(row, col), self.index(col, row));

        #[cfg(debug_assertions)]
        {
            let twice = self.written[at].swap(true, Ordering::Relaxed);
            debug_assert!(!twice, "cell ({row}, {col}) written twice");
        }

        // SAFETY: both indices are in bounds, exclusivity is the caller's contract.
        unsafe {
            self.ptr.add(at).write(value);
            self.ptr.add(mirror).write(value);
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.len && col < self.len,
            "cell ({row}, {col}) outside of a block of length {}",
            self.len
        );

        row * self.len + col
    }
}

impl Cells for SharedMtx<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        let at = self.index(row, col);

        // SAFETY: in bounds, and readers only look at cells of finished diagonals.
        unsafe { self.ptr.add(at).read() }
    }
}
