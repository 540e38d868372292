use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::matrix::Cells;

/// How the dot product behind a cell is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelMode {
    /// Plain left to right sum, reproducible bit for bit.
    #[default]
    Sequential,
    /// Fans the dot product out over the rayon pool once the vectors reach `min_len`.
    /// The reduction order changes, results are only equal up to rounding.
    Parallel { min_len: usize },
}

/// Computes the value of cell `(row, col)`, with `col > row`.
///
/// The value is the cube root of the dot product between the `k = col - row`
/// cells of `row` starting at the diagonal and the `k` cells of row `col`
/// starting at column `row + 1`, the latter being the mirror of column `col`.
/// Every cell read lies on a diagonal lower than `k`; the caller guarantees
/// those are already materialized and stores the result on both sides.
///
/// # Arguments
/// * `mtx` - The matrix to read from.
/// * `row` - The row of the cell.
/// * `col` - The column of the cell.
/// * `mode` - The evaluation strategy of the dot product.
///
/// # Returns
/// The value of the cell.
pub fn compute_cell<C>(mtx: &C, row: usize, col: usize, mode: KernelMode) -> f64
where
    C: Cells + Sync + ?Sized,
{
    debug_assert!(col > row, "cell ({row}, {col}) is not above the diagonal");

    let k = col - row;
    let term = |t: usize| mtx.get(row, row + t) * mtx.get(col, row + 1 + t);

    let dot: f64 = match mode {
        KernelMode::Parallel { min_len } if k >= min_len => (0..k).into_par_iter().map(term).sum(),
        _ => (0..k).map(term).sum(),
    };

    dot.cbrt()
}
