//! The single threaded wavefront, the reference every parallel engine is checked against.

use crate::{
    kernel::{self, KernelMode},
    matrix::SquareMtx,
};

/// Computes every cell above the main diagonal, one diagonal after the other.
///
/// # Arguments
/// * `mtx` - A freshly seeded matrix.
pub fn compute(mtx: &mut SquareMtx) {
    let len = mtx.len();

    for diag in 1..len {
        for row in 0..len - diag {
            let col = row + diag;
            let value = kernel::compute_cell(mtx, row, col, KernelMode::Sequential);
            mtx.set_pair(row, col, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cell_matrix_is_untouched() {
        let mut mtx = SquareMtx::new(1);
        compute(&mut mtx);

        assert_eq!(mtx.as_slice(), [1.]);
    }

    #[test]
    fn two_by_two_computes_one_pair() {
        let mut mtx = SquareMtx::new(2);
        compute(&mut mtx);

        let expected = (0.5f64 * 1.).cbrt();
        assert_eq!(mtx.as_slice(), [0.5, expected, expected, 1.]);
    }
}
