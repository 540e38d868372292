//! Wavefront computation of a symmetric matrix whose cells above the main
//! diagonal depend on the diagonals below them.

pub mod config;
pub mod cursor;
pub mod farm;
pub mod kernel;
pub mod matrix;
pub mod sequential;

pub use config::{FarmConfig, FarmSpec, clamp_len, clamp_parallelism};
pub use cursor::{DiagonalCursor, Partition, WorkUnit};
pub use farm::{Farm, FarmErr, FarmReport};
pub use kernel::KernelMode;
pub use matrix::{Cells, SquareMtx};
