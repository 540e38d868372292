use std::time::Duration;

use crate::cursor::WorkUnit;

/// What a farm run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FarmReport {
    /// The effective size of the worker pool.
    pub workers: usize,
    /// Diagonals advanced, `len - 1` for a full run.
    pub advances: usize,
    /// Units sent to workers.
    pub dispatched: usize,
    /// Units the emitter computed itself.
    pub assisted: usize,
    /// Cells computed and stored, settled cells excluded. Each pair counts once.
    pub written: usize,
    pub elapsed: Duration,
    /// Every unit in dispatch order, only filled when tracing.
    pub units: Vec<WorkUnit>,
}

impl FarmReport {
    pub(super) fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }
}
