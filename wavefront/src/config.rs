use std::num::NonZeroUsize;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{cursor::Partition, kernel::KernelMode};

/// Execution bounds of a farm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Size of the worker pool, the emitter runs on the calling thread.
    pub workers: NonZeroUsize,
    #[serde(default)]
    pub partition: Partition,
    /// Lets the emitter compute a trailing unit shorter than a full static chunk.
    #[serde(default = "emitter_assist_default")]
    pub emitter_assist: bool,
    #[serde(default)]
    pub kernel: KernelMode,
    /// Records every dispatched unit in the run's report.
    #[serde(default)]
    pub trace: bool,
}

fn emitter_assist_default() -> bool {
    true
}

impl FarmConfig {
    /// Creates a configuration with a static partition and the sequential kernel.
    ///
    /// # Arguments
    /// * `workers` - Size of the worker pool.
    pub fn new(workers: NonZeroUsize) -> Self {
        Self {
            workers,
            partition: Partition::default(),
            emitter_assist: true,
            kernel: KernelMode::default(),
            trace: false,
        }
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_emitter_assist(mut self, emitter_assist: bool) -> Self {
        self.emitter_assist = emitter_assist;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelMode) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Returns this configuration with its worker count clamped to a matrix of length `len`.
    pub fn clamped(mut self, len: usize) -> Self {
        self.workers = clamp_parallelism(self.workers.get(), len);
        self
    }
}

/// A whole farm run: the matrix and how to compute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSpec {
    pub len: usize,
    pub farm: FarmConfig,
}

impl FarmSpec {
    /// Returns this spec with a valid matrix length and worker count.
    pub fn clamped(self) -> Self {
        let len = clamp_len(self.len);
        Self {
            len,
            farm: self.farm.clamped(len),
        }
    }
}

/// Clamps a requested matrix length to at least `1`.
pub fn clamp_len(len: usize) -> usize {
    if len == 0 {
        warn!("matrix length 0 clamped to 1");
    }

    len.max(1)
}

/// Clamps a requested degree of parallelism into `[1, len]`.
///
/// A matrix of length `0` or `1` still gets one unit so nothing ever runs with
/// zero workers or ranks.
///
/// # Arguments
/// * `requested` - The configured amount of workers or ranks.
/// * `len` - The side length of the matrix.
///
/// # Returns
/// The effective degree of parallelism.
pub fn clamp_parallelism(requested: usize, len: usize) -> NonZeroUsize {
    let upper = len.max(1);
    let effective = requested.clamp(1, upper);

    if effective != requested {
        warn!("parallelism {requested} clamped to {effective} for a matrix of length {len}");
    }

    NonZeroUsize::new(effective).unwrap_or(NonZeroUsize::MIN)
}
