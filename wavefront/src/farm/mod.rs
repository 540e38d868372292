//! The shared memory engine: one emitter and a pool of worker threads over a
//! single matrix, synchronized diagonal by diagonal through a feedback loop.

mod emitter;
mod error;
mod report;
mod state;
mod worker;

use std::{ops::Range, sync::mpsc, thread, time::Instant};

use log::{debug, info};

use crate::{config::FarmConfig, matrix::SquareMtx};
use emitter::Emitter;
use worker::Workspace;

pub use error::{FarmErr, Result};
pub use report::FarmReport;
pub use state::{EmitterState, Event};

/// A reusable farm, every run spawns and joins its own worker pool.
#[derive(Debug, Clone, Copy)]
pub struct Farm {
    cfg: FarmConfig,
}

impl Farm {
    /// Creates a new `Farm`.
    ///
    /// # Arguments
    /// * `cfg` - The farm configuration, its worker count gets clamped per run.
    pub fn new(cfg: FarmConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FarmConfig {
        &self.cfg
    }

    /// Computes every cell above the main diagonal of `mtx`.
    ///
    /// # Arguments
    /// * `mtx` - A freshly seeded matrix or block.
    ///
    /// # Returns
    /// What the run did or the first failure of the emitter or a worker.
    pub fn run(&self, mtx: &mut SquareMtx) -> Result<FarmReport> {
        self.run_settled(mtx, &[])
    }

    /// Computes every cell of `mtx` except those inside an already settled block.
    ///
    /// A cell `(row, col)` is settled when both `row` and `col` fall in the same
    /// range of `settled`. Settled cells still count as processed for the
    /// diagonal they belong to, they are just not recomputed.
    ///
    /// # Arguments
    /// * `mtx` - The matrix, holding materialized values in its settled blocks.
    /// * `settled` - Local index ranges of blocks computed by a previous run.
    ///
    /// # Returns
    /// What the run did or the first failure of the emitter or a worker.
    pub fn run_settled(&self, mtx: &mut SquareMtx, settled: &[Range<usize>]) -> Result<FarmReport> {
        let start = Instant::now();
        let len = mtx.len();
        let cfg = self.cfg.clamped(len);

        if len <= 1 {
            debug!("nothing above the diagonal of a matrix of length {len}");
            return Ok(FarmReport::new(cfg.workers.get()));
        }

        let view = mtx.shared();
        let ws = Workspace {
            mtx: &view,
            settled,
            kernel: cfg.kernel,
        };

        let mut report = thread::scope(|s| {
            let (done_tx, done_rx) = mpsc::channel();
            let mut tasks = Vec::with_capacity(cfg.workers.get());
            let mut handles = Vec::with_capacity(cfg.workers.get());

            for id in 0..cfg.workers.get() {
                let (task_tx, task_rx) = mpsc::channel();
                let done_tx = done_tx.clone();

                handles.push(s.spawn(move || worker::run(id, ws, task_rx, done_tx)));
                tasks.push(task_tx);
            }

            // Only the workers hold feedback senders, the channel closes once they're all gone.
            drop(done_tx);

            let emitted = Emitter::new(cfg, tasks, done_rx, ws).run();

            let mut panicked = None;
            for (id, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() && panicked.is_none() {
                    panicked = Some(FarmErr::WorkerPanicked { worker: id });
                }
            }

            match panicked {
                Some(e) => Err(e),
                None => emitted,
            }
        })?;

        report.elapsed = start.elapsed();
        info!(
            "farm computed {} cells of a matrix of length {len} with {} workers in {:?}",
            report.written, report.workers, report.elapsed
        );

        Ok(report)
    }
}
