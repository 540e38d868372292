use std::{
    ops::Range,
    sync::mpsc::{Receiver, Sender},
    thread,
};

use log::debug;

use crate::{
    cursor::WorkUnit,
    kernel::{self, KernelMode},
    matrix::{Cells, SharedMtx},
};

/// A worker's acknowledgement of one unit.
#[derive(Debug, Clone, Copy)]
pub(super) struct Completion {
    pub worker: usize,
    pub diag: usize,
    /// Positions of the unit, settled ones included.
    pub processed: usize,
    pub written: usize,
}

/// What a worker reports back to the emitter.
#[derive(Debug, Clone, Copy)]
pub(super) enum Feedback {
    Done(Completion),
    /// Sent while unwinding, so the emitter doesn't wait on a dead worker.
    Panicked { worker: usize },
}

/// Owns a worker's feedback handle and reports a panic when dropped while unwinding.
pub(super) struct PanicGuard {
    worker: usize,
    feedback: Sender<Feedback>,
}

impl PanicGuard {
    pub fn new(worker: usize, feedback: Sender<Feedback>) -> Self {
        Self { worker, feedback }
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.feedback.send(Feedback::Panicked {
                worker: self.worker,
            });
        }
    }
}

/// Everything a thread needs to compute cells, shared by the emitter and the workers.
#[derive(Clone, Copy)]
pub(super) struct Workspace<'a> {
    pub mtx: &'a SharedMtx<'a>,
    pub settled: &'a [Range<usize>],
    pub kernel: KernelMode,
}

impl Workspace<'_> {
    pub fn matrix_len(&self) -> usize {
        self.mtx.len()
    }

    fn is_settled(&self, row: usize, col: usize) -> bool {
        self.settled
            .iter()
            .any(|range| range.contains(&row) && range.contains(&col))
    }
}

/// Runs a worker until its task channel closes or the emitter stops listening.
///
/// # Arguments
/// * `id` - The worker's index in the pool.
/// * `ws` - The matrix and the compute settings.
/// * `tasks` - This worker's FIFO of units.
/// * `feedback` - The channel shared by all workers towards the emitter.
pub(super) fn run(
    id: usize,
    ws: Workspace<'_>,
    tasks: Receiver<WorkUnit>,
    feedback: Sender<Feedback>,
) {
    let guard = PanicGuard::new(id, feedback);
    let mut units = 0;

    while let Ok(unit) = tasks.recv() {
        let (processed, written) = compute_unit(ws, unit);
        let done = Completion {
            worker: id,
            diag: unit.diag,
            processed,
            written,
        };

        if guard.feedback.send(Feedback::Done(done)).is_err() {
            break;
        }

        units += 1;
    }

    debug!(worker = id, units = units; "worker exiting");
}

/// Computes and stores every non settled cell of `unit`.
///
/// # Returns
/// The positions processed and the cells actually written.
pub(super) fn compute_unit(ws: Workspace<'_>, unit: WorkUnit) -> (usize, usize) {
    let mut written = 0;

    for (row, col) in unit.cells() {
        if ws.is_settled(row, col) {
            continue;
        }

        let value = kernel::compute_cell(ws.mtx, row, col, ws.kernel);

        // SAFETY: units of one diagonal are disjoint and the emitter only moves
        // on once the whole diagonal is acknowledged, so no other thread reads
        // or writes this pair while it's stored.
        unsafe { ws.mtx.store_pair(row, col, value) };
        written += 1;
    }

    (unit.len(), written)
}
