use std::{
    num::NonZeroUsize,
    sync::mpsc::{Receiver, Sender},
};

use log::{debug, trace};

use super::{
    FarmErr, FarmReport, Result,
    state::{EmitterState, Event},
    worker::{self, Feedback, Workspace},
};
use crate::{
    config::FarmConfig,
    cursor::{DiagonalCursor, WorkUnit},
};

/// The farm's coordinator: walks the diagonals, hands out units and waits for
/// every cell of a diagonal to be acknowledged before moving on.
pub(super) struct Emitter<'a> {
    cfg: FarmConfig,
    cursor: DiagonalCursor,
    tasks: Vec<Sender<WorkUnit>>,
    feedback: Receiver<Feedback>,
    ws: Workspace<'a>,
    report: FarmReport,
}

impl<'a> Emitter<'a> {
    /// Creates a new `Emitter`.
    ///
    /// # Arguments
    /// * `cfg` - The clamped farm configuration.
    /// * `tasks` - One task channel per worker, `cfg.workers` of them.
    /// * `feedback` - The receiving end of the workers' completions.
    /// * `ws` - The matrix and the compute settings, for assisted units.
    pub fn new(
        cfg: FarmConfig,
        tasks: Vec<Sender<WorkUnit>>,
        feedback: Receiver<Feedback>,
        ws: Workspace<'a>,
    ) -> Self {
        Self {
            cfg,
            cursor: DiagonalCursor::new(ws.matrix_len()),
            tasks,
            feedback,
            ws,
            report: FarmReport::new(cfg.workers.get()),
        }
    }

    /// Drives the state machine until every diagonal is acknowledged.
    ///
    /// Consumes the emitter so the task channels close on return, letting idle
    /// workers exit.
    pub fn run(mut self) -> Result<FarmReport> {
        let start = Event::Start {
            diagonals: self.cursor.diagonals(),
        };
        let mut state = EmitterState::Idle.on(start)?;

        while state != EmitterState::Terminated {
            state = match state {
                EmitterState::Dispatching => self.dispatch()?,
                state => self.await_completion(state)?,
            };
        }

        Ok(self.report)
    }

    /// Advances the cursor and hands the new diagonal out.
    fn dispatch(&mut self) -> Result<EmitterState> {
        let diag = self
            .cursor
            .advance()
            .ok_or(FarmErr::CursorExhausted {
                diag: self.cursor.diag(),
            })?;
        self.report.advances += 1;

        let diag_len = self.cursor.remaining();
        let chunks = self.cursor.chunks(self.cfg.partition, self.workers());
        let full = chunks.chunk_size();
        let mut units: Vec<WorkUnit> = chunks.filter_map(|u| u.clamped(diag_len)).collect();

        let short_tail = match (full, units.last()) {
            (Some(full), Some(tail)) => units.len() > 1 && tail.len() < full,
            _ => false,
        };
        let assisted = (self.cfg.emitter_assist && short_tail)
            .then(|| units.pop())
            .flatten();

        let mut state = EmitterState::Dispatching.on(Event::Dispatched {
            elements: diag_len,
            last: self.cursor.is_last(),
        })?;

        let count = units.len();
        for (k, unit) in units.into_iter().enumerate() {
            let worker = k % self.tasks.len();
            self.tasks[worker]
                .send(unit)
                .map_err(|_| FarmErr::WorkerGone { worker })?;

            self.record(unit);
            self.report.dispatched += 1;
        }

        debug!("dispatched diagonal {diag} of {diag_len} cells in {count} units");

        if let Some(tail) = assisted {
            let (processed, written) = worker::compute_unit(self.ws, tail);
            trace!("emitter computed {tail:?}");

            self.record(tail);
            self.report.assisted += 1;
            self.report.written += written;
            state = state.on(Event::Completed { processed })?;
        }

        Ok(state)
    }

    /// Blocks on the feedback channel for the next completion of the current diagonal.
    fn await_completion(&mut self, state: EmitterState) -> Result<EmitterState> {
        let diag = self.cursor.diag();
        let done = match self.feedback.recv() {
            Ok(Feedback::Done(done)) => done,
            Ok(Feedback::Panicked { worker }) => return Err(FarmErr::WorkerPanicked { worker }),
            Err(_) => return Err(FarmErr::FeedbackClosed { diag }),
        };

        if done.diag != diag {
            return Err(FarmErr::StaleCompletion {
                worker: done.worker,
                expected: diag,
                got: done.diag,
            });
        }

        trace!(
            "worker {} acknowledged {} cells of diagonal {diag}",
            done.worker, done.processed
        );

        self.report.written += done.written;
        state.on(Event::Completed {
            processed: done.processed,
        })
    }

    fn record(&mut self, unit: WorkUnit) {
        if self.cfg.trace {
            self.report.units.push(unit);
        }
    }

    fn workers(&self) -> NonZeroUsize {
        self.cfg.workers
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, thread};

    use super::*;
    use crate::{
        farm::worker::{Completion, PanicGuard},
        kernel::KernelMode,
        matrix::SquareMtx,
    };

    fn single_worker() -> FarmConfig {
        FarmConfig::new(NonZeroUsize::MIN)
    }

    #[test]
    fn panicking_worker_fails_the_run() {
        let mut mtx = SquareMtx::new(4);
        let view = mtx.shared();
        let ws = Workspace {
            mtx: &view,
            settled: &[],
            kernel: KernelMode::Sequential,
        };

        let (task_tx, task_rx) = mpsc::channel::<WorkUnit>();
        let (done_tx, done_rx) = mpsc::channel();

        thread::scope(|s| {
            let worker = s.spawn(move || {
                let _guard = PanicGuard::new(0, done_tx);
                if task_rx.recv().is_ok() {
                    panic!("worker lost its unit");
                }
            });

            let res = Emitter::new(single_worker(), vec![task_tx], done_rx, ws).run();

            assert!(matches!(res, Err(FarmErr::WorkerPanicked { worker: 0 })));
            assert!(worker.join().is_err());
        });
    }

    #[test]
    fn completion_for_another_diagonal_is_rejected() {
        let mut mtx = SquareMtx::new(4);
        let view = mtx.shared();
        let ws = Workspace {
            mtx: &view,
            settled: &[],
            kernel: KernelMode::Sequential,
        };

        let (task_tx, task_rx) = mpsc::channel::<WorkUnit>();
        let (done_tx, done_rx) = mpsc::channel();

        thread::scope(|s| {
            s.spawn(move || {
                if let Ok(unit) = task_rx.recv() {
                    let done = Completion {
                        worker: 0,
                        diag: unit.diag + 1,
                        processed: unit.len(),
                        written: 0,
                    };
                    let _ = done_tx.send(Feedback::Done(done));
                }
            });

            let res = Emitter::new(single_worker(), vec![task_tx], done_rx, ws).run();

            assert!(matches!(
                res,
                Err(FarmErr::StaleCompletion {
                    worker: 0,
                    expected: 1,
                    got: 2
                })
            ));
        });
    }

    #[test]
    fn silent_worker_closes_the_feedback_channel() {
        let mut mtx = SquareMtx::new(3);
        let view = mtx.shared();
        let ws = Workspace {
            mtx: &view,
            settled: &[],
            kernel: KernelMode::Sequential,
        };

        let (task_tx, task_rx) = mpsc::channel::<WorkUnit>();
        let (done_tx, done_rx) = mpsc::channel::<Feedback>();

        thread::scope(|s| {
            s.spawn(move || {
                let _ = task_rx.recv();
                drop(done_tx);
            });

            let res = Emitter::new(single_worker(), vec![task_tx], done_rx, ws).run();

            assert!(matches!(res, Err(FarmErr::FeedbackClosed { diag: 1 })));
        });
    }

    #[test]
    fn gone_worker_fails_the_dispatch() {
        let mut mtx = SquareMtx::new(3);
        let view = mtx.shared();
        let ws = Workspace {
            mtx: &view,
            settled: &[],
            kernel: KernelMode::Sequential,
        };

        let (task_tx, task_rx) = mpsc::channel::<WorkUnit>();
        let (_done_tx, done_rx) = mpsc::channel::<Feedback>();
        drop(task_rx);

        let res = Emitter::new(single_worker(), vec![task_tx], done_rx, ws).run();

        assert!(matches!(res, Err(FarmErr::WorkerGone { worker: 0 })));
    }
}
