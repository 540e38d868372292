use std::{error::Error, fmt, io};

use super::state::{EmitterState, Event};

/// The farm module's result type.
pub type Result<T> = std::result::Result<T, FarmErr>;

/// Farm runtime failures, all of them fatal for the run.
#[derive(Debug)]
pub enum FarmErr {
    /// The task channel of a worker closed before the run ended.
    WorkerGone { worker: usize },
    /// Every worker dropped its feedback handle while completions were outstanding.
    FeedbackClosed { diag: usize },
    WorkerPanicked { worker: usize },
    IllegalTransition { state: EmitterState, event: Event },
    /// A completion arrived for a diagonal other than the one in flight.
    StaleCompletion {
        worker: usize,
        expected: usize,
        got: usize,
    },
    /// The emitter tried to dispatch past the last diagonal.
    CursorExhausted { diag: usize },
}

impl fmt::Display for FarmErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FarmErr::WorkerGone { worker } => write!(f, "worker {worker} stopped taking tasks"),
            FarmErr::FeedbackClosed { diag } => {
                write!(f, "feedback channel closed while diagonal {diag} was in flight")
            }
            FarmErr::WorkerPanicked { worker } => write!(f, "worker {worker} panicked"),
            FarmErr::IllegalTransition { state, event } => {
                write!(f, "illegal emitter transition: {event:?} while {state:?}")
            }
            FarmErr::StaleCompletion {
                worker,
                expected,
                got,
            } => write!(
                f,
                "worker {worker} completed diagonal {got}, expected diagonal {expected}"
            ),
            FarmErr::CursorExhausted { diag } => {
                write!(f, "no diagonal left to dispatch after diagonal {diag}")
            }
        }
    }
}

impl Error for FarmErr {}

/// Boundary conversion for binaries / I/O APIs.
impl From<FarmErr> for io::Error {
    fn from(value: FarmErr) -> Self {
        io::Error::other(value)
    }
}
