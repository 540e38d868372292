use super::{FarmErr, Result};

/// The lifecycle of the farm's emitter.
///
/// `Idle -> Dispatching -> Awaiting -> Dispatching -> ... -> Terminated`, with a
/// direct `Idle -> Terminated` when there is no diagonal above the main one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Idle,
    Dispatching,
    /// Waiting for the cells of the current diagonal to be acknowledged.
    Awaiting {
        outstanding: usize,
        /// Whether the diagonal in flight is the last one.
        last: bool,
    },
    Terminated,
}

/// The inputs driving the emitter's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A run starts over `diagonals` diagonals above the main one.
    Start { diagonals: usize },
    /// A whole diagonal of `elements` cells was handed out.
    Dispatched { elements: usize, last: bool },
    /// A unit of `processed` cells was acknowledged.
    Completed { processed: usize },
}

impl EmitterState {
    /// Applies `event` to the current state.
    ///
    /// # Returns
    /// The next state or `FarmErr::IllegalTransition` if the event isn't valid in this state.
    pub fn on(self, event: Event) -> Result<Self> {
        use EmitterState::*;

        let next = match (self, event) {
            (Idle, Event::Start { diagonals: 0 }) => Terminated,
            (Idle, Event::Start { .. }) => Dispatching,
            (Dispatching, Event::Dispatched { elements, last }) if elements > 0 => Awaiting {
                outstanding: elements,
                last,
            },
            (Awaiting { outstanding, last }, Event::Completed { processed })
                if processed <= outstanding =>
            {
                match outstanding - processed {
                    0 if last => Terminated,
                    0 => Dispatching,
                    outstanding => Awaiting { outstanding, last },
                }
            }
            (state, event) => return Err(FarmErr::IllegalTransition { state, event }),
        };

        Ok(next)
    }
}
