use std::{error::Error, fmt, io, ops::Range};

use tokio::task::JoinError;
use wavefront::FarmErr;

/// The rank module's result type.
pub type Result<T> = std::result::Result<T, RankErr>;

/// Distributed run failures, all of them fatal.
#[derive(Debug)]
pub enum RankErr {
    Io(io::Error),
    Farm(FarmErr),
    /// The blocking task running the local farm was cancelled or panicked.
    Join(JoinError),
    UnknownRank {
        rank: usize,
        ranks: usize,
    },
    UnexpectedMessage {
        from: usize,
        got: &'static str,
    },
    BlockMismatch {
        from: usize,
        round: u32,
        expected: Range<usize>,
        got_round: u32,
        got: Range<usize>,
    },
    /// A peer reported its own failure instead of sending its block.
    PeerFailed {
        peer: usize,
        reason: String,
    },
    /// Every rank finished but none of them was the root.
    MissingRoot,
}

impl fmt::Display for RankErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankErr::Io(e) => write!(f, "io error: {e}"),
            RankErr::Farm(e) => write!(f, "local farm failed: {e}"),
            RankErr::Join(e) => write!(f, "compute join error: {e}"),
            RankErr::UnknownRank { rank, ranks } => {
                write!(f, "rank {rank} doesn't exist in a run of {ranks} ranks")
            }
            RankErr::UnexpectedMessage { from, got } => {
                write!(f, "unexpected message from rank {from}: got {got}")
            }
            RankErr::BlockMismatch {
                from,
                round,
                expected,
                got_round,
                got,
            } => write!(
                f,
                "block mismatch from rank {from}: expected rows {expected:?} of round {round}, got rows {got:?} of round {got_round}"
            ),
            RankErr::PeerFailed { peer, reason } => write!(f, "rank {peer} failed: {reason}"),
            RankErr::MissingRoot => write!(f, "no rank ended up holding the matrix"),
        }
    }
}

impl Error for RankErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RankErr::Io(e) => Some(e),
            RankErr::Farm(e) => Some(e),
            RankErr::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RankErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<FarmErr> for RankErr {
    fn from(value: FarmErr) -> Self {
        Self::Farm(value)
    }
}

impl From<JoinError> for RankErr {
    fn from(value: JoinError) -> Self {
        Self::Join(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<RankErr> for io::Error {
    fn from(value: RankErr) -> Self {
        match value {
            RankErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
