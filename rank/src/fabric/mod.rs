//! The transports connecting ranks.

mod local;
mod tcp;

use std::io;

use comms::{FrameReceiver, FrameSender};
use tokio::io::{AsyncRead, AsyncWrite};

pub use local::LocalFabric;
pub use tcp::TcpFabric;

/// Point to point links between the ranks of one run.
///
/// Every link is one way and used for a single block: the leaf opens it, the
/// branch accepts it.
#[trait_variant::make(Fabric: Send)]
pub trait FabricTemplate {
    type Rx: AsyncRead + Unpin + Send + 'static;
    type Tx: AsyncWrite + Unpin + Send + 'static;

    /// This fabric's own rank.
    fn rank(&self) -> usize;

    /// Opens the sending half of a link towards `peer`.
    ///
    /// # Arguments
    /// * `peer` - The physical rank to send to.
    async fn open(&self, peer: usize) -> io::Result<FrameSender<Self::Tx>>;

    /// Waits for `peer` to open a link towards this rank.
    ///
    /// # Arguments
    /// * `peer` - The physical rank expected to send.
    async fn accept(&self, peer: usize) -> io::Result<FrameReceiver<Self::Rx>>;
}
