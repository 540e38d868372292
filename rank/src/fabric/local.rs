use std::{collections::HashMap, io, sync::Arc};

use comms::{FrameReceiver, FrameSender};
use log::debug;
use parking_lot::Mutex;
use tokio::{io::DuplexStream, sync::Notify};

use super::Fabric;

const LINK_CAPACITY: usize = 64 * 1024;

/// Links opened but not yet accepted, keyed by `(from, to)`.
#[derive(Default)]
struct Pending {
    links: Mutex<HashMap<(usize, usize), DuplexStream>>,
    arrivals: Notify,
}

/// An in-process fabric: every link is a `tokio::io::duplex` pipe.
#[derive(Clone)]
pub struct LocalFabric {
    rank: usize,
    pending: Arc<Pending>,
}

impl LocalFabric {
    /// Creates one connected fabric per rank.
    ///
    /// # Arguments
    /// * `ranks` - The amount of ranks in the run.
    ///
    /// # Returns
    /// The fabrics, indexed by rank.
    pub fn mesh(ranks: usize) -> Vec<Self> {
        let pending = Arc::new(Pending::default());

        (0..ranks)
            .map(|rank| Self {
                rank,
                pending: Arc::clone(&pending),
            })
            .collect()
    }
}

impl Fabric for LocalFabric {
    type Rx = DuplexStream;
    type Tx = DuplexStream;

    fn rank(&self) -> usize {
        self.rank
    }

    async fn open(&self, peer: usize) -> io::Result<FrameSender<DuplexStream>> {
        let (near, far) = tokio::io::duplex(LINK_CAPACITY);

        {
            let mut links = self.pending.links.lock();
            if links.contains_key(&(self.rank, peer)) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("rank {} already has a link towards rank {peer}", self.rank),
                ));
            }
            links.insert((self.rank, peer), far);
        }

        self.pending.arrivals.notify_waiters();
        debug!("rank {} opened a local link towards rank {peer}", self.rank);

        Ok(FrameSender::new(near))
    }

    async fn accept(&self, peer: usize) -> io::Result<FrameReceiver<DuplexStream>> {
        loop {
            // Registered before looking, so an arrival in between still wakes us.
            let arrival = self.pending.arrivals.notified();

            let link = self.pending.links.lock().remove(&(peer, self.rank));
            if let Some(far) = link {
                return Ok(FrameReceiver::new(far));
            }

            arrival.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use comms::msg::{Command, Msg};

    use super::*;

    #[tokio::test]
    async fn link_carries_messages_whoever_comes_first() {
        let mut mesh = LocalFabric::mesh(2);
        let (one, zero) = (mesh.pop().unwrap(), mesh.pop().unwrap());

        let receiving = tokio::spawn(async move {
            let mut rx = zero.accept(1).await.unwrap();
            let mut buf: Vec<u64> = Vec::new();
            let msg: Msg = rx.recv_into(&mut buf).await.unwrap();
            matches!(msg, Msg::Control(Command::Hello { rank: 1 }))
        });

        let mut tx = one.open(0).await.unwrap();
        tx.send(&Msg::Control(Command::Hello { rank: 1 }))
            .await
            .unwrap();

        assert!(receiving.await.unwrap());
    }

    #[tokio::test]
    async fn second_link_to_the_same_peer_is_refused() {
        let mesh = LocalFabric::mesh(2);

        let _tx = mesh[1].open(0).await.unwrap();
        let err = mesh[1].open(0).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }
}
