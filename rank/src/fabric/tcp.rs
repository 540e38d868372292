use std::{collections::HashMap, io, net::SocketAddr, time::Duration};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg},
};
use log::{debug, info};
use parking_lot::Mutex;
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use super::Fabric;

const CONNECT_BACKOFF: Duration = Duration::from_millis(50);

/// A fabric over TCP, rank `q` listens on `base_port + q`.
///
/// Every link starts with a `Hello` carrying the sender's rank, links from
/// ranks nobody is waiting for yet are parked until they're accepted.
pub struct TcpFabric {
    rank: usize,
    host: String,
    base_port: u16,
    listener: TcpListener,
    parked: Mutex<HashMap<usize, FrameReceiver<OwnedReadHalf>>>,
}

impl TcpFabric {
    /// Binds this rank's listener.
    ///
    /// # Arguments
    /// * `rank` - This rank.
    /// * `host` - The host every rank listens on.
    /// * `base_port` - The port of rank `0`.
    pub async fn bind(rank: usize, host: impl Into<String>, base_port: u16) -> io::Result<Self> {
        let host = host.into();
        let port = port_of(base_port, rank)?;
        let listener = TcpListener::bind((host.as_str(), port)).await?;

        Ok(Self::from_listener(rank, listener, host, base_port))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(
        rank: usize,
        listener: TcpListener,
        host: impl Into<String>,
        base_port: u16,
    ) -> Self {
        let host = host.into();
        if let Ok(addr) = listener.local_addr() {
            info!("rank {rank} listening at {addr}");
        }

        Self {
            rank,
            host,
            base_port,
            listener,
            parked: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    async fn connect(&self, port: u16) -> io::Result<TcpStream> {
        loop {
            match TcpStream::connect((self.host.as_str(), port)).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    debug!("{}:{port} not up yet, retrying", self.host);
                    time::sleep(CONNECT_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Fabric for TcpFabric {
    type Rx = OwnedReadHalf;
    type Tx = OwnedWriteHalf;

    fn rank(&self) -> usize {
        self.rank
    }

    async fn open(&self, peer: usize) -> io::Result<FrameSender<OwnedWriteHalf>> {
        let port = port_of(self.base_port, peer)?;
        let stream = self.connect(port).await?;
        let (_, tx) = stream.into_split();

        let mut tx = FrameSender::new(tx);
        tx.send(&Msg::Control(Command::Hello { rank: self.rank }))
            .await?;

        debug!("rank {} connected to rank {peer}", self.rank);
        Ok(tx)
    }

    async fn accept(&self, peer: usize) -> io::Result<FrameReceiver<OwnedReadHalf>> {
        loop {
            let parked = self.parked.lock().remove(&peer);
            if let Some(rx) = parked {
                return Ok(rx);
            }

            let (stream, addr) = self.listener.accept().await?;
            let (rx, _) = stream.into_split();
            let mut rx = FrameReceiver::new(rx);

            let mut buf: Vec<u64> = Vec::new();
            let hello: Msg = rx.recv_into(&mut buf).await?;
            let from = match hello {
                Msg::Control(Command::Hello { rank }) => rank,
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("expected a hello from {addr}, got {}", other.kind()),
                    ));
                }
            };

            if from == peer {
                return Ok(rx);
            }

            debug!("rank {} parks the link of rank {from}", self.rank);
            self.parked.lock().insert(from, rx);
        }
    }
}

fn port_of(base_port: u16, rank: usize) -> io::Result<u16> {
    usize::from(base_port)
        .checked_add(rank)
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("rank {rank} has no port above {base_port}"),
            )
        })
}
