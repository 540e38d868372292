//! Writing length prefixed frames onto a byte stream.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, Serialize};

/// Writes one frame per message: a big endian length prefix, the serialized
/// header and, when the message has one, a trailing slice written as is.
pub struct FrameSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    /// Creates a new `FrameSender`.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Frames `msg` and flushes it.
    ///
    /// # Arguments
    /// * `msg` - A serializable message.
    ///
    /// # Returns
    /// An `io::Error` if the writer fails.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { head, tx } = self;

        head.clear();
        head.resize(LEN_TYPE_SIZE, 0);

        let tail = msg.serialize(head);
        let body_len = head.len() - LEN_TYPE_SIZE + tail.map_or(0, <[u8]>::len);
        head[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());

        tx.write_all(head).await?;
        if let Some(tail) = tail {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }

    /// Shuts down the underlying writer, the peer observes end of stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.tx.shutdown().await
    }
}
