//! Reading length prefixed frames off a byte stream.

use std::io;

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Align8, Deserialize, LEN_TYPE_SIZE, LenType};

/// The largest frame accepted by default, a whole `2^14` matrix fits with room to spare.
pub const DEFAULT_MAX_FRAME: u64 = 1 << 34;

/// Reads one frame at a time and deserializes it in place.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
    max_frame: u64,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    /// Creates a new `FrameReceiver` accepting frames up to `DEFAULT_MAX_FRAME` bytes.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub fn new(rx: R) -> Self {
        Self {
            rx,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Changes the size above which a frame is refused without being read.
    pub fn with_max_frame(mut self, max_frame: u64) -> Self {
        self.max_frame = max_frame;
        self
    }

    /// Waits for the next frame and deserializes it.
    ///
    /// The body lands in `buf`, whose element type fixes the alignment the
    /// message may borrow with. The buffer is reused across calls.
    ///
    /// # Arguments
    /// * `buf` - The backing storage, the returned `T` borrows from it.
    ///
    /// # Returns
    /// The message, `UnexpectedEof` if the stream ended, or `InvalidData` if
    /// the frame is oversized or malformed.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align8,
    {
        let mut prefix = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut prefix).await?;

        let frame_len = LenType::from_be_bytes(prefix);
        let len = usize::try_from(frame_len)
            .ok()
            .filter(|_| frame_len <= self.max_frame)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "frame of {frame_len} bytes over the limit of {} bytes",
                        self.max_frame
                    ),
                )
            })?;

        trace!("receiving a frame of {len} bytes");
        buf.clear();
        buf.resize(len.div_ceil(size_of::<B>()), B::zeroed());

        let body = &mut bytemuck::cast_slice_mut(buf.as_mut_slice())[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{self, AsyncWriteExt};

    use super::*;
    use crate::msg::Msg;

    #[tokio::test]
    async fn length_prefix_past_the_limit_is_refused() {
        let (mut near, far) = io::duplex(64);
        let mut rx = FrameReceiver::new(far);

        near.write_all(&u64::MAX.to_be_bytes()).await.unwrap();

        let mut buf: Vec<u64> = Vec::new();
        let res: io::Result<Msg> = rx.recv_into(&mut buf).await;
        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::InvalidData);
        assert!(buf.is_empty());
    }
}
