use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

// round: u32, origin: u64, len: u64. Keeps the cells 8 bytes aligned inside the frame.
const BLOCK_HEADER_SIZE: usize = size_of::<u32>() + 2 * size_of::<u64>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const BLOCK_H: Header = 2;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// A square block of the matrix, sent by a leaf rank to its branch.
    Block {
        /// The merge round this block belongs to.
        round: u32,
        /// Global index of the block's first row.
        origin: u64,
        /// The side length of the block.
        len: u64,
        /// `len * len` cells in row-major order.
        cells: &'a [f64],
    },
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// First message on a fresh connection, identifies the sending rank.
    Hello { rank: usize },
}

/// The application layer message between ranks.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name of the message kind, for logs and error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Hello { .. }) => "control/hello",
            Msg::Data(Payload::Block { .. }) => "data/block",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {needed} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_H.to_be_bytes());
                Some(e.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());

                // SAFETY: `Command`'s Serialize impl is derived, has no maps and
                //         writes into a `Vec`, so it cannot fail.
                serde_json::to_writer(&mut *buf, cmd).unwrap();
                None
            }
            Msg::Data(Payload::Block {
                round,
                origin,
                len,
                cells,
            }) => {
                buf.extend_from_slice(&BLOCK_H.to_be_bytes());
                buf.extend_from_slice(&round.to_be_bytes());
                buf.extend_from_slice(&origin.to_be_bytes());
                buf.extend_from_slice(&len.to_be_bytes());
                Some(bytemuck::cast_slice(cells))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        }

        let buf: &'a [u8] = buf;
        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);

        match Header::from_be_bytes(be_array(kind_buf)) {
            ERR_H => {
                let string = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_H => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            BLOCK_H => {
                if rest.len() < BLOCK_HEADER_SIZE {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + BLOCK_HEADER_SIZE);
                }

                let (head, bytes) = rest.split_at(BLOCK_HEADER_SIZE);
                let round = u32::from_be_bytes(be_array(&head[..4]));
                let origin = u64::from_be_bytes(be_array(&head[4..12]));
                let len = u64::from_be_bytes(be_array(&head[12..20]));

                let cells: &[f64] = bytemuck::try_cast_slice(bytes).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("block cells can't be viewed as f64: {e:?}"),
                    )
                })?;

                let expected = len.checked_mul(len).map(|n| n as usize);
                if expected != Some(cells.len()) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("block of side {len} carries {} cells", cells.len()),
                    ));
                }

                Ok(Self::Data(Payload::Block {
                    round,
                    origin,
                    len,
                    cells,
                }))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}

/// Copies the first `N` bytes of `bytes` into an array, the caller checked the length.
fn be_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
