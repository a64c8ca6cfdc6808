//! Writes length prefixed frames.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, Serialize};

/// The sending end handle of the communication.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes it.
    ///
    /// The length prefix covers the buffered encoding plus the borrowed tail,
    /// which is written straight from `msg` after the buffer.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { buf, tx } = self;

        buf.clear();
        buf.resize(LEN_TYPE_SIZE, 0);

        let tail = msg.serialize(buf)?;
        let len = buf.len() - LEN_TYPE_SIZE + tail.map_or(0, <[_]>::len);
        let header = (len as LenType).to_be_bytes();

        buf[..header.len()].copy_from_slice(&header);
        tx.write_all(buf).await?;

        if let Some(tail) = tail {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }
}
