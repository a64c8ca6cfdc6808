use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType};

/// Frames bigger than this are rejected before allocating.
const MAX_FRAME_LEN: usize = 1 << 30;

/// The receiving end handle of the communication.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Reads the next frame into `buf` and decodes it, the result may borrow from `buf`.
    ///
    /// # Errors
    /// `UnexpectedEof` if the peer hung up mid frame, `InvalidData` if the
    /// announced length is over the limit or the body doesn't decode.
    pub async fn recv_into<'buf, T>(&mut self, buf: &'buf mut Vec<u8>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
    {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        buf.clear();
        buf.resize(len, 0);
        self.rx.read_exact(buf).await?;

        T::deserialize(buf.as_slice())
    }
}
