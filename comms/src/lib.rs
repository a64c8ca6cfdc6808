mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use deserialize::Deserialize;
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

/// Every frame starts with its body length as a big endian `u64`.
type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// Wraps the two halves of a stream into framed message endpoints.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
