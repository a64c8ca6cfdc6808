use std::io;

/// Decodes a frame body. The body has already had its length prefix removed.
pub trait Deserialize<'a>: Sized {
    /// # Errors
    /// `InvalidData` when `buf` isn't a valid encoding of `Self`.
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
