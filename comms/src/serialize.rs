use std::io;

/// Writes a message body into a frame buffer.
///
/// Implementors append their header and any owned encoding into `buf` and may
/// return a borrowed tail that gets written right after it without copying.
pub trait Serialize<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
