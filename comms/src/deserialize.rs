use std::io;

/// A message that can be read back from the body of a frame.
pub trait Deserialize<'a>: Sized {
    /// Builds `Self` borrowing from `buf` where possible.
    ///
    /// # Arguments
    /// * `buf` - The body of a frame, without the length prefix.
    ///
    /// # Returns
    /// The message or an `io::Error` of kind `InvalidData` if the bytes are malformed.
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self>;
}
