//! Application-side collaborators of the engine.
//!
//! The engine moves opaque bytes; reading the buffer to send and storing the
//! delivered one is the application's business.  What the application does
//! with the payload afterwards (image conversion, display) is out of scope.

use std::fs;
use std::io;
use std::path::Path;

/// Read the whole file at `path` as the buffer to send.
pub fn open_bytes(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    fs::read(path)
}

/// Write a delivered buffer to `path`, replacing any existing file.
pub fn save_bytes(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)
}
