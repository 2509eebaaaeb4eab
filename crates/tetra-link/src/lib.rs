pub mod serial;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::io;

pub use serial::SerialTransport;

/// Raw byte pipe to the camera.
///
/// Implementations never block on receive: `poll_read` hands back whatever
/// has arrived so far (possibly nothing) and returns immediately.
pub trait Transport {
    /// Write all bytes and push them out to the wire.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Copy already-received bytes into `buf`. `Ok(0)` means nothing pending.
    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop any received bytes nobody has read yet.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).poll_read(buf)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}
