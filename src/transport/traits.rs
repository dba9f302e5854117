use std::io::Result;
use std::net::SocketAddr;

/// Trait representing an OSC datagram channel.
/// Object-safe so endpoints can be backed by mocks in tests.
pub trait OscTransport: Send + Sync {
    /// Send one datagram to `destination`.
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize>;

    /// Receive one datagram.
    /// Returns the number of bytes read and the source address.
    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Get the local socket address.
    fn local_addr(&self) -> Result<SocketAddr>;
}
