use super::traits::OscTransport;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::Result;
use std::net::{SocketAddr, UdpSocket};

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an exclusive, non-blocking socket.
    pub fn new(bind_addr: SocketAddr) -> Result<Self> {
        Self::bind(bind_addr, false)
    }

    /// Bind a non-blocking socket with SO_REUSEADDR so that another endpoint
    /// that also opts in can bind the same address.
    pub fn new_shared(bind_addr: SocketAddr) -> Result<Self> {
        Self::bind(bind_addr, true)
    }

    fn bind(bind_addr: SocketAddr, reuse_address: bool) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))?;
        if reuse_address {
            socket.set_reuse_address(true)?;
        }
        if bind_addr.is_ipv6() {
            // Keep v6 endpoints reachable from v4-mapped peers
            socket.set_only_v6(false)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&bind_addr.into())?;
        Ok(UdpTransport { socket: socket.into() })
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(UdpTransport { socket: self.socket.try_clone()? })
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }
}

impl OscTransport for UdpTransport {
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize> {
        self.socket.send_to(data, destination)
    }

    fn receive(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buffer)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}
