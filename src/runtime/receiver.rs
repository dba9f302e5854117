use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::{LocalHostMode, ReceiverConfig};
use super::HostMode;
use crate::codec::OscPacket;
use crate::error::ReceiverError;
use crate::logging::{ConsoleLogger, LogLevel, OscLogger};
use crate::transport::{OscTransport, UdpTransport};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_507;

struct ReceiverInner {
    config: ReceiverConfig,
    transport: Option<UdpTransport>,
    resume_after_pause: bool,
    buf: Vec<u8>,
}

/// Listening OSC endpoint. Shared through `Arc` so transmitters can hold a
/// non-owning `Weak` to it and piggyback on its binding.
pub struct OscReceiver {
    inner: Mutex<ReceiverInner>,
    logger: Arc<dyn OscLogger>,
}

impl OscReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self::with_logger(config, ConsoleLogger::new())
    }

    pub fn with_logger(config: ReceiverConfig, logger: Arc<dyn OscLogger>) -> Self {
        OscReceiver {
            inner: Mutex::new(ReceiverInner {
                config,
                transport: None,
                resume_after_pause: false,
                buf: vec![0u8; MAX_DATAGRAM],
            }),
            logger,
        }
    }

    fn inner(&self) -> MutexGuard<'_, ReceiverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect(&self) -> Result<(), ReceiverError> {
        let mut inner = self.inner();
        if inner.transport.is_some() {
            return Ok(());
        }

        let addr = configured_endpoint(&inner.config)?;
        let transport = UdpTransport::new_shared(addr).map_err(|source| {
            self.logger.log(LogLevel::Error, "Receiver", &format!("Bind to {} failed: {}", addr, source));
            ReceiverError::BindFailure { addr, source }
        })?;

        let bound = transport.local_addr().unwrap_or(addr);
        self.logger.log(LogLevel::Info, "Receiver", &format!("Listening on {}", bound));
        inner.transport = Some(transport);
        Ok(())
    }

    pub fn close(&self) {
        let mut inner = self.inner();
        if let Some(transport) = inner.transport.take() {
            let addr = transport.local_addr().map(|a| a.to_string()).unwrap_or_default();
            self.logger.log(LogLevel::Info, "Receiver", &format!("Closed {}", addr));
        }
    }

    pub fn reconnect(&self) -> Result<(), ReceiverError> {
        self.close();
        self.connect()
    }

    pub fn is_available(&self) -> bool {
        self.inner().transport.is_some()
    }

    pub fn local_host_mode(&self) -> LocalHostMode {
        self.inner().config.local_host_mode.clone()
    }

    /// Configured host; `0.0.0.0` for [`LocalHostMode::Any`].
    pub fn local_host(&self) -> String {
        match &self.inner().config.local_host_mode {
            LocalHostMode::Any => Ipv4Addr::UNSPECIFIED.to_string(),
            LocalHostMode::Custom { host } => host.clone(),
        }
    }

    /// Bound port while open, otherwise the configured one.
    pub fn local_port(&self) -> u16 {
        let inner = self.inner();
        inner
            .transport
            .as_ref()
            .and_then(|t| t.local_addr().ok())
            .map(|a| a.port())
            .unwrap_or(inner.config.local_port)
    }

    /// Current binding: the socket's address while open, otherwise the
    /// address `connect` would bind.
    pub fn local_endpoint(&self) -> Result<SocketAddr, ReceiverError> {
        let inner = self.inner();
        if let Some(addr) = inner.transport.as_ref().and_then(|t| t.local_addr().ok()) {
            return Ok(addr);
        }
        configured_endpoint(&inner.config)
    }

    /// Clone of the open socket, for a transmitter sending from this binding.
    pub fn share_transport(&self) -> Option<UdpTransport> {
        self.inner().transport.as_ref().and_then(|t| t.try_clone().ok())
    }

    pub fn configure<F: FnOnce(&mut ReceiverConfig)>(&self, f: F) -> Result<(), ReceiverError> {
        let was_open = {
            let mut inner = self.inner();
            f(&mut inner.config);
            inner.transport.is_some()
        };
        if was_open { self.reconnect() } else { Ok(()) }
    }

    /// Non-blocking. `Ok(None)` when no datagram is pending.
    pub fn receive(&self) -> Result<Option<(OscPacket, SocketAddr)>, ReceiverError> {
        let mut inner = self.inner();
        let ReceiverInner { transport, buf, .. } = &mut *inner;
        let transport = transport.as_ref().ok_or(ReceiverError::NotConnected)?;

        let (size, from) = match transport.receive(buf) {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(ReceiverError::Receive(e)),
        };

        match OscPacket::decode(&buf[..size]) {
            Ok(packet) => Ok(Some((packet, from))),
            Err(source) => {
                self.logger.log(LogLevel::Warn, "Receiver", &format!("Dropping {} malformed bytes from {}", size, from));
                Err(ReceiverError::Decode { from, source })
            }
        }
    }

    pub fn start(&self, mode: HostMode) -> Result<(), ReceiverError> {
        let (auto_connect, work_in_editor) = {
            let inner = self.inner();
            (inner.config.auto_connect, inner.config.work_in_editor)
        };
        match mode {
            HostMode::Playing if auto_connect => self.connect(),
            HostMode::Editing if work_in_editor => self.connect(),
            _ => Ok(()),
        }
    }

    pub fn stop(&self) {
        self.close();
    }

    pub fn pause(&self, paused: bool) -> Result<(), ReceiverError> {
        let resume = {
            let mut inner = self.inner();
            if !inner.config.close_on_pause {
                return Ok(());
            }
            if paused {
                inner.resume_after_pause |= inner.transport.is_some();
                false
            } else {
                std::mem::take(&mut inner.resume_after_pause)
            }
        };
        if paused {
            self.close();
            Ok(())
        } else if resume {
            self.connect()
        } else {
            Ok(())
        }
    }
}

fn configured_endpoint(config: &ReceiverConfig) -> Result<SocketAddr, ReceiverError> {
    let host = match &config.local_host_mode {
        LocalHostMode::Any => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        LocalHostMode::Custom { host } => host
            .parse()
            .map_err(|_| ReceiverError::InvalidLocalAddress(host.clone()))?,
    };
    Ok(SocketAddr::new(host, config.local_port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OscMessage;
    use std::net::UdpSocket;

    fn loopback(port: u16) -> ReceiverConfig {
        ReceiverConfig {
            local_host_mode: LocalHostMode::Custom { host: "127.0.0.1".to_string() },
            ..ReceiverConfig::new(port)
        }
    }

    #[test]
    fn test_connect_and_close_are_idempotent() {
        let receiver = OscReceiver::new(loopback(0));
        receiver.connect().unwrap();
        let port = receiver.local_port();
        assert_ne!(port, 0);

        receiver.connect().unwrap();
        assert_eq!(receiver.local_port(), port);

        receiver.close();
        receiver.close();
        assert!(!receiver.is_available());
        assert_eq!(receiver.local_port(), 0);
    }

    #[test]
    fn test_invalid_custom_host() {
        let receiver = OscReceiver::new(ReceiverConfig {
            local_host_mode: LocalHostMode::Custom { host: "localhost".to_string() },
            ..ReceiverConfig::new(0)
        });
        assert!(matches!(receiver.connect(), Err(ReceiverError::InvalidLocalAddress(_))));
        assert!(!receiver.is_available());
    }

    #[test]
    fn test_any_host_reports_unspecified() {
        let receiver = OscReceiver::new(ReceiverConfig::new(9001));
        assert_eq!(receiver.local_host_mode(), LocalHostMode::Any);
        assert_eq!(receiver.local_host(), "0.0.0.0");
        assert_eq!(receiver.local_endpoint().unwrap(), "0.0.0.0:9001".parse().unwrap());
    }

    #[test]
    fn test_receive_decodes_messages() {
        let receiver = OscReceiver::new(loopback(0));
        assert!(matches!(receiver.receive(), Err(ReceiverError::NotConnected)));

        receiver.connect().unwrap();
        assert!(receiver.receive().unwrap().is_none());

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let bytes = OscPacket::from(OscMessage::new("/ping").with_arg(1i32)).encode().unwrap();
        sender.send_to(&bytes, receiver.local_endpoint().unwrap()).unwrap();

        let (packet, from) = poll(&receiver);
        assert_eq!(from, sender.local_addr().unwrap());
        assert_eq!(packet, OscPacket::from(OscMessage::new("/ping").with_arg(1i32)));
    }

    #[test]
    fn test_malformed_datagram_is_reported() {
        let receiver = OscReceiver::new(loopback(0));
        receiver.connect().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"junk", receiver.local_endpoint().unwrap()).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            match receiver.receive() {
                Err(ReceiverError::Decode { .. }) => break,
                Ok(None) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(std::time::Duration::from_millis(5))
                }
                other => panic!("Expected decode error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_pause_only_when_configured() {
        let receiver = OscReceiver::new(loopback(0));
        receiver.connect().unwrap();
        receiver.pause(true).unwrap();
        assert!(receiver.is_available());

        receiver.configure(|c| c.close_on_pause = true).unwrap();
        assert!(receiver.is_available());
        receiver.pause(true).unwrap();
        assert!(!receiver.is_available());
        receiver.pause(false).unwrap();
        assert!(receiver.is_available());
    }

    #[test]
    fn test_repeated_pause_still_resumes() {
        let receiver = OscReceiver::new(ReceiverConfig { close_on_pause: true, ..loopback(0) });
        receiver.connect().unwrap();

        receiver.pause(true).unwrap();
        receiver.pause(true).unwrap();
        assert!(!receiver.is_available());

        receiver.pause(false).unwrap();
        assert!(receiver.is_available());
    }

    #[test]
    fn test_drop_releases_socket() {
        let port = UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let receiver = OscReceiver::new(loopback(port));
        receiver.connect().unwrap();
        let bound = receiver.local_endpoint().unwrap();
        assert_eq!(bound.port(), port);

        drop(receiver);
        // Exclusive bind fails while any socket still holds the address
        let rebound = UdpTransport::new(bound).unwrap();
        assert_eq!(rebound.local_addr().unwrap(), bound);
    }

    #[test]
    fn test_start_honours_host_mode_flags() {
        let receiver = OscReceiver::new(ReceiverConfig {
            auto_connect: false,
            work_in_editor: true,
            ..loopback(0)
        });
        receiver.start(HostMode::Playing).unwrap();
        assert!(!receiver.is_available());
        receiver.start(HostMode::Editing).unwrap();
        assert!(receiver.is_available());
        receiver.stop();
        assert!(!receiver.is_available());
    }

    fn poll(receiver: &OscReceiver) -> (OscPacket, SocketAddr) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if let Some(r) = receiver.receive().unwrap() {
                return r;
            }
            assert!(std::time::Instant::now() < deadline, "Timed out waiting for packet");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}
