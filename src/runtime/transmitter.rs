use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Weak};

use super::config::{LocalHostMode, LocalPortMode, TransmitterConfig};
use super::receiver::OscReceiver;
use super::HostMode;
use crate::codec::{OscBundle, OscPacket};
use crate::error::{ReceiverError, TransmitterError};
use crate::logging::{ConsoleLogger, LogLevel, OscLogger};
use crate::transport::{OscTransport, UdpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitterState {
    Closed,
    /// Only observable from inside `connect`.
    Connecting,
    Open,
    /// Last `connect` failed. Behaves like `Closed`.
    Error,
}

/// Sending OSC endpoint.
///
/// The configuration is consumed when [`connect`](Self::connect) resolves the
/// local binding. Changing it through [`configure`](Self::configure) while open
/// closes and reconnects; there is no in-place rebinding.
pub struct OscTransmitter {
    config: TransmitterConfig,
    source_receiver: Option<Weak<OscReceiver>>,
    state: TransmitterState,
    transport: Option<Box<dyn OscTransport>>,
    remote: Option<SocketAddr>,
    bundle: OscBundle,
    resume_after_pause: bool,
    logger: Arc<dyn OscLogger>,
}

impl OscTransmitter {
    pub fn new(config: TransmitterConfig) -> Self {
        Self::with_logger(config, ConsoleLogger::new())
    }

    pub fn with_logger(config: TransmitterConfig, logger: Arc<dyn OscLogger>) -> Self {
        OscTransmitter {
            config,
            source_receiver: None,
            state: TransmitterState::Closed,
            transport: None,
            remote: None,
            bundle: OscBundle::immediate(),
            resume_after_pause: false,
            logger,
        }
    }

    pub fn state(&self) -> TransmitterState {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == TransmitterState::Open
    }

    /// Opens the socket. Does nothing if already open.
    pub fn connect(&mut self) -> Result<(), TransmitterError> {
        if self.state == TransmitterState::Open {
            self.logger.log(LogLevel::Debug, "Transmitter", "Connect ignored, already open");
            return Ok(());
        }

        self.state = TransmitterState::Connecting;
        match self.open_transport() {
            Ok((transport, remote)) => {
                let local = transport
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                self.logger.log(LogLevel::Info, "Transmitter", &format!("Connected {} -> {}", local, remote));
                self.transport = Some(transport);
                self.remote = Some(remote);
                self.state = TransmitterState::Open;
                Ok(())
            }
            Err(e) => {
                self.logger.log(LogLevel::Error, "Transmitter", &format!("Connect failed: {}", e));
                self.state = TransmitterState::Error;
                Err(e)
            }
        }
    }

    fn open_transport(&self) -> Result<(Box<dyn OscTransport>, SocketAddr), TransmitterError> {
        let remote = self.remote_endpoint()?;

        if let Some(receiver) = self.bound_receiver()? {
            if let Some(shared) = receiver.share_transport() {
                return Ok((Box::new(shared), remote));
            }
            let local = receiver_endpoint(&receiver)?;
            let transport = UdpTransport::new_shared(local)
                .map_err(|source| TransmitterError::BindFailure { addr: local, source })?;
            return Ok((Box::new(transport), remote));
        }

        if self.config.local_port_mode == LocalPortMode::FromReceiver {
            self.logger.log(
                LogLevel::Warn,
                "Transmitter",
                "Local port mode FromReceiver is deprecated, bind a source receiver instead",
            );
        }

        let local = self.resolve_local_endpoint()?;
        let transport = UdpTransport::new(local)
            .map_err(|source| TransmitterError::BindFailure { addr: local, source })?;
        Ok((Box::new(transport), remote))
    }

    /// Releases the socket. Does nothing if already closed.
    pub fn close(&mut self) {
        match self.state {
            TransmitterState::Open => {
                self.transport = None;
                self.remote = None;
                if !self.bundle.is_empty() {
                    self.logger.log(
                        LogLevel::Warn,
                        "Transmitter",
                        &format!("Discarding {} unsent bundled messages", self.bundle.len()),
                    );
                }
                self.bundle = OscBundle::immediate();
                self.state = TransmitterState::Closed;
                self.logger.log(LogLevel::Info, "Transmitter", "Closed");
            }
            TransmitterState::Error => self.state = TransmitterState::Closed,
            TransmitterState::Closed | TransmitterState::Connecting => {}
        }
    }

    pub fn reconnect(&mut self) -> Result<(), TransmitterError> {
        self.close();
        self.connect()
    }

    /// Applies a configuration change. An open endpoint is closed and
    /// reconnected with the new settings.
    pub fn configure<F: FnOnce(&mut TransmitterConfig)>(&mut self, f: F) -> Result<(), TransmitterError> {
        f(&mut self.config);
        if self.is_available() { self.reconnect() } else { Ok(()) }
    }

    pub fn set_source_receiver(&mut self, receiver: Option<&Arc<OscReceiver>>) -> Result<(), TransmitterError> {
        self.bind_source_receiver(receiver);
        if self.is_available() { self.reconnect() } else { Ok(()) }
    }

    /// Records the reference only. Takes effect on the next `connect`.
    pub fn bind_source_receiver(&mut self, receiver: Option<&Arc<OscReceiver>>) {
        self.source_receiver = receiver.map(Arc::downgrade);
    }

    /// The bound receiver, if one is set and still alive.
    pub fn source_receiver(&self) -> Option<Arc<OscReceiver>> {
        self.source_receiver.as_ref().and_then(Weak::upgrade)
    }

    fn bound_receiver(&self) -> Result<Option<Arc<OscReceiver>>, TransmitterError> {
        match &self.source_receiver {
            None => Ok(None),
            Some(weak) => weak
                .upgrade()
                .map(Some)
                .ok_or(TransmitterError::SourceReceiverUnavailable),
        }
    }

    pub fn remote_endpoint(&self) -> Result<SocketAddr, TransmitterError> {
        let ip: IpAddr = self
            .config
            .remote_host
            .parse()
            .map_err(|_| TransmitterError::InvalidRemoteAddress(self.config.remote_host.clone()))?;
        Ok(SocketAddr::new(ip, self.config.remote_port))
    }

    /// The address `connect` would bind, without binding it.
    pub fn resolve_local_endpoint(&self) -> Result<SocketAddr, TransmitterError> {
        let remote = self.remote_endpoint()?;

        if let Some(receiver) = self.bound_receiver()? {
            return receiver_endpoint(&receiver);
        }

        let host = match &self.config.local_host_mode {
            LocalHostMode::Any if remote.is_ipv6() => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            LocalHostMode::Any => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            LocalHostMode::Custom { host } => host
                .parse()
                .map_err(|_| TransmitterError::InvalidLocalAddress(host.clone()))?,
        };

        let port = match self.config.local_port_mode {
            LocalPortMode::FromRemotePort => self.config.remote_port,
            LocalPortMode::Custom { port } => port,
            // A bound receiver was handled above
            LocalPortMode::FromReceiver => return Err(TransmitterError::SourceReceiverUnavailable),
        };

        Ok(SocketAddr::new(host, port))
    }

    /// Actual bound address while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().and_then(|t| t.local_addr().ok())
    }

    /// Sends `packet`, or queues it when bundling is enabled. Messages pass
    /// through the map bundle first.
    pub fn send(&mut self, packet: impl Into<OscPacket>) -> Result<(), TransmitterError> {
        if !self.is_available() {
            return Err(TransmitterError::NotConnected);
        }

        let mut packet = packet.into();
        if let Some(map) = &self.config.map_bundle {
            map.apply_packet(&mut packet);
        }

        match packet {
            OscPacket::Message(message) if self.config.use_bundle => {
                self.bundle.push(message);
                Ok(())
            }
            packet => self.send_packet(&packet),
        }
    }

    /// Sends queued messages as one immediate bundle.
    pub fn flush(&mut self) -> Result<(), TransmitterError> {
        if self.bundle.is_empty() {
            return Ok(());
        }
        if !self.is_available() {
            return Err(TransmitterError::NotConnected);
        }
        let bundle = std::mem::replace(&mut self.bundle, OscBundle::immediate());
        self.send_packet(&OscPacket::Bundle(bundle))
    }

    pub fn pending(&self) -> usize {
        self.bundle.len()
    }

    fn send_packet(&self, packet: &OscPacket) -> Result<(), TransmitterError> {
        let (Some(transport), Some(remote)) = (&self.transport, self.remote) else {
            return Err(TransmitterError::NotConnected);
        };
        let bytes = packet.encode().map_err(TransmitterError::Encode)?;
        transport.send(&bytes, remote).map_err(|e| {
            self.logger.log(LogLevel::Error, "Transmitter", &format!("Send to {} failed: {}", remote, e));
            TransmitterError::Send(e)
        })?;
        self.logger.log(LogLevel::Debug, "Transmitter", &format!("Sent {} bytes to {}", bytes.len(), remote));
        Ok(())
    }

    pub fn start(&mut self, mode: HostMode) -> Result<(), TransmitterError> {
        match mode {
            HostMode::Playing if self.config.auto_connect => self.connect(),
            HostMode::Editing if self.config.work_in_editor && !self.is_available() => self.connect(),
            _ => Ok(()),
        }
    }

    pub fn stop(&mut self) {
        self.close();
    }

    /// Closes on pause and reopens on resume when `close_on_pause` is set.
    /// Only an endpoint that was open before the pause is reopened.
    pub fn pause(&mut self, paused: bool) -> Result<(), TransmitterError> {
        if !self.config.close_on_pause {
            return Ok(());
        }
        if paused {
            // Repeated pauses must not forget an endpoint that was open
            self.resume_after_pause |= self.is_available();
            self.close();
            Ok(())
        } else if std::mem::take(&mut self.resume_after_pause) {
            self.connect()
        } else {
            Ok(())
        }
    }

    pub fn remote_host(&self) -> &str {
        &self.config.remote_host
    }

    pub fn remote_port(&self) -> u16 {
        self.config.remote_port
    }

    pub fn local_host_mode(&self) -> &LocalHostMode {
        &self.config.local_host_mode
    }

    pub fn local_port_mode(&self) -> &LocalPortMode {
        &self.config.local_port_mode
    }

    /// Effective local host: the receiver's when one is bound.
    pub fn local_host(&self) -> String {
        if let Some(receiver) = self.source_receiver() {
            return receiver.local_host();
        }
        match &self.config.local_host_mode {
            LocalHostMode::Any => match self.remote_endpoint() {
                Ok(remote) if remote.is_ipv6() => Ipv6Addr::UNSPECIFIED.to_string(),
                _ => Ipv4Addr::UNSPECIFIED.to_string(),
            },
            LocalHostMode::Custom { host } => host.clone(),
        }
    }

    /// Effective local port, `None` if it cannot be resolved.
    pub fn local_port(&self) -> Option<u16> {
        if let Some(addr) = self.local_addr() {
            return Some(addr.port());
        }
        if let Some(receiver) = self.source_receiver() {
            return Some(receiver.local_port());
        }
        match self.config.local_port_mode {
            LocalPortMode::FromRemotePort => Some(self.config.remote_port),
            LocalPortMode::Custom { port } => Some(port),
            LocalPortMode::FromReceiver => None,
        }
    }

    pub fn auto_connect(&self) -> bool {
        self.config.auto_connect
    }

    pub fn close_on_pause(&self) -> bool {
        self.config.close_on_pause
    }

    pub fn work_in_editor(&self) -> bool {
        self.config.work_in_editor
    }

    pub fn use_bundle(&self) -> bool {
        self.config.use_bundle
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }
}

impl Drop for OscTransmitter {
    fn drop(&mut self) {
        self.close();
    }
}

fn receiver_endpoint(receiver: &OscReceiver) -> Result<SocketAddr, TransmitterError> {
    receiver.local_endpoint().map_err(|e| match e {
        ReceiverError::InvalidLocalAddress(host) => TransmitterError::InvalidLocalAddress(host),
        _ => TransmitterError::SourceReceiverUnavailable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;

    fn loopback(remote_port: u16) -> TransmitterConfig {
        TransmitterConfig {
            local_host_mode: LocalHostMode::Custom { host: "127.0.0.1".to_string() },
            local_port_mode: LocalPortMode::Custom { port: 0 },
            ..TransmitterConfig::new("127.0.0.1", remote_port)
        }
    }

    #[test]
    fn test_invalid_remote_hosts_never_open() {
        for host in ["not-an-ip", "", "256.0.0.1", "127.0.0", "localhost", " 127.0.0.1", "1.2.3.4:80"] {
            let mut tx = OscTransmitter::new(TransmitterConfig {
                remote_host: host.to_string(),
                ..loopback(9000)
            });
            let err = tx.connect().unwrap_err();
            assert!(matches!(err, TransmitterError::InvalidRemoteAddress(ref h) if h == host));
            assert!(!tx.is_available());
            assert_eq!(tx.state(), TransmitterState::Error);
        }
    }

    #[test]
    fn test_from_remote_port_mirrors_remote() {
        let tx = OscTransmitter::new(TransmitterConfig::new("127.0.0.1", 9000));
        assert_eq!(tx.local_port_mode(), &LocalPortMode::FromRemotePort);
        let local = tx.resolve_local_endpoint().unwrap();
        assert_eq!(local, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(tx.local_port(), Some(9000));
    }

    #[test]
    fn test_any_host_follows_remote_family() {
        let tx = OscTransmitter::new(TransmitterConfig::new("::1", 9000));
        assert_eq!(tx.resolve_local_endpoint().unwrap(), "[::]:9000".parse().unwrap());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut tx = OscTransmitter::new(loopback(9000));
        tx.connect().unwrap();
        let addr = tx.local_addr().unwrap();

        tx.connect().unwrap();
        assert!(tx.is_available());
        assert_eq!(tx.local_addr(), Some(addr));
    }

    #[test]
    fn test_close_after_connect() {
        let mut tx = OscTransmitter::new(loopback(9000));
        tx.connect().unwrap();
        tx.close();
        assert!(!tx.is_available());
        assert_eq!(tx.state(), TransmitterState::Closed);
        assert_eq!(tx.local_addr(), None);
        tx.close();
        assert_eq!(tx.state(), TransmitterState::Closed);
    }

    #[test]
    fn test_error_state_resets_on_close() {
        let mut tx = OscTransmitter::new(TransmitterConfig::new("bogus", 1));
        assert!(tx.connect().is_err());
        tx.close();
        assert_eq!(tx.state(), TransmitterState::Closed);
    }

    #[test]
    fn test_invalid_local_host() {
        let mut tx = OscTransmitter::new(TransmitterConfig {
            local_host_mode: LocalHostMode::Custom { host: "my-laptop".to_string() },
            ..loopback(9000)
        });
        assert!(matches!(tx.connect(), Err(TransmitterError::InvalidLocalAddress(_))));
        assert!(!tx.is_available());
    }

    #[test]
    fn test_port_in_use_is_bind_failure() {
        let blocker = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut tx = OscTransmitter::new(TransmitterConfig {
            local_port_mode: LocalPortMode::Custom { port },
            ..loopback(9000)
        });
        match tx.connect() {
            Err(TransmitterError::BindFailure { addr, .. }) => assert_eq!(addr.port(), port),
            other => panic!("Expected bind failure, got {:?}", other),
        }
        assert_eq!(tx.state(), TransmitterState::Error);
    }

    #[test]
    fn test_from_receiver_without_receiver() {
        let logger = MemoryLogger::new();
        let mut tx = OscTransmitter::with_logger(
            TransmitterConfig { local_port_mode: LocalPortMode::FromReceiver, ..loopback(9000) },
            logger.clone(),
        );
        assert!(matches!(tx.connect(), Err(TransmitterError::SourceReceiverUnavailable)));
        assert!(logger.contains(LogLevel::Warn, "deprecated"));
        assert_eq!(tx.local_port(), None);
    }

    #[test]
    fn test_send_requires_open() {
        let mut tx = OscTransmitter::new(loopback(9000));
        let err = tx.send(crate::codec::OscMessage::new("/x")).unwrap_err();
        assert!(matches!(err, TransmitterError::NotConnected));
    }

    #[test]
    fn test_configure_while_open_reconnects() {
        let mut tx = OscTransmitter::new(loopback(9000));
        tx.connect().unwrap();
        tx.configure(|c| c.remote_port = 9100).unwrap();
        assert!(tx.is_available());
        assert_eq!(tx.remote_endpoint().unwrap().port(), 9100);

        let err = tx.configure(|c| c.remote_host = "nope".to_string()).unwrap_err();
        assert!(matches!(err, TransmitterError::InvalidRemoteAddress(_)));
        assert!(!tx.is_available());
    }

    #[test]
    fn test_configure_while_closed_does_not_connect() {
        let mut tx = OscTransmitter::new(loopback(9000));
        tx.configure(|c| c.use_bundle = true).unwrap();
        assert!(tx.use_bundle());
        assert!(!tx.is_available());
    }

    #[test]
    fn test_start_honours_host_mode_flags() {
        let mut tx = OscTransmitter::new(TransmitterConfig { auto_connect: false, ..loopback(9000) });
        tx.start(HostMode::Playing).unwrap();
        assert!(!tx.is_available());
        tx.start(HostMode::Editing).unwrap();
        assert!(!tx.is_available());

        tx.configure(|c| c.work_in_editor = true).unwrap();
        tx.start(HostMode::Editing).unwrap();
        assert!(tx.is_available());
        tx.stop();
        assert!(!tx.is_available());

        tx.configure(|c| c.auto_connect = true).unwrap();
        tx.start(HostMode::Playing).unwrap();
        assert!(tx.is_available());
    }

    #[test]
    fn test_repeated_pause_still_resumes() {
        let mut tx = OscTransmitter::new(TransmitterConfig { close_on_pause: true, ..loopback(9000) });
        tx.connect().unwrap();

        tx.pause(true).unwrap();
        tx.pause(true).unwrap();
        assert!(!tx.is_available());

        tx.pause(false).unwrap();
        assert!(tx.is_available());
    }

    #[test]
    fn test_drop_releases_socket() {
        let port = free_port();
        let mut tx = OscTransmitter::new(TransmitterConfig {
            local_port_mode: LocalPortMode::Custom { port },
            ..loopback(9000)
        });
        tx.connect().unwrap();
        let bound = tx.local_addr().unwrap();
        assert_eq!(bound.port(), port);

        drop(tx);
        let rebound = UdpTransport::new(bound).unwrap();
        assert_eq!(rebound.local_addr().unwrap(), bound);
    }

    #[test]
    fn test_any_local_host_follows_remote_family() {
        let v6 = OscTransmitter::new(TransmitterConfig::new("::1", 9000));
        assert_eq!(v6.local_host(), "::");
        assert_eq!(v6.resolve_local_endpoint().unwrap().ip().to_string(), v6.local_host());

        let v4 = OscTransmitter::new(TransmitterConfig::new("127.0.0.1", 9000));
        assert_eq!(v4.local_host(), "0.0.0.0");
    }

    fn free_port() -> u16 {
        let scratch = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        scratch.local_addr().unwrap().port()
    }

    #[test]
    fn test_pause_resume() {
        let mut tx = OscTransmitter::new(loopback(9000));
        tx.connect().unwrap();
        tx.pause(true).unwrap();
        assert!(tx.is_available(), "close_on_pause is off");

        tx.configure(|c| c.close_on_pause = true).unwrap();
        assert!(tx.close_on_pause());
        tx.pause(true).unwrap();
        assert!(!tx.is_available());
        tx.pause(false).unwrap();
        assert!(tx.is_available());

        // Closed before pausing stays closed after resuming
        tx.close();
        tx.pause(true).unwrap();
        tx.pause(false).unwrap();
        assert!(!tx.is_available());
    }
}
