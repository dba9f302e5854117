use std::io;
use std::net::SocketAddr;

/// Failures surfaced by [`crate::runtime::OscTransmitter`].
#[derive(thiserror::Error, Debug)]
pub enum TransmitterError {
    /// The remote host is not a valid IP address.
    #[error("invalid remote address: {0:?}")]
    InvalidRemoteAddress(String),

    /// The custom local host is not a valid IP address.
    #[error("invalid local address: {0:?}")]
    InvalidLocalAddress(String),

    /// A source receiver is required but none is bound, or it has been dropped.
    #[error("source receiver is not available")]
    SourceReceiverUnavailable,

    /// The resolved local endpoint could not be bound.
    #[error("failed to bind {addr}")]
    BindFailure {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("transmitter is not connected")]
    NotConnected,

    #[error("failed to encode packet")]
    Encode(#[source] io::Error),

    #[error("failed to send packet")]
    Send(#[source] io::Error),
}

/// Failures surfaced by [`crate::runtime::OscReceiver`].
#[derive(thiserror::Error, Debug)]
pub enum ReceiverError {
    #[error("invalid local address: {0:?}")]
    InvalidLocalAddress(String),

    #[error("failed to bind {addr}")]
    BindFailure {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("receiver is not connected")]
    NotConnected,

    #[error("failed to receive packet")]
    Receive(#[source] io::Error),

    #[error("malformed packet from {from}")]
    Decode {
        from: SocketAddr,
        #[source]
        source: io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config")]
    Io(#[from] io::Error),

    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),

    #[error("no {kind} named {name:?} in config")]
    Missing { kind: &'static str, name: String },
}
