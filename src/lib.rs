pub mod codec;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod transport;
pub mod utilities;

pub use codec::{OscArg, OscBundle, OscMessage, OscPacket, OscTimeTag};
pub use error::{ConfigError, ReceiverError, TransmitterError};
pub use runtime::*;
pub use transport::{OscTransport, UdpTransport};
