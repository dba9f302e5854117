//! # OSC Codec Module
//!
//! Encoding and decoding of OSC 1.0 packets.
//!
//! ## Key Types
//!
//! - [`OscMessage`] - Address pattern plus typed arguments
//! - [`OscArg`] - One argument and its type tag
//! - [`OscBundle`] - Time-tagged group of packets
//! - [`OscPacket`] - Either of the above, as sent in one datagram
//! - [`OscSerialize`] / [`OscDeserialize`] - Traits for wire encoding
//!
//! ## Example
//!
//! ```ignore
//! use osc_link::codec::{OscMessage, OscPacket};
//!
//! let packet = OscPacket::from(OscMessage::new("/fader/1").with_arg(0.75f32));
//! let bytes = packet.encode()?;
//! ```

pub mod traits;
pub mod primitives;
pub mod message;
pub mod bundle;

pub use traits::{OscSerialize, OscDeserialize};
pub use message::{OscArg, OscMessage};
pub use bundle::{OscBundle, OscPacket, OscTimeTag};
