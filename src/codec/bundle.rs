use super::message::OscMessage;
use super::traits::{OscDeserialize, OscSerialize};
use std::io::{Cursor, Error, ErrorKind, Read, Result, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// 64-bit NTP time tag: upper 32 bits seconds, lower 32 bits fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OscTimeTag(pub u64);

impl OscTimeTag {
    pub const IMMEDIATE: OscTimeTag = OscTimeTag(1);

    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let seconds = since_unix.as_secs() + NTP_UNIX_OFFSET;
        let fraction = ((since_unix.subsec_nanos() as u64) << 32) / 1_000_000_000;
        OscTimeTag((seconds << 32) | fraction)
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn seconds(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn fraction(&self) -> u32 {
        self.0 as u32
    }
}

impl OscSerialize for OscTimeTag {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl OscDeserialize for OscTimeTag {
    fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(OscTimeTag(u64::deserialize(reader)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub time_tag: OscTimeTag,
    pub elements: Vec<OscPacket>,
}

impl OscBundle {
    pub fn new(time_tag: OscTimeTag) -> Self {
        OscBundle { time_tag, elements: Vec::new() }
    }

    pub fn immediate() -> Self {
        Self::new(OscTimeTag::IMMEDIATE)
    }

    pub fn push(&mut self, packet: impl Into<OscPacket>) {
        self.elements.push(packet.into());
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }
}

impl OscSerialize for OscBundle {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(BUNDLE_TAG)?;
        self.time_tag.serialize(writer)?;

        // Each element is prefixed with its encoded size
        for element in &self.elements {
            let encoded = element.encode()?;
            let size = i32::try_from(encoded.len())
                .map_err(|_| Error::new(ErrorKind::InvalidInput, "Bundle element too large"))?;
            size.serialize(writer)?;
            writer.write_all(&encoded)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl From<OscMessage> for OscPacket {
    fn from(message: OscMessage) -> Self {
        OscPacket::Message(message)
    }
}

impl From<OscBundle> for OscPacket {
    fn from(bundle: OscBundle) -> Self {
        OscPacket::Bundle(bundle)
    }
}

impl OscPacket {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Decode one datagram. The whole buffer must be consumed.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() || buf.len() % 4 != 0 {
            return Err(Error::new(ErrorKind::InvalidData, "OSC packet size must be a non-zero multiple of 4"));
        }

        if buf.starts_with(BUNDLE_TAG) {
            let mut cursor = Cursor::new(&buf[BUNDLE_TAG.len()..]);
            let time_tag = OscTimeTag::deserialize(&mut cursor)?;
            let mut bundle = OscBundle::new(time_tag);
            let remaining = cursor.get_ref().len() as u64;

            while cursor.position() < remaining {
                let size = i32::deserialize(&mut cursor)?;
                if size <= 0 || size % 4 != 0 {
                    return Err(Error::new(ErrorKind::InvalidData, "Invalid bundle element size"));
                }
                let start = cursor.position() as usize;
                let end = start + size as usize;
                let element = cursor
                    .get_ref()
                    .get(start..end)
                    .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, "Truncated bundle element"))?;
                bundle.elements.push(OscPacket::decode(element)?);
                cursor.set_position(end as u64);
            }
            return Ok(OscPacket::Bundle(bundle));
        }

        let mut cursor = Cursor::new(buf);
        let message = OscMessage::deserialize(&mut cursor)?;
        if cursor.position() as usize != buf.len() {
            return Err(Error::new(ErrorKind::InvalidData, "Trailing bytes after OSC message"));
        }
        Ok(OscPacket::Message(message))
    }
}

impl OscSerialize for OscPacket {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            OscPacket::Message(m) => m.serialize(writer),
            OscPacket::Bundle(b) => b.serialize(writer),
        }
    }
}
