use super::primitives::{read_osc_blob, read_osc_string, write_osc_blob, write_osc_string};
use super::traits::{OscDeserialize, OscSerialize};
use super::bundle::OscTimeTag;
use std::io::{Error, ErrorKind, Read, Result, Write};

/// A single OSC argument together with its type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    String(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    Bool(bool),
    Nil,
    Impulse,
    Char(char),
    /// RGBA
    Color([u8; 4]),
    /// Port id, status byte, data1, data2
    Midi([u8; 4]),
    TimeTag(OscTimeTag),
}

impl OscArg {
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::String(_) => 's',
            OscArg::Blob(_) => 'b',
            OscArg::Long(_) => 'h',
            OscArg::Double(_) => 'd',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Nil => 'N',
            OscArg::Impulse => 'I',
            OscArg::Char(_) => 'c',
            OscArg::Color(_) => 'r',
            OscArg::Midi(_) => 'm',
            OscArg::TimeTag(_) => 't',
        }
    }

    /// Numeric view used by value mapping. Only `Int` and `Float` qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OscArg::Int(v) => Some(*v as f64),
            OscArg::Float(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            OscArg::Int(v) => v.serialize(writer),
            OscArg::Float(v) => v.serialize(writer),
            OscArg::String(v) => write_osc_string(writer, v),
            OscArg::Blob(v) => write_osc_blob(writer, v),
            OscArg::Long(v) => v.serialize(writer),
            OscArg::Double(v) => v.serialize(writer),
            OscArg::Bool(_) | OscArg::Nil | OscArg::Impulse => Ok(()),
            OscArg::Char(c) => (*c as u32).serialize(writer),
            OscArg::Color(v) | OscArg::Midi(v) => writer.write_all(v),
            OscArg::TimeTag(t) => t.serialize(writer),
        }
    }

    fn read_payload<R: Read>(tag: char, reader: &mut R) -> Result<Self> {
        let arg = match tag {
            'i' => OscArg::Int(i32::deserialize(reader)?),
            'f' => OscArg::Float(f32::deserialize(reader)?),
            's' | 'S' => OscArg::String(read_osc_string(reader)?),
            'b' => OscArg::Blob(read_osc_blob(reader)?),
            'h' => OscArg::Long(i64::deserialize(reader)?),
            'd' => OscArg::Double(f64::deserialize(reader)?),
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            'N' => OscArg::Nil,
            'I' => OscArg::Impulse,
            'c' => {
                let raw = u32::deserialize(reader)?;
                let c = char::from_u32(raw)
                    .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Invalid OSC char"))?;
                OscArg::Char(c)
            }
            'r' | 'm' => {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf)?;
                if tag == 'r' { OscArg::Color(buf) } else { OscArg::Midi(buf) }
            }
            't' => OscArg::TimeTag(OscTimeTag::deserialize(reader)?),
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Unsupported OSC type tag '{}'", other),
                ))
            }
        };
        Ok(arg)
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self { OscArg::Int(v) }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self { OscArg::Float(v) }
}

impl From<&str> for OscArg {
    fn from(v: &str) -> Self { OscArg::String(v.to_string()) }
}

impl From<String> for OscArg {
    fn from(v: String) -> Self { OscArg::String(v) }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self { OscArg::Bool(v) }
}

impl From<Vec<u8>> for OscArg {
    fn from(v: Vec<u8>) -> Self { OscArg::Blob(v) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        OscMessage { address: address.into(), args: Vec::new() }
    }

    pub fn with_arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn type_tags(&self) -> String {
        std::iter::once(',')
            .chain(self.args.iter().map(OscArg::type_tag))
            .collect()
    }
}

impl OscSerialize for OscMessage {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        if !self.address.starts_with('/') {
            return Err(Error::new(ErrorKind::InvalidInput, "OSC address must start with '/'"));
        }
        write_osc_string(writer, &self.address)?;
        write_osc_string(writer, &self.type_tags())?;
        for arg in &self.args {
            arg.write_payload(writer)?;
        }
        Ok(())
    }
}

impl OscDeserialize for OscMessage {
    fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let address = read_osc_string(reader)?;
        if !address.starts_with('/') {
            return Err(Error::new(ErrorKind::InvalidData, "OSC address must start with '/'"));
        }

        let tags = read_osc_string(reader)?;
        let tags = tags
            .strip_prefix(',')
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Missing OSC type tag string"))?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            args.push(OscArg::read_payload(tag, reader)?);
        }
        Ok(OscMessage { address, args })
    }
}
