use super::traits::{OscSerialize, OscDeserialize};
use std::io::{Error, ErrorKind, Result, Write, Read};

macro_rules! impl_primitive {
    ($type:ty, $bytes:expr) => {
        impl OscSerialize for $type {
            fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
                writer.write_all(&self.to_be_bytes())
            }
        }

        impl OscDeserialize for $type {
            fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
                let mut buf = [0u8; $bytes];
                reader.read_exact(&mut buf)?;
                Ok(<$type>::from_be_bytes(buf))
            }
        }
    };
}

impl_primitive!(u32, 4);
impl_primitive!(u64, 8);
impl_primitive!(i32, 4);
impl_primitive!(i64, 8);
impl_primitive!(f32, 4);
impl_primitive!(f64, 8);

/// Number of zero bytes needed to align `len` to a 4 byte boundary.
pub fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// OSC-string: UTF-8 bytes, a NUL terminator, then zero padding to 4 bytes.
pub fn write_osc_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(Error::new(ErrorKind::InvalidInput, "OSC string contains NUL"));
    }
    writer.write_all(value.as_bytes())?;
    // Terminator plus padding is always between 1 and 4 bytes
    let zeros = 4 - value.len() % 4;
    writer.write_all(&[0u8; 4][..zeros])
}

pub fn read_osc_string<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let mut chunk = [0u8; 4];
        reader.read_exact(&mut chunk)?;
        if let Some(nul) = chunk.iter().position(|b| *b == 0) {
            if chunk[nul..].iter().any(|b| *b != 0) {
                return Err(Error::new(ErrorKind::InvalidData, "OSC string padding is not zeroed"));
            }
            bytes.extend_from_slice(&chunk[..nul]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidData, "Invalid UTF-8"))
}

/// OSC-blob: i32 size, the bytes, then zero padding to 4 bytes.
pub fn write_osc_blob<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    let len = i32::try_from(data.len())
        .map_err(|_| Error::new(ErrorKind::InvalidInput, "OSC blob too large"))?;
    len.serialize(writer)?;
    writer.write_all(data)?;
    writer.write_all(&[0u8; 3][..padding(data.len())])
}

pub fn read_osc_blob<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = i32::deserialize(reader)?;
    if len < 0 {
        return Err(Error::new(ErrorKind::InvalidData, "Negative OSC blob size"));
    }
    let len = len as usize;
    let mut data = Vec::new();
    (&mut *reader).take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(Error::new(ErrorKind::UnexpectedEof, "Truncated OSC blob"));
    }
    let mut pad = [0u8; 3];
    reader.read_exact(&mut pad[..padding(len)])?;
    Ok(data)
}
