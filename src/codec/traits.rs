use std::io::{Result, Write, Read};

// Trait for Types that can be encoded to the OSC wire format
pub trait OscSerialize {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<()>;
}

// Trait for Types that can be decoded from the OSC wire format
pub trait OscDeserialize: Sized {
    fn deserialize<R: Read>(reader: &mut R) -> Result<Self>;
}
