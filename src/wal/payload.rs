//! Serializable log payloads
//!
//! Anything written through the generator implements [`LogPayload`].
//! Implementations write nothing when the destination is too small, so a
//! failed encode never leaves partial bytes behind.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, WalError};

/// Payload that knows its encoded size and can write itself into a buffer
pub trait LogPayload {
    /// Number of bytes `serialize_into` will write
    fn serialized_size(&self) -> usize;

    /// Write into `buf[*pos..]`, advancing `pos` only on success
    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()>;
}

/// Copy `data` into `buf[*pos..]` if it fits
fn copy_into(data: &[u8], buf: &mut [u8], pos: &mut usize) -> Result<()> {
    let start = *pos;
    let available = buf.len().saturating_sub(start);
    if available < data.len() {
        return Err(WalError::BufferNotEnough {
            needed: data.len(),
            available,
        });
    }
    buf[start..start + data.len()].copy_from_slice(data);
    *pos = start + data.len();
    Ok(())
}

impl LogPayload for [u8] {
    fn serialized_size(&self) -> usize {
        self.len()
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(self, buf, pos)
    }
}

impl<const N: usize> LogPayload for [u8; N] {
    fn serialized_size(&self) -> usize {
        N
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(self, buf, pos)
    }
}

impl LogPayload for Vec<u8> {
    fn serialized_size(&self) -> usize {
        self.len()
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(self, buf, pos)
    }
}

impl LogPayload for Bytes {
    fn serialized_size(&self) -> usize {
        self.len()
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(self, buf, pos)
    }
}

impl LogPayload for str {
    fn serialized_size(&self) -> usize {
        self.len()
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(self.as_bytes(), buf, pos)
    }
}

impl LogPayload for u64 {
    fn serialized_size(&self) -> usize {
        8
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(&self.to_le_bytes(), buf, pos)
    }
}

/// Any serde value, encoded with bincode
///
/// The value is encoded once up front so size queries and retries after
/// `BufferNotEnough` do not re-run the serializer.
#[derive(Debug, Clone)]
pub struct BincodePayload {
    encoded: Vec<u8>,
}

impl BincodePayload {
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self {
            encoded: bincode::serialize(value)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }
}

impl LogPayload for BincodePayload {
    fn serialized_size(&self) -> usize {
        self.encoded.len()
    }

    fn serialize_into(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        copy_into(&self.encoded, buf, pos)
    }
}

/// Decode a payload written through [`BincodePayload`]
pub fn decode_bincode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(data)?)
}
