//! Canonical binary encoding.
//!
//! Every value is written as a one-byte tag followed by a fixed-width or
//! length-prefixed payload. Integers are big-endian, lengths are `u32`, and
//! absent optional fields are written as an explicit null instead of being
//! skipped, so two structurally equal values always produce the same bytes.
//! Field order is whatever the type's [`CanonicalEncode`] impl writes; it never
//! depends on map iteration order.

use crate::errors::CoreError;
use crate::hash::{DataHash, DataHasher, HashAlgorithm};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_U64: u8 = 0x02;
const TAG_U128: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_TEXT: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;

/// Types with a schema-fixed canonical encoding.
pub trait CanonicalEncode {
    /// Writes this value into the encoder.
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError>;

    /// Canonical bytes of this value.
    fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut enc = CanonicalEncoder::new();
        self.encode_into(&mut enc)?;
        Ok(enc.finish())
    }

    /// SHA-256 over the canonical bytes.
    fn canonical_hash(&self) -> Result<DataHash, CoreError> {
        Ok(DataHasher::new(HashAlgorithm::Sha256)
            .update(self.canonical_bytes()?)
            .finalize())
    }
}

/// Writer for the canonical encoding.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

fn length_prefix(len: usize) -> Result<u32, CoreError> {
    u32::try_from(len)
        .map_err(|_| CoreError::Encoding(format!("length {} exceeds the u32 limit", len)))
}

impl CanonicalEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Writes an explicit null.
    pub fn null(&mut self) -> &mut Self {
        self.buf.push(TAG_NULL);
        self
    }

    /// Writes a boolean.
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(TAG_BOOL);
        self.buf.push(u8::from(value));
        self
    }

    /// Writes an unsigned 64-bit integer.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.push(TAG_U64);
        // Writing into a Vec cannot fail.
        let _ = self.buf.write_u64::<BigEndian>(value);
        self
    }

    /// Writes an unsigned 128-bit integer.
    pub fn u128(&mut self, value: u128) -> &mut Self {
        self.buf.push(TAG_U128);
        let _ = self.buf.write_u128::<BigEndian>(value);
        self
    }

    /// Writes a byte string.
    pub fn bytes(&mut self, value: &[u8]) -> Result<&mut Self, CoreError> {
        let len = length_prefix(value.len())?;
        self.buf.push(TAG_BYTES);
        let _ = self.buf.write_u32::<BigEndian>(len);
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    /// Writes a UTF-8 string.
    pub fn text(&mut self, value: &str) -> Result<&mut Self, CoreError> {
        let len = length_prefix(value.len())?;
        self.buf.push(TAG_TEXT);
        let _ = self.buf.write_u32::<BigEndian>(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(self)
    }

    /// Writes an array header; the caller must then write exactly `len` items.
    pub fn array(&mut self, len: usize) -> Result<&mut Self, CoreError> {
        let len = length_prefix(len)?;
        self.buf.push(TAG_ARRAY);
        let _ = self.buf.write_u32::<BigEndian>(len);
        Ok(self)
    }

    /// Writes a hash as its imprint bytes.
    pub fn hash(&mut self, value: &DataHash) -> Result<&mut Self, CoreError> {
        self.bytes(&value.imprint())
    }

    /// Writes a nested value.
    pub fn value<T: CanonicalEncode + ?Sized>(&mut self, value: &T) -> Result<&mut Self, CoreError> {
        value.encode_into(self)?;
        Ok(self)
    }

    /// Writes an optional nested value, null when absent.
    pub fn optional<T: CanonicalEncode>(&mut self, value: Option<&T>) -> Result<&mut Self, CoreError> {
        match value {
            Some(v) => self.value(v),
            None => Ok(self.null()),
        }
    }

    /// Writes optional bytes, null when absent.
    pub fn optional_bytes(&mut self, value: Option<&[u8]>) -> Result<&mut Self, CoreError> {
        match value {
            Some(v) => self.bytes(v),
            None => Ok(self.null()),
        }
    }
}

impl CanonicalEncode for DataHash {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.hash(self)?;
        Ok(())
    }
}

/// Reader for the canonical encoding. Every read checks the tag.
pub struct CanonicalDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> CanonicalDecoder<'a> {
    /// Wraps the bytes to decode.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn truncated() -> CoreError {
        CoreError::Encoding("unexpected end of canonical data".to_string())
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), CoreError> {
        let tag = self.cursor.read_u8().map_err(|_| Self::truncated())?;
        if tag != expected {
            return Err(CoreError::Encoding(format!(
                "unexpected tag {:#04x} (expected {:#04x})",
                tag, expected
            )));
        }
        Ok(())
    }

    fn peek_tag(&self) -> Option<u8> {
        let pos = self.cursor.position() as usize;
        self.cursor.get_ref().get(pos).copied()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CoreError> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        let end = start.checked_add(len).ok_or_else(Self::truncated)?;
        if end > data.len() {
            return Err(Self::truncated());
        }
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    /// Reads an unsigned 64-bit integer.
    pub fn u64(&mut self) -> Result<u64, CoreError> {
        self.expect_tag(TAG_U64)?;
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| Self::truncated())
    }

    /// Reads a byte string.
    pub fn bytes(&mut self) -> Result<&'a [u8], CoreError> {
        self.expect_tag(TAG_BYTES)?;
        let len = self
            .cursor
            .read_u32::<BigEndian>()
            .map_err(|_| Self::truncated())?;
        self.take(len as usize)
    }

    /// Reads a byte string of an exact length.
    pub fn fixed_bytes<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let bytes = self.bytes()?;
        if bytes.len() != N {
            return Err(CoreError::Encoding(format!(
                "invalid byte string length: {} (expected {})",
                bytes.len(),
                N
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a UTF-8 string.
    pub fn text(&mut self) -> Result<&'a str, CoreError> {
        self.expect_tag(TAG_TEXT)?;
        let len = self
            .cursor
            .read_u32::<BigEndian>()
            .map_err(|_| Self::truncated())?;
        let raw = self.take(len as usize)?;
        std::str::from_utf8(raw).map_err(|e| CoreError::Encoding(format!("invalid UTF-8: {}", e)))
    }

    /// Reads an array header and returns the item count.
    pub fn array(&mut self) -> Result<usize, CoreError> {
        self.expect_tag(TAG_ARRAY)?;
        let len = self
            .cursor
            .read_u32::<BigEndian>()
            .map_err(|_| Self::truncated())?;
        Ok(len as usize)
    }

    /// Consumes a null if one is next; returns whether it did.
    pub fn null(&mut self) -> Result<bool, CoreError> {
        if self.peek_tag() == Some(TAG_NULL) {
            self.expect_tag(TAG_NULL)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Fails unless every byte was consumed.
    pub fn finish(self) -> Result<(), CoreError> {
        let remaining = self.cursor.get_ref().len() as u64 - self.cursor.position();
        if remaining != 0 {
            return Err(CoreError::Encoding(format!(
                "{} trailing bytes after canonical value",
                remaining
            )));
        }
        Ok(())
    }
}
