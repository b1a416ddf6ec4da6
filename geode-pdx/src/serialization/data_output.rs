//! Data output traits and implementations for the PDX wire format.

use crate::error::{PdxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

use super::ds_code::DsCode;

/// Largest array length that fits the single-byte length encoding.
pub const MAX_SHORT_ARRAY_LEN: i32 = 252;

/// Marker byte for a two-byte (unsigned) array length.
pub const ARRAY_LEN_SHORT_MARKER: u8 = 0xFE;

/// Marker byte for a four-byte array length.
pub const ARRAY_LEN_INT_MARKER: u8 = 0xFD;

/// Encoded form of a null array length.
pub const ARRAY_LEN_NULL: u8 = 0xFF;

/// Trait for writing primitive values in the PDX binary format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a single signed byte.
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a single unsigned byte.
    fn write_unsigned_byte(&mut self, v: u8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a UTF-16 code unit (Java `char`) in big-endian order.
    fn write_char(&mut self, v: u16) -> Result<()>;

    /// Writes a 16-bit signed integer in big-endian order.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a 32-bit signed integer in big-endian order.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 64-bit signed integer in big-endian order.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes a 32-bit floating point in big-endian order.
    fn write_float(&mut self, v: f32) -> Result<()>;

    /// Writes a 64-bit floating point in big-endian order.
    fn write_double(&mut self, v: f64) -> Result<()>;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Returns the number of bytes written so far.
    fn position(&self) -> usize;

    /// Writes an array length using the compact 1/3/5 byte encoding.
    ///
    /// A negative length denotes a null array.
    fn write_array_len(&mut self, len: i32) -> Result<()> {
        if len < 0 {
            self.write_unsigned_byte(ARRAY_LEN_NULL)
        } else if len <= MAX_SHORT_ARRAY_LEN {
            self.write_unsigned_byte(len as u8)
        } else if len <= 0xFFFF {
            self.write_unsigned_byte(ARRAY_LEN_SHORT_MARKER)?;
            self.write_char(len as u16)
        } else {
            self.write_unsigned_byte(ARRAY_LEN_INT_MARKER)?;
            self.write_int(len)
        }
    }

    /// Writes a string as Java modified UTF-8 with an unsigned 16-bit length.
    fn write_utf(&mut self, v: &str) -> Result<()> {
        let encoded = encode_modified_utf8(v);
        if encoded.len() > u16::MAX as usize {
            return Err(PdxError::Serialization(format!(
                "encoded string too long: {} bytes",
                encoded.len()
            )));
        }
        self.write_char(encoded.len() as u16)?;
        self.write_bytes(&encoded)
    }

    /// Writes a string as a 32-bit count of UTF-16 code units followed by the units.
    fn write_utf_huge(&mut self, v: &str) -> Result<()> {
        let units: Vec<u16> = v.encode_utf16().collect();
        self.write_int(units.len() as i32)?;
        for unit in units {
            self.write_char(unit)?;
        }
        Ok(())
    }

    /// Writes an ASCII string with an unsigned 16-bit length.
    fn write_ascii(&mut self, v: &str) -> Result<()> {
        if !v.is_ascii() || v.len() > u16::MAX as usize {
            return Err(PdxError::Serialization(format!(
                "not a short ASCII string: '{}'",
                v
            )));
        }
        self.write_char(v.len() as u16)?;
        self.write_bytes(v.as_bytes())
    }

    /// Writes a type-tagged string, choosing the huge encoding for long values.
    ///
    /// `None` is written as the null-string code.
    fn write_string(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            None => self.write_unsigned_byte(DsCode::NullString.code()),
            Some(s) if s.len() * 3 <= u16::MAX as usize => {
                self.write_unsigned_byte(DsCode::CacheableString.code())?;
                self.write_utf(s)
            }
            Some(s) => {
                self.write_unsigned_byte(DsCode::CacheableStringHuge.code())?;
                self.write_utf_huge(s)
            }
        }
    }
}

/// Encodes a string as Java modified UTF-8.
///
/// NUL is written as two bytes and supplementary characters as two
/// three-byte surrogates.
pub fn encode_modified_utf8(v: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len());
    for unit in v.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// A buffer-based implementation of `DataOutput`.
#[derive(Debug)]
pub struct ObjectDataOutput {
    buffer: BytesMut,
}

impl ObjectDataOutput {
    /// Creates a new `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Creates a new `ObjectDataOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consumes the output and returns the written bytes without copying.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Overwrites four already-written bytes at `position` with `v`.
    ///
    /// Used to back-fill headers whose values are only known at the end.
    pub fn write_int_at(&mut self, position: usize, v: i32) -> Result<()> {
        let end = position + 4;
        if end > self.buffer.len() {
            return Err(PdxError::IllegalState(format!(
                "cannot patch bytes {}..{} of a {} byte buffer",
                position,
                end,
                self.buffer.len()
            )));
        }
        self.buffer[position..end].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

impl Default for ObjectDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for ObjectDataOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_unsigned_byte(&mut self, v: u8) -> Result<()> {
        self.buffer.put_u8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(if v { 1 } else { 0 });
        Ok(())
    }

    fn write_char(&mut self, v: u16) -> Result<()> {
        self.buffer.put_u16(v);
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.buffer.put_i16(v);
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.buffer.put_i32(v);
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.buffer.put_i64(v);
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        self.buffer.put_f32(v);
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.buffer.put_f64(v);
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn position(&self) -> usize {
        self.buffer.len()
    }
}
