//! Data input traits and implementations for the PDX wire format.

use crate::error::{PdxError, Result};
use bytes::Buf;
use std::io::Cursor;

use super::data_output::{ARRAY_LEN_INT_MARKER, ARRAY_LEN_NULL, ARRAY_LEN_SHORT_MARKER};
use super::ds_code::DsCode;

/// Trait for reading primitive values from the PDX binary format.
///
/// All multi-byte values are read in big-endian byte order.
pub trait DataInput {
    /// Reads a single signed byte.
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a single unsigned byte.
    fn read_unsigned_byte(&mut self) -> Result<u8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads a UTF-16 code unit (Java `char`) in big-endian order.
    fn read_char(&mut self) -> Result<u16>;

    /// Reads a 16-bit signed integer in big-endian order.
    fn read_short(&mut self) -> Result<i16>;

    /// Reads a 32-bit signed integer in big-endian order.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads a 64-bit signed integer in big-endian order.
    fn read_long(&mut self) -> Result<i64>;

    /// Reads a 32-bit floating point in big-endian order.
    fn read_float(&mut self) -> Result<f32>;

    /// Reads a 64-bit floating point in big-endian order.
    fn read_double(&mut self) -> Result<f64>;

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Returns the current read position.
    fn position(&self) -> usize;

    /// Moves the read position to `position`.
    fn seek(&mut self, position: usize) -> Result<()>;

    /// Returns the number of bytes remaining to be read.
    fn remaining(&self) -> usize;

    /// Reads an array length written by `DataOutput::write_array_len`.
    ///
    /// Returns -1 for a null array.
    fn read_array_len(&mut self) -> Result<i32> {
        let code = self.read_unsigned_byte()?;
        match code {
            ARRAY_LEN_NULL => Ok(-1),
            ARRAY_LEN_SHORT_MARKER => Ok(self.read_char()? as i32),
            ARRAY_LEN_INT_MARKER => {
                let len = self.read_int()?;
                if len < 0 {
                    return Err(PdxError::Serialization(format!(
                        "invalid array length: {}",
                        len
                    )));
                }
                Ok(len)
            }
            0..=252 => Ok(code as i32),
        }
    }

    /// Reads a Java modified UTF-8 string with an unsigned 16-bit length.
    fn read_utf(&mut self) -> Result<String> {
        let len = self.read_char()? as usize;
        let bytes = self.read_bytes(len)?;
        decode_modified_utf8(&bytes)
    }

    /// Reads a string stored as a 32-bit count of UTF-16 code units.
    fn read_utf_huge(&mut self) -> Result<String> {
        let len = self.read_int()?;
        if len < 0 {
            return Err(PdxError::Serialization(format!(
                "invalid string length: {}",
                len
            )));
        }
        let len = len as usize;
        if len.saturating_mul(2) > self.remaining() {
            return Err(PdxError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                len * 2,
                self.remaining()
            )));
        }
        let mut units = Vec::with_capacity(len);
        for _ in 0..len {
            units.push(self.read_char()?);
        }
        String::from_utf16(&units)
            .map_err(|e| PdxError::Serialization(format!("invalid UTF-16 string: {}", e)))
    }

    /// Reads an ASCII string with an unsigned 16-bit length.
    fn read_ascii(&mut self) -> Result<String> {
        let len = self.read_char()? as usize;
        let bytes = self.read_bytes(len)?;
        ascii_to_string(bytes)
    }

    /// Reads an ASCII string with a 32-bit length.
    fn read_ascii_huge(&mut self) -> Result<String> {
        let len = self.read_int()?;
        if len < 0 {
            return Err(PdxError::Serialization(format!(
                "invalid string length: {}",
                len
            )));
        }
        let bytes = self.read_bytes(len as usize)?;
        ascii_to_string(bytes)
    }

    /// Reads a type-tagged string; the null-string code yields `None`.
    fn read_string(&mut self) -> Result<Option<String>> {
        let code = self.read_unsigned_byte()?;
        self.read_string_body(code)
    }

    /// Reads the body of a string whose type code was already consumed.
    fn read_string_body(&mut self, code: u8) -> Result<Option<String>> {
        match DsCode::from_code(code) {
            Some(DsCode::NullString) => Ok(None),
            Some(DsCode::CacheableString) => self.read_utf().map(Some),
            Some(DsCode::CacheableStringHuge) => self.read_utf_huge().map(Some),
            Some(DsCode::CacheableAsciiString) => self.read_ascii().map(Some),
            Some(DsCode::CacheableAsciiStringHuge) => self.read_ascii_huge().map(Some),
            _ => Err(PdxError::Serialization(format!(
                "expected a string type code, found {}",
                code
            ))),
        }
    }
}

fn ascii_to_string(bytes: Vec<u8>) -> Result<String> {
    if !bytes.is_ascii() {
        return Err(PdxError::Serialization(
            "non-ASCII byte in ASCII string".to_string(),
        ));
    }
    String::from_utf8(bytes)
        .map_err(|e| PdxError::Serialization(format!("invalid ASCII string: {}", e)))
}

/// Decodes Java modified UTF-8 into a string.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let malformed =
        |at: usize| PdxError::Serialization(format!("malformed modified UTF-8 at byte {}", at));
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1).ok_or_else(|| malformed(i))?;
            if b2 & 0xC0 != 0x80 {
                return Err(malformed(i));
            }
            units.push(((b as u16 & 0x1F) << 6) | (b2 as u16 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1).ok_or_else(|| malformed(i))?;
            let b3 = *bytes.get(i + 2).ok_or_else(|| malformed(i))?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return Err(malformed(i));
            }
            units.push(((b as u16 & 0x0F) << 12) | ((b2 as u16 & 0x3F) << 6) | (b3 as u16 & 0x3F));
            i += 3;
        } else {
            return Err(malformed(i));
        }
    }
    String::from_utf16(&units)
        .map_err(|e| PdxError::Serialization(format!("invalid UTF-16 in string: {}", e)))
}

/// A buffer-based implementation of `DataInput`.
#[derive(Debug)]
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Borrows the next `len` bytes without copying and advances past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(len)?;
        let start = self.cursor.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.advance(len);
        Ok(&data[start..start + len])
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(PdxError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_i8())
    }

    fn read_unsigned_byte(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() != 0)
    }

    fn read_char(&mut self) -> Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_u16())
    }

    fn read_short(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_i16())
    }

    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    fn read_long(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_i64())
    }

    fn read_float(&mut self) -> Result<f32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_f32())
    }

    fn read_double(&mut self) -> Result<f64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_f64())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_remaining(len)?;
        let mut buf = vec![0u8; len];
        self.cursor.copy_to_slice(&mut buf);
        Ok(buf)
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn seek(&mut self, position: usize) -> Result<()> {
        let len = self.cursor.get_ref().len();
        if position > len {
            return Err(PdxError::Serialization(format!(
                "seek to {} past end of {} byte buffer",
                position, len
            )));
        }
        self.cursor.set_position(position as u64);
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.cursor.remaining()
    }
}
