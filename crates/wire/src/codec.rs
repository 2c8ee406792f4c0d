//! Big-endian primitives shared by every handle-protocol structure.
//!
//! Byte strings are written as a `u32` length prefix followed by the raw
//! bytes. Reads never panic: running past the end of the buffer yields
//! [`WireError::Truncated`].

use crate::errors::{Result, WireError};

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Length-prefixed byte string.
    pub fn put_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| WireError::TooLarge {
            field,
            len: bytes.len(),
            limit: u32::MAX as usize,
        })?;
        self.put_u32(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Raw bytes with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        if self.remaining() < needed {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Length-prefixed byte string, refusing anything above `limit`.
    pub fn get_bytes(&mut self, field: &'static str, limit: usize) -> Result<&'a [u8]> {
        let len = self.get_u32()? as usize;
        if len > limit {
            return Err(WireError::TooLarge { field, len, limit });
        }
        self.take(len)
    }

    pub fn get_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Rest of the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(WireError::TrailingBytes(extra)),
        }
    }
}
