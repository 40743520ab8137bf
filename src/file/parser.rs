//! Cursor-based byte stream parser for class-file decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a
//! bounds-checked big-endian reader over a byte slice. It is the single
//! primitive every structure parser in [`crate::classfile`] is built on:
//! the constant pool reader, the field/method readers and the bytecode
//! decoder all drive one of these cursors.
//!
//! # Usage
//!
//! ```rust
//! use jrelax::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE];
//! let mut parser = Parser::new(&data);
//! assert_eq!(parser.read_u32()?, 0xCAFE_BABE);
//! # Ok::<(), jrelax::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A bounds-checked big-endian parser over class-file bytes.
///
/// The parser maintains an internal position cursor; every read validates
/// data availability before touching the buffer, so malformed or truncated
/// input surfaces as [`crate::Error::OutOfBounds`] rather than a panic.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] over a byte slice, positioned at offset 0.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by `step` would
    /// exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self
            .position
            .checked_add(step)
            .ok_or_else(|| out_of_bounds_error!())?;
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = end;
        Ok(())
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at end of data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Read a value of type `T` in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data
    /// length.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at(self.data, &mut self.position)
    }

    /// Read a `u8` and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at end of data.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_be()
    }

    /// Read a big-endian `u16` and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_be()
    }

    /// Read a big-endian `u32` and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_be()
    }

    /// Read a big-endian `i16` and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 2 bytes remain.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_be()
    }

    /// Read a big-endian `i32` and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_be()
    }

    /// Read `count` raw bytes and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `count` bytes
    /// remain.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .ok_or_else(|| out_of_bounds_error!())?;
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Align the position to a 4-byte boundary relative to `base`.
    ///
    /// `tableswitch` and `lookupswitch` operands are padded so their 4-byte
    /// fields start at a multiple of four from the beginning of the method's
    /// code array; `base` is the cursor position of that code-array start.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if padding would exceed the data
    /// length.
    pub fn align4(&mut self, base: usize) -> Result<()> {
        let from_base = self.position - base;
        let padding = (4 - (from_base % 4)) % 4;
        self.advance_by(padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_sequential() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_u32().unwrap(), 0xCAFE_BABE);
        assert_eq!(parser.read_u16().unwrap(), 0);
        assert_eq!(parser.read_u16().unwrap(), 0x34);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn read_bytes_and_bounds() {
        let data = [1, 2, 3];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_bytes(2).unwrap(), &[1, 2]);
        assert!(matches!(parser.read_bytes(2), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [7, 8];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.peek_byte().unwrap(), 7);
        assert_eq!(parser.pos(), 0);
        assert_eq!(parser.read_u8().unwrap(), 7);
    }

    #[test]
    fn align4_relative_to_base() {
        let data = [0u8; 16];
        let mut parser = Parser::new(&data);

        // Base at 3: positions 4..7 pad to 7 (base + 4).
        parser.advance_by(4).unwrap();
        parser.align4(3).unwrap();
        assert_eq!(parser.pos(), 7);

        // Already aligned: no movement.
        parser.align4(3).unwrap();
        assert_eq!(parser.pos(), 7);
    }

    #[test]
    fn signed_reads() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0x00];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_i16().unwrap(), -1);
        assert_eq!(parser.read_i32().unwrap(), -512);
    }
}
