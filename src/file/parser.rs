//! Cursor-based byte stream parser for class file decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a byte slice. The class file decoder, the attribute decoders and the bytecode decoder all
//! read through it, so every truncated input surfaces as [`crate::Error::OutOfBounds`] rather
//! than a panic.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser::read_be`] - Read primitive types (big-endian)
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a sub-slice and skip it
//! - [`crate::file::parser::Parser::read_modified_utf8`] - Decode the JVM's modified UTF-8
//! - [`crate::file::parser::Parser::align`] - Skip padding, used by `tableswitch`/`lookupswitch`
//!
//! # Usage Examples
//!
//! ```rust
//! use clearwing::Parser;
//!
//! let data = [0x00, 0x03, b'f', b'o', b'o', 0x12];
//! let mut parser = Parser::new(&data);
//!
//! let length = parser.read_be::<u16>()?;
//! let name = parser.read_modified_utf8(length as usize)?;
//! assert_eq!(name, "foo");
//! assert_eq!(parser.peek_byte()?, 0x12);
//! # Ok::<(), clearwing::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A cursor over a borrowed byte slice.
///
/// All read operations advance the cursor; all of them are bounds checked.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to `pos`.
    ///
    /// Seeking to exactly the end is allowed so that a caller can mark the input
    /// as consumed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` lies past the end.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `step` bytes remain.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The complete underlying data, independent of the cursor.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Read a value without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
    pub fn peek_be<T: ClassIO>(&self) -> Result<T> {
        let mut temp_position = self.position;
        read_be_at::<T>(self.data, &mut temp_position)
    }

    /// Skip forward to the next multiple of `alignment`, relative to the start of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding runs past the end.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a big-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Decode `len` bytes of modified UTF-8 (JVMS 4.4.7).
    ///
    /// NUL is encoded as `0xC0 0x80` and supplementary characters as two three-byte
    /// surrogate sequences. Unpaired surrogates are replaced with U+FFFD.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is too short and
    /// [`crate::Error::Malformed`] on an invalid lead or continuation byte.
    pub fn read_modified_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        if bytes.iter().all(|byte| *byte != 0 && *byte < 0x80) {
            return Ok(bytes.iter().map(|byte| char::from(*byte)).collect());
        }

        let mut units: Vec<u16> = Vec::with_capacity(len);
        let mut index = 0;
        while index < bytes.len() {
            let first = u16::from(bytes[index]);
            let continuation = |offset: usize| -> Result<u16> {
                match bytes.get(index + offset) {
                    Some(byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
                    _ => Err(malformed_error!(
                        "Invalid modified UTF-8 continuation at {}",
                        index + offset
                    )),
                }
            };

            if first & 0x80 == 0 {
                units.push(first);
                index += 1;
            } else if first & 0xE0 == 0xC0 {
                units.push(((first & 0x1F) << 6) | continuation(1)?);
                index += 2;
            } else if first & 0xF0 == 0xE0 {
                units.push(((first & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
                index += 3;
            } else {
                return Err(malformed_error!(
                    "Invalid modified UTF-8 lead byte {:#04x} at {}",
                    first,
                    index
                ));
            }
        }

        Ok(char::decode_utf16(units)
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_and_navigate() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_be::<u16>().unwrap(), 0x0102);
        assert_eq!(parser.pos(), 2);
        assert_eq!(parser.peek_be::<u16>().unwrap(), 0x0304);
        assert_eq!(parser.pos(), 2);

        parser.advance_by(1).unwrap();
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x04, 0x05]);
        assert!(parser.has_more_data());

        parser.seek(6).unwrap();
        assert!(!parser.has_more_data());
        assert!(matches!(parser.peek_byte(), Err(Error::OutOfBounds { .. })));
        assert!(matches!(parser.seek(7), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_align() {
        let data = [0_u8; 12];
        let mut parser = Parser::new(&data);

        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.seek(9).unwrap();
        assert!(parser.align(8).is_err());
    }

    #[test]
    fn test_modified_utf8_ascii() {
        let data = b"java/lang/Object";
        let mut parser = Parser::new(data);
        assert_eq!(
            parser.read_modified_utf8(data.len()).unwrap(),
            "java/lang/Object"
        );
    }

    #[test]
    fn test_modified_utf8_nul_and_two_byte() {
        // 'a', NUL as C0 80, 'é' as C3 A9
        let data = [b'a', 0xC0, 0x80, 0xC3, 0xA9];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_modified_utf8(5).unwrap(), "a\0é");
    }

    #[test]
    fn test_modified_utf8_surrogate_pair() {
        // U+1F600 as the surrogate pair D83D DE00, each in three-byte form
        let data = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_modified_utf8(6).unwrap(), "\u{1F600}");
    }

    #[test]
    fn test_modified_utf8_invalid() {
        let data = [0xC3, 0x41];
        let mut parser = Parser::new(&data);
        assert!(matches!(
            parser.read_modified_utf8(2),
            Err(Error::Malformed { .. })
        ));

        let data = [0xF0, 0x80, 0x80, 0x80];
        let mut parser = Parser::new(&data);
        assert!(parser.read_modified_utf8(4).is_err());

        let mut parser = Parser::new(&data);
        assert!(matches!(
            parser.read_modified_utf8(8),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
