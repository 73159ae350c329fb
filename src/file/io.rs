//! Bounds-checked big-endian reads for class file decoding.
//!
//! Every multi-byte quantity in a class file (constant pool entries, attribute lengths,
//! branch offsets inside the `Code` attribute) is stored big-endian. This module provides
//! the [`ClassIO`] trait, implemented for all primitive integer and floating point types,
//! plus two free functions that read a value from the front of a buffer or at a moving
//! offset.
//!
//! All reads return [`crate::Error::OutOfBounds`] instead of panicking when the buffer is
//! too short.
//!
//! # Examples
//!
//! ```rust
//! use clearwing::file::io::{read_be, read_be_at};
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x3D];
//! let magic: u32 = read_be(&data)?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! let mut offset = 4;
//! let major: u16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(major, 61);
//! assert_eq!(offset, 6);
//! # Ok::<(), clearwing::Error>(())
//! ```

use crate::Result;

/// Conversion from a fixed-size big-endian byte array.
///
/// Implemented for `u8`..`u64`, `i8`..`i64`, `f32` and `f64`. The associated `Bytes`
/// type is the matching array, so the width of a read is known at compile time.
pub trait ClassIO: Sized {
    /// The byte array holding one encoded value
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from its big-endian representation
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_class_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Read a big-endian value from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the value.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Read a big-endian value at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(bytes) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_be_widths() {
        assert_eq!(read_be::<u8>(&TEST_BUFFER).unwrap(), 0x01);
        assert_eq!(read_be::<u16>(&TEST_BUFFER).unwrap(), 0x0102);
        assert_eq!(read_be::<u32>(&TEST_BUFFER).unwrap(), 0x0102_0304);
        assert_eq!(read_be::<u64>(&TEST_BUFFER).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(read_be::<i16>(&[0xFF, 0xFE]).unwrap(), -2);
    }

    #[test]
    fn read_be_floats() {
        assert_eq!(read_be::<f32>(&1.5_f32.to_be_bytes()).unwrap(), 1.5);
        assert_eq!(read_be::<f64>(&(-2.25_f64).to_be_bytes()).unwrap(), -2.25);
    }

    #[test]
    fn read_be_at_advances() {
        let mut offset = 2;
        let value: u16 = read_be_at(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0304);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_be_errors() {
        assert!(matches!(
            read_be::<u32>(&[0x01, 0x02]),
            Err(Error::OutOfBounds { .. })
        ));

        let mut offset = usize::MAX;
        assert!(matches!(
            read_be_at::<u8>(&TEST_BUFFER, &mut offset),
            Err(Error::OutOfBounds)
        ));
        assert_eq!(offset, usize::MAX);
    }
}
