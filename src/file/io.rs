//! Low-level byte order utilities for class-file parsing and generation.
//!
//! Everything in a JVM class file is big-endian. This module provides safe,
//! bounds-checked reading of primitive types from byte buffers through the
//! [`crate::file::io::ClassIO`] trait, plus append-style writers used when
//! regenerating class files. All failures surface as
//! [`crate::Error::OutOfBounds`]; there is no panic path.

use crate::Result;

/// Trait for types that can be read from and written to big-endian byte buffers.
///
/// Implemented for the fixed-width integers and floats that appear in class
/// files. The `BYTES` constant drives bounds checking before any slice access.
pub trait ClassIO: Sized {
    /// Size of the serialized value in bytes.
    const BYTES: usize;

    /// Decode a value from the start of `data` (big-endian). `data` is
    /// guaranteed to hold at least `BYTES` bytes when called through
    /// [`read_be_at`].
    fn from_be(data: &[u8]) -> Self;

    /// Append the big-endian encoding of `self` to `out`.
    fn put_be(self, out: &mut Vec<u8>);
}

macro_rules! impl_class_io {
    ($($t:ty),*) => {
        $(
            impl ClassIO for $t {
                const BYTES: usize = std::mem::size_of::<$t>();

                fn from_be(data: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(&data[..Self::BYTES]);
                    <$t>::from_be_bytes(bytes)
                }

                fn put_be(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }
        )*
    };
}

impl_class_io!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Read a `T` at `*offset`, advancing the offset on success.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `T::BYTES` bytes remain.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let end = offset
        .checked_add(T::BYTES)
        .ok_or_else(|| out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let value = T::from_be(&data[*offset..end]);
    *offset = end;
    Ok(value)
}

/// Append the big-endian encoding of `value` to `out`.
pub fn write_be<T: ClassIO>(out: &mut Vec<u8>, value: T) {
    value.put_be(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_be_primitives() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
        let mut offset = 0;

        let magic: u32 = read_be_at(&data, &mut offset).unwrap();
        assert_eq!(magic, 0xCAFE_BABE);
        let version: u16 = read_be_at(&data, &mut offset).unwrap();
        assert_eq!(version, 0x34);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_be_signed() {
        let data = [0xFF, 0xFE];
        let mut offset = 0;
        let value: i16 = read_be_at(&data, &mut offset).unwrap();
        assert_eq!(value, -2);
    }

    #[test]
    fn read_be_out_of_bounds() {
        let data = [0x01];
        let mut offset = 0;
        let result: Result<u32> = read_be_at(&data, &mut offset);
        assert!(matches!(result, Err(Error::OutOfBounds)));
        assert_eq!(offset, 0);
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut out = Vec::new();
        write_be(&mut out, 0xCAFE_BABEu32);
        write_be(&mut out, -1i16);

        let mut offset = 0;
        assert_eq!(read_be_at::<u32>(&out, &mut offset).unwrap(), 0xCAFE_BABE);
        assert_eq!(read_be_at::<i16>(&out, &mut offset).unwrap(), -1);
    }

}
