//! Binary row codec for winagg spill files.
//!
//! Rows that no longer fit in the row store's memory budget are written to a scratch file
//! one record at a time. This crate produces and parses the record *body*; the store adds
//! its own length framing around it.
//!
//! ## Body Format (little endian)
//!
//! ```text
//! +--------+----------+---------+---------+-----
//! | row_id | n_values | value 0 | value 1 | ...
//! | u64    | u32      |         |         |
//! +--------+----------+---------+---------+-----
//!
//! value: [tag: u8][payload]
//!   Null      -
//!   Boolean   u8
//!   Int32     i32
//!   Int64     i64
//!   Float64   f64 bits
//!   String    u32 length + UTF-8 bytes
//!   DateTime  i64
//!   Bytes     u32 length + bytes
//!   Array     u32 count + values
//! ```

#![no_std]

extern crate alloc;

mod decoder;
mod encoder;

pub use decoder::{decode_row, DecodeError};
pub use encoder::RowEncoder;

/// Size of the fixed row header: row id plus value count.
pub const ROW_HEADER_SIZE: usize = 12;

/// Value tags for binary encoding
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Null = 0,
    Boolean = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 4,
    String = 5,
    DateTime = 6,
    Bytes = 7,
    Array = 8,
}

impl ValueTag {
    /// Parses a tag byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => ValueTag::Null,
            1 => ValueTag::Boolean,
            2 => ValueTag::Int32,
            3 => ValueTag::Int64,
            4 => ValueTag::Float64,
            5 => ValueTag::String,
            6 => ValueTag::DateTime,
            7 => ValueTag::Bytes,
            8 => ValueTag::Array,
            _ => return None,
        })
    }

    /// Get the fixed payload size in bytes, or None for length-prefixed payloads
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ValueTag::Null => Some(0),
            ValueTag::Boolean => Some(1),
            ValueTag::Int32 => Some(4),
            ValueTag::Int64 | ValueTag::Float64 | ValueTag::DateTime => Some(8),
            ValueTag::String | ValueTag::Bytes | ValueTag::Array => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_from_byte() {
        for byte in 0u8..=8 {
            let tag = ValueTag::from_byte(byte).unwrap();
            assert_eq!(tag as u8, byte);
        }
        assert_eq!(ValueTag::from_byte(9), None);
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(ValueTag::Int32.fixed_size(), Some(4));
        assert_eq!(ValueTag::Float64.fixed_size(), Some(8));
        assert_eq!(ValueTag::String.fixed_size(), None);
    }
}
