//! Binary decoder for spill records.

use super::ValueTag;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;
use winagg_core::{Row, Value};

/// Errors produced while decoding a record body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The body ended before a complete value could be read.
    #[error("record truncated at byte {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    /// An unknown value tag was found.
    #[error("unknown value tag {tag} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },
    /// A string payload is not valid UTF-8.
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    /// Bytes were left over after the last value.
    #[error("{remaining} trailing bytes after row")]
    TrailingBytes { remaining: usize },
}

/// Decode a row body produced by [`RowEncoder`](crate::RowEncoder).
pub fn decode_row(bytes: &[u8]) -> Result<Row, DecodeError> {
    let mut reader = Reader { bytes, offset: 0 };
    let id = u64::from_le_bytes(reader.take_array()?);
    let count = u32::from_le_bytes(reader.take_array()?) as usize;
    // Every value takes at least its tag byte
    let mut values = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        values.push(reader.read_value()?);
    }
    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(Row::new(id, values))
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_varlen(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = u32::from_le_bytes(self.take_array()?) as usize;
        self.take(len)
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let tag_offset = self.offset;
        let [byte] = self.take_array::<1>()?;
        let tag = ValueTag::from_byte(byte).ok_or(DecodeError::UnknownTag {
            tag: byte,
            offset: tag_offset,
        })?;
        Ok(match tag {
            ValueTag::Null => Value::Null,
            ValueTag::Boolean => {
                let [b] = self.take_array::<1>()?;
                Value::Boolean(b != 0)
            }
            ValueTag::Int32 => Value::Int32(i32::from_le_bytes(self.take_array()?)),
            ValueTag::Int64 => Value::Int64(i64::from_le_bytes(self.take_array()?)),
            ValueTag::Float64 => Value::Float64(f64::from_bits(u64::from_le_bytes(
                self.take_array()?,
            ))),
            ValueTag::String => {
                let start = self.offset;
                let data = self.read_varlen()?;
                let s = core::str::from_utf8(data)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset: start })?;
                Value::String(String::from(s))
            }
            ValueTag::DateTime => Value::DateTime(i64::from_le_bytes(self.take_array()?)),
            ValueTag::Bytes => Value::Bytes(self.read_varlen()?.to_vec()),
            ValueTag::Array => {
                let count = u32::from_le_bytes(self.take_array()?) as usize;
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                Value::Array(items)
            }
        })
    }
}
