//! Binary encoder for spill records.

use super::ValueTag;
use alloc::vec::Vec;
use winagg_core::{Row, Value};

/// Reusable row encoder. The internal buffer is kept between rows so that spilling a
/// partition does not allocate once per record.
#[derive(Debug, Default)]
pub struct RowEncoder {
    buffer: Vec<u8>,
}

impl RowEncoder {
    /// Create a new encoder with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with a pre-allocated buffer
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a row body. The returned slice is valid until the next call.
    pub fn encode(&mut self, row: &Row) -> &[u8] {
        self.buffer.clear();
        self.buffer.extend_from_slice(&row.id().to_le_bytes());
        self.buffer
            .extend_from_slice(&(row.len() as u32).to_le_bytes());
        for value in row.values() {
            Self::encode_value(&mut self.buffer, value);
        }
        &self.buffer
    }

    fn encode_value(buffer: &mut Vec<u8>, value: &Value) {
        match value {
            Value::Null => buffer.push(ValueTag::Null as u8),
            Value::Boolean(b) => {
                buffer.push(ValueTag::Boolean as u8);
                buffer.push(u8::from(*b));
            }
            Value::Int32(i) => {
                buffer.push(ValueTag::Int32 as u8);
                buffer.extend_from_slice(&i.to_le_bytes());
            }
            Value::Int64(i) => {
                buffer.push(ValueTag::Int64 as u8);
                buffer.extend_from_slice(&i.to_le_bytes());
            }
            Value::Float64(f) => {
                // Bit pattern, so NaN payloads and -0.0 survive a spill
                buffer.push(ValueTag::Float64 as u8);
                buffer.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::String(s) => {
                buffer.push(ValueTag::String as u8);
                Self::write_varlen(buffer, s.as_bytes());
            }
            Value::DateTime(ts) => {
                buffer.push(ValueTag::DateTime as u8);
                buffer.extend_from_slice(&ts.to_le_bytes());
            }
            Value::Bytes(b) => {
                buffer.push(ValueTag::Bytes as u8);
                Self::write_varlen(buffer, b);
            }
            Value::Array(items) => {
                buffer.push(ValueTag::Array as u8);
                buffer.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    Self::encode_value(buffer, item);
                }
            }
        }
    }

    #[inline]
    fn write_varlen(buffer: &mut Vec<u8>, data: &[u8]) {
        buffer.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buffer.extend_from_slice(data);
    }
}
