//! Data type definitions for winagg.

/// Supported data types for row values and aggregate states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
    /// Fixed-shape composite, used for aggregate transition states
    Array,
}

impl DataType {
    /// Returns true for Int32 and Int64.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    /// Returns true for the integer types and Float64.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float64)
    }

    /// Returns whether a value of this type may be stored where `target` is expected
    /// without conversion. Int32 widens into Int64.
    pub fn is_binary_compatible(&self, target: DataType) -> bool {
        *self == target || matches!((self, target), (DataType::Int32, DataType::Int64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int32, DataType::Int32);
        assert_ne!(DataType::Int32, DataType::Int64);
    }

    #[test]
    fn test_numeric_classes() {
        assert!(DataType::Int32.is_integer());
        assert!(DataType::Int64.is_integer());
        assert!(!DataType::Float64.is_integer());
        assert!(DataType::Float64.is_numeric());
        assert!(!DataType::String.is_numeric());
        assert!(!DataType::Boolean.is_numeric());
    }

    #[test]
    fn test_binary_compatible() {
        assert!(DataType::Int32.is_binary_compatible(DataType::Int64));
        assert!(DataType::Int64.is_binary_compatible(DataType::Int64));
        assert!(!DataType::Int64.is_binary_compatible(DataType::Int32));
        assert!(!DataType::String.is_binary_compatible(DataType::Int64));
    }
}
