//! Row structure for winagg.
//!
//! A `Row` is an opaque record to the engine: it is buffered, spilled and handed back,
//! and only inspected through comparators and argument evaluators.

use crate::value::Value;
use alloc::vec::Vec;
use core::mem::size_of;

/// Identifier carried through from input to output rows.
pub type RowId = u64;

/// A row id for rows that don't correspond to an input record.
pub const DUMMY_ROW_ID: RowId = u64::MAX;

/// A row of values.
#[derive(Clone, Debug)]
pub struct Row {
    /// Identifier of this row.
    id: RowId,
    /// Values stored in this row, indexed by column position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given ID and values.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Creates a dummy row.
    pub fn dummy(values: Vec<Value>) -> Self {
        Self::new(DUMMY_ROW_ID, values)
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns a copy of this row with `extra` appended after the existing columns.
    pub fn extended(&self, extra: impl IntoIterator<Item = Value>) -> Row {
        let mut values = self.values.clone();
        values.extend(extra);
        Row::new(self.id, values)
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if this is a dummy row.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.id == DUMMY_ROW_ID
    }

    /// Approximate in-memory footprint, used for work memory accounting.
    pub fn estimated_size(&self) -> usize {
        let spare = self.values.capacity() - self.values.len();
        size_of::<Row>()
            + spare * size_of::<Value>()
            + self.values.iter().map(Value::estimated_size).sum::<usize>()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.values == other.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_row_new() {
        let row = Row::new(1, vec![Value::Int64(42), Value::String("Alice".into())]);
        assert_eq!(row.id(), 1);
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
    }

    #[test]
    fn test_row_get_value() {
        let row = Row::new(1, vec![Value::Int64(1), Value::String("Alice".into())]);
        assert_eq!(row.get(0), Some(&Value::Int64(1)));
        assert_eq!(row.get(1), Some(&Value::String("Alice".into())));
        assert_eq!(row.get(2), None);
    }

    #[test]
    fn test_row_extended() {
        let row = Row::new(9, vec![Value::Int64(1)]);
        let out = row.extended(vec![Value::Int64(2), Value::Null]);
        assert_eq!(out.id(), 9);
        assert_eq!(out.values(), &[Value::Int64(1), Value::Int64(2), Value::Null]);
    }

    #[test]
    fn test_row_dummy() {
        let row = Row::dummy(vec![Value::Int32(1)]);
        assert!(row.is_dummy());
        assert_eq!(row.id(), DUMMY_ROW_ID);
    }

    #[test]
    fn test_row_equality() {
        let row1 = Row::new(1, vec![Value::Int32(42)]);
        let row2 = Row::new(1, vec![Value::Int32(42)]);
        let row3 = Row::new(2, vec![Value::Int32(42)]);
        assert_eq!(row1, row2);
        assert_ne!(row1, row3);
    }

    #[test]
    fn test_estimated_size_grows_with_values() {
        let narrow = Row::new(1, vec![Value::Int64(1)]);
        let wide = Row::new(1, vec![Value::Int64(1), Value::String("padding".into())]);
        assert!(wide.estimated_size() > narrow.estimated_size());
    }
}
