//! Partition and order key comparison.

use winagg_core::Row;

/// Decides whether two rows share key values.
///
/// Used for partition boundary detection and, with the order keys, as the peer predicate.
pub trait KeyComparator {
    /// Returns true if `a` and `b` have equal keys.
    fn equal(&self, a: &Row, b: &Row) -> bool;
}

impl<F> KeyComparator for F
where
    F: Fn(&Row, &Row) -> bool,
{
    fn equal(&self, a: &Row, b: &Row) -> bool {
        self(a, b)
    }
}

/// Compares a list of columns with `Value` equality. Nulls are equal to each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnKeys {
    columns: Vec<usize>,
}

impl ColumnKeys {
    /// Creates a comparator over the given column indices.
    pub fn new(columns: impl Into<Vec<usize>>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Returns the key columns.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
}

impl KeyComparator for ColumnKeys {
    fn equal(&self, a: &Row, b: &Row) -> bool {
        self.columns.iter().all(|&col| a.get(col) == b.get(col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winagg_core::Value;

    #[test]
    fn test_column_keys() {
        let keys = ColumnKeys::new([0, 2]);
        let a = Row::new(1, vec![Value::Int64(1), Value::Int64(9), Value::Null]);
        let b = Row::new(2, vec![Value::Int64(1), Value::Int64(7), Value::Null]);
        let c = Row::new(3, vec![Value::Int64(2), Value::Int64(9), Value::Null]);
        assert!(keys.equal(&a, &b));
        assert!(!keys.equal(&a, &c));
    }

    #[test]
    fn test_closure_comparator() {
        let parity = |a: &Row, b: &Row| a.id() % 2 == b.id() % 2;
        let cmp: &dyn KeyComparator = &parity;
        assert!(cmp.equal(&Row::new(2, vec![]), &Row::new(4, vec![])));
        assert!(!cmp.equal(&Row::new(2, vec![]), &Row::new(3, vec![])));
    }
}
