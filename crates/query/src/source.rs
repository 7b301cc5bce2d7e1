//! Upstream row sources.

use crate::error::Result;
use winagg_core::Row;

/// Produces input rows, already grouped by partition and sorted within each one.
///
/// Once `next_row` returns `Ok(None)` the source is exhausted for good.
pub trait RowSource {
    /// Returns the next row, or `None` at end of input.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Source over an owned vector of rows.
#[derive(Debug)]
pub struct VecSource {
    rows: std::vec::IntoIter<Row>,
}

impl VecSource {
    /// Creates a source yielding `rows` in order.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for VecSource {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }
}

/// Source adapting any row iterator.
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator<Item = Row>> IterSource<I> {
    /// Wraps an iterator.
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I: Iterator<Item = Row>> RowSource for IterSource<I> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.iter.next())
    }
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        (**self).next_row()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winagg_core::Value;

    #[test]
    fn test_vec_source() {
        let mut source = VecSource::new(vec![Row::new(1, vec![Value::Int64(1)])]);
        assert_eq!(source.next_row().unwrap().map(|r| r.id()), Some(1));
        assert!(source.next_row().unwrap().is_none());
        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn test_iter_source() {
        let mut source = IterSource::new((0..3).map(|i| Row::new(i, vec![])));
        let mut ids = Vec::new();
        while let Some(row) = source.next_row().unwrap() {
            ids.push(row.id());
        }
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
