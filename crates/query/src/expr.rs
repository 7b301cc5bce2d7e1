//! Function argument expressions.

use std::fmt;
use std::rc::Rc;
use winagg_core::{Error, Result, Row, Value};

/// Evaluator signature for [`ArgExpr::Custom`].
pub type RowFn = Rc<dyn Fn(&Row) -> Result<Value>>;

/// An argument of a window or aggregate function, evaluated against one row.
#[derive(Clone)]
pub enum ArgExpr {
    /// Value of a column of the row.
    Column(usize),
    /// A constant.
    Literal(Value),
    /// Caller-supplied evaluator.
    Custom(RowFn),
}

impl ArgExpr {
    /// Column reference.
    pub fn column(index: usize) -> Self {
        ArgExpr::Column(index)
    }

    /// Constant value.
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgExpr::Literal(value.into())
    }

    /// Custom evaluator.
    pub fn custom(f: impl Fn(&Row) -> Result<Value> + 'static) -> Self {
        ArgExpr::Custom(Rc::new(f))
    }

    /// Returns true if the expression yields the same value for every row.
    pub fn is_constant(&self) -> bool {
        matches!(self, ArgExpr::Literal(_))
    }

    /// Evaluates against `row`.
    pub fn evaluate(&self, row: &Row) -> Result<Value> {
        match self {
            ArgExpr::Column(index) => row.get(*index).cloned().ok_or_else(|| {
                Error::invalid_operation(format!(
                    "column {} out of range for row of {} columns",
                    index,
                    row.len()
                ))
            }),
            ArgExpr::Literal(value) => Ok(value.clone()),
            ArgExpr::Custom(f) => f(row),
        }
    }
}

impl fmt::Debug for ArgExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgExpr::Column(index) => write!(f, "Column({})", index),
            ArgExpr::Literal(value) => write!(f, "Literal({:?})", value),
            ArgExpr::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Evaluates every expression against `row`.
pub(crate) fn evaluate_all(args: &[ArgExpr], row: &Row) -> Result<Vec<Value>> {
    args.iter().map(|arg| arg.evaluate(row)).collect()
}
