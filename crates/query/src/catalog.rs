//! Function resolution.
//!
//! A call site names a function and the types of its arguments; the catalog turns that into
//! a function object once, at executor construction.

use crate::aggregate::{
    AggregateFunction, BoolAnd, BoolOr, Count, CountStar, FloatAvg, FloatSum, IntAvg, IntSum,
    MinMax, StringAgg,
};
use crate::error::{Result, WindowError};
use crate::window::{
    CumeDist, DenseRank, FirstValue, LagLead, LastValue, NthValue, Ntile, PercentRank, Rank,
    RowNumber, WindowFunction,
};
use winagg_core::DataType;

/// A resolved function.
pub enum ResolvedFunction {
    Aggregate(Box<dyn AggregateFunction>),
    Window(Box<dyn WindowFunction>),
}

impl ResolvedFunction {
    /// Name of the resolved function.
    pub fn name(&self) -> &str {
        match self {
            ResolvedFunction::Aggregate(f) => f.name(),
            ResolvedFunction::Window(f) => f.name(),
        }
    }

    /// Returns true for aggregates.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, ResolvedFunction::Aggregate(_))
    }
}

impl std::fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFunction::Aggregate(func) => write!(f, "Aggregate({})", func.name()),
            ResolvedFunction::Window(func) => write!(f, "Window({})", func.name()),
        }
    }
}

/// Looks functions up by name and argument types.
pub trait FunctionCatalog {
    /// Resolves `name(arg_types...)`.
    fn resolve(&self, name: &str, arg_types: &[DataType]) -> Result<ResolvedFunction>;
}

/// The built-in aggregates and window functions.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    fn aggregate(name: &str, args: &[DataType]) -> Option<Box<dyn AggregateFunction>> {
        use DataType::*;
        let func: Box<dyn AggregateFunction> = match (name, args) {
            ("count", []) => Box::new(CountStar),
            ("count", [_]) => Box::new(Count),
            ("sum", [t]) if t.is_integer() => Box::new(IntSum::new(*t)),
            ("sum", [Float64]) => Box::new(FloatSum),
            ("avg", [t]) if t.is_integer() => Box::new(IntAvg),
            ("avg", [Float64]) => Box::new(FloatAvg),
            ("min", [t]) if *t != Array => Box::new(MinMax::min(*t)),
            ("max", [t]) if *t != Array => Box::new(MinMax::max(*t)),
            ("bool_and" | "every", [Boolean]) => Box::new(BoolAnd),
            ("bool_or", [Boolean]) => Box::new(BoolOr),
            ("string_agg", [String, String]) => Box::new(StringAgg),
            _ => return None,
        };
        Some(func)
    }

    fn window(name: &str, args: &[DataType]) -> Option<Box<dyn WindowFunction>> {
        let func: Box<dyn WindowFunction> = match (name, args) {
            ("row_number", []) => Box::new(RowNumber),
            ("rank", []) => Box::new(Rank),
            ("dense_rank", []) => Box::new(DenseRank),
            ("percent_rank", []) => Box::new(PercentRank),
            ("cume_dist", []) => Box::new(CumeDist),
            ("ntile", [t]) if t.is_integer() => Box::new(Ntile),
            ("lag", [_]) => Box::new(LagLead::lag()),
            ("lag", [_, t] | [_, t, _]) if t.is_integer() => Box::new(LagLead::lag()),
            ("lead", [_]) => Box::new(LagLead::lead()),
            ("lead", [_, t] | [_, t, _]) if t.is_integer() => Box::new(LagLead::lead()),
            ("first_value", [_]) => Box::new(FirstValue),
            ("last_value", [_]) => Box::new(LastValue),
            ("nth_value", [_, t]) if t.is_integer() => Box::new(NthValue),
            _ => return None,
        };
        Some(func)
    }
}

impl FunctionCatalog for BuiltinCatalog {
    fn resolve(&self, name: &str, arg_types: &[DataType]) -> Result<ResolvedFunction> {
        let lower = name.to_ascii_lowercase();
        if let Some(func) = Self::aggregate(&lower, arg_types) {
            return Ok(ResolvedFunction::Aggregate(func));
        }
        if let Some(func) = Self::window(&lower, arg_types) {
            return Ok(ResolvedFunction::Window(func));
        }
        Err(unknown_function(name, arg_types))
    }
}

pub(crate) fn unknown_function(name: &str, arg_types: &[DataType]) -> WindowError {
    WindowError::UnknownFunction {
        name: name.to_string(),
        args: arg_types
            .iter()
            .map(|t| format!("{:?}", t))
            .collect::<Vec<_>>()
            .join(", "),
    }
}
