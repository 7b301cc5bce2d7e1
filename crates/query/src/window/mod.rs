//! Window functions.
//!
//! A window function computes one value per row from arbitrary rows of the partition or the
//! frame, reading them through a [`WindowObject`].

mod builtins;

pub use builtins::{
    CumeDist, DenseRank, FirstValue, LagLead, LastValue, NthValue, Ntile, PercentRank, Rank,
    RowNumber,
};

use crate::error::Result;
use crate::executor::WindowObject;
use winagg_core::Value;

/// A window function.
pub trait WindowFunction {
    /// Function name, for messages.
    fn name(&self) -> &str;

    /// Computes the value for the current row.
    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value>;
}
