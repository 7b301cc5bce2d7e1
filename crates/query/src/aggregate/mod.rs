//! Aggregate functions usable over a window frame.
//!
//! An aggregate is a capability object resolved once per call site: an initial state, a
//! transition step, an optional final step and, for functions that support it, a combine
//! step used to merge a checkpointed state into a live one.

mod builtins;
mod state;

pub use builtins::{
    BoolAnd, BoolOr, Count, CountStar, FloatAvg, FloatSum, IntAvg, IntSum, MinMax, StringAgg,
};
pub use state::TransitionState;

use winagg_core::{DataType, Error, Result, Value};

/// Outcome of a transition or combine step.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Replace the state.
    NewValue(Value),
    /// Keep the state as it is.
    Unchanged,
}

/// A window aggregate.
pub trait AggregateFunction {
    /// Function name, for messages.
    fn name(&self) -> &str;

    /// Type of the transition state.
    fn state_type(&self) -> DataType;

    /// Initial state. `None` means null; a strict function then takes its first non-null
    /// input as the state.
    fn initial_state(&self) -> Option<Value>;

    /// Strict functions are never called with a null argument or a null state.
    fn is_strict(&self) -> bool {
        true
    }

    /// Folds one row's arguments into `state`.
    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition>;

    /// Returns true if `finalize` does more than return the state.
    fn has_final(&self) -> bool {
        false
    }

    /// A strict final step is skipped for a null state, which yields null.
    fn final_is_strict(&self) -> bool {
        true
    }

    /// Produces the result from the state.
    fn finalize(&self, state: &Value) -> Result<Value> {
        Ok(state.clone())
    }

    /// Returns true if `combine` is implemented and merging states in row order gives the
    /// same result as feeding the rows one by one.
    ///
    /// Checkpoint states only ever cover a suffix of the frame. A checkpoint whose transition
    /// or combine step fails is dropped and its rows are fed to the live state instead.
    fn supports_combine(&self) -> bool {
        false
    }

    /// Merges `right`, covering rows that directly follow those of `left`, into `left`.
    fn combine(&self, _left: &Value, _right: &Value) -> Result<Transition> {
        Err(Error::invalid_operation(format!(
            "aggregate {} cannot combine states",
            self.name()
        )))
    }
}
