//! Per-call transition state.

use super::{AggregateFunction, Transition};
use winagg_core::{Result, Value};

/// Accumulated state of one aggregate call over some run of rows.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionState {
    value: Value,
    /// False until the state received a value, either an initial one or an input.
    initialized: bool,
}

impl TransitionState {
    /// Fresh state for `func`.
    pub fn new(func: &dyn AggregateFunction) -> Self {
        match func.initial_state() {
            Some(value) => Self {
                value,
                initialized: true,
            },
            None => Self {
                value: Value::Null,
                initialized: false,
            },
        }
    }

    /// Current state value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true once the state holds a value.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Folds one row's arguments in.
    pub fn advance(&mut self, func: &dyn AggregateFunction, args: &[Value]) -> Result<()> {
        if func.is_strict() {
            if args.iter().any(Value::is_null) {
                return Ok(());
            }
            if !self.initialized && self.value.is_null() {
                // First non-null input becomes the state verbatim
                self.value = args.first().cloned().unwrap_or(Value::Null);
                self.initialized = true;
                return Ok(());
            }
            if self.value.is_null() {
                // A strict transition returned null earlier; it sticks
                return Ok(());
            }
        }
        if let Transition::NewValue(value) = func.transition(&self.value, args)? {
            self.value = value;
        }
        self.initialized = true;
        Ok(())
    }

    /// Merges `other`, which covers the rows right after those folded into `self`.
    pub fn combine(&mut self, func: &dyn AggregateFunction, other: &TransitionState) -> Result<()> {
        if !other.initialized {
            return Ok(());
        }
        if !self.initialized {
            *self = other.clone();
            return Ok(());
        }
        if other.value.is_null() {
            return Ok(());
        }
        if self.value.is_null() {
            self.value = other.value.clone();
            return Ok(());
        }
        if let Transition::NewValue(value) = func.combine(&self.value, &other.value)? {
            self.value = value;
        }
        Ok(())
    }

    /// Produces the aggregate result.
    pub fn finalize(&self, func: &dyn AggregateFunction) -> Result<Value> {
        if !func.has_final() {
            return Ok(self.value.clone());
        }
        if func.final_is_strict() && self.value.is_null() {
            return Ok(Value::Null);
        }
        func.finalize(&self.value)
    }
}
