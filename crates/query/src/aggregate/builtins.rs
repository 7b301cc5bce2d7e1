//! Built-in aggregate functions.

use super::{AggregateFunction, Transition};
use winagg_core::{DataType, Error, Result, Value};

fn int_arg(value: &Value) -> Result<i64> {
    value
        .to_i64()
        .ok_or_else(|| Error::type_mismatch(DataType::Int64, value.data_type().unwrap_or(DataType::Int64)))
}

fn float_arg(value: &Value) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| Error::type_mismatch(DataType::Float64, value.data_type().unwrap_or(DataType::Float64)))
}

fn bool_arg(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::type_mismatch(DataType::Boolean, value.data_type().unwrap_or(DataType::Boolean)))
}

fn checked_add(name: &str, a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| Error::overflow(format!("{}: bigint out of range", name)))
}

/// Integer sums accumulate in 128 bits and are range checked only when finalized, so a
/// partial sum over any run of rows never overflows on its own.
///
/// The state is `[count, high, low]`, all Int64, with the sum split into two words.
fn wide_state(count: i64, sum: i128) -> Value {
    Value::Array(vec![
        Value::Int64(count),
        Value::Int64((sum >> 64) as i64),
        Value::Int64(sum as u64 as i64),
    ])
}

fn wide_parts(state: &Value) -> Result<(i64, i128)> {
    match state.as_array() {
        Some([count, high, low]) => {
            let high = int_arg(high)? as i128;
            let low = int_arg(low)? as u64 as i128;
            Ok((int_arg(count)?, (high << 64) | low))
        }
        _ => Err(Error::type_mismatch(
            DataType::Array,
            state.data_type().unwrap_or(DataType::Array),
        )),
    }
}

fn wide_add(name: &str, (lc, ls): (i64, i128), (rc, rs): (i64, i128)) -> Result<Value> {
    let sum = ls
        .checked_add(rs)
        .ok_or_else(|| Error::overflow(format!("{}: accumulator out of range", name)))?;
    Ok(wide_state(checked_add(name, lc, rc)?, sum))
}

/// `[count, sum]` pair held by the float avg state.
fn avg_parts(state: &Value) -> Result<(&Value, &Value)> {
    match state.as_array() {
        Some([count, sum]) => Ok((count, sum)),
        _ => Err(Error::type_mismatch(
            DataType::Array,
            state.data_type().unwrap_or(DataType::Array),
        )),
    }
}

/// `count(*)`: counts rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountStar;

impl AggregateFunction for CountStar {
    fn name(&self) -> &str {
        "count"
    }

    fn state_type(&self) -> DataType {
        DataType::Int64
    }

    fn initial_state(&self) -> Option<Value> {
        Some(Value::Int64(0))
    }

    fn is_strict(&self) -> bool {
        false
    }

    fn transition(&self, state: &Value, _args: &[Value]) -> Result<Transition> {
        Ok(Transition::NewValue(Value::Int64(checked_add(
            "count",
            int_arg(state)?,
            1,
        )?)))
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        Ok(Transition::NewValue(Value::Int64(checked_add(
            "count",
            int_arg(left)?,
            int_arg(right)?,
        )?)))
    }
}

/// `count(x)`: counts non-null inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl AggregateFunction for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn state_type(&self) -> DataType {
        DataType::Int64
    }

    fn initial_state(&self) -> Option<Value> {
        Some(Value::Int64(0))
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        CountStar.transition(state, args)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        CountStar.combine(left, right)
    }
}

/// `sum` over Int32 or Int64 input, producing Int64.
///
/// Only the finished sum must fit in Int64; intermediate sums may leave the range.
#[derive(Clone, Copy, Debug)]
pub struct IntSum {
    input: DataType,
}

impl IntSum {
    pub fn new(input: DataType) -> Self {
        Self { input }
    }

    /// Declared argument type.
    pub fn input(&self) -> DataType {
        self.input
    }
}

impl AggregateFunction for IntSum {
    fn name(&self) -> &str {
        "sum"
    }

    fn state_type(&self) -> DataType {
        DataType::Array
    }

    fn initial_state(&self) -> Option<Value> {
        Some(wide_state(0, 0))
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("sum expects one argument"))?;
        let next = wide_add("sum", wide_parts(state)?, (1, int_arg(arg)? as i128))?;
        Ok(Transition::NewValue(next))
    }

    fn has_final(&self) -> bool {
        true
    }

    fn finalize(&self, state: &Value) -> Result<Value> {
        let (count, sum) = wide_parts(state)?;
        if count == 0 {
            return Ok(Value::Null);
        }
        i64::try_from(sum)
            .map(Value::Int64)
            .map_err(|_| Error::overflow("sum: bigint out of range"))
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        Ok(Transition::NewValue(wide_add(
            "sum",
            wide_parts(left)?,
            wide_parts(right)?,
        )?))
    }
}

/// `sum` over Float64 input. Floating point addition is not associative, so states are
/// never combined.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatSum;

impl AggregateFunction for FloatSum {
    fn name(&self) -> &str {
        "sum"
    }

    fn state_type(&self) -> DataType {
        DataType::Float64
    }

    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("sum expects one argument"))?;
        Ok(Transition::NewValue(Value::Float64(
            float_arg(state)? + float_arg(arg)?,
        )))
    }
}

/// `avg` over integer input, sharing the wide state of [`IntSum`].
#[derive(Clone, Copy, Debug, Default)]
pub struct IntAvg;

impl AggregateFunction for IntAvg {
    fn name(&self) -> &str {
        "avg"
    }

    fn state_type(&self) -> DataType {
        DataType::Array
    }

    fn initial_state(&self) -> Option<Value> {
        Some(wide_state(0, 0))
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("avg expects one argument"))?;
        let next = wide_add("avg", wide_parts(state)?, (1, int_arg(arg)? as i128))?;
        Ok(Transition::NewValue(next))
    }

    fn has_final(&self) -> bool {
        true
    }

    fn finalize(&self, state: &Value) -> Result<Value> {
        let (count, sum) = wide_parts(state)?;
        if count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float64(sum as f64 / count as f64))
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        Ok(Transition::NewValue(wide_add(
            "avg",
            wide_parts(left)?,
            wide_parts(right)?,
        )?))
    }
}

/// `avg` over Float64 input. State is `[count Int64, sum Float64]`; not combinable.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatAvg;

impl AggregateFunction for FloatAvg {
    fn name(&self) -> &str {
        "avg"
    }

    fn state_type(&self) -> DataType {
        DataType::Array
    }

    fn initial_state(&self) -> Option<Value> {
        Some(Value::Array(vec![Value::Int64(0), Value::Float64(0.0)]))
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let (count, sum) = avg_parts(state)?;
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("avg expects one argument"))?;
        Ok(Transition::NewValue(Value::Array(vec![
            Value::Int64(checked_add("avg", int_arg(count)?, 1)?),
            Value::Float64(float_arg(sum)? + float_arg(arg)?),
        ])))
    }

    fn has_final(&self) -> bool {
        true
    }

    fn finalize(&self, state: &Value) -> Result<Value> {
        let (count, sum) = avg_parts(state)?;
        let count = int_arg(count)?;
        if count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float64(float_arg(sum)? / count as f64))
    }
}

/// `min` and `max`. Ties keep the earlier value.
#[derive(Clone, Copy, Debug)]
pub struct MinMax {
    input: DataType,
    is_max: bool,
}

impl MinMax {
    pub fn min(input: DataType) -> Self {
        Self {
            input,
            is_max: false,
        }
    }

    pub fn max(input: DataType) -> Self {
        Self {
            input,
            is_max: true,
        }
    }

    fn better(&self, candidate: &Value, current: &Value) -> bool {
        if self.is_max {
            candidate > current
        } else {
            candidate < current
        }
    }
}

impl AggregateFunction for MinMax {
    fn name(&self) -> &str {
        if self.is_max {
            "max"
        } else {
            "min"
        }
    }

    fn state_type(&self) -> DataType {
        self.input
    }

    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        match args.first() {
            Some(arg) if self.better(arg, state) => Ok(Transition::NewValue(arg.clone())),
            Some(_) => Ok(Transition::Unchanged),
            None => Err(Error::invalid_operation(format!(
                "{} expects one argument",
                self.name()
            ))),
        }
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        self.transition(left, std::slice::from_ref(right))
    }
}

/// `bool_and` / `every`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolAnd;

impl AggregateFunction for BoolAnd {
    fn name(&self) -> &str {
        "bool_and"
    }

    fn state_type(&self) -> DataType {
        DataType::Boolean
    }

    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("bool_and expects one argument"))?;
        Ok(Transition::NewValue(Value::Boolean(
            bool_arg(state)? && bool_arg(arg)?,
        )))
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        self.transition(left, std::slice::from_ref(right))
    }
}

/// `bool_or`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolOr;

impl AggregateFunction for BoolOr {
    fn name(&self) -> &str {
        "bool_or"
    }

    fn state_type(&self) -> DataType {
        DataType::Boolean
    }

    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let arg = args
            .first()
            .ok_or_else(|| Error::invalid_operation("bool_or expects one argument"))?;
        Ok(Transition::NewValue(Value::Boolean(
            bool_arg(state)? || bool_arg(arg)?,
        )))
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: &Value, right: &Value) -> Result<Transition> {
        self.transition(left, std::slice::from_ref(right))
    }
}

/// `string_agg(value, delimiter)`. Null values are skipped; a null delimiter is empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringAgg;

impl AggregateFunction for StringAgg {
    fn name(&self) -> &str {
        "string_agg"
    }

    fn state_type(&self) -> DataType {
        DataType::String
    }

    fn initial_state(&self) -> Option<Value> {
        None
    }

    fn is_strict(&self) -> bool {
        false
    }

    fn transition(&self, state: &Value, args: &[Value]) -> Result<Transition> {
        let value = match args.first() {
            None | Some(Value::Null) => return Ok(Transition::Unchanged),
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(Error::type_mismatch(
                    DataType::String,
                    other.data_type().unwrap_or(DataType::String),
                ))
            }
        };
        let acc = match state {
            Value::Null => return Ok(Transition::NewValue(Value::String(value.clone()))),
            Value::String(acc) => acc,
            other => {
                return Err(Error::type_mismatch(
                    DataType::String,
                    other.data_type().unwrap_or(DataType::String),
                ))
            }
        };
        let delimiter = args.get(1).and_then(Value::as_str).unwrap_or("");
        let mut out = String::with_capacity(acc.len() + delimiter.len() + value.len());
        out.push_str(acc);
        out.push_str(delimiter);
        out.push_str(value);
        Ok(Transition::NewValue(Value::String(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TransitionState;

    fn run(func: &dyn AggregateFunction, inputs: &[Vec<Value>]) -> Value {
        let mut state = TransitionState::new(func);
        for args in inputs {
            state.advance(func, args).unwrap();
        }
        state.finalize(func).unwrap()
    }

    fn ints(values: &[Option<i64>]) -> Vec<Vec<Value>> {
        values
            .iter()
            .map(|v| vec![v.map_or(Value::Null, Value::Int64)])
            .collect()
    }

    #[test]
    fn test_count() {
        let inputs = ints(&[Some(1), None, Some(3)]);
        assert_eq!(run(&Count, &inputs), Value::Int64(2));
        assert_eq!(run(&CountStar, &inputs), Value::Int64(3));
        assert_eq!(run(&Count, &[]), Value::Int64(0));
    }

    #[test]
    fn test_int_sum() {
        let sum = IntSum::new(DataType::Int64);
        assert_eq!(run(&sum, &ints(&[Some(10), None, Some(20)])), Value::Int64(30));
        assert_eq!(run(&sum, &ints(&[None, None])), Value::Null);

        let sum32 = IntSum::new(DataType::Int32);
        let single = vec![vec![Value::Int32(7)]];
        assert_eq!(run(&sum32, &single), Value::Int64(7));
    }

    #[test]
    fn test_int_sum_overflow() {
        let sum = IntSum::new(DataType::Int64);
        let mut state = TransitionState::new(&sum);
        state.advance(&sum, &[Value::Int64(i64::MAX)]).unwrap();
        state.advance(&sum, &[Value::Int64(1)]).unwrap();
        let err = state.finalize(&sum).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));

        // Back in range once a later input cancels the excess
        state.advance(&sum, &[Value::Int64(-1)]).unwrap();
        assert_eq!(state.finalize(&sum).unwrap(), Value::Int64(i64::MAX));
    }

    #[test]
    fn test_int_sum_combine_past_range() {
        let sum = IntSum::new(DataType::Int64);
        let mut left = TransitionState::new(&sum);
        left.advance(&sum, &[Value::Int64(i64::MIN)]).unwrap();
        left.advance(&sum, &[Value::Int64(-1)]).unwrap();

        let mut right = TransitionState::new(&sum);
        right.advance(&sum, &[Value::Int64(i64::MAX)]).unwrap();
        right.advance(&sum, &[Value::Int64(i64::MAX)]).unwrap();

        left.combine(&sum, &right).unwrap();
        assert_eq!(left.finalize(&sum).unwrap(), Value::Int64(i64::MAX - 2));

        let mut avg = TransitionState::new(&IntAvg);
        for v in [i64::MAX, i64::MAX, i64::MIN, i64::MIN] {
            avg.advance(&IntAvg, &[Value::Int64(v)]).unwrap();
        }
        assert_eq!(avg.finalize(&IntAvg).unwrap(), Value::Float64(-0.5));
    }

    #[test]
    fn test_float_sum() {
        let inputs = vec![vec![Value::Float64(0.5)], vec![Value::Null], vec![Value::Float64(1.25)]];
        assert_eq!(run(&FloatSum, &inputs), Value::Float64(1.75));
        assert!(!FloatSum.supports_combine());
    }

    #[test]
    fn test_avg() {
        assert_eq!(run(&IntAvg, &ints(&[Some(1), Some(2), None])), Value::Float64(1.5));
        assert_eq!(run(&IntAvg, &ints(&[None])), Value::Null);
        let floats = vec![vec![Value::Float64(1.0)], vec![Value::Float64(4.0)]];
        assert_eq!(run(&FloatAvg, &floats), Value::Float64(2.5));
    }

    #[test]
    fn test_min_max() {
        let inputs = ints(&[Some(3), None, Some(-1), Some(8)]);
        assert_eq!(run(&MinMax::min(DataType::Int64), &inputs), Value::Int64(-1));
        assert_eq!(run(&MinMax::max(DataType::Int64), &inputs), Value::Int64(8));

        let max = MinMax::max(DataType::Int64);
        assert_eq!(
            max.transition(&Value::Int64(5), &[Value::Int64(5)]).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_bool_aggs() {
        let inputs = vec![
            vec![Value::Boolean(true)],
            vec![Value::Null],
            vec![Value::Boolean(false)],
        ];
        assert_eq!(run(&BoolAnd, &inputs), Value::Boolean(false));
        assert_eq!(run(&BoolOr, &inputs), Value::Boolean(true));
        assert_eq!(run(&BoolAnd, &inputs[..2]), Value::Boolean(true));
    }

    #[test]
    fn test_string_agg() {
        let inputs = vec![
            vec![Value::String("a".into()), Value::String(", ".into())],
            vec![Value::Null, Value::String(", ".into())],
            vec![Value::String("b".into()), Value::String(", ".into())],
            vec![Value::String("c".into()), Value::Null],
        ];
        assert_eq!(run(&StringAgg, &inputs), Value::String("a, bc".into()));
        assert_eq!(run(&StringAgg, &inputs[1..2]), Value::Null);
    }

    #[test]
    fn test_type_mismatch() {
        let sum = IntSum::new(DataType::Int64);
        let mut state = TransitionState::new(&sum);
        state.advance(&sum, &[Value::Int64(1)]).unwrap();
        let err = state
            .advance(&sum, &[Value::String("x".into())])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
