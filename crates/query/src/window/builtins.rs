//! Built-in window functions.

use super::WindowFunction;
use crate::error::Result;
use crate::executor::{WindowObject, WindowSeek};
use winagg_core::{DataType, Error, Value};

/// `row_number()`: position in the partition, from 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowNumber;

impl WindowFunction for RowNumber {
    fn name(&self) -> &str {
        "row_number"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let cur = obj.current_position();
        obj.set_mark(cur)?;
        Ok(Value::Int64(cur + 1))
    }
}

#[derive(Default)]
struct RankState {
    rank: i64,
}

/// Returns true if the current row starts a new peer group. Leaves the mark on the current
/// row, after looking at the previous one.
fn rank_up(obj: &mut WindowObject<'_>) -> Result<bool> {
    let cur = obj.current_position();
    let up = if obj.partition_local::<RankState>()?.rank == 0 {
        obj.partition_local::<RankState>()?.rank = 1;
        false
    } else {
        !obj.rows_are_peers(cur - 1, cur)?
    };
    obj.set_mark(cur)?;
    Ok(up)
}

/// `rank()`: rank with gaps.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rank;

impl WindowFunction for Rank {
    fn name(&self) -> &str {
        "rank"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let up = rank_up(obj)?;
        let cur = obj.current_position();
        let state = obj.partition_local::<RankState>()?;
        if up {
            state.rank = cur + 1;
        }
        Ok(Value::Int64(state.rank))
    }
}

/// `dense_rank()`: rank without gaps.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseRank;

impl WindowFunction for DenseRank {
    fn name(&self) -> &str {
        "dense_rank"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let up = rank_up(obj)?;
        let state = obj.partition_local::<RankState>()?;
        if up {
            state.rank += 1;
        }
        Ok(Value::Int64(state.rank))
    }
}

/// `percent_rank()`: `(rank - 1) / (rows - 1)`, 0 for a single-row partition.
#[derive(Clone, Copy, Debug, Default)]
pub struct PercentRank;

impl WindowFunction for PercentRank {
    fn name(&self) -> &str {
        "percent_rank"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let total = obj.partition_row_count()?;
        let up = rank_up(obj)?;
        let cur = obj.current_position();
        let state = obj.partition_local::<RankState>()?;
        if up {
            state.rank = cur + 1;
        }
        if total <= 1 {
            return Ok(Value::Float64(0.0));
        }
        Ok(Value::Float64((state.rank - 1) as f64 / (total - 1) as f64))
    }
}

/// `cume_dist()`: fraction of rows up to and including the current row's last peer.
#[derive(Clone, Copy, Debug, Default)]
pub struct CumeDist;

impl WindowFunction for CumeDist {
    fn name(&self) -> &str {
        "cume_dist"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let total = obj.partition_row_count()?;
        let up = rank_up(obj)?;
        let cur = obj.current_position();
        if up || obj.partition_local::<RankState>()?.rank == 1 {
            // Count the peers that follow the current row
            let mut rank = cur + 1;
            while rank < total && obj.rows_are_peers(rank - 1, rank)? {
                rank += 1;
            }
            obj.partition_local::<RankState>()?.rank = rank;
        }
        let rank = obj.partition_local::<RankState>()?.rank;
        Ok(Value::Float64(rank as f64 / total as f64))
    }
}

#[derive(Default)]
struct NtileState {
    ntile: i64,
    rows_per_bucket: i64,
    boundary: i64,
    remainder: i64,
}

/// `ntile(n)`: bucket number, from 1, splitting the partition into `n` near-equal groups.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ntile;

impl WindowFunction for Ntile {
    fn name(&self) -> &str {
        "ntile"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        if obj.partition_local::<NtileState>()?.ntile == 0 {
            let total = obj.partition_row_count()?;
            let buckets = obj.get_arg_current(0)?;
            if buckets.is_null() {
                return Ok(Value::Null);
            }
            let buckets = int_arg(&buckets)?;
            if buckets <= 0 {
                return Err(Error::invalid_operation("argument of ntile must be greater than zero").into());
            }
            let state = obj.partition_local::<NtileState>()?;
            state.ntile = 1;
            state.rows_per_bucket = 0;
            state.boundary = total / buckets;
            if state.boundary <= 0 {
                state.boundary = 1;
            } else {
                state.remainder = total % buckets;
                if state.remainder != 0 {
                    state.boundary += 1;
                }
            }
        }

        let state = obj.partition_local::<NtileState>()?;
        state.rows_per_bucket += 1;
        if state.boundary < state.rows_per_bucket {
            if state.remainder != 0 && state.ntile == state.remainder {
                state.remainder = 0;
                state.boundary -= 1;
            }
            state.ntile += 1;
            state.rows_per_bucket = 1;
        }
        Ok(Value::Int64(state.ntile))
    }
}

/// `lag(x [, offset [, default]])` and `lead(x [, offset [, default]])`.
#[derive(Clone, Copy, Debug)]
pub struct LagLead {
    forward: bool,
}

impl LagLead {
    pub fn lag() -> Self {
        Self { forward: false }
    }

    pub fn lead() -> Self {
        Self { forward: true }
    }
}

impl WindowFunction for LagLead {
    fn name(&self) -> &str {
        if self.forward {
            "lead"
        } else {
            "lag"
        }
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let (offset, constant) = if obj.arg_count() > 1 {
            let offset = obj.get_arg_current(1)?;
            if offset.is_null() {
                return Ok(Value::Null);
            }
            (int_arg(&offset)?, obj.arg_is_constant(1))
        } else {
            (1, true)
        };
        let relpos = if self.forward { offset } else { -offset };
        let fetched = obj.get_arg_in_partition(0, relpos, WindowSeek::Current, constant)?;
        if fetched.out_of_range && obj.arg_count() > 2 {
            return obj.get_arg_current(2);
        }
        Ok(fetched.value)
    }
}

/// `first_value(x)`: `x` on the first row of the frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstValue;

impl WindowFunction for FirstValue {
    fn name(&self) -> &str {
        "first_value"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        Ok(obj.get_arg_in_frame(0, 0, WindowSeek::Head, true)?.value)
    }
}

/// `last_value(x)`: `x` on the last row of the frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct LastValue;

impl WindowFunction for LastValue {
    fn name(&self) -> &str {
        "last_value"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        Ok(obj.get_arg_in_frame(0, 0, WindowSeek::Tail, true)?.value)
    }
}

/// `nth_value(x, n)`: `x` on the `n`-th row of the frame, from 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct NthValue;

impl WindowFunction for NthValue {
    fn name(&self) -> &str {
        "nth_value"
    }

    fn evaluate(&self, obj: &mut WindowObject<'_>) -> Result<Value> {
        let nth = obj.get_arg_current(1)?;
        if nth.is_null() {
            return Ok(Value::Null);
        }
        let nth = int_arg(&nth)?;
        if nth <= 0 {
            return Err(Error::invalid_operation("argument of nth_value must be greater than zero").into());
        }
        let constant = obj.arg_is_constant(1);
        Ok(obj
            .get_arg_in_frame(0, nth - 1, WindowSeek::Head, constant)?
            .value)
    }
}

fn int_arg(value: &Value) -> Result<i64> {
    value.to_i64().ok_or_else(|| {
        Error::type_mismatch(DataType::Int64, value.data_type().unwrap_or(DataType::Int64)).into()
    })
}
