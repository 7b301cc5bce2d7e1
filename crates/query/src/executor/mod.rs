//! Window aggregation executor.
//!
//! The executor pulls rows of one partition at a time into a row store, computes every
//! window function and aggregate call for each row in input order, and emits the input row
//! extended with one value per call.

mod aggregator;
mod checkpoint;
mod frame_tracker;
mod partition;
mod winobj;

pub use winobj::{ArgFetch, WindowObject, WindowSeek};

use crate::catalog::{BuiltinCatalog, FunctionCatalog, ResolvedFunction};
use crate::compare::KeyComparator;
use crate::config::WindowConfig;
use crate::error::{Result, WindowError};
use crate::expr::ArgExpr;
use crate::frame::FrameSpec;
use crate::source::RowSource;
use crate::window::WindowFunction;
use aggregator::{AggCall, Aggregator};
use partition::Partition;
use winagg_core::{DataType, Row, Value};
use winagg_storage::CursorFlags;
use winobj::ObjectState;

/// A function call: a name and typed arguments.
#[derive(Clone, Debug)]
pub struct WindowCall {
    name: String,
    args: Vec<ArgExpr>,
    arg_types: Vec<DataType>,
}

impl WindowCall {
    /// Creates a call without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            arg_types: Vec::new(),
        }
    }

    /// Appends an argument of the given type.
    pub fn arg(mut self, expr: ArgExpr, data_type: DataType) -> Self {
        self.args.push(expr);
        self.arg_types.push(data_type);
        self
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument types.
    pub fn arg_types(&self) -> &[DataType] {
        &self.arg_types
    }
}

/// Builder for [`WindowAggExecutor`].
pub struct WindowAggBuilder {
    source: Box<dyn RowSource>,
    partition_keys: Option<Box<dyn KeyComparator>>,
    order_keys: Option<Box<dyn KeyComparator>>,
    frame: FrameSpec,
    calls: Vec<WindowCall>,
    config: WindowConfig,
    catalog: Box<dyn FunctionCatalog>,
}

impl WindowAggBuilder {
    /// Rows with equal keys under `keys` form one partition. Without it, the whole input is
    /// one partition.
    pub fn partition_by(mut self, keys: impl KeyComparator + 'static) -> Self {
        self.partition_keys = Some(Box::new(keys));
        self
    }

    /// Rows with equal keys under `keys` are peers.
    pub fn order_by(mut self, keys: impl KeyComparator + 'static) -> Self {
        self.order_keys = Some(Box::new(keys));
        self
    }

    /// Sets the frame. Defaults to `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
    pub fn frame(mut self, frame: FrameSpec) -> Self {
        self.frame = frame;
        self
    }

    /// Adds a call; its result becomes the next output column.
    pub fn call(mut self, call: WindowCall) -> Self {
        self.calls.push(call);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: WindowConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the function catalog.
    pub fn catalog(mut self, catalog: impl FunctionCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    /// Resolves every call and checks the frame shape and configuration.
    pub fn build(self) -> Result<WindowAggExecutor> {
        self.config.validate()?;
        self.frame.validate()?;

        let mut outputs = Vec::with_capacity(self.calls.len());
        let mut functions = Vec::new();
        let mut aggregates = Vec::new();
        for call in self.calls {
            match self.catalog.resolve(&call.name, &call.arg_types)? {
                ResolvedFunction::Aggregate(func) => {
                    if func.is_strict() && func.initial_state().is_none() {
                        let compatible = call
                            .arg_types
                            .first()
                            .map_or(false, |t| t.is_binary_compatible(func.state_type()));
                        if !compatible {
                            return Err(WindowError::configuration(format!(
                                "aggregate {} has no initial value and its first argument cannot seed a {:?} state",
                                func.name(),
                                func.state_type()
                            )));
                        }
                    }
                    outputs.push(Output::Aggregate(aggregates.len()));
                    aggregates.push(AggCall::new(func, call.args));
                }
                ResolvedFunction::Window(func) => {
                    outputs.push(Output::Window(functions.len()));
                    functions.push(FunctionCall {
                        func,
                        args: call.args,
                        state: ObjectState::default(),
                        result: Value::Null,
                    });
                }
            }
        }

        let head_movable = self.frame.head_is_movable();
        let aggregator = Aggregator::new(aggregates, self.config.checkpoints.clone(), head_movable);
        log::debug!(
            "window executor built: {} window functions, {} aggregates, checkpoints {}",
            functions.len(),
            outputs.len() - functions.len(),
            if aggregator.checkpoints_usable() {
                "on"
            } else {
                "off"
            }
        );

        Ok(WindowAggExecutor {
            part: Partition::new(
                self.source,
                self.partition_keys,
                self.order_keys,
                self.config.store.clone(),
            ),
            frame: self.frame,
            functions,
            aggregator,
            outputs,
            started: false,
            done: false,
            poisoned: false,
        })
    }
}

struct FunctionCall {
    func: Box<dyn WindowFunction>,
    args: Vec<ArgExpr>,
    state: ObjectState,
    result: Value,
}

/// Where an output column comes from.
#[derive(Clone, Copy, Debug)]
enum Output {
    Window(usize),
    Aggregate(usize),
}

/// Computes window functions and aggregates over a partitioned, ordered row stream.
///
/// Input must arrive grouped by partition and sorted within each partition. Output rows come
/// out in input order, one per input row, with the call results appended. The first error
/// poisons the executor.
///
/// # Example
///
/// ```rust
/// use winagg_core::{DataType, Row, Value};
/// use winagg_query::{ArgExpr, FrameBound, FrameSpec, VecSource, WindowAggExecutor, WindowCall};
///
/// let rows = [10, 20, 30, 40]
///     .iter()
///     .enumerate()
///     .map(|(i, &x)| Row::new(i as u64, vec![Value::Int64(x)]))
///     .collect();
///
/// let out = WindowAggExecutor::builder(VecSource::new(rows))
///     .frame(FrameSpec::rows(FrameBound::preceding(1), FrameBound::CurrentRow))
///     .call(WindowCall::new("sum").arg(ArgExpr::column(0), DataType::Int64))
///     .build()?
///     .execute()?;
///
/// let sums: Vec<_> = out.iter().map(|row| row.values()[1].clone()).collect();
/// assert_eq!(sums, vec![Value::Int64(10), Value::Int64(30), Value::Int64(50), Value::Int64(70)]);
/// # Ok::<(), winagg_query::WindowError>(())
/// ```
pub struct WindowAggExecutor {
    part: Partition,
    frame: FrameSpec,
    functions: Vec<FunctionCall>,
    aggregator: Aggregator,
    outputs: Vec<Output>,
    started: bool,
    done: bool,
    poisoned: bool,
}

impl WindowAggExecutor {
    /// Starts building an executor reading from `source`.
    pub fn builder(source: impl RowSource + 'static) -> WindowAggBuilder {
        WindowAggBuilder {
            source: Box::new(source),
            partition_keys: None,
            order_keys: None,
            frame: FrameSpec::default(),
            calls: Vec::new(),
            config: WindowConfig::default(),
            catalog: Box::new(BuiltinCatalog),
        }
    }

    /// Produces the next output row, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.poisoned {
            return Err(WindowError::Poisoned);
        }
        match self.advance() {
            Ok(row) => Ok(row),
            Err(err) => {
                log::warn!("window executor failed: {}", err);
                self.poisoned = true;
                self.part.release();
                Err(err)
            }
        }
    }

    /// Runs to the end of input.
    pub fn execute(mut self) -> Result<Vec<Row>> {
        let mut out = Vec::new();
        while let Some(row) = self.next_row()? {
            out.push(row);
        }
        Ok(out)
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.part.set_frame(self.frame.resolve()?);
            self.started = true;
        }

        if self.part.is_active() {
            self.part.current_pos += 1;
            self.part.frame.invalidate();
        } else if !self.begin_partition()? {
            self.done = true;
            return Ok(None);
        }

        loop {
            let cur = self.part.current_pos;
            self.part.spool(Some(cur))?;
            if !self.part.is_finished() {
                break;
            }
            let more = self.part.more_partitions();
            self.part.release();
            if !more || !self.begin_partition()? {
                self.done = true;
                return Ok(None);
            }
        }

        let row = self.part.fetch_current()?;

        for call in &mut self.functions {
            let mut obj = WindowObject::new(&mut self.part, &mut call.state, &call.args);
            call.result = call.func.evaluate(&mut obj)?;
        }
        self.aggregator.evaluate(&mut self.part)?;

        // Let the peer scan cursors move on so trimming is not held back
        if self.part.head_cursor.is_some() {
            self.part.update_frame_head()?;
        }
        if self.part.tail_cursor.is_some() {
            self.part.update_frame_tail()?;
        }
        self.part.trim();

        let results = self.outputs.iter().map(|output| match *output {
            Output::Window(i) => self.functions[i].result.clone(),
            Output::Aggregate(i) => self.aggregator.result(i),
        });
        Ok(Some(row.extended(results)))
    }

    /// Starts the next partition and allocates every cursor before its first row is stored.
    fn begin_partition(&mut self) -> Result<bool> {
        if !self.part.begin()? {
            return Ok(false);
        }
        let head_movable = self.frame.head_is_movable();
        let store = self.part.store_mut()?;
        self.aggregator.begin_partition(store, head_movable)?;
        for call in &mut self.functions {
            call.state.reset();
            call.state.cursor = Some(store.allocate_cursor(CursorFlags::BACKWARD)?);
            call.result = Value::Null;
        }
        self.part.push_first_row()?;
        Ok(true)
    }
}

impl Iterator for WindowAggExecutor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }
        self.next_row().transpose()
    }
}

impl std::fmt::Debug for WindowAggExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowAggExecutor")
            .field("frame", &self.frame)
            .field("functions", &self.functions.len())
            .field("aggregates", &(self.outputs.len() - self.functions.len()))
            .field("done", &self.done)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ColumnKeys;
    use crate::frame::FrameBound;
    use crate::source::{IterSource, VecSource};

    fn rows(values: &[Option<i64>]) -> Vec<Row> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Row::new(i as u64, vec![v.map_or(Value::Null, Value::Int64)]))
            .collect()
    }

    fn sum() -> WindowCall {
        WindowCall::new("sum").arg(ArgExpr::column(0), DataType::Int64)
    }

    fn column(out: &[Row], index: usize) -> Vec<Value> {
        out.iter().map(|r| r.values()[index].clone()).collect()
    }

    #[test]
    fn test_empty_input() {
        let mut exec = WindowAggExecutor::builder(VecSource::new(Vec::new()))
            .call(sum())
            .build()
            .unwrap();
        assert!(exec.next_row().unwrap().is_none());
        assert!(exec.next_row().unwrap().is_none());
    }

    #[test]
    fn test_output_keeps_row_ids_and_call_order() {
        let out = WindowAggExecutor::builder(VecSource::new(rows(&[Some(3), Some(4)])))
            .frame(FrameSpec::whole_partition())
            .call(WindowCall::new("row_number"))
            .call(sum())
            .call(WindowCall::new("count"))
            .build()
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].id(), 1);
        assert_eq!(
            out[1].values(),
            &[Value::Int64(4), Value::Int64(2), Value::Int64(7), Value::Int64(2)]
        );
    }

    #[test]
    fn test_strict_null_running_sum() {
        let out = WindowAggExecutor::builder(VecSource::new(rows(&[None, Some(5), None, Some(3)])))
            .frame(FrameSpec::rows(FrameBound::UnboundedPreceding, FrameBound::CurrentRow))
            .call(sum())
            .build()
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(
            column(&out, 1),
            vec![Value::Null, Value::Int64(5), Value::Int64(5), Value::Int64(8)]
        );
    }

    #[test]
    fn test_bad_offset_fails_on_first_row() {
        let mut exec = WindowAggExecutor::builder(VecSource::new(rows(&[Some(1)])))
            .frame(FrameSpec::rows(FrameBound::Preceding(Value::Null), FrameBound::CurrentRow))
            .call(sum())
            .build()
            .unwrap();
        let err = exec.next_row().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(exec.next_row(), Err(WindowError::Poisoned)));
        assert!(exec.next().is_none());
    }

    #[test]
    fn test_build_rejects_bad_setup() {
        let range_offset = WindowAggExecutor::builder(VecSource::new(Vec::new()))
            .frame(FrameSpec::range(FrameBound::preceding(1), FrameBound::CurrentRow))
            .build();
        assert!(range_offset.unwrap_err().is_configuration());

        let unknown = WindowAggExecutor::builder(VecSource::new(Vec::new()))
            .call(WindowCall::new("sum").arg(ArgExpr::column(0), DataType::Bytes))
            .build();
        assert!(matches!(unknown, Err(WindowError::UnknownFunction { .. })));

        let config = WindowAggExecutor::builder(VecSource::new(Vec::new()))
            .config(WindowConfig::new().with_checkpoint_count(0))
            .build();
        assert!(config.unwrap_err().is_configuration());
    }

    #[test]
    fn test_partitions_restart_state() {
        let input = vec![
            Row::new(0, vec![Value::Int64(1), Value::Int64(10)]),
            Row::new(1, vec![Value::Int64(1), Value::Int64(20)]),
            Row::new(2, vec![Value::Int64(2), Value::Int64(5)]),
        ];
        let out: Vec<Row> = WindowAggExecutor::builder(IterSource::new(input.into_iter()))
            .partition_by(ColumnKeys::new([0]))
            .call(WindowCall::new("sum").arg(ArgExpr::column(1), DataType::Int64))
            .call(WindowCall::new("row_number"))
            .build()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        // Without order keys every row of a partition is a peer
        assert_eq!(column(&out, 2), vec![Value::Int64(30), Value::Int64(30), Value::Int64(5)]);
        assert_eq!(column(&out, 3), vec![Value::Int64(1), Value::Int64(2), Value::Int64(1)]);
    }
}
