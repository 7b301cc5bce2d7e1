//! Random access to the partition for window functions.

use super::partition::Partition;
use crate::error::{Result, WindowError};
use crate::expr::ArgExpr;
use crate::frame::FrameMode;
use std::any::Any;
use std::rc::Rc;
use winagg_core::{Error, Row, Value};
use winagg_storage::CursorId;

/// Reference point of a relative row offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSeek {
    /// The current row.
    Current,
    /// The first row of the partition or frame.
    Head,
    /// The last row of the partition or frame.
    Tail,
}

/// An argument value fetched from another row.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgFetch {
    /// The argument, or null when the row does not exist.
    pub value: Value,
    /// The requested row lies outside the partition or frame.
    pub out_of_range: bool,
}

impl ArgFetch {
    fn found(value: Value) -> Self {
        Self {
            value,
            out_of_range: false,
        }
    }

    fn out_of_range() -> Self {
        Self {
            value: Value::Null,
            out_of_range: true,
        }
    }
}

/// Per-call state that outlives a single row.
#[derive(Default)]
pub(crate) struct ObjectState {
    pub(crate) cursor: Option<CursorId>,
    local: Option<Box<dyn Any>>,
}

impl ObjectState {
    /// Forgets partition-local data; the cursor is reassigned by the caller.
    pub(crate) fn reset(&mut self) {
        self.cursor = None;
        self.local = None;
    }
}

/// Handle a window function uses to read rows of the current partition.
///
/// Each function call owns a cursor with backward capability. Rows are addressed by absolute
/// position, relative to the current row, the head or the tail. A call may promise, through
/// its mark, never to read rows below some position again; the executor then discards them.
pub struct WindowObject<'a> {
    part: &'a mut Partition,
    state: &'a mut ObjectState,
    args: &'a [ArgExpr],
}

impl<'a> WindowObject<'a> {
    pub(crate) fn new(
        part: &'a mut Partition,
        state: &'a mut ObjectState,
        args: &'a [ArgExpr],
    ) -> Self {
        Self { part, state, args }
    }

    /// Position of the current row within its partition.
    pub fn current_position(&self) -> i64 {
        self.part.current_pos
    }

    /// Number of rows in the partition. Reads the whole partition on first use.
    pub fn partition_row_count(&mut self) -> Result<i64> {
        self.part.row_count()
    }

    /// Number of arguments of this call.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Returns true if argument `argno` has the same value on every row.
    pub fn arg_is_constant(&self, argno: usize) -> bool {
        self.args.get(argno).map_or(false, ArgExpr::is_constant)
    }

    /// Evaluates argument `argno` on the current row. Not subject to the mark.
    pub fn get_arg_current(&self, argno: usize) -> Result<Value> {
        let row = Rc::clone(self.part.current_row()?);
        self.evaluate(argno, &row)
    }

    /// Evaluates argument `argno` on a row of the partition.
    ///
    /// A position outside the partition is not an error: the result is null and flagged
    /// out of range. With `set_mark` the call's mark moves to the fetched row.
    pub fn get_arg_in_partition(
        &mut self,
        argno: usize,
        relpos: i64,
        seek: WindowSeek,
        set_mark: bool,
    ) -> Result<ArgFetch> {
        let pos = match seek {
            WindowSeek::Current => self.part.current_pos.saturating_add(relpos),
            WindowSeek::Head => relpos,
            WindowSeek::Tail => self.part.row_count()?.saturating_sub(1).saturating_add(relpos),
        };
        let cursor = self.cursor()?;
        let row = match self.part.fetch_at(cursor, pos)? {
            Some(row) => row,
            None => return Ok(ArgFetch::out_of_range()),
        };
        if set_mark {
            self.set_mark_clamped(pos)?;
        }
        Ok(ArgFetch::found(self.evaluate(argno, &row)?))
    }

    /// Evaluates argument `argno` on a row of the current frame.
    ///
    /// `Head` counts from the frame's first row and `Tail` from its last; positions outside
    /// the frame are flagged out of range.
    pub fn get_arg_in_frame(
        &mut self,
        argno: usize,
        relpos: i64,
        seek: WindowSeek,
        set_mark: bool,
    ) -> Result<ArgFetch> {
        let pos = match seek {
            WindowSeek::Current => self.part.current_pos.saturating_add(relpos),
            WindowSeek::Head => self.part.update_frame_head()?.saturating_add(relpos),
            WindowSeek::Tail => self
                .part
                .update_frame_tail()?
                .saturating_sub(1)
                .saturating_add(relpos),
        };
        if !self.part.frame_contains(pos)? {
            return Ok(ArgFetch::out_of_range());
        }
        let cursor = self.cursor()?;
        let row = match self.part.fetch_at(cursor, pos)? {
            Some(row) => row,
            None => return Ok(ArgFetch::out_of_range()),
        };
        if set_mark {
            self.set_mark_clamped(pos)?;
        }
        Ok(ArgFetch::found(self.evaluate(argno, &row)?))
    }

    /// Returns true if the rows at `pos1` and `pos2` are equal under the order keys.
    /// Without order keys all rows are peers.
    pub fn rows_are_peers(&mut self, pos1: i64, pos2: i64) -> Result<bool> {
        if !self.part.has_order_keys() {
            return Ok(true);
        }
        let cursor = self.cursor()?;
        let a = self.fetch_in_window(cursor, pos1)?;
        let b = self.fetch_in_window(cursor, pos2)?;
        Ok(self.part.are_peers(&a, &b))
    }

    /// Promises never to fetch rows below `pos` again. The mark only moves forward.
    pub fn set_mark(&mut self, pos: i64) -> Result<()> {
        let cursor = self.cursor()?;
        self.part.store_mut()?.set_mark(cursor, pos)?;
        Ok(())
    }

    /// Scratch state of this call, created with `T::default()` at the first use in each
    /// partition.
    pub fn partition_local<T: Default + 'static>(&mut self) -> Result<&mut T> {
        let local = self
            .state
            .local
            .get_or_insert_with(|| Box::new(T::default()));
        local.as_mut().downcast_mut::<T>().ok_or_else(|| {
            WindowError::invariant("partition-local state requested with a different type")
        })
    }

    fn cursor(&self) -> Result<CursorId> {
        self.state
            .cursor
            .ok_or_else(|| WindowError::invariant("window function has no cursor"))
    }

    fn fetch_in_window(&mut self, cursor: CursorId, pos: i64) -> Result<Rc<Row>> {
        self.part.fetch_at(cursor, pos)?.ok_or_else(|| {
            Error::invalid_operation(format!("specified position is out of window: {}", pos))
                .into()
        })
    }

    /// In RANGE mode with a moving head, the mark may not pass the frame head, which later
    /// head scans still need.
    fn set_mark_clamped(&mut self, pos: i64) -> Result<()> {
        let frame = self.part.frame_def()?;
        let mut mark = pos;
        if frame.mode == FrameMode::Range && frame.head_is_movable() {
            mark = mark.min(self.part.update_frame_head()?);
        }
        self.set_mark(mark)
    }

    fn evaluate(&self, argno: usize, row: &Row) -> Result<Value> {
        let arg = self.args.get(argno).ok_or_else(|| {
            Error::invalid_operation(format!(
                "argument {} requested from a call with {} arguments",
                argno,
                self.args.len()
            ))
        })?;
        Ok(arg.evaluate(row)?)
    }
}
