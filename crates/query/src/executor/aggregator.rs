//! Incremental evaluation of aggregates over the frame.
//!
//! All aggregate calls share one cursor and one accumulated range `base..upto`. While the
//! frame head stays put, rows are only added at the tail. When the head moves the
//! accumulation restarts at the new head, or resumes from a checkpoint.

use super::checkpoint::CheckpointCache;
use super::partition::Partition;
use crate::aggregate::{AggregateFunction, TransitionState};
use crate::config::CheckpointConfig;
use crate::error::{Result, WindowError};
use crate::expr::{evaluate_all, ArgExpr};
use std::rc::Rc;
use winagg_core::{Row, Value};
use winagg_storage::{CursorFlags, CursorId, RowStore};

/// One aggregate call site.
pub(crate) struct AggCall {
    func: Rc<dyn AggregateFunction>,
    args: Vec<ArgExpr>,
    live: TransitionState,
    result: Value,
}

impl AggCall {
    pub(crate) fn new(func: Box<dyn AggregateFunction>, args: Vec<ArgExpr>) -> Self {
        let func: Rc<dyn AggregateFunction> = Rc::from(func);
        let live = TransitionState::new(func.as_ref());
        Self {
            func,
            args,
            live,
            result: Value::Null,
        }
    }
}

pub(crate) struct Aggregator {
    calls: Vec<AggCall>,
    cursor: Option<CursorId>,
    /// First row folded into the live states.
    base: i64,
    /// One past the last row folded into the live states.
    upto: i64,
    /// Row at `upto`, fetched but found outside the frame.
    pending_row: Option<(i64, Rc<Row>)>,
    checkpoints: CheckpointCache,
}

impl Aggregator {
    /// Checkpoints are only used when the head can move and every call can combine states.
    pub(crate) fn new(calls: Vec<AggCall>, config: CheckpointConfig, head_movable: bool) -> Self {
        let usable = config.enabled
            && head_movable
            && !calls.is_empty()
            && calls.iter().all(|c| c.func.supports_combine());
        let funcs = calls.iter().map(|c| Rc::clone(&c.func)).collect();
        Self {
            calls,
            cursor: None,
            base: 0,
            upto: 0,
            pending_row: None,
            checkpoints: CheckpointCache::new(config, usable, funcs),
        }
    }

    pub(crate) fn checkpoints_usable(&self) -> bool {
        self.checkpoints.is_usable()
    }

    /// Result of call `index` for the current row.
    pub(crate) fn result(&self, index: usize) -> Value {
        self.calls
            .get(index)
            .map_or(Value::Null, |call| call.result.clone())
    }

    /// Allocates cursors in the new partition's store and clears all state.
    pub(crate) fn begin_partition(&mut self, store: &mut RowStore, head_movable: bool) -> Result<()> {
        self.base = 0;
        self.upto = 0;
        self.pending_row = None;
        self.cursor = None;
        if self.calls.is_empty() {
            return Ok(());
        }
        let flags = if head_movable {
            CursorFlags::BACKWARD
        } else {
            CursorFlags::NONE
        };
        self.cursor = Some(store.allocate_cursor(flags)?);
        for call in &mut self.calls {
            call.live = TransitionState::new(call.func.as_ref());
            call.result = Value::Null;
        }
        self.checkpoints.begin_partition(store)
    }

    /// Brings every result up to date for the current row.
    pub(crate) fn evaluate(&mut self, part: &mut Partition) -> Result<()> {
        if self.calls.is_empty() {
            return Ok(());
        }
        let cursor = self
            .cursor
            .ok_or_else(|| WindowError::invariant("aggregate cursor not allocated"))?;
        let frame = part.frame_def()?;
        let cur = part.current_pos;

        let head = part.update_frame_head()?;
        if frame.head_is_movable() {
            part.store_mut()?.set_mark(cursor, head)?;
        }

        // Peers of an already aggregated row share its frame
        if self.base == head
            && frame.end_follows_peers()
            && self.base <= cur
            && cur < self.upto
        {
            return Ok(());
        }

        let mut resume = None;
        if cur == 0 || head != self.base {
            let prev_size = self.upto - self.base;
            if cur > 0 {
                resume = self.checkpoints.find_resume(head, prev_size);
            }
            for call in &mut self.calls {
                call.live = TransitionState::new(call.func.as_ref());
            }
            match resume {
                Some(slot) => log::trace!(
                    "row {}: frame head {} resumes from checkpoint at row {}",
                    cur,
                    head,
                    self.checkpoints.slot(slot).start
                ),
                None => {
                    let step = if cur == 0 {
                        self.checkpoints.first_step()
                    } else {
                        (libm::sqrt(prev_size.max(0) as f64) as i64).max(1)
                    };
                    self.checkpoints
                        .reschedule(head, step, part.store_mut()?, cursor)?;
                    log::trace!("row {}: aggregates restart at frame head {}", cur, head);
                }
            }
            self.base = head;
            self.upto = head;
            self.pending_row = None;
        }

        self.feed(part, cursor, resume)?;

        for call in &mut self.calls {
            call.result = call.live.finalize(call.func.as_ref())?;
        }
        Ok(())
    }

    /// Folds rows from `upto` until the first row outside the frame.
    fn feed(&mut self, part: &mut Partition, cursor: CursorId, mut resume: Option<usize>) -> Result<()> {
        let mut feed_from = 0;
        loop {
            if let Some(slot) = resume {
                if self.upto == self.checkpoints.slot(slot).start {
                    resume = None;
                    if self.resume_from(part, cursor, slot)? {
                        feed_from = slot;
                        continue;
                    }
                }
            }

            let row = match self.pending_row.take() {
                Some((pos, row)) if pos == self.upto => row,
                _ => match part.fetch_at(cursor, self.upto)? {
                    Some(row) => row,
                    None => break,
                },
            };
            if !part.frame_contains(self.upto)? {
                self.pending_row = Some((self.upto, row));
                break;
            }

            let inputs = self
                .calls
                .iter()
                .map(|call| evaluate_all(&call.args, &row))
                .collect::<winagg_core::Result<Vec<_>>>()?;
            for (call, args) in self.calls.iter_mut().zip(&inputs) {
                call.live.advance(call.func.as_ref(), args)?;
            }
            if resume.is_none() && self.checkpoints.is_usable() {
                self.checkpoints
                    .feed(feed_from, self.upto, &inputs, part.store_mut()?, cursor)?;
            }
            self.upto += 1;
        }
        Ok(())
    }

    /// Combines checkpoint `slot` into the live states if it lies wholly inside the frame,
    /// and moves the aggregate cursor past it.
    ///
    /// The live states change only if every call combines; otherwise the checkpoint is
    /// dropped and its rows are fed one by one.
    fn resume_from(&mut self, part: &mut Partition, cursor: CursorId, slot: usize) -> Result<bool> {
        let end = match self.checkpoints.slot(slot).end {
            Some(end) => end,
            None => return Ok(false),
        };
        if end >= part.update_frame_tail()? {
            return Ok(false);
        }
        let cp = self.checkpoints.slot(slot);
        let (start, cp_cursor) = (cp.start, cp.cursor);
        let merged = self
            .calls
            .iter()
            .zip(&cp.states)
            .map(|(call, state)| {
                let mut live = call.live.clone();
                live.combine(call.func.as_ref(), state).map(|()| live)
            })
            .collect::<winagg_core::Result<Vec<_>>>();
        let merged = match merged {
            Ok(merged) => merged,
            Err(err) => {
                log::debug!("checkpoint at row {} not combined: {}", start, err);
                self.checkpoints.invalidate(slot);
                return Ok(false);
            }
        };
        part.store_mut()?.copy_position(cp_cursor, cursor)?;
        for (call, live) in self.calls.iter_mut().zip(merged) {
            call.live = live;
        }
        self.upto = end + 1;
        self.pending_row = None;
        Ok(true)
    }
}
