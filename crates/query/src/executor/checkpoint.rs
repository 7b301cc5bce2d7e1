//! Checkpointed transition states.
//!
//! A checkpoint accumulates the aggregate inputs of rows `start..=end`, where `start` is
//! scheduled ahead of the frame head at a full restart and `end` grows as rows are fed. When
//! the head later moves to or before `start`, the aggregator feeds `head..start` into a fresh
//! state, combines the checkpoint in, and continues after `end` without rescanning.

use crate::aggregate::{AggregateFunction, TransitionState};
use crate::config::CheckpointConfig;
use crate::error::Result;
use std::rc::Rc;
use winagg_core::Value;
use winagg_storage::{CursorFlags, CursorId, RowStore};

/// Start of a slot that is not scheduled; no row position ever matches it.
const UNSCHEDULED: i64 = -1;

#[derive(Debug)]
pub(crate) struct Checkpoint {
    pub(crate) start: i64,
    /// Last row folded in; `None` until the row at `start` is fed.
    pub(crate) end: Option<i64>,
    pub(crate) states: Vec<TransitionState>,
    /// Sits one past `end`, for the aggregate cursor to jump to.
    pub(crate) cursor: CursorId,
}

impl Checkpoint {
    fn clear(&mut self, funcs: &[Rc<dyn AggregateFunction>]) {
        self.start = UNSCHEDULED;
        self.end = None;
        self.states = fresh_states(funcs);
    }
}

/// Checkpoints of one partition.
pub(crate) struct CheckpointCache {
    config: CheckpointConfig,
    usable: bool,
    funcs: Vec<Rc<dyn AggregateFunction>>,
    slots: Vec<Checkpoint>,
}

impl CheckpointCache {
    pub(crate) fn new(
        config: CheckpointConfig,
        usable: bool,
        funcs: Vec<Rc<dyn AggregateFunction>>,
    ) -> Self {
        Self {
            config,
            usable,
            funcs,
            slots: Vec::new(),
        }
    }

    pub(crate) fn is_usable(&self) -> bool {
        self.usable
    }

    pub(crate) fn first_step(&self) -> i64 {
        self.config.first_step
    }

    pub(crate) fn slot(&self, index: usize) -> &Checkpoint {
        &self.slots[index]
    }

    /// Allocates one cursor per checkpoint in the new partition's store.
    pub(crate) fn begin_partition(&mut self, store: &mut RowStore) -> Result<()> {
        self.slots.clear();
        if !self.usable {
            return Ok(());
        }
        for _ in 0..self.config.count {
            let cursor = store.allocate_cursor(CursorFlags::NONE)?;
            self.slots.push(Checkpoint {
                start: UNSCHEDULED,
                end: None,
                states: fresh_states(&self.funcs),
                cursor,
            });
        }
        Ok(())
    }

    /// Picks the checkpoint to resume from after the head moved to `head`.
    ///
    /// Only considered when the previous frame held more than `min_frame_size` rows.
    pub(crate) fn find_resume(&self, head: i64, prev_size: i64) -> Option<usize> {
        if !self.usable || prev_size <= self.config.min_frame_size {
            return None;
        }
        self.slots
            .iter()
            .position(|cp| head <= cp.start && cp.end.is_some())
    }

    /// Discards every checkpoint and schedules new ones `step` rows apart after `head`.
    pub(crate) fn reschedule(
        &mut self,
        head: i64,
        step: i64,
        store: &mut RowStore,
        agg_cursor: CursorId,
    ) -> Result<()> {
        if !self.usable {
            return Ok(());
        }
        for (i, cp) in self.slots.iter_mut().enumerate() {
            cp.clear(&self.funcs);
            cp.start = head.saturating_add(step.saturating_mul(i as i64 + 1));
            // Lets the store trim rows the stale checkpoint pinned
            store.copy_position(agg_cursor, cp.cursor)?;
        }
        log::trace!(
            "scheduled {} checkpoints from row {} every {} rows",
            self.slots.len(),
            head,
            step
        );
        Ok(())
    }

    /// Drops checkpoint `index` until the next reschedule.
    pub(crate) fn invalidate(&mut self, index: usize) {
        if let Some(cp) = self.slots.get_mut(index) {
            cp.clear(&self.funcs);
        }
    }

    /// Folds row `pos` into every checkpoint from slot `from` on that either starts at `pos`
    /// or ends right before it. `agg_cursor` must sit one past `pos`.
    ///
    /// A checkpoint whose transition fails is dropped rather than failing the row.
    pub(crate) fn feed(
        &mut self,
        from: usize,
        pos: i64,
        inputs: &[Vec<Value>],
        store: &mut RowStore,
        agg_cursor: CursorId,
    ) -> Result<()> {
        for cp in self.slots.iter_mut().skip(from) {
            if pos < cp.start {
                continue;
            }
            let extends = match cp.end {
                Some(end) => end + 1 == pos,
                None => pos == cp.start,
            };
            if !extends {
                continue;
            }
            let advanced = cp
                .states
                .iter_mut()
                .zip(&self.funcs)
                .zip(inputs)
                .try_for_each(|((state, func), args)| state.advance(func.as_ref(), args));
            if let Err(err) = advanced {
                log::debug!("checkpoint at row {} dropped at row {}: {}", cp.start, pos, err);
                cp.clear(&self.funcs);
                continue;
            }
            cp.end = Some(pos);
            store.copy_position(agg_cursor, cp.cursor)?;
        }
        Ok(())
    }
}

fn fresh_states(funcs: &[Rc<dyn AggregateFunction>]) -> Vec<TransitionState> {
    funcs.iter().map(|f| TransitionState::new(f.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{IntSum, Transition};
    use winagg_core::{DataType, Error, Row};
    use winagg_storage::StoreConfig;

    /// Integer sum that refuses the value 5.
    struct RejectsFive;

    impl AggregateFunction for RejectsFive {
        fn name(&self) -> &str {
            "rejects_five"
        }

        fn state_type(&self) -> DataType {
            DataType::Int64
        }

        fn initial_state(&self) -> Option<Value> {
            Some(Value::Int64(0))
        }

        fn transition(&self, state: &Value, args: &[Value]) -> winagg_core::Result<Transition> {
            match (state, args.first()) {
                (_, Some(Value::Int64(5))) => Err(Error::overflow("five")),
                (Value::Int64(a), Some(Value::Int64(b))) => {
                    Ok(Transition::NewValue(Value::Int64(a + b)))
                }
                _ => Err(Error::invalid_operation("rejects_five expects integers")),
            }
        }

        fn supports_combine(&self) -> bool {
            true
        }

        fn combine(&self, left: &Value, right: &Value) -> winagg_core::Result<Transition> {
            self.transition(left, std::slice::from_ref(right))
        }
    }

    fn store_with_rows(
        n: i64,
        func: Rc<dyn AggregateFunction>,
    ) -> (RowStore, CursorId, CheckpointCache) {
        let mut store = RowStore::new(StoreConfig::default());
        store.set_default_flags(CursorFlags::NONE).unwrap();
        let agg = store.allocate_cursor(CursorFlags::BACKWARD).unwrap();
        let config = CheckpointConfig {
            count: 2,
            ..CheckpointConfig::default()
        };
        let mut cache = CheckpointCache::new(config, true, vec![func]);
        cache.begin_partition(&mut store).unwrap();
        for i in 0..n {
            store.append(Row::new(i as u64, vec![Value::Int64(i)])).unwrap();
        }
        (store, agg, cache)
    }

    fn feed_rows(
        cache: &mut CheckpointCache,
        store: &mut RowStore,
        agg: CursorId,
        rows: std::ops::Range<i64>,
    ) {
        store.select(agg).unwrap();
        for pos in rows {
            store.fetch(true).unwrap();
            cache
                .feed(0, pos, &[vec![Value::Int64(pos)]], store, agg)
                .unwrap();
        }
    }

    #[test]
    fn test_feed_extends_contiguous_runs() {
        let sum = IntSum::new(DataType::Int64);
        let (mut store, agg, mut cache) = store_with_rows(10, Rc::new(sum));
        cache.reschedule(0, 3, &mut store, agg).unwrap();
        assert_eq!(cache.slot(0).start, 3);
        assert_eq!(cache.slot(1).start, 6);

        feed_rows(&mut cache, &mut store, agg, 0..8);
        assert_eq!(cache.slot(0).end, Some(7));
        assert_eq!(
            cache.slot(0).states[0].finalize(&sum).unwrap(),
            Value::Int64(3 + 4 + 5 + 6 + 7)
        );
        assert_eq!(cache.slot(1).end, Some(7));
        assert_eq!(cache.slot(1).states[0].finalize(&sum).unwrap(), Value::Int64(6 + 7));
        assert_eq!(store.position(cache.slot(0).cursor).unwrap(), 8);
    }

    #[test]
    fn test_find_resume() {
        let sum = Rc::new(IntSum::new(DataType::Int64));
        let (mut store, agg, mut cache) = store_with_rows(10, sum);
        cache.reschedule(0, 2, &mut store, agg).unwrap();
        assert_eq!(cache.find_resume(1, 10), None);

        feed_rows(&mut cache, &mut store, agg, 0..5);
        assert_eq!(cache.find_resume(1, 10), Some(0));
        assert_eq!(cache.find_resume(3, 10), Some(1));
        assert_eq!(cache.find_resume(5, 10), None);
        // Small previous frames never resume
        assert_eq!(cache.find_resume(1, 4), None);

        cache.invalidate(0);
        assert_eq!(cache.find_resume(1, 10), Some(1));
    }

    #[test]
    fn test_failed_transition_drops_only_that_checkpoint() {
        let (mut store, agg, mut cache) = store_with_rows(10, Rc::new(RejectsFive));
        cache.reschedule(0, 3, &mut store, agg).unwrap();

        feed_rows(&mut cache, &mut store, agg, 0..8);
        assert_eq!(cache.slot(0).start, UNSCHEDULED);
        assert_eq!(cache.slot(0).end, None);
        assert_eq!(cache.slot(1).end, Some(7));
        assert_eq!(cache.slot(1).states[0].value(), &Value::Int64(6 + 7));
        assert_eq!(cache.find_resume(0, 10), Some(1));
    }

    #[test]
    fn test_unusable_cache_is_inert() {
        let mut store = RowStore::new(StoreConfig::default());
        let mut cache = CheckpointCache::new(CheckpointConfig::default(), false, Vec::new());
        cache.begin_partition(&mut store).unwrap();
        assert_eq!(store.cursor_count(), 1);
        assert_eq!(cache.find_resume(0, 1000), None);
        assert!(!cache.is_usable());
    }
}
