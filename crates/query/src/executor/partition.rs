//! Partition state: input spooling, the row store and the current row.
//!
//! Rows of one partition are pulled from the source lazily, only as far as the current row,
//! a frame edge or a window function needs them. The first row of the following partition
//! is held back until that partition begins.

use crate::compare::KeyComparator;
use crate::error::{Result, WindowError};
use crate::frame::{Bound, FrameMode, FrameState, ResolvedFrame};
use crate::source::RowSource;
use std::rc::Rc;
use winagg_core::Row;
use winagg_storage::{CursorFlags, CursorId, RowStore, StoreConfig};

/// Partition currently being evaluated.
pub(crate) struct Partition {
    source: Box<dyn RowSource>,
    /// First row of the next partition, read while spooling the current one.
    pending: Option<Row>,
    partition_keys: Option<Box<dyn KeyComparator>>,
    order_keys: Option<Box<dyn KeyComparator>>,
    store_config: StoreConfig,
    store: Option<RowStore>,
    /// Copy of the partition's first row, compared against to find its end.
    first_row: Option<Row>,
    frame_def: Option<ResolvedFrame>,
    /// Rows appended to the store so far.
    pub(crate) spooled: i64,
    /// The store holds every row of the partition.
    partition_spooled: bool,
    /// Input continues past this partition.
    more_partitions: bool,
    pub(crate) current_pos: i64,
    pub(crate) current_row: Option<Rc<Row>>,
    pub(crate) frame: FrameState,
    /// Row at `frame.head`, cached while scanning for peers.
    pub(crate) head_row: Option<Rc<Row>>,
    /// Row at `frame.tail`, cached while scanning for peers.
    pub(crate) tail_row: Option<Rc<Row>>,
    pub(crate) head_cursor: Option<CursorId>,
    pub(crate) tail_cursor: Option<CursorId>,
    partitions_seen: u64,
}

impl Partition {
    pub(crate) fn new(
        source: Box<dyn RowSource>,
        partition_keys: Option<Box<dyn KeyComparator>>,
        order_keys: Option<Box<dyn KeyComparator>>,
        store_config: StoreConfig,
    ) -> Self {
        Self {
            source,
            pending: None,
            partition_keys,
            order_keys,
            store_config,
            store: None,
            first_row: None,
            frame_def: None,
            spooled: 0,
            partition_spooled: false,
            more_partitions: false,
            current_pos: 0,
            current_row: None,
            frame: FrameState::default(),
            head_row: None,
            tail_row: None,
            head_cursor: None,
            tail_cursor: None,
            partitions_seen: 0,
        }
    }

    pub(crate) fn set_frame(&mut self, frame: ResolvedFrame) {
        self.frame_def = Some(frame);
    }

    pub(crate) fn frame_def(&self) -> Result<ResolvedFrame> {
        self.frame_def
            .ok_or_else(|| WindowError::invariant("frame offsets used before being resolved"))
    }

    pub(crate) fn has_order_keys(&self) -> bool {
        self.order_keys.is_some()
    }

    /// Returns true between `begin` and `release`.
    pub(crate) fn is_active(&self) -> bool {
        self.store.is_some()
    }

    pub(crate) fn store_mut(&mut self) -> Result<&mut RowStore> {
        self.store
            .as_mut()
            .ok_or_else(|| WindowError::invariant("no partition is active"))
    }

    /// Starts the next partition: reads its first row and creates an empty store.
    ///
    /// Returns false once input is exhausted. The first row is not appended yet, so callers
    /// can still allocate cursors of any capability; see [`Partition::push_first_row`].
    pub(crate) fn begin(&mut self) -> Result<bool> {
        self.partition_spooled = false;
        self.spooled = 0;
        self.current_pos = 0;
        self.current_row = None;
        self.frame = FrameState::default();
        self.head_row = None;
        self.tail_row = None;
        self.head_cursor = None;
        self.tail_cursor = None;

        let first = match self.pending.take() {
            Some(row) => row,
            None => match self.source.next_row()? {
                Some(row) => row,
                None => {
                    self.partition_spooled = true;
                    self.more_partitions = false;
                    return Ok(false);
                }
            },
        };

        let frame = self.frame_def()?;
        let mut store = RowStore::new(self.store_config.clone());
        store.set_default_flags(CursorFlags::NONE)?;
        if frame.mode == FrameMode::Range && self.order_keys.is_some() {
            if frame.start == Bound::CurrentRow {
                self.head_cursor = Some(store.allocate_cursor(CursorFlags::NONE)?);
            }
            if frame.end == Bound::CurrentRow {
                self.tail_cursor = Some(store.allocate_cursor(CursorFlags::NONE)?);
            }
        }
        self.store = Some(store);
        self.first_row = Some(first);
        self.partitions_seen += 1;
        log::debug!("window partition {} started", self.partitions_seen);
        Ok(true)
    }

    /// Appends the partition's first row. Cursor allocation is closed afterwards.
    pub(crate) fn push_first_row(&mut self) -> Result<()> {
        let row = self
            .first_row
            .clone()
            .ok_or_else(|| WindowError::invariant("partition has no first row"))?;
        self.store_mut()?.append(row)?;
        self.spooled = 1;
        Ok(())
    }

    /// Pulls input rows until row `upto` is stored, the partition ends, or input ends.
    /// `None` spools the whole partition.
    pub(crate) fn spool(&mut self, upto: Option<i64>) -> Result<()> {
        if self.partition_spooled || self.store.is_none() {
            return Ok(());
        }
        while upto.map_or(true, |pos| self.spooled <= pos) {
            let row = match self.source.next_row()? {
                Some(row) => row,
                None => {
                    self.partition_spooled = true;
                    self.more_partitions = false;
                    break;
                }
            };
            if let (Some(keys), Some(first)) = (&self.partition_keys, &self.first_row) {
                if !keys.equal(first, &row) {
                    self.pending = Some(row);
                    self.partition_spooled = true;
                    self.more_partitions = true;
                    break;
                }
            }
            self.store_mut()?.append(row)?;
            self.spooled += 1;
        }
        Ok(())
    }

    /// Spools the whole partition and returns its row count.
    pub(crate) fn row_count(&mut self) -> Result<i64> {
        self.spool(None)?;
        Ok(self.spooled)
    }

    /// Returns true when the current row has run past the partition's last row.
    pub(crate) fn is_finished(&self) -> bool {
        self.partition_spooled && self.current_pos >= self.spooled
    }

    pub(crate) fn more_partitions(&self) -> bool {
        self.more_partitions
    }

    /// Drops the store, and with it any spill file.
    pub(crate) fn release(&mut self) {
        if let Some(store) = self.store.take() {
            log::debug!(
                "window partition {} released: {} rows, {}",
                self.partitions_seen,
                self.spooled,
                if store.is_in_memory() {
                    "in memory"
                } else {
                    "spilled"
                }
            );
        }
        self.current_row = None;
        self.head_row = None;
        self.tail_row = None;
        self.head_cursor = None;
        self.tail_cursor = None;
    }

    /// Reads the current row through cursor 0.
    pub(crate) fn fetch_current(&mut self) -> Result<Rc<Row>> {
        let store = self.store_mut()?;
        store.select(0)?;
        let row = store
            .fetch(true)?
            .ok_or_else(|| WindowError::invariant("unexpected end of row store"))?;
        self.current_row = Some(Rc::clone(&row));
        Ok(row)
    }

    pub(crate) fn current_row(&self) -> Result<&Rc<Row>> {
        self.current_row
            .as_ref()
            .ok_or_else(|| WindowError::invariant("no current row"))
    }

    /// Fetches row `pos` through `cursor`, spooling as needed.
    ///
    /// Returns `None` if the position lies outside the partition. Asking for a row below the
    /// cursor's mark is an invariant violation.
    pub(crate) fn fetch_at(&mut self, cursor: CursorId, pos: i64) -> Result<Option<Rc<Row>>> {
        if pos < 0 {
            return Ok(None);
        }
        self.spool(Some(pos))?;
        if pos >= self.spooled {
            return Ok(None);
        }

        let store = self.store_mut()?;
        let mark = store.mark(cursor)?;
        if pos < mark {
            return Err(WindowError::invariant(format!(
                "cannot fetch row {} before mark position {} of cursor {}",
                pos, mark, cursor
            )));
        }
        store.select(cursor)?;
        let mut at = store.position(cursor)?;
        while at > pos + 1 {
            if !store.advance(false)? {
                return Err(WindowError::invariant("unexpected start of row store"));
            }
            at -= 1;
        }
        let row = if at == pos + 1 {
            store.fetch(false)?
        } else {
            while at < pos {
                if !store.advance(true)? {
                    return Err(WindowError::invariant("unexpected end of row store"));
                }
                at += 1;
            }
            store.fetch(true)?
        };
        row.map(Some)
            .ok_or_else(|| WindowError::invariant("unexpected end of row store"))
    }

    /// Peer predicate under the order keys. Without order keys every row is a peer.
    pub(crate) fn are_peers(&self, a: &Row, b: &Row) -> bool {
        self.order_keys.as_ref().map_or(true, |keys| keys.equal(a, b))
    }

    pub(crate) fn trim(&mut self) {
        if let Some(store) = self.store.as_mut() {
            store.trim();
        }
    }
}
