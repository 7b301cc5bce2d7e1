//! Spillable multi-cursor row storage.
//!
//! This module provides the `RowStore` struct which buffers the rows of one partition and
//! serves them back through independent read cursors. Rows live in memory until the byte
//! budget is exceeded; the store then migrates once, irreversibly, to a [`SpillFile`].
//!
//! Positions are absolute row indexes: row `i` is the `i`-th row ever appended, whether it
//! is still held in memory, trimmed away, or spilled.

use crate::config::StoreConfig;
use crate::cursor::{Cursor, CursorFlags, CursorId};
use crate::error::{Result, StoreError};
use crate::spill::SpillFile;
use std::collections::VecDeque;
use std::mem::size_of;
use std::rc::Rc;
use winagg_binary::{decode_row, RowEncoder};
use winagg_core::Row;

/// Number of row slots reserved by a new store.
const INITIAL_SLOTS: usize = 1024;

/// Bytes accounted per reserved row slot.
const SLOT_SIZE: usize = size_of::<Rc<Row>>();

/// Size of a record length word.
const LEN_WORD: u64 = 4;

/// Where rows currently live and what the file handle is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Rows are held in memory.
    InMemory,
    /// Spilled; the file handle sits at the write tail.
    WriteFile,
    /// Spilled; the file handle sits at the active cursor's position.
    ReadFile,
}

/// Result of moving the active cursor by one row.
enum Step {
    Memory(Rc<Row>),
    /// Record body left in `read_buf`.
    Spilled,
}

/// Append-only row storage with multiple read cursors.
pub struct RowStore {
    config: StoreConfig,
    status: Status,
    /// Rows retained in memory; `memory[0]` is row `base`.
    memory: VecDeque<Rc<Row>>,
    base: i64,
    /// Total rows ever appended.
    count: i64,
    /// Reserved row slots, counted against the budget.
    slots: usize,
    mem_used: usize,
    cursors: Vec<Cursor>,
    active: CursorId,
    file: Option<SpillFile>,
    /// Row at file offset 0.
    file_base: i64,
    /// Records carry a trailing length word.
    backward_records: bool,
    encoder: RowEncoder,
    read_buf: Vec<u8>,
}

impl RowStore {
    /// Creates an empty store. Cursor 0 exists with `REWIND`.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            status: Status::InMemory,
            memory: VecDeque::with_capacity(INITIAL_SLOTS),
            base: 0,
            count: 0,
            slots: INITIAL_SLOTS,
            mem_used: INITIAL_SLOTS * SLOT_SIZE,
            cursors: vec![Cursor::new(CursorFlags::REWIND)],
            active: 0,
            file: None,
            file_base: 0,
            backward_records: false,
            encoder: RowEncoder::new(),
            read_buf: Vec::new(),
        }
    }

    /// Returns the number of rows ever appended.
    #[inline]
    pub fn len(&self) -> i64 {
        self.count
    }

    /// Returns true if no row was appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the storage status.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns true while rows are held in memory.
    #[inline]
    pub fn is_in_memory(&self) -> bool {
        self.status == Status::InMemory
    }

    /// Bytes accounted against the budget.
    #[inline]
    pub fn memory_used(&self) -> usize {
        self.mem_used
    }

    /// First row still held in memory.
    #[inline]
    pub fn first_retained(&self) -> i64 {
        self.base
    }

    /// Returns the active cursor.
    #[inline]
    pub fn active_cursor(&self) -> CursorId {
        self.active
    }

    /// Number of allocated cursors.
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Position of the row the cursor's next forward fetch returns.
    pub fn position(&self, cursor: CursorId) -> Result<i64> {
        Ok(self.cursor(cursor)?.pos)
    }

    /// Mark of the cursor.
    pub fn mark(&self, cursor: CursorId) -> Result<i64> {
        Ok(self.cursor(cursor)?.mark)
    }

    /// Capabilities of the cursor.
    pub fn flags(&self, cursor: CursorId) -> Result<CursorFlags> {
        Ok(self.cursor(cursor)?.flags)
    }

    /// Returns true if the cursor's last forward fetch ran off the end.
    pub fn at_eof(&self, cursor: CursorId) -> Result<bool> {
        Ok(self.cursor(cursor)?.eof)
    }

    /// Union of every cursor's capabilities.
    pub fn committed_flags(&self) -> CursorFlags {
        self.cursors
            .iter()
            .fold(CursorFlags::NONE, |acc, c| acc | c.flags)
    }

    /// Replaces cursor 0's capabilities. Only allowed before the first append.
    pub fn set_default_flags(&mut self, flags: CursorFlags) -> Result<()> {
        if self.count > 0 {
            return Err(StoreError::CapabilityRaised {
                requested: flags,
                committed: self.committed_flags(),
            });
        }
        self.cursors[0].flags = flags;
        Ok(())
    }

    /// Allocates a cursor positioned where cursor 0 is.
    ///
    /// Once rows exist, the new cursor may not need capabilities that no existing cursor
    /// has: trimming and record framing already depend on them.
    pub fn allocate_cursor(&mut self, flags: CursorFlags) -> Result<CursorId> {
        let committed = self.committed_flags();
        if self.count > 0 && !committed.contains(flags) {
            return Err(StoreError::CapabilityRaised {
                requested: flags,
                committed,
            });
        }
        let mut cursor = self.cursors[0].clone();
        if self.status == Status::ReadFile && self.active == 0 {
            cursor.offset = self.spill_file()?.tell();
        }
        cursor.flags = flags;
        cursor.mark = self.base;
        self.cursors.push(cursor);
        Ok(self.cursors.len() - 1)
    }

    /// Makes `cursor` the active one.
    pub fn select(&mut self, cursor: CursorId) -> Result<()> {
        self.cursor(cursor)?;
        if cursor == self.active {
            return Ok(());
        }
        if self.status == Status::ReadFile {
            let file = self.file.as_mut().ok_or_else(missing_file)?;
            self.cursors[self.active].offset = file.tell();
            file.seek(self.cursors[cursor].offset)?;
        }
        self.active = cursor;
        Ok(())
    }

    /// Appends a row. Cursors at the end now see it on their next forward fetch.
    pub fn append(&mut self, row: Row) -> Result<()> {
        match self.status {
            Status::InMemory => self.append_memory(row),
            Status::WriteFile | Status::ReadFile => self.append_file(&row),
        }
    }

    fn append_memory(&mut self, row: Row) -> Result<()> {
        if self.memory.len() + 1 >= self.slots {
            self.grow_slots();
        }
        self.mem_used += row.estimated_size();
        self.memory.push_back(Rc::new(row));
        self.count += 1;
        for cursor in &mut self.cursors {
            cursor.eof = false;
        }
        if self.memory.len() < self.slots && self.mem_used <= self.config.work_mem {
            return Ok(());
        }
        self.spill()
    }

    /// Doubles the slot reservation if the budget allows it.
    fn grow_slots(&mut self) {
        let extra = self.slots * SLOT_SIZE;
        if self.mem_used + extra > self.config.work_mem {
            return;
        }
        self.memory.reserve(self.slots);
        self.slots *= 2;
        self.mem_used += extra;
    }

    fn append_file(&mut self, row: &Row) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(missing_file)?;
        if self.status == Status::ReadFile {
            self.cursors[self.active].offset = file.tell();
        }
        let tail = file.len();
        for cursor in &mut self.cursors {
            if cursor.eof {
                cursor.eof = false;
                cursor.offset = tail;
            }
        }
        let body = self.encoder.encode(row);
        write_record(file, body, self.backward_records)?;
        self.count += 1;
        self.status = Status::WriteFile;
        Ok(())
    }

    /// Moves every retained row to a new spill file.
    fn spill(&mut self) -> Result<()> {
        let mut file = SpillFile::create(self.config.temp_dir.as_deref())?;
        self.backward_records = self.committed_flags().contains(CursorFlags::BACKWARD);
        self.file_base = self.base;

        let rows = self.memory.len();
        for (i, row) in self.memory.iter().enumerate() {
            let index = self.base + i as i64;
            let offset = file.len();
            for cursor in self.cursors.iter_mut().filter(|c| c.pos == index) {
                cursor.offset = offset;
            }
            let body = self.encoder.encode(row);
            write_record(&mut file, body, self.backward_records)?;
        }
        let tail = file.len();
        for cursor in self.cursors.iter_mut().filter(|c| c.pos >= self.count) {
            cursor.offset = tail;
        }

        log::debug!(
            "row store spilled {} rows ({} bytes in memory) to {} bytes on disk",
            rows,
            self.mem_used,
            tail
        );

        self.memory = VecDeque::new();
        self.mem_used = 0;
        self.file = Some(file);
        self.status = Status::WriteFile;
        Ok(())
    }

    /// Fetches the next (or previous) row through the active cursor.
    ///
    /// Returns `None` at either end. Running off the end forward sets the cursor's eof flag;
    /// a later append clears it.
    pub fn fetch(&mut self, forward: bool) -> Result<Option<Rc<Row>>> {
        match self.step(forward)? {
            None => Ok(None),
            Some(Step::Memory(row)) => Ok(Some(row)),
            Some(Step::Spilled) => Ok(Some(Rc::new(decode_row(&self.read_buf)?))),
        }
    }

    /// Moves the active cursor by one row without materializing it.
    pub fn advance(&mut self, forward: bool) -> Result<bool> {
        Ok(self.step(forward)?.is_some())
    }

    fn step(&mut self, forward: bool) -> Result<Option<Step>> {
        let id = self.active;
        let cursor = &self.cursors[id];
        if !forward {
            if !cursor.flags.contains(CursorFlags::BACKWARD) {
                return Err(StoreError::BackwardNotAllowed { cursor: id });
            }
            if cursor.pos == 0 {
                return Ok(None);
            }
            let target = cursor.pos - 1;
            if target < cursor.mark {
                return Err(StoreError::FetchBeforeMark {
                    cursor: id,
                    position: target,
                    mark: cursor.mark,
                });
            }
            let first = if self.is_in_memory() { self.base } else { self.file_base };
            if target < first {
                return Err(StoreError::RowTrimmed {
                    position: target,
                    first_retained: first,
                });
            }
        } else if cursor.pos >= self.count {
            self.cursors[id].eof = true;
            return Ok(None);
        }

        match self.status {
            Status::InMemory => Ok(Some(Step::Memory(self.step_memory(forward)?))),
            Status::WriteFile | Status::ReadFile => {
                self.step_file(forward)?;
                Ok(Some(Step::Spilled))
            }
        }
    }

    fn step_memory(&mut self, forward: bool) -> Result<Rc<Row>> {
        let cursor = &mut self.cursors[self.active];
        let index = if forward { cursor.pos } else { cursor.pos - 1 };
        if index < self.base {
            return Err(StoreError::RowTrimmed {
                position: index,
                first_retained: self.base,
            });
        }
        let row = self
            .memory
            .get((index - self.base) as usize)
            .cloned()
            .ok_or_else(|| StoreError::RowTrimmed {
                position: index,
                first_retained: self.base,
            })?;
        cursor.pos = if forward { index + 1 } else { index };
        Ok(row)
    }

    fn step_file(&mut self, forward: bool) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(missing_file)?;
        let cursor = &mut self.cursors[self.active];
        if self.status == Status::WriteFile {
            file.seek(cursor.offset)?;
            self.status = Status::ReadFile;
        }

        if forward {
            let start = file.tell();
            let len = u64::from(file.read_u32()?);
            if len < LEN_WORD {
                return Err(StoreError::corrupt(start, "length word shorter than itself"));
            }
            self.read_buf.resize((len - LEN_WORD) as usize, 0);
            file.read_exact(&mut self.read_buf)?;
            if self.backward_records && u64::from(file.read_u32()?) != len {
                return Err(StoreError::corrupt(start, "trailing length mismatch"));
            }
            cursor.pos += 1;
        } else {
            let end = file.tell();
            if end < LEN_WORD {
                return Err(StoreError::corrupt(end, "no record before offset"));
            }
            file.seek(end - LEN_WORD)?;
            let len = u64::from(file.read_u32()?);
            if len < LEN_WORD {
                return Err(StoreError::corrupt(end - LEN_WORD, "length word shorter than itself"));
            }
            let start = end
                .checked_sub(len + LEN_WORD)
                .ok_or_else(|| StoreError::corrupt(end, "trailing length overruns file start"))?;
            file.seek(start)?;
            if u64::from(file.read_u32()?) != len {
                return Err(StoreError::corrupt(start, "leading length mismatch"));
            }
            self.read_buf.resize((len - LEN_WORD) as usize, 0);
            file.read_exact(&mut self.read_buf)?;
            file.seek(start)?;
            cursor.pos -= 1;
        }
        cursor.eof = false;
        Ok(())
    }

    /// Rewinds the active cursor to row 0.
    pub fn rescan(&mut self) -> Result<()> {
        let id = self.active;
        if !self.cursors[id].flags.contains(CursorFlags::REWIND) {
            return Err(StoreError::RewindNotAllowed { cursor: id });
        }
        let first = if self.is_in_memory() { self.base } else { self.file_base };
        if first > 0 {
            return Err(StoreError::RowTrimmed {
                position: 0,
                first_retained: first,
            });
        }
        let cursor = &mut self.cursors[id];
        cursor.pos = 0;
        cursor.eof = false;
        cursor.offset = 0;
        if self.status == Status::ReadFile {
            self.spill_file_mut()?.seek(0)?;
        }
        Ok(())
    }

    /// Moves `dst` to where `src` is. Capabilities and mark of `dst` are kept.
    pub fn copy_position(&mut self, src: CursorId, dst: CursorId) -> Result<()> {
        self.cursor(src)?;
        self.cursor(dst)?;
        if src == dst {
            return Ok(());
        }
        let mut offset = self.cursors[src].offset;
        if self.status == Status::ReadFile {
            let file = self.file.as_mut().ok_or_else(missing_file)?;
            if src == self.active {
                offset = file.tell();
            } else if dst == self.active {
                file.seek(offset)?;
            }
        }
        let (pos, eof) = (self.cursors[src].pos, self.cursors[src].eof);
        let target = &mut self.cursors[dst];
        target.pos = pos;
        target.eof = eof;
        target.offset = offset;
        Ok(())
    }

    /// Promises that `cursor` never goes below `pos` again, and moves it there if it is
    /// still behind.
    pub fn set_mark(&mut self, cursor: CursorId, pos: i64) -> Result<()> {
        let current = self.cursor(cursor)?.mark;
        if pos < current {
            return Err(StoreError::MarkMovedBackward {
                cursor,
                from: current,
                to: pos,
            });
        }
        self.cursors[cursor].mark = pos;
        if self.cursors[cursor].pos >= pos {
            return Ok(());
        }

        if self.is_in_memory() {
            let c = &mut self.cursors[cursor];
            c.pos = pos.min(self.count);
            c.eof = false;
            return Ok(());
        }
        let previous = self.active;
        self.select(cursor)?;
        while self.cursors[cursor].pos < pos {
            if !self.advance(true)? {
                break;
            }
        }
        self.select(previous)
    }

    /// Discards in-memory rows no cursor can reach anymore.
    ///
    /// Keeps one row below the lowest floor, since the caller may still hold the row a
    /// backward fetch just returned. No-op once spilled or while any cursor has `REWIND`.
    pub fn trim(&mut self) {
        if !self.is_in_memory() {
            return;
        }
        if self
            .cursors
            .iter()
            .any(|c| c.flags.contains(CursorFlags::REWIND))
        {
            return;
        }
        let oldest = self
            .cursors
            .iter()
            .map(Cursor::floor)
            .min()
            .unwrap_or(self.count);
        let remove = (oldest - 1 - self.base).min(self.memory.len() as i64);
        if remove <= 0 {
            return;
        }
        for row in self.memory.drain(..remove as usize) {
            self.mem_used = self.mem_used.saturating_sub(row.estimated_size());
        }
        self.base += remove;
    }

    fn cursor(&self, cursor: CursorId) -> Result<&Cursor> {
        self.cursors
            .get(cursor)
            .ok_or(StoreError::UnknownCursor { cursor })
    }

    fn spill_file(&self) -> Result<&SpillFile> {
        self.file.as_ref().ok_or_else(missing_file)
    }

    fn spill_file_mut(&mut self) -> Result<&mut SpillFile> {
        self.file.as_mut().ok_or_else(missing_file)
    }
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for RowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStore")
            .field("status", &self.status)
            .field("count", &self.count)
            .field("base", &self.base)
            .field("mem_used", &self.mem_used)
            .field("cursors", &self.cursors)
            .field("active", &self.active)
            .finish()
    }
}

fn write_record(file: &mut SpillFile, body: &[u8], trailing: bool) -> Result<()> {
    let len = u32::try_from(body.len() + LEN_WORD as usize)
        .map_err(|_| StoreError::corrupt(file.len(), "row too large for a spill record"))?;
    let word = len.to_le_bytes();
    file.append(&word)?;
    file.append(body)?;
    if trailing {
        file.append(&word)?;
    }
    Ok(())
}

fn missing_file() -> StoreError {
    StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "row store is spilled but has no spill file",
    ))
}
