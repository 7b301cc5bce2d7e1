//! Append-only scratch file backing a spilled row store.
//!
//! The file is created unlinked (via `tempfile`) and disappears when dropped. Writes only
//! ever go to the tail, so bytes already written never change: a cached read block can be
//! reused for as long as it is useful, and reads may interleave with appends freely.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Pending appended bytes are written out once they reach this size.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Size of the read cache block.
const READ_BLOCK_SIZE: usize = 8 * 1024;

/// Buffered, seekable, append-only spill file.
#[derive(Debug)]
pub struct SpillFile {
    file: File,
    /// Bytes written to the OS file.
    flushed: u64,
    /// Appended bytes not yet written, logically located at `flushed..`.
    pending: Vec<u8>,
    /// Logical handle position.
    pos: u64,
    cache: Vec<u8>,
    cache_start: u64,
}

impl SpillFile {
    /// Creates a new spill file in `dir`, or in the platform temp directory.
    pub fn create(dir: Option<&Path>) -> io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(Self {
            file,
            flushed: 0,
            pending: Vec::with_capacity(WRITE_BUFFER_SIZE),
            pos: 0,
            cache: Vec::new(),
            cache_start: 0,
        })
    }

    /// Logical length, pending bytes included.
    #[inline]
    pub fn len(&self) -> u64 {
        self.flushed + self.pending.len() as u64
    }

    /// Returns true if nothing was ever appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current handle position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Moves the handle. Positions past the end are rejected.
    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {} past end of spill file ({})", pos, self.len()),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    /// Appends bytes at the tail and leaves the handle there.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(data);
        if self.pending.len() >= WRITE_BUFFER_SIZE {
            self.flush()?;
        }
        self.pos = self.len();
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes at the handle and advances it.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.pos;
        let end = start + buf.len() as u64;
        if end > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at {} past end of spill file", buf.len(), start),
            ));
        }
        if end > self.flushed {
            self.flush()?;
        }
        let cache_end = self.cache_start + self.cache.len() as u64;
        if start < self.cache_start || end > cache_end {
            self.fill_cache(start, end)?;
        }
        let from = (start - self.cache_start) as usize;
        buf.copy_from_slice(&self.cache[from..from + buf.len()]);
        self.pos = end;
        Ok(())
    }

    /// Reads a little-endian u32 at the handle.
    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut word = [0u8; 4];
        self.read_exact(&mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Writes pending bytes to the OS file.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.flushed))?;
        self.file.write_all(&self.pending)?;
        self.flushed += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    /// Loads a block covering `start..end`, centred so that both forward and backward
    /// scans hit the cache on the next read.
    fn fill_cache(&mut self, start: u64, end: u64) -> io::Result<()> {
        let half = (READ_BLOCK_SIZE / 2) as u64;
        let block_start = start.saturating_sub(half);
        let wanted = (end - block_start).max(READ_BLOCK_SIZE as u64);
        let size = wanted.min(self.flushed - block_start) as usize;
        self.cache.resize(size, 0);
        self.file.seek(SeekFrom::Start(block_start))?;
        self.file.read_exact(&mut self.cache)?;
        self.cache_start = block_start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_read() {
        let mut file = SpillFile::create(None).unwrap();
        assert!(file.is_empty());
        file.append(b"hello").unwrap();
        file.append(b"world").unwrap();
        assert_eq!(file.len(), 10);
        assert_eq!(file.tell(), 10);

        file.seek(5).unwrap();
        let mut buf = [0u8; 5];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(file.tell(), 10);
    }

    #[test]
    fn test_interleaved_reads_and_appends() {
        let mut file = SpillFile::create(None).unwrap();
        file.append(&1u32.to_le_bytes()).unwrap();
        file.seek(0).unwrap();
        assert_eq!(file.read_u32().unwrap(), 1);

        // The cached block must not hide bytes appended after it was loaded
        file.append(&2u32.to_le_bytes()).unwrap();
        file.seek(4).unwrap();
        assert_eq!(file.read_u32().unwrap(), 2);
        file.seek(0).unwrap();
        assert_eq!(file.read_u32().unwrap(), 1);
    }

    #[test]
    fn test_large_file_crosses_buffers() {
        let mut file = SpillFile::create(None).unwrap();
        for i in 0..50_000u32 {
            file.append(&i.to_le_bytes()).unwrap();
        }
        for i in [0u32, 4_095, 20_000, 49_999] {
            file.seek(u64::from(i) * 4).unwrap();
            assert_eq!(file.read_u32().unwrap(), i);
        }
        // Walk backward across a block boundary
        for i in (10_000..12_100u32).rev() {
            file.seek(u64::from(i) * 4).unwrap();
            assert_eq!(file.read_u32().unwrap(), i);
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let mut file = SpillFile::create(None).unwrap();
        file.append(b"abc").unwrap();
        assert!(file.seek(4).is_err());
        file.seek(2).unwrap();
        let mut buf = [0u8; 2];
        let err = file.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_create_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(Some(dir.path())).unwrap();
        file.append(b"x").unwrap();
        file.flush().unwrap();
        assert_eq!(file.len(), 1);
    }
}
