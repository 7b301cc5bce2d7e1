//! Read cursors over a row store.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Index of a cursor within its store. Cursor 0 always exists.
pub type CursorId = usize;

/// Capability flags of a cursor.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CursorFlags(u8);

impl CursorFlags {
    /// No capabilities: forward reads only.
    pub const NONE: CursorFlags = CursorFlags(0);
    /// May return to row 0.
    pub const REWIND: CursorFlags = CursorFlags(1);
    /// May step to the previous row.
    pub const BACKWARD: CursorFlags = CursorFlags(1 << 1);

    /// Returns the raw bits.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    #[inline]
    pub fn contains(self, other: CursorFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flag is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CursorFlags {
    type Output = CursorFlags;

    fn bitor(self, rhs: CursorFlags) -> CursorFlags {
        CursorFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CursorFlags {
    fn bitor_assign(&mut self, rhs: CursorFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for CursorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in [(Self::REWIND, "REWIND"), (Self::BACKWARD, "BACKWARD")] {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Per-cursor state.
///
/// `pos` is the absolute index of the row the next forward fetch returns. `offset` is the
/// spill file offset of that row; it is only meaningful once the store has spilled, and for
/// the active cursor it is stale while the store is reading (the file handle holds it).
#[derive(Clone, Debug)]
pub(crate) struct Cursor {
    pub(crate) flags: CursorFlags,
    pub(crate) pos: i64,
    pub(crate) eof: bool,
    pub(crate) offset: u64,
    pub(crate) mark: i64,
}

impl Cursor {
    pub(crate) fn new(flags: CursorFlags) -> Self {
        Self {
            flags,
            pos: 0,
            eof: false,
            offset: 0,
            mark: 0,
        }
    }

    /// Lowest row this cursor may still ask for.
    pub(crate) fn floor(&self) -> i64 {
        if self.flags.contains(CursorFlags::BACKWARD) {
            self.mark.min(self.pos)
        } else {
            self.pos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_union() {
        let flags = CursorFlags::REWIND | CursorFlags::BACKWARD;
        assert!(flags.contains(CursorFlags::REWIND));
        assert!(flags.contains(CursorFlags::BACKWARD));
        assert!(!CursorFlags::REWIND.contains(flags));
        assert!(flags.contains(CursorFlags::NONE));
        assert_eq!(format!("{:?}", flags), "REWIND | BACKWARD");
        assert_eq!(format!("{:?}", CursorFlags::NONE), "NONE");
    }

    #[test]
    fn test_cursor_floor() {
        let mut forward = Cursor::new(CursorFlags::NONE);
        forward.pos = 7;
        forward.mark = 3;
        assert_eq!(forward.floor(), 7);

        let mut backward = Cursor::new(CursorFlags::BACKWARD);
        backward.pos = 7;
        backward.mark = 3;
        assert_eq!(backward.floor(), 3);
    }
}
