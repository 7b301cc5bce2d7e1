//! Window frame specification.
//!
//! A frame is described by a mode and two bounds. Offsets are plain values; they are checked
//! for shape when the executor is built and resolved to row counts once, on the first output
//! row, after which they stay fixed for every partition.

use crate::error::{Result, WindowError};
use winagg_core::Value;

/// How frame offsets are measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameMode {
    /// Physical row counts.
    Rows,
    /// Order-key values; peers of the current row share frame edges.
    Range,
}

/// One edge of a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(Value),
    CurrentRow,
    Following(Value),
    UnboundedFollowing,
}

impl FrameBound {
    /// `n PRECEDING`.
    pub fn preceding(n: i64) -> Self {
        FrameBound::Preceding(Value::Int64(n))
    }

    /// `n FOLLOWING`.
    pub fn following(n: i64) -> Self {
        FrameBound::Following(Value::Int64(n))
    }

    fn has_offset(&self) -> bool {
        matches!(self, FrameBound::Preceding(_) | FrameBound::Following(_))
    }

    /// Ordering of bound kinds, used to reject frames that end before they start.
    fn rank(&self) -> u8 {
        match self {
            FrameBound::UnboundedPreceding => 0,
            FrameBound::Preceding(_) => 1,
            FrameBound::CurrentRow => 2,
            FrameBound::Following(_) => 3,
            FrameBound::UnboundedFollowing => 4,
        }
    }
}

/// A complete frame clause.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSpec {
    pub mode: FrameMode,
    pub start: FrameBound,
    pub end: FrameBound,
}

impl Default for FrameSpec {
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
    fn default() -> Self {
        Self::range(FrameBound::UnboundedPreceding, FrameBound::CurrentRow)
    }
}

impl FrameSpec {
    /// `ROWS BETWEEN start AND end`.
    pub fn rows(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Rows,
            start,
            end,
        }
    }

    /// `RANGE BETWEEN start AND end`.
    pub fn range(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Range,
            start,
            end,
        }
    }

    /// The whole partition for every row.
    pub fn whole_partition() -> Self {
        Self::range(FrameBound::UnboundedPreceding, FrameBound::UnboundedFollowing)
    }

    /// Rejects frame shapes that can never be evaluated.
    pub fn validate(&self) -> Result<()> {
        if self.start == FrameBound::UnboundedFollowing {
            return Err(WindowError::configuration(
                "frame start cannot be UNBOUNDED FOLLOWING",
            ));
        }
        if self.end == FrameBound::UnboundedPreceding {
            return Err(WindowError::configuration(
                "frame end cannot be UNBOUNDED PRECEDING",
            ));
        }
        if self.end.rank() < self.start.rank() {
            return Err(WindowError::configuration(format!(
                "frame starting from {} cannot end with {}",
                describe(&self.start),
                describe(&self.end)
            )));
        }
        if self.mode == FrameMode::Range && (self.start.has_offset() || self.end.has_offset()) {
            return Err(WindowError::configuration(
                "RANGE frames with offset PRECEDING/FOLLOWING are not supported",
            ));
        }
        Ok(())
    }

    /// Returns true if the frame head can move within a partition.
    pub fn head_is_movable(&self) -> bool {
        self.start != FrameBound::UnboundedPreceding
    }

    /// Evaluates the offsets.
    pub(crate) fn resolve(&self) -> Result<ResolvedFrame> {
        self.validate()?;
        Ok(ResolvedFrame {
            mode: self.mode,
            start: resolve_bound(&self.start, "starting")?,
            end: resolve_bound(&self.end, "ending")?,
        })
    }
}

fn describe(bound: &FrameBound) -> &'static str {
    match bound {
        FrameBound::UnboundedPreceding => "UNBOUNDED PRECEDING",
        FrameBound::Preceding(_) => "PRECEDING",
        FrameBound::CurrentRow => "CURRENT ROW",
        FrameBound::Following(_) => "FOLLOWING",
        FrameBound::UnboundedFollowing => "UNBOUNDED FOLLOWING",
    }
}

fn resolve_bound(bound: &FrameBound, which: &str) -> Result<Bound> {
    let (value, sign) = match bound {
        FrameBound::UnboundedPreceding => return Ok(Bound::UnboundedPreceding),
        FrameBound::CurrentRow => return Ok(Bound::CurrentRow),
        FrameBound::UnboundedFollowing => return Ok(Bound::UnboundedFollowing),
        FrameBound::Preceding(v) => (v, -1),
        FrameBound::Following(v) => (v, 1),
    };
    if value.is_null() {
        return Err(WindowError::configuration(format!(
            "frame {} offset must not be null",
            which
        )));
    }
    let n = value.to_i64().ok_or_else(|| {
        WindowError::configuration(format!(
            "frame {} offset must be an integer, got {:?}",
            which, value
        ))
    })?;
    if n < 0 {
        return Err(WindowError::configuration(format!(
            "frame {} offset must not be negative",
            which
        )));
    }
    Ok(Bound::Offset(sign * n))
}

/// A frame bound with its offset evaluated. Offsets are signed: negative means preceding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bound {
    UnboundedPreceding,
    Offset(i64),
    CurrentRow,
    UnboundedFollowing,
}

/// A frame ready for evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedFrame {
    pub(crate) mode: FrameMode,
    pub(crate) start: Bound,
    pub(crate) end: Bound,
}

impl ResolvedFrame {
    /// The frame end cannot differ between the current row and a previous row whose frame
    /// contained it, provided the head did not move either.
    pub(crate) fn end_follows_peers(&self) -> bool {
        matches!(self.end, Bound::CurrentRow | Bound::UnboundedFollowing)
    }

    pub(crate) fn head_is_movable(&self) -> bool {
        self.start != Bound::UnboundedPreceding
    }
}

/// Frame edges of the current row. `tail` is exclusive.
#[derive(Debug, Default)]
pub(crate) struct FrameState {
    pub(crate) head: i64,
    pub(crate) head_valid: bool,
    pub(crate) tail: i64,
    pub(crate) tail_valid: bool,
}

impl FrameState {
    /// Forgets both edges; called when the current row advances.
    pub(crate) fn invalidate(&mut self) {
        self.head_valid = false;
        self.tail_valid = false;
    }
}
