//! Frame head and tail positions of the current row.
//!
//! Both edges are computed lazily and cached until the current row advances. The tail is
//! exclusive: the frame is `head..tail`. Neither edge moves backward within a partition,
//! which lets the peer scans of RANGE frames run forward through their own cursors.

use super::partition::Partition;
use crate::error::{Result, WindowError};
use crate::frame::{Bound, FrameMode};
use std::rc::Rc;

impl Partition {
    /// Brings `frame.head` up to date and returns it.
    pub(crate) fn update_frame_head(&mut self) -> Result<i64> {
        if self.frame.head_valid {
            return Ok(self.frame.head);
        }
        let frame = self.frame_def()?;
        let cur = self.current_pos;
        let head = match frame.start {
            Bound::UnboundedPreceding => 0,
            Bound::CurrentRow if frame.mode == FrameMode::Rows => cur,
            Bound::CurrentRow if !self.has_order_keys() => 0,
            Bound::CurrentRow => self.scan_peer_head()?,
            Bound::Offset(offset) => {
                if frame.mode == FrameMode::Range {
                    return Err(WindowError::configuration(
                        "RANGE frames with offset PRECEDING/FOLLOWING are not supported",
                    ));
                }
                let head = cur.saturating_add(offset);
                if head < 0 {
                    0
                } else if head > cur {
                    self.spool(Some(head - 1))?;
                    head.min(self.spooled)
                } else {
                    head
                }
            }
            Bound::UnboundedFollowing => {
                return Err(WindowError::configuration(
                    "frame start cannot be UNBOUNDED FOLLOWING",
                ))
            }
        };
        self.frame.head = head;
        self.frame.head_valid = true;
        Ok(head)
    }

    /// Brings `frame.tail` up to date and returns it.
    pub(crate) fn update_frame_tail(&mut self) -> Result<i64> {
        if self.frame.tail_valid {
            return Ok(self.frame.tail);
        }
        let frame = self.frame_def()?;
        let cur = self.current_pos;
        let tail = match frame.end {
            Bound::UnboundedFollowing => self.row_count()?,
            Bound::CurrentRow if frame.mode == FrameMode::Rows => cur + 1,
            Bound::CurrentRow if !self.has_order_keys() => self.row_count()?,
            Bound::CurrentRow => self.scan_peer_tail()?,
            Bound::Offset(offset) => {
                if frame.mode == FrameMode::Range {
                    return Err(WindowError::configuration(
                        "RANGE frames with offset PRECEDING/FOLLOWING are not supported",
                    ));
                }
                let tail = cur.saturating_add(offset).saturating_add(1);
                if tail < 0 {
                    0
                } else if tail > cur + 1 {
                    self.spool(Some(tail - 1))?;
                    tail.min(self.spooled)
                } else {
                    tail
                }
            }
            Bound::UnboundedPreceding => {
                return Err(WindowError::configuration(
                    "frame end cannot be UNBOUNDED PRECEDING",
                ))
            }
        };
        self.frame.tail = tail;
        self.frame.tail_valid = true;
        Ok(tail)
    }

    /// Returns true if row `pos` lies in the current row's frame.
    pub(crate) fn frame_contains(&mut self, pos: i64) -> Result<bool> {
        let head = self.update_frame_head()?;
        if pos < head {
            return Ok(false);
        }
        let tail = self.update_frame_tail()?;
        Ok(pos < tail)
    }

    /// First peer of the current row, scanning forward from the previous head.
    fn scan_peer_head(&mut self) -> Result<i64> {
        let cursor = self
            .head_cursor
            .ok_or_else(|| WindowError::invariant("frame head cursor not allocated"))?;
        let current = Rc::clone(self.current_row()?);
        let mut head = self.frame.head;
        loop {
            let row = match self.head_row.clone() {
                Some(row) => row,
                None => {
                    let row = self.fetch_at(cursor, head)?.ok_or_else(|| {
                        WindowError::invariant("frame head scan ran past the current row")
                    })?;
                    self.head_row = Some(Rc::clone(&row));
                    row
                }
            };
            if self.are_peers(&row, &current) {
                return Ok(head);
            }
            head += 1;
            self.head_row = None;
        }
    }

    /// One past the last peer of the current row, scanning forward from the previous tail.
    fn scan_peer_tail(&mut self) -> Result<i64> {
        let cursor = self
            .tail_cursor
            .ok_or_else(|| WindowError::invariant("frame tail cursor not allocated"))?;
        let current = Rc::clone(self.current_row()?);
        let cur = self.current_pos;
        let mut tail = self.frame.tail;
        loop {
            let row = match self.tail_row.clone() {
                Some(row) => row,
                None => match self.fetch_at(cursor, tail)? {
                    Some(row) => {
                        self.tail_row = Some(Rc::clone(&row));
                        row
                    }
                    None => return Ok(tail),
                },
            };
            if tail > cur && !self.are_peers(&row, &current) {
                return Ok(tail);
            }
            tail += 1;
            self.tail_row = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ColumnKeys;
    use crate::frame::{FrameBound, FrameSpec};
    use crate::source::VecSource;
    use winagg_core::{Row, Value};
    use winagg_storage::StoreConfig;

    fn partition(values: &[i64], frame: FrameSpec, ordered: bool) -> Partition {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Row::new(i as u64, vec![Value::Int64(v)]))
            .collect();
        let order: Option<Box<dyn crate::compare::KeyComparator>> = if ordered {
            Some(Box::new(ColumnKeys::new([0])))
        } else {
            None
        };
        let mut part = Partition::new(
            Box::new(VecSource::new(rows)),
            None,
            order,
            StoreConfig::default(),
        );
        part.set_frame(frame.resolve().unwrap());
        assert!(part.begin().unwrap());
        part.push_first_row().unwrap();
        part
    }

    /// Walks every row and collects `(head, tail)`.
    fn frames(part: &mut Partition) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        loop {
            part.spool(Some(part.current_pos)).unwrap();
            if part.is_finished() {
                break;
            }
            part.fetch_current().unwrap();
            let head = part.update_frame_head().unwrap();
            let tail = part.update_frame_tail().unwrap();
            out.push((head, tail));
            part.current_pos += 1;
            part.frame.invalidate();
        }
        out
    }

    #[test]
    fn test_rows_offsets() {
        let frame = FrameSpec::rows(FrameBound::preceding(1), FrameBound::CurrentRow);
        let mut part = partition(&[10, 20, 30, 40], frame, false);
        assert_eq!(frames(&mut part), vec![(0, 1), (0, 2), (1, 3), (2, 4)]);
    }

    #[test]
    fn test_rows_offsets_clamp_to_partition() {
        let frame = FrameSpec::rows(FrameBound::following(2), FrameBound::following(5));
        let mut part = partition(&[1, 2, 3, 4], frame, false);
        assert_eq!(frames(&mut part), vec![(2, 4), (3, 4), (4, 4), (4, 4)]);

        let frame = FrameSpec::rows(FrameBound::preceding(3), FrameBound::preceding(2));
        let mut part = partition(&[1, 2, 3, 4], frame, false);
        assert_eq!(frames(&mut part), vec![(0, 0), (0, 0), (0, 1), (0, 2)]);
    }

    #[test]
    fn test_range_peers() {
        let frame = FrameSpec::range(FrameBound::CurrentRow, FrameBound::CurrentRow);
        let mut part = partition(&[1, 1, 2, 2, 3], frame, true);
        assert_eq!(
            frames(&mut part),
            vec![(0, 2), (0, 2), (2, 4), (2, 4), (4, 5)]
        );
    }

    #[test]
    fn test_range_without_order_keys_is_whole_partition() {
        let frame = FrameSpec::range(FrameBound::CurrentRow, FrameBound::CurrentRow);
        let mut part = partition(&[5, 1, 9], frame, false);
        assert_eq!(frames(&mut part), vec![(0, 3), (0, 3), (0, 3)]);

        let mut part = partition(&[5, 1, 9], FrameSpec::whole_partition(), true);
        assert_eq!(frames(&mut part), vec![(0, 3), (0, 3), (0, 3)]);
    }

    #[test]
    fn test_default_frame_ends_at_last_peer() {
        let mut part = partition(&[1, 2, 2, 3], FrameSpec::default(), true);
        assert_eq!(frames(&mut part), vec![(0, 1), (0, 3), (0, 3), (0, 4)]);
    }

    #[test]
    fn test_frame_contains() {
        let frame = FrameSpec::rows(FrameBound::preceding(1), FrameBound::following(1));
        let mut part = partition(&[1, 2, 3, 4], frame, false);
        part.spool(Some(1)).unwrap();
        part.fetch_current().unwrap();
        part.current_pos = 1;
        part.frame.invalidate();
        assert!(part.frame_contains(0).unwrap());
        assert!(part.frame_contains(2).unwrap());
        assert!(!part.frame_contains(3).unwrap());
    }
}
