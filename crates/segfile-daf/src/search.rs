//! Explicit search cursors over the DAF directory.
//!
//! Each `DafSearch` carries its own position, so any number of searches
//! can run on one handle, interleaved in any order, without disturbing each
//! other.

use serde::Serialize;

use segfile_record::{ErrorKind, KernelError, Result, SegmentDirectory};

use crate::summary::Summary;
use crate::Daf;

/// Location of one segment in the directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DafSegment {
    /// Summary record holding the summary
    pub record: u32,
    /// Index of the summary within its record
    pub slot: usize,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq)]
enum Position {
    BeforeFirst,
    At(DafSegment),
    AfterLast,
}

/// An independent traversal cursor
#[derive(Debug, Clone)]
pub struct DafSearch {
    position: Position,
}

impl DafSearch {
    pub(crate) fn forward() -> Self {
        Self {
            position: Position::BeforeFirst,
        }
    }

    pub(crate) fn backward() -> Self {
        Self {
            position: Position::AfterLast,
        }
    }

    /// Advance to the next segment. Returns `false` at the end of the list.
    pub fn find_next(&mut self, daf: &Daf) -> Result<bool> {
        let step = match &self.position {
            Position::BeforeFirst => daf.first_segment()?,
            Position::At(segment) => daf.next_segment(segment)?,
            Position::AfterLast => None,
        };
        Ok(self.settle(step, Position::AfterLast))
    }

    /// Step back to the previous segment. Returns `false` at the start.
    pub fn find_previous(&mut self, daf: &Daf) -> Result<bool> {
        let step = match &self.position {
            Position::AfterLast => daf.last_segment()?,
            Position::At(segment) => daf.previous_segment(segment)?,
            Position::BeforeFirst => None,
        };
        Ok(self.settle(step, Position::BeforeFirst))
    }

    fn settle(&mut self, step: Option<DafSegment>, exhausted: Position) -> bool {
        match step {
            Some(segment) => {
                self.position = Position::At(segment);
                true
            }
            None => {
                self.position = exhausted;
                false
            }
        }
    }

    /// The segment found by the last successful `find_next`/`find_previous`
    pub fn segment(&self) -> Result<&DafSegment> {
        match &self.position {
            Position::At(segment) => Ok(segment),
            _ => Err(KernelError::new(
                ErrorKind::NoCurrentSegment,
                "no segment has been found by this search",
            )),
        }
    }

    /// Summary of the current segment
    pub fn descriptor(&self) -> Result<&Summary> {
        Ok(&self.segment()?.summary)
    }

    /// Name of the current segment
    pub fn name(&self, daf: &Daf) -> Result<String> {
        daf.segment_name(self.segment()?)
    }
}
