//! DLA: a doubly linked list of segment descriptors in a DAS integer space.
//!
//! Integer addresses 1..=3 hold the format version, the pointer to the
//! first descriptor and the pointer to the last. A pointer `p` names the
//! descriptor stored at integer addresses `p+1..=p+8`:
//!
//! ```text
//! p+1  backward pointer      p+5  double base
//! p+2  forward pointer       p+6  double size
//! p+3  integer base          p+7  character base
//! p+4  integer size          p+8  character size
//! ```
//!
//! Bases precede the first element of each component, so element `i` of
//! the integer component is at `int_base + i` (1-based).

use std::path::Path;

use serde::Serialize;
use tracing::instrument;

use segfile_config::{log_dla_debug, log_dla_warn};
use segfile_record::{
    Access, Architecture, CommentStore, ErrorKind, KernelError, Result, SegmentDirectory,
};

use crate::{Das, DasFileRecord};

/// DLA format version stored at integer address 1
pub const DLA_VERSION: i32 = 1;

/// Null descriptor pointer
pub const NULL_POINTER: i32 = -1;

/// Integers per descriptor
pub const DESCRIPTOR_SIZE: u32 = 8;

const VERSION_ADDRESS: u32 = 1;
const FIRST_ADDRESS: u32 = 2;
const LAST_ADDRESS: u32 = 3;

/// File types that carry a DLA segment list
pub const DLA_KINDS: [&str; 2] = ["DLA", "DSK"];

/// One segment descriptor. The value carries its own position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DlaDescriptor {
    /// Pointer to this descriptor
    pub pointer: i32,
    pub backward: i32,
    pub forward: i32,
    pub int_base: i32,
    pub int_size: i32,
    pub double_base: i32,
    pub double_size: i32,
    pub char_base: i32,
    pub char_size: i32,
}

impl DlaDescriptor {
    fn from_words(pointer: i32, w: &[i32]) -> Self {
        Self {
            pointer,
            backward: w[0],
            forward: w[1],
            int_base: w[2],
            int_size: w[3],
            double_base: w[4],
            double_size: w[5],
            char_base: w[6],
            char_size: w[7],
        }
    }

    fn to_words(self) -> [i32; DESCRIPTOR_SIZE as usize] {
        [
            self.backward,
            self.forward,
            self.int_base,
            self.int_size,
            self.double_base,
            self.double_size,
            self.char_base,
            self.char_size,
        ]
    }

    /// Whether a successor exists. No I/O, no cursor.
    pub fn has_next(&self) -> bool {
        self.forward != NULL_POINTER
    }

    /// Whether a predecessor exists.
    pub fn has_previous(&self) -> bool {
        self.backward != NULL_POINTER
    }
}

/// An open DLA file
#[derive(Debug)]
pub struct Dla {
    das: Das,
    open_segment: Option<i32>,
}

impl Dla {
    /// Create a new DLA file with an empty segment list.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn create<P: AsRef<Path>>(
        path: P,
        internal_name: &str,
        kind: &str,
        comment_records: u32,
    ) -> Result<Self> {
        if !DLA_KINDS.contains(&kind) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("'{}' is not a DLA file type; use DLA or DSK", kind),
            ));
        }
        let mut das = Das::create(path, internal_name, kind, comment_records)?;
        das.append_ints(&[DLA_VERSION, NULL_POINTER, NULL_POINTER])?;
        log_dla_debug!("Created DLA", kind = kind);
        Ok(Self {
            das,
            open_segment: None,
        })
    }

    pub fn open_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_das(Das::open_read(path)?)
    }

    pub fn open_write<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_das(Das::open_write(path)?)
    }

    fn from_das(das: Das) -> Result<Self> {
        das.file_type().expect(Architecture::Das, &DLA_KINDS)?;
        if das.last_addresses()?.ints < LAST_ADDRESS {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("{} has no DLA header", das.path().display()),
            ));
        }
        let version = das.read_ints(VERSION_ADDRESS, VERSION_ADDRESS)?[0];
        if version != DLA_VERSION {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("unsupported DLA format version {}", version),
            ));
        }
        Ok(Self {
            das,
            open_segment: None,
        })
    }

    /// The underlying DAS file, for segment component reads
    pub fn das(&self) -> &Das {
        &self.das
    }

    /// The underlying DAS file, for segment component appends between
    /// [`begin_segment`](Self::begin_segment) and
    /// [`end_segment`](Self::end_segment)
    pub fn das_mut(&mut self) -> &mut Das {
        &mut self.das
    }

    pub fn file_record(&self) -> &DasFileRecord {
        self.das.file_record()
    }

    fn header_pointer(&self, address: u32) -> Result<i32> {
        Ok(self.das.read_ints(address, address)?[0])
    }

    /// Read the descriptor named by `pointer`.
    pub fn descriptor_at(&self, pointer: i32) -> Result<DlaDescriptor> {
        if pointer < LAST_ADDRESS as i32 {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("invalid DLA descriptor pointer {}", pointer),
            ));
        }
        let first = pointer as u32 + 1;
        let words = self.das.read_ints(first, first + DESCRIPTOR_SIZE - 1)?;
        Ok(DlaDescriptor::from_words(pointer, &words))
    }

    /// The first descriptor. Fails with `NoSegments` on an empty file.
    pub fn begin_forward_search(&self) -> Result<DlaDescriptor> {
        self.first_segment()?.ok_or_else(|| self.no_segments())
    }

    /// The last descriptor. Fails with `NoSegments` on an empty file.
    pub fn begin_backward_search(&self) -> Result<DlaDescriptor> {
        self.last_segment()?.ok_or_else(|| self.no_segments())
    }

    fn no_segments(&self) -> KernelError {
        KernelError::new(
            ErrorKind::NoSegments,
            format!("{} contains no segments", self.das.path().display()),
        )
    }

    pub fn has_next(&self, descriptor: &DlaDescriptor) -> bool {
        descriptor.has_next()
    }

    pub fn has_previous(&self, descriptor: &DlaDescriptor) -> bool {
        descriptor.has_previous()
    }

    pub fn get_next(&self, descriptor: &DlaDescriptor) -> Result<DlaDescriptor> {
        self.next_segment(descriptor)?.ok_or_else(|| {
            KernelError::new(
                ErrorKind::NoSuccessor,
                format!("segment at pointer {} is the last", descriptor.pointer),
            )
        })
    }

    pub fn get_previous(&self, descriptor: &DlaDescriptor) -> Result<DlaDescriptor> {
        self.previous_segment(descriptor)?.ok_or_else(|| {
            KernelError::new(
                ErrorKind::NoPredecessor,
                format!("segment at pointer {} is the first", descriptor.pointer),
            )
        })
    }

    /// Number of segments; zero for an empty file.
    pub fn segment_count(&self) -> Result<usize> {
        self.count_entries()
    }

    /// Start a new segment at the end of the list. Components appended to
    /// the DAS spaces until [`end_segment`](Self::end_segment) belong to it.
    pub fn begin_segment(&mut self) -> Result<DlaDescriptor> {
        self.das.check_access(Access::Write)?;
        if let Some(pointer) = self.open_segment {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("segment at pointer {} has not been ended", pointer),
            ));
        }
        let last = self.das.last_addresses()?;
        let previous = self.header_pointer(LAST_ADDRESS)?;
        let pointer = last.ints as i32;
        let descriptor = DlaDescriptor {
            pointer,
            backward: previous,
            forward: NULL_POINTER,
            int_base: pointer + DESCRIPTOR_SIZE as i32,
            int_size: 0,
            double_base: last.doubles as i32,
            double_size: 0,
            char_base: last.chars as i32,
            char_size: 0,
        };
        self.das.append_ints(&descriptor.to_words())?;

        if previous == NULL_POINTER {
            self.das.update_ints(FIRST_ADDRESS, &[pointer])?;
        } else {
            // forward pointer of the old last descriptor
            self.das.update_ints(previous as u32 + 2, &[pointer])?;
        }
        self.das.update_ints(LAST_ADDRESS, &[pointer])?;
        self.open_segment = Some(pointer);
        log_dla_debug!("Began segment", pointer = pointer, previous = previous);
        Ok(descriptor)
    }

    /// Close the open segment, recording the size of each component.
    pub fn end_segment(&mut self) -> Result<DlaDescriptor> {
        self.das.check_access(Access::Write)?;
        let pointer = self.open_segment.ok_or_else(|| {
            KernelError::new(ErrorKind::InvalidValue, "no segment has been begun")
        })?;
        let mut descriptor = self.descriptor_at(pointer)?;
        let last = self.das.last_addresses()?;
        descriptor.int_size = last.ints as i32 - descriptor.int_base;
        descriptor.double_size = last.doubles as i32 - descriptor.double_base;
        descriptor.char_size = last.chars as i32 - descriptor.char_base;

        let base = pointer as u32;
        self.das.update_ints(base + 4, &[descriptor.int_size])?;
        self.das.update_ints(base + 6, &[descriptor.double_size])?;
        self.das.update_ints(base + 8, &[descriptor.char_size])?;
        self.open_segment = None;
        log_dla_debug!(
            "Ended segment",
            pointer = pointer,
            ints = descriptor.int_size,
            doubles = descriptor.double_size
        );
        Ok(descriptor)
    }

    /// Release the file. Later operations fail with `FileClosed`.
    pub fn close(&mut self) -> Result<()> {
        if let Some(pointer) = self.open_segment.take() {
            log_dla_warn!("Closing with an unfinished segment", pointer = pointer);
        }
        self.das.close()
    }
}

impl SegmentDirectory for Dla {
    type Entry = DlaDescriptor;

    fn first_segment(&self) -> Result<Option<DlaDescriptor>> {
        match self.header_pointer(FIRST_ADDRESS)? {
            NULL_POINTER => Ok(None),
            pointer => self.descriptor_at(pointer).map(Some),
        }
    }

    fn last_segment(&self) -> Result<Option<DlaDescriptor>> {
        match self.header_pointer(LAST_ADDRESS)? {
            NULL_POINTER => Ok(None),
            pointer => self.descriptor_at(pointer).map(Some),
        }
    }

    fn next_segment(&self, entry: &DlaDescriptor) -> Result<Option<DlaDescriptor>> {
        if !entry.has_next() {
            return Ok(None);
        }
        self.descriptor_at(entry.forward).map(Some)
    }

    fn previous_segment(&self, entry: &DlaDescriptor) -> Result<Option<DlaDescriptor>> {
        if !entry.has_previous() {
            return Ok(None);
        }
        self.descriptor_at(entry.backward).map(Some)
    }
}

impl CommentStore for Dla {
    fn add_comments(&mut self, lines: &[&str]) -> Result<()> {
        self.das.add_comments(lines)
    }

    fn read_comments(&self, max_line_len: usize) -> Result<Vec<String>> {
        self.das.read_comments(max_line_len)
    }

    fn delete_comments(&mut self) -> Result<()> {
        self.das.delete_comments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_descriptor_layout() {
        let temp = TempDir::new().unwrap();
        let mut dla = Dla::create(temp.path().join("d.dla"), "LAYOUT", "DLA", 0).unwrap();
        let begun = dla.begin_segment().unwrap();
        assert_eq!(begun.pointer, 3);
        assert_eq!(begun.int_base, 11);
        dla.das_mut().append_ints(&[10, 20, 30]).unwrap();
        dla.das_mut().append_doubles(&[1.5, 2.5]).unwrap();
        let ended = dla.end_segment().unwrap();

        assert_eq!(ended.int_size, 3);
        assert_eq!(ended.double_base, 0);
        assert_eq!(ended.double_size, 2);
        assert_eq!(ended.char_size, 0);
        assert_eq!(dla.descriptor_at(3).unwrap(), ended);
        assert_eq!(
            dla.das().read_ints(ended.int_base as u32 + 1, ended.int_base as u32 + 3).unwrap(),
            vec![10, 20, 30]
        );
        assert_eq!(dla.das().read_ints(1, 3).unwrap(), vec![1, 3, 3]);
    }

    #[test]
    fn test_segment_protocol_errors() {
        let temp = TempDir::new().unwrap();
        let mut dla = Dla::create(temp.path().join("p.dla"), "P", "DLA", 0).unwrap();
        assert_eq!(dla.end_segment().unwrap_err().kind(), ErrorKind::InvalidValue);
        dla.begin_segment().unwrap();
        assert_eq!(dla.begin_segment().unwrap_err().kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_create_rejects_other_kinds() {
        let temp = TempDir::new().unwrap();
        let err = Dla::create(temp.path().join("x.dla"), "X", "SPK", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
