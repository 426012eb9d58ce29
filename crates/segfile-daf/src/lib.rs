//! # segfile-daf
//!
//! Double precision Array Files: the directory architecture under SPK, CK
//! and PCK kernels.
//!
//! ## File Layout
//!
//! ```text
//! +------------------+
//! | File record      |  id word, ND, NI, name, FWARD, BWARD, FREE
//! +------------------+
//! | Comment records  |  1000 characters each, NUL-terminated lines, EOT
//! +------------------+
//! | Summary record   |  NEXT, PREV, NSUM, summaries...
//! | Name record      |  one name per summary
//! +------------------+
//! | Data records     |  128 doubles each
//! | ...              |  (more summary/name pairs as the directory grows)
//! +------------------+
//! ```
//!
//! Summary records form a doubly linked list from `FWARD` to `BWARD`.
//! Traversal uses explicit [`DafSearch`] cursor values or the
//! [`SegmentDirectory`] iterator.

mod comments;
pub mod file_record;
pub mod search;
pub mod summary;
mod writer;

use std::path::Path;

use tracing::instrument;

use segfile_config::log_daf_debug;
use segfile_record::{
    Access, AccessMode, Architecture, ByteOrder, ErrorKind, FileType, KernelError, RecordStore,
    Result, SegmentDirectory,
};

pub use file_record::DafFileRecord;
pub use search::{DafSearch, DafSegment};
pub use summary::{DescriptorCodec, Summary, SummaryRecord};

/// Double precision words per data record
pub const DOUBLES_PER_RECORD: u32 = 128;

/// Comment characters stored per comment record
pub const COMMENT_CHARS_PER_RECORD: usize = 1000;

/// An open DAF
#[derive(Debug)]
pub struct Daf {
    store: RecordStore,
    record: DafFileRecord,
}

impl Daf {
    /// Create a new DAF with an empty directory, open for write.
    ///
    /// `comment_chars` characters of comment area are reserved up front;
    /// more can be added later at the cost of shifting the file.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn create<P: AsRef<Path>>(
        path: P,
        internal_name: &str,
        nd: usize,
        ni: usize,
        comment_chars: usize,
        kind: &str,
    ) -> Result<Self> {
        file_record::check_dimensions(nd, ni)?;
        file_record::check_internal_name(internal_name)?;

        let reserved = comment_chars.div_ceil(COMMENT_CHARS_PER_RECORD) as u32;
        let record = DafFileRecord {
            file_type: FileType::new(Architecture::Daf, kind),
            nd,
            ni,
            internal_name: internal_name.to_string(),
            fward: reserved + 2,
            bward: reserved + 2,
            free: (reserved + 3) * DOUBLES_PER_RECORD + 1,
            byte_order: ByteOrder::Little,
        };

        let mut store = RecordStore::create(path)?;
        store.write_record(1, &record.encode())?;
        for n in 2..record.fward {
            store.write_record(n, &[0u8; segfile_record::RECORD_LEN])?;
        }
        store.write_record(
            record.fward,
            &SummaryRecord::empty().encode(ByteOrder::Little),
        )?;
        store.write_record(record.fward + 1, &summary::blank_name_record())?;

        log_daf_debug!("Created DAF", nd = nd, ni = ni, reserved = reserved);
        Ok(Self { store, record })
    }

    /// Open an existing DAF for read access.
    pub fn open_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, AccessMode::Read)
    }

    /// Open an existing DAF for read and write access.
    pub fn open_write<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, AccessMode::Write)
    }

    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let store = RecordStore::open(path, mode)?;
        if store.record_count() == 0 {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("{} is empty", store.path().display()),
            ));
        }
        let head = store.read_record(1)?;
        let record = DafFileRecord::decode(&head).map_err(|e| match e.kind() {
            // an unknown id word means this is not a DAF at all
            ErrorKind::InvalidFormat if !head.starts_with(b"DAF/") && !head.starts_with(b"NAIF/DAF") => {
                KernelError::new(
                    ErrorKind::WrongFileType,
                    format!("{} is not a DAF: {}", store.path().display(), e),
                )
            }
            _ => e,
        })?;
        if record.file_type.architecture != Architecture::Daf {
            return Err(KernelError::new(
                ErrorKind::WrongFileType,
                format!(
                    "{} has architecture {}, not DAF",
                    store.path().display(),
                    record.file_type.architecture.tag()
                ),
            ));
        }
        if mode == AccessMode::Write && !record.byte_order.is_native() {
            return Err(KernelError::new(
                ErrorKind::NotWritable,
                format!(
                    "{} is in {} format; only LTL-IEEE files can be written",
                    store.path().display(),
                    record.byte_order.format_word()
                ),
            ));
        }
        log_daf_debug!(
            "Opened DAF",
            nd = record.nd,
            ni = record.ni,
            writable = mode == AccessMode::Write
        );
        Ok(Self { store, record })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn file_record(&self) -> &DafFileRecord {
        &self.record
    }

    pub fn file_type(&self) -> &FileType {
        &self.record.file_type
    }

    pub fn internal_name(&self) -> &str {
        &self.record.internal_name
    }

    pub fn nd(&self) -> usize {
        self.record.nd
    }

    pub fn ni(&self) -> usize {
        self.record.ni
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    pub fn check_access(&self, need: Access) -> Result<()> {
        self.store.check_access(need)
    }

    /// Start a search before the first segment.
    pub fn begin_forward_search(&self) -> Result<DafSearch> {
        self.check_access(Access::Read)?;
        Ok(DafSearch::forward())
    }

    /// Start a search after the last segment.
    pub fn begin_backward_search(&self) -> Result<DafSearch> {
        self.check_access(Access::Read)?;
        Ok(DafSearch::backward())
    }

    /// Number of segments, counted by a full traversal. Zero for an empty file.
    pub fn count_segments(&self) -> Result<usize> {
        self.count_entries()
    }

    /// Name of a segment
    pub fn segment_name(&self, segment: &DafSegment) -> Result<String> {
        let record = self.store.read_record(segment.record + 1)?;
        Ok(summary::read_name(
            &record,
            self.record.nd,
            self.record.ni,
            segment.slot,
        ))
    }

    /// Release the file. Later operations fail with `FileClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    pub(crate) fn read_summary_record(&self, number: u32) -> Result<SummaryRecord> {
        let record = self.store.read_record(number)?;
        SummaryRecord::decode(&record, self.record.byte_order, self.record.nd, self.record.ni)
    }

    pub(crate) fn write_summary_record(&mut self, number: u32, record: &SummaryRecord) -> Result<()> {
        self.store
            .write_record(number, &record.encode(self.record.byte_order))
    }

    pub(crate) fn write_file_record(&mut self) -> Result<()> {
        self.store.write_record(1, &self.record.encode())
    }

    /// Walk summary records from `start` along `next` (forward) or `prev`
    /// links until one holds summaries.
    fn walk(&self, start: u32, forward: bool) -> Result<Option<(u32, SummaryRecord)>> {
        let mut number = start;
        let mut visited = 0u32;
        while number != 0 {
            if visited > self.store.record_count() {
                return Err(KernelError::new(
                    ErrorKind::InvalidFormat,
                    format!("summary record list in {} is cyclic", self.path().display()),
                ));
            }
            visited += 1;
            let record = self.read_summary_record(number)?;
            if !record.summaries.is_empty() {
                return Ok(Some((number, record)));
            }
            number = if forward { record.next } else { record.prev };
        }
        Ok(None)
    }

    fn segment_at(record: u32, summaries: &SummaryRecord, slot: usize) -> DafSegment {
        DafSegment {
            record,
            slot,
            summary: summaries.summaries[slot].clone(),
        }
    }
}

impl SegmentDirectory for Daf {
    type Entry = DafSegment;

    fn first_segment(&self) -> Result<Option<DafSegment>> {
        self.check_access(Access::Read)?;
        Ok(self
            .walk(self.record.fward, true)?
            .map(|(n, rec)| Self::segment_at(n, &rec, 0)))
    }

    fn last_segment(&self) -> Result<Option<DafSegment>> {
        self.check_access(Access::Read)?;
        Ok(self.walk(self.record.bward, false)?.map(|(n, rec)| {
            let slot = rec.summaries.len() - 1;
            Self::segment_at(n, &rec, slot)
        }))
    }

    fn next_segment(&self, entry: &DafSegment) -> Result<Option<DafSegment>> {
        let current = self.read_summary_record(entry.record)?;
        if entry.slot + 1 < current.summaries.len() {
            return Ok(Some(Self::segment_at(entry.record, &current, entry.slot + 1)));
        }
        Ok(self
            .walk(current.next, true)?
            .map(|(n, rec)| Self::segment_at(n, &rec, 0)))
    }

    fn previous_segment(&self, entry: &DafSegment) -> Result<Option<DafSegment>> {
        let current = self.read_summary_record(entry.record)?;
        if entry.slot > 0 && entry.slot <= current.summaries.len() {
            return Ok(Some(Self::segment_at(entry.record, &current, entry.slot - 1)));
        }
        Ok(self.walk(current.prev, false)?.map(|(n, rec)| {
            let slot = rec.summaries.len() - 1;
            Self::segment_at(n, &rec, slot)
        }))
    }
}
