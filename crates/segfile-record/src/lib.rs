//! # segfile-record
//!
//! Fixed-size record storage for segmented kernel files.
//!
//! Every DAF and DAS file is a sequence of 1024-byte records. This crate
//! owns the physical substrate shared by both architectures:
//!
//! - [`RecordStore`]: whole-record random access to one open file, with an
//!   in-process registry that enforces read/write access modes
//! - [`KernelError`]: the single tagged error type used by every layer
//! - [`format`]: byte order, text fields, id words and file identification
//! - [`SegmentDirectory`] / [`CommentStore`]: the capability traits that
//!   directories and typed views are composed from
//!
//! ## File Layout
//!
//! ```text
//! +----------------+
//! | Record 1       |  File record (id word, counts, pointers, format)
//! +----------------+
//! | Record 2..N    |  Comment / directory / data records (1024B each)
//! +----------------+
//! ```

pub mod comments;
pub mod directory;
mod error;
pub mod format;
pub mod store;

pub use comments::CommentStore;
pub use directory::{SegmentDirectory, Segments};
pub use error::{ErrorKind, KernelError, Result};
pub use format::{identify, Architecture, ByteOrder, FileType};
pub use store::{Access, AccessMode, Record, RecordStore};

/// Size of every physical record, in bytes.
pub const RECORD_LEN: usize = 1024;
