use std::fmt;
use std::io;

use thiserror::Error;

/// Category of a storage failure.
///
/// Callers match on the kind; the accompanying detail string is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Underlying OS I/O failure
    Io,
    /// File requested for write while open for read, or the reverse
    AccessModeConflict,
    /// Handle cannot be read. Every open `RecordStore` is readable, so the
    /// storage layer itself never returns this kind; closed handles report
    /// `FileClosed` instead.
    NotReadable,
    /// Handle was not opened for write access
    NotWritable,
    /// Handle has been closed
    FileClosed,
    /// Architecture or type tag does not match the requesting view
    WrongFileType,
    /// File contents violate the binary layout
    InvalidFormat,
    /// Traversal requested on a file with no segments
    NoSegments,
    /// Segment has no successor
    NoSuccessor,
    /// Segment has no predecessor
    NoPredecessor,
    /// Cursor has not been positioned on a segment
    NoCurrentSegment,
    /// Caller buffer does not match the fixed dimension
    InvalidArraySize,
    /// Caller value is out of range or inconsistent
    InvalidValue,
    /// Clock of a tolerance differs from the instrument clock
    ClockMismatch,
    /// Derived quantity is undefined for the input
    NotComputable,
    /// Parameter cannot be changed
    ImmutableValue,
    /// Segment data type is not supported by this operation
    UnsupportedType,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "I/O error",
            ErrorKind::AccessModeConflict => "access mode conflict",
            ErrorKind::NotReadable => "file not readable",
            ErrorKind::NotWritable => "file not writable",
            ErrorKind::FileClosed => "file closed",
            ErrorKind::WrongFileType => "wrong file type",
            ErrorKind::InvalidFormat => "invalid file format",
            ErrorKind::NoSegments => "no segments",
            ErrorKind::NoSuccessor => "no successor",
            ErrorKind::NoPredecessor => "no predecessor",
            ErrorKind::NoCurrentSegment => "no current segment",
            ErrorKind::InvalidArraySize => "invalid array size",
            ErrorKind::InvalidValue => "invalid value",
            ErrorKind::ClockMismatch => "clock mismatch",
            ErrorKind::NotComputable => "not computable",
            ErrorKind::ImmutableValue => "immutable value",
            ErrorKind::UnsupportedType => "unsupported segment type",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in any storage layer
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{kind}: {detail}")]
    Kernel { kind: ErrorKind, detail: String },
}

impl KernelError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Kernel {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Io(_) => ErrorKind::Io,
            KernelError::Kernel { kind, .. } => *kind,
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
