//! Whole-record random access to a single file.
//!
//! Records are numbered from 1. A process-wide registry tracks which files
//! are open and how, so that a file cannot be opened for write while it is
//! open for read (or the reverse). Any number of read handles may share a
//! file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::{debug, instrument};

use crate::{ErrorKind, KernelError, Result, RECORD_LEN};

/// One physical record
pub type Record = [u8; RECORD_LEN];

/// Mode a file was opened in. Write handles are also readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// Access required by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Default)]
struct OpenState {
    readers: usize,
    writer: bool,
}

/// Files currently open in this process, keyed by canonical path
static OPEN_FILES: Lazy<Mutex<HashMap<PathBuf, OpenState>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn register(key: &Path, mode: AccessMode) -> Result<()> {
    let mut open = OPEN_FILES.lock().unwrap_or_else(|e| e.into_inner());
    let state = open.entry(key.to_path_buf()).or_default();
    match mode {
        AccessMode::Read if state.writer => Err(KernelError::new(
            ErrorKind::AccessModeConflict,
            format!("{} is already open for write access", key.display()),
        )),
        AccessMode::Write if state.writer || state.readers > 0 => Err(KernelError::new(
            ErrorKind::AccessModeConflict,
            format!(
                "{} is already open for {} access",
                key.display(),
                if state.writer { "write" } else { "read" }
            ),
        )),
        AccessMode::Read => {
            state.readers += 1;
            Ok(())
        }
        AccessMode::Write => {
            state.writer = true;
            Ok(())
        }
    }
}

fn deregister(key: &Path, mode: AccessMode) {
    let mut open = OPEN_FILES.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(state) = open.get_mut(key) {
        match mode {
            AccessMode::Read => state.readers = state.readers.saturating_sub(1),
            AccessMode::Write => state.writer = false,
        }
        if state.readers == 0 && !state.writer {
            open.remove(key);
        }
    }
}

/// Fixed-size record access to one open file
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    key: PathBuf,
    file: Option<File>,
    mode: AccessMode,
    records: u32,
}

impl RecordStore {
    /// Open an existing file.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(mode == AccessMode::Write)
            .open(&path)?;
        let key = fs::canonicalize(&path)?;
        let len = file.metadata()?.len();
        let records = len.div_ceil(RECORD_LEN as u64) as u32;
        register(&key, mode)?;
        debug!(records, "opened record store");

        Ok(Self {
            path,
            key,
            file: Some(file),
            mode,
            records,
        })
    }

    /// Create a new, empty file open for write. Fails if the file exists.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        let key = fs::canonicalize(&path)?;
        register(&key, AccessMode::Write)?;

        Ok(Self {
            path,
            key,
            file: Some(file),
            mode: AccessMode::Write,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.is_open() && self.mode == AccessMode::Write
    }

    /// Number of records currently in the file
    pub fn record_count(&self) -> u32 {
        self.records
    }

    /// Verify the handle is open for the required access.
    ///
    /// Every open handle is readable, so a closed handle fails with
    /// `FileClosed` and a read handle asked for write fails with
    /// `NotWritable`.
    pub fn check_access(&self, need: Access) -> Result<()> {
        if self.file.is_none() {
            return Err(KernelError::new(
                ErrorKind::FileClosed,
                format!("{} has been closed", self.path.display()),
            ));
        }
        if need == Access::Write && self.mode != AccessMode::Write {
            return Err(KernelError::new(
                ErrorKind::NotWritable,
                format!("{} is open for read access only", self.path.display()),
            ));
        }
        Ok(())
    }

    fn file(&self, need: Access) -> Result<&File> {
        self.check_access(need)?;
        self.file.as_ref().ok_or_else(|| {
            KernelError::new(
                ErrorKind::FileClosed,
                format!("{} has been closed", self.path.display()),
            )
        })
    }

    /// Read record `number`. A short final record is zero filled.
    pub fn read_record(&self, number: u32) -> Result<Record> {
        let mut file = self.file(Access::Read)?;
        if number == 0 || number > self.records {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "record {} is outside {} (1..={})",
                    number,
                    self.path.display(),
                    self.records
                ),
            ));
        }
        file.seek(SeekFrom::Start(Self::offset(number)))?;

        let mut record = [0u8; RECORD_LEN];
        let mut filled = 0;
        while filled < RECORD_LEN {
            let n = file.read(&mut record[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(record)
    }

    /// Write record `number`, which may extend the file by one record.
    pub fn write_record(&mut self, number: u32, record: &Record) -> Result<()> {
        let records = self.records;
        let mut file = self.file(Access::Write)?;
        if number == 0 || number > records + 1 {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "cannot write record {} to {} holding {} records",
                    number,
                    self.path.display(),
                    records
                ),
            ));
        }
        file.seek(SeekFrom::Start(Self::offset(number)))?;
        file.write_all(record)?;
        self.records = records.max(number);
        Ok(())
    }

    /// Shrink the file to `records` records.
    pub fn truncate(&mut self, records: u32) -> Result<()> {
        let file = self.file(Access::Write)?;
        file.set_len(records as u64 * RECORD_LEN as u64)?;
        self.records = records.min(self.records);
        Ok(())
    }

    /// Flush written records to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file(Access::Write)?.sync_all()?;
        Ok(())
    }

    /// Release the OS file. Subsequent operations fail with `FileClosed`.
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            deregister(&self.key, self.mode);
            if self.mode == AccessMode::Write {
                file.sync_all()?;
            }
            debug!(path = %self.path.display(), "closed record store");
        }
        Ok(())
    }

    fn offset(number: u32) -> u64 {
        (number as u64 - 1) * RECORD_LEN as u64
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            deregister(&self.key, self.mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registered(path: &Path) -> bool {
        let key = fs::canonicalize(path).unwrap();
        let open = OPEN_FILES.lock().unwrap_or_else(|e| e.into_inner());
        open.contains_key(&key)
    }

    fn filled(byte: u8) -> Record {
        [byte; RECORD_LEN]
    }

    #[test]
    fn test_write_then_read_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("records.bin");

        let mut store = RecordStore::create(&path).unwrap();
        store.write_record(1, &filled(1)).unwrap();
        store.write_record(2, &filled(2)).unwrap();
        store.write_record(1, &filled(9)).unwrap();
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.read_record(1).unwrap(), filled(9));
        assert_eq!(store.read_record(2).unwrap(), filled(2));
        store.close().unwrap();

        let store = RecordStore::open(&path, AccessMode::Read).unwrap();
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.read_record(2).unwrap(), filled(2));
    }

    #[test]
    fn test_no_gaps_or_record_zero() {
        let temp = TempDir::new().unwrap();
        let mut store = RecordStore::create(temp.path().join("gap.bin")).unwrap();
        assert!(store.write_record(0, &filled(0)).is_err());
        assert!(store.write_record(2, &filled(0)).is_err());
        assert!(store.read_record(1).is_err());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("exists.bin");
        std::fs::write(&path, b"x").unwrap();
        let err = RecordStore::create(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_access_mode_conflicts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shared.bin");
        let mut writer = RecordStore::create(&path).unwrap();
        writer.write_record(1, &filled(0)).unwrap();

        let err = RecordStore::open(&path, AccessMode::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessModeConflict);
        writer.close().unwrap();

        let reader1 = RecordStore::open(&path, AccessMode::Read).unwrap();
        let reader2 = RecordStore::open(&path, AccessMode::Read).unwrap();
        let err = RecordStore::open(&path, AccessMode::Write).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessModeConflict);

        drop(reader1);
        drop(reader2);
        assert!(RecordStore::open(&path, AccessMode::Write).is_ok());
    }

    #[test]
    fn test_closed_and_read_only_handles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("closed.bin");
        let mut store = RecordStore::create(&path).unwrap();
        store.write_record(1, &filled(3)).unwrap();
        store.close().unwrap();

        let err = store.read_record(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileClosed);
        assert!(store.close().is_ok());

        let mut reader = RecordStore::open(&path, AccessMode::Read).unwrap();
        let err = reader.write_record(1, &filled(4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotWritable);
    }

    #[test]
    fn test_check_access_kinds() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("access.bin");
        let mut writer = RecordStore::create(&path).unwrap();
        assert!(writer.check_access(Access::Read).is_ok());
        assert!(writer.check_access(Access::Write).is_ok());
        writer.write_record(1, &filled(5)).unwrap();
        writer.close().unwrap();
        for need in [Access::Read, Access::Write] {
            let err = writer.check_access(need).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FileClosed);
        }

        let mut reader = RecordStore::open(&path, AccessMode::Read).unwrap();
        assert!(reader.check_access(Access::Read).is_ok());
        let err = reader.check_access(Access::Write).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotWritable);
        reader.close().unwrap();
        let err = reader.check_access(Access::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileClosed);
    }

    #[test]
    fn test_failed_open_leaves_no_registration() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.bin");
        assert_eq!(
            RecordStore::open(&missing, AccessMode::Write).unwrap_err().kind(),
            ErrorKind::Io
        );

        let path = temp.path().join("busy.bin");
        let mut writer = RecordStore::create(&path).unwrap();
        writer.write_record(1, &filled(6)).unwrap();
        writer.close().unwrap();
        assert!(!registered(&path));

        let reader = RecordStore::open(&path, AccessMode::Read).unwrap();
        let err = RecordStore::open(&path, AccessMode::Write).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessModeConflict);
        drop(reader);
        assert!(!registered(&path));

        let mut writer = RecordStore::open(&path, AccessMode::Write).unwrap();
        assert!(registered(&path));
        writer.close().unwrap();
        assert!(!registered(&path));
    }

    #[test]
    fn test_truncate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trunc.bin");
        let mut store = RecordStore::create(&path).unwrap();
        for n in 1..=4 {
            store.write_record(n, &filled(n as u8)).unwrap();
        }
        store.truncate(2).unwrap();
        assert_eq!(store.record_count(), 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * RECORD_LEN as u64);
    }
}
