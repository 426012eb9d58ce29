//! # segfile-das
//!
//! Direct Access, Segmented files: three append-only logical address
//! spaces (character, double precision, integer) stored in typed clusters
//! of 1024-byte records, plus the DLA segment list built on the integer
//! space.
//!
//! ## File Layout
//!
//! ```text
//! +--------------------+
//! | File record        |  id word, name, reserved/comment counts
//! +--------------------+
//! | Reserved records   |
//! +--------------------+
//! | Comment records    |  1024 characters each, NUL-terminated lines
//! +--------------------+
//! | Directory record   |  cluster types and record counts
//! | Cluster records    |  1024 chars / 128 doubles / 256 ints each
//! | ...                |  (more directory records as the file grows)
//! +--------------------+
//! ```

mod clusters;
mod comments;
pub mod dla;
pub mod file_record;

use std::collections::BTreeSet;
use std::path::Path;

use tracing::instrument;

use segfile_config::log_das_debug;
use segfile_record::{
    Access, AccessMode, Architecture, ByteOrder, ErrorKind, FileType, KernelError, RecordStore,
    Result, RECORD_LEN,
};

pub use clusters::{DataKind, Word};
pub use dla::{Dla, DlaDescriptor};
pub use file_record::DasFileRecord;

use clusters::{ClusterMap, DirectoryRecord};

/// Last logical address in use in each space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct LastAddresses {
    pub chars: u32,
    pub doubles: u32,
    pub ints: u32,
}

/// An open DAS file
#[derive(Debug)]
pub struct Das {
    store: RecordStore,
    record: DasFileRecord,
    clusters: ClusterMap,
}

impl Das {
    /// Create a new, empty DAS file open for write, with `comment_records`
    /// blank comment records reserved.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn create<P: AsRef<Path>>(
        path: P,
        internal_name: &str,
        kind: &str,
        comment_records: u32,
    ) -> Result<Self> {
        segfile_record::format::check_printable("internal file name", internal_name)?;
        if internal_name.len() > file_record::INTERNAL_NAME_LEN {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "internal file name is {} characters; at most {} are allowed",
                    internal_name.len(),
                    file_record::INTERNAL_NAME_LEN
                ),
            ));
        }

        let record = DasFileRecord {
            file_type: FileType::new(Architecture::Das, kind),
            internal_name: internal_name.to_string(),
            reserved_records: 0,
            reserved_chars: 0,
            comment_records,
            comment_chars: 0,
            byte_order: ByteOrder::Little,
        };

        let mut store = RecordStore::create(path)?;
        store.write_record(1, &record.encode())?;
        for n in 0..comment_records {
            store.write_record(2 + n, &[0u8; RECORD_LEN])?;
        }
        let first = record.first_directory();
        let directory = DirectoryRecord::empty(first, 0);
        store.write_record(first, &directory.encode(record.byte_order))?;

        let clusters = ClusterMap::new(directory);
        log_das_debug!("Created DAS", kind = kind, comment_records = comment_records);
        Ok(Self {
            store,
            record,
            clusters,
        })
    }

    /// Open an existing DAS file for read access.
    pub fn open_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, AccessMode::Read)
    }

    /// Open an existing DAS file for read and write access.
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
        if !head.starts_with(b"DAS/") && !head.starts_with(b"NAIF/DAS") {
            return Err(KernelError::new(
                ErrorKind::WrongFileType,
                format!("{} is not a DAS file", store.path().display()),
            ));
        }
        let record = DasFileRecord::decode(&head)?;
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
        let clusters = ClusterMap::load(&store, record.first_directory(), record.byte_order)?;
        log_das_debug!(
            "Opened DAS",
            directories = clusters.directories.len(),
            writable = mode == AccessMode::Write
        );
        Ok(Self {
            store,
            record,
            clusters,
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// The file record, read on open
    pub fn file_record(&self) -> &DasFileRecord {
        &self.record
    }

    pub fn file_type(&self) -> &FileType {
        &self.record.file_type
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    /// Verify the handle is open with the required access.
    pub fn check_access(&self, need: Access) -> Result<()> {
        self.store.check_access(need)
    }

    pub fn last_addresses(&self) -> Result<LastAddresses> {
        self.check_access(Access::Read)?;
        Ok(LastAddresses {
            chars: self.clusters.last_address(DataKind::Char),
            doubles: self.clusters.last_address(DataKind::Double),
            ints: self.clusters.last_address(DataKind::Int),
        })
    }

    pub fn append_chars(&mut self, chars: &[u8]) -> Result<()> {
        self.append(chars)
    }

    pub fn append_doubles(&mut self, values: &[f64]) -> Result<()> {
        self.append(values)
    }

    pub fn append_ints(&mut self, values: &[i32]) -> Result<()> {
        self.append(values)
    }

    /// Characters at addresses `first..=last`
    pub fn read_chars(&self, first: u32, last: u32) -> Result<Vec<u8>> {
        self.read(first, last)
    }

    pub fn read_doubles(&self, first: u32, last: u32) -> Result<Vec<f64>> {
        self.read(first, last)
    }

    pub fn read_ints(&self, first: u32, last: u32) -> Result<Vec<i32>> {
        self.read(first, last)
    }

    /// Overwrite doubles starting at address `first`.
    pub fn update_doubles(&mut self, first: u32, values: &[f64]) -> Result<()> {
        self.update(first, values)
    }

    /// Overwrite integers starting at address `first`.
    pub fn update_ints(&mut self, first: u32, values: &[i32]) -> Result<()> {
        self.update(first, values)
    }

    /// Append words to the end of their address space.
    pub fn append<W: Word>(&mut self, values: &[W]) -> Result<()> {
        self.check_access(Access::Write)?;
        if values.is_empty() {
            return Ok(());
        }
        let kind = W::KIND;
        let per = kind.per_record();
        let order = self.record.byte_order;
        let mut last = self.clusters.last_address(kind);
        let mut dirty = BTreeSet::new();
        let mut remaining = values;

        while !remaining.is_empty() {
            let offset = (last % per) as usize;
            let (physical, mut record) = if offset == 0 {
                let (physical, created) =
                    self.clusters
                        .allocate(kind, self.store.record_count(), &mut dirty)?;
                if let Some(index) = created {
                    let directory = &self.clusters.directories[index];
                    self.store
                        .write_record(directory.number, &directory.encode(order))?;
                    log_das_debug!("Added cluster directory", record = directory.number);
                }
                (physical, [0u8; RECORD_LEN])
            } else {
                let (physical, _) = self.clusters.locate(kind, last)?;
                (physical, self.store.read_record(physical)?)
            };

            let n = remaining.len().min(per as usize - offset);
            let mut buf = &mut record[offset * W::SIZE..(offset + n) * W::SIZE];
            for &value in &remaining[..n] {
                value.put(order, &mut buf);
            }
            self.store.write_record(physical, &record)?;
            last += n as u32;
            remaining = &remaining[n..];
        }

        self.clusters.set_last(kind, last, &mut dirty);
        self.write_directories(&dirty)?;
        Ok(())
    }

    /// Words at addresses `first..=last` of their address space.
    pub fn read<W: Word>(&self, first: u32, last: u32) -> Result<Vec<W>> {
        self.check_access(Access::Read)?;
        self.check_range(W::KIND, first, last)?;
        let order = self.record.byte_order;
        let mut values = Vec::with_capacity((last - first + 1) as usize);
        let mut address = first;
        while address <= last {
            let (physical, offset) = self.clusters.locate(W::KIND, address)?;
            let record = self.store.read_record(physical)?;
            let n = ((last - address + 1) as usize).min(W::KIND.per_record() as usize - offset);
            let mut buf = &record[offset * W::SIZE..(offset + n) * W::SIZE];
            for _ in 0..n {
                values.push(W::get(order, &mut buf));
            }
            address += n as u32;
        }
        Ok(values)
    }

    /// Overwrite existing words starting at address `first`.
    pub fn update<W: Word>(&mut self, first: u32, values: &[W]) -> Result<()> {
        self.check_access(Access::Write)?;
        if values.is_empty() {
            return Ok(());
        }
        let last = first + values.len() as u32 - 1;
        self.check_range(W::KIND, first, last)?;
        let order = self.record.byte_order;
        let mut address = first;
        let mut remaining = values;
        while !remaining.is_empty() {
            let (physical, offset) = self.clusters.locate(W::KIND, address)?;
            let mut record = self.store.read_record(physical)?;
            let n = remaining.len().min(W::KIND.per_record() as usize - offset);
            let mut buf = &mut record[offset * W::SIZE..(offset + n) * W::SIZE];
            for &value in &remaining[..n] {
                value.put(order, &mut buf);
            }
            self.store.write_record(physical, &record)?;
            address += n as u32;
            remaining = &remaining[n..];
        }
        Ok(())
    }

    fn check_range(&self, kind: DataKind, first: u32, last: u32) -> Result<()> {
        let end = self.clusters.last_address(kind);
        if first == 0 || last < first || last > end {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "{:?} address range {}..={} is outside 1..={}",
                    kind, first, last, end
                ),
            ));
        }
        Ok(())
    }

    fn write_directories(&mut self, dirty: &BTreeSet<usize>) -> Result<()> {
        let order = self.record.byte_order;
        for &index in dirty {
            let directory = &self.clusters.directories[index];
            self.store
                .write_record(directory.number, &directory.encode(order))?;
        }
        Ok(())
    }

    /// Move every record from the first directory record onward by `delta`
    /// records and relink the directories.
    pub(crate) fn shift_directories(&mut self, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let first = self.record.first_directory();
        let count = self.store.record_count();
        let moved = |n: u32| (n as i64 + delta as i64) as u32;

        if delta > 0 {
            let blank = [0u8; RECORD_LEN];
            for n in count + 1..=moved(count) {
                self.store.write_record(n, &blank)?;
            }
            for n in (first..=count).rev() {
                let record = self.store.read_record(n)?;
                self.store.write_record(moved(n), &record)?;
            }
        } else {
            for n in first..=count {
                let record = self.store.read_record(n)?;
                self.store.write_record(moved(n), &record)?;
            }
            self.store.truncate(moved(count))?;
        }

        let order = self.record.byte_order;
        for directory in &mut self.clusters.directories {
            directory.number = moved(directory.number);
            if directory.prev != 0 {
                directory.prev = moved(directory.prev);
            }
            if directory.next != 0 {
                directory.next = moved(directory.next);
            }
            self.store
                .write_record(directory.number, &directory.encode(order))?;
        }
        self.clusters = ClusterMap::load(&self.store, moved(first), order)?;
        log_das_debug!("Shifted directories", delta = delta, first = moved(first));
        Ok(())
    }

    pub(crate) fn write_file_record(&mut self) -> Result<()> {
        self.store.write_record(1, &self.record.encode())
    }

    /// Release the file. Later operations fail with `FileClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segfile_record::CommentStore;
    use tempfile::TempDir;

    #[test]
    fn test_address_spaces_are_independent() {
        let temp = TempDir::new().unwrap();
        let mut das = Das::create(temp.path().join("a.dsk"), "SPACES", "DSK", 0).unwrap();
        das.append_ints(&[1, 2, 3]).unwrap();
        das.append_doubles(&[0.5; 200]).unwrap();
        das.append_ints(&(4..=600).collect::<Vec<i32>>()).unwrap();
        das.append_chars(b"hello").unwrap();

        let last = das.last_addresses().unwrap();
        assert_eq!(last, LastAddresses { chars: 5, doubles: 200, ints: 600 });
        assert_eq!(das.read_ints(1, 600).unwrap(), (1..=600).collect::<Vec<i32>>());
        assert_eq!(das.read_doubles(128, 130).unwrap(), vec![0.5; 3]);
        assert_eq!(das.read_chars(1, 5).unwrap(), b"hello".to_vec());
        assert!(das.read_ints(600, 601).is_err());
        assert!(das.read_doubles(0, 1).is_err());
    }

    #[test]
    fn test_update_in_place() {
        let temp = TempDir::new().unwrap();
        let mut das = Das::create(temp.path().join("u.dsk"), "UPD", "DSK", 0).unwrap();
        das.append_ints(&[0; 300]).unwrap();
        das.update_ints(255, &[7, 8, 9]).unwrap();
        assert_eq!(das.read_ints(254, 258).unwrap(), vec![0, 7, 8, 9, 0]);
        let err = das.update_ints(299, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_many_clusters_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("many.dsk");
        let mut das = Das::create(&path, "MANY", "DSK", 0).unwrap();
        // alternating types start a new cluster each time, spilling past one directory
        for i in 0..130 {
            das.append_ints(&[i]).unwrap();
            das.append_doubles(&[f64::from(i)]).unwrap();
            das.append_chars(b"x").unwrap();
        }
        das.close().unwrap();

        let mut das = Das::open_write(&path).unwrap();
        let lines: Vec<String> = (0..200).map(|i| format!("comment line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        das.add_comments(&refs).unwrap();
        das.update_ints(65, &[-1]).unwrap();
        das.append_ints(&[1000]).unwrap();
        das.close().unwrap();

        let das = Das::open_read(&path).unwrap();
        let last = das.last_addresses().unwrap();
        assert_eq!(last, LastAddresses { chars: 130, doubles: 130, ints: 131 });
        let mut ints: Vec<i32> = (0..130).collect();
        ints[64] = -1;
        ints.push(1000);
        assert_eq!(das.read_ints(1, 131).unwrap(), ints);
        assert_eq!(das.read_doubles(130, 130).unwrap(), vec![129.0]);
        assert_eq!(das.read_chars(1, 130).unwrap(), vec![b'x'; 130]);
        assert_eq!(das.read_comments(80).unwrap(), lines);
    }

    #[test]
    fn test_read_only_handle_rejects_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("r.dsk");
        let mut das = Das::create(&path, "RO", "DSK", 0).unwrap();
        das.append_doubles(&[1.0]).unwrap();
        das.close().unwrap();
        assert_eq!(das.read_doubles(1, 1).unwrap_err().kind(), ErrorKind::FileClosed);

        let mut das = Das::open_read(&path).unwrap();
        assert_eq!(das.read_doubles(1, 1).unwrap(), vec![1.0]);
        let err = das.append_doubles(&[2.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotWritable);
    }
}
