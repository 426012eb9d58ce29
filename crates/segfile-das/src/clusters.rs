//! Cluster directory records and the logical-to-physical record map.
//!
//! Data records of one type that are physically adjacent form a cluster.
//! Each cluster directory record describes the clusters that follow it:
//!
//! ```text
//! word  0        previous directory record (0 = none)
//! word  1        next directory record (0 = none)
//! words 2..8     (min, max) logical address for char, double, int
//! word  8        type of the first cluster (1 char, 2 double, 3 int)
//! words 9..256   signed record counts, one per cluster
//! ```
//!
//! Types cycle char -> double -> int -> char. A positive count means the
//! cluster has the next type in the cycle after its predecessor, a negative
//! count the previous type.

use std::collections::BTreeSet;

use bytes::{Buf, BufMut};
use serde::Serialize;

use segfile_record::{ByteOrder, ErrorKind, KernelError, Record, RecordStore, Result, RECORD_LEN};

/// Cluster slots in one directory record
pub const MAX_CLUSTERS: usize = 247;

const DIRECTORY_WORDS: usize = RECORD_LEN / 4;
const RANGE_WORD: usize = 2;
const FIRST_TYPE_WORD: usize = 8;
const COUNT_WORD: usize = 9;

/// The three logical address spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataKind {
    Char,
    Double,
    Int,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Char, DataKind::Double, DataKind::Int];

    pub fn code(self) -> i32 {
        match self {
            DataKind::Char => 1,
            DataKind::Double => 2,
            DataKind::Int => 3,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(DataKind::Char),
            2 => Some(DataKind::Double),
            3 => Some(DataKind::Int),
            _ => None,
        }
    }

    fn next(self) -> Self {
        match self {
            DataKind::Char => DataKind::Double,
            DataKind::Double => DataKind::Int,
            DataKind::Int => DataKind::Char,
        }
    }

    fn previous(self) -> Self {
        match self {
            DataKind::Char => DataKind::Int,
            DataKind::Double => DataKind::Char,
            DataKind::Int => DataKind::Double,
        }
    }

    /// Words of this type per physical record
    pub fn per_record(self) -> u32 {
        match self {
            DataKind::Char => 1024,
            DataKind::Double => 128,
            DataKind::Int => 256,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.code() as usize - 1
    }
}

/// One cluster directory record
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DirectoryRecord {
    pub number: u32,
    pub prev: u32,
    pub next: u32,
    pub ranges: [(u32, u32); 3],
    pub clusters: Vec<(DataKind, u32)>,
}

impl DirectoryRecord {
    pub fn empty(number: u32, prev: u32) -> Self {
        Self {
            number,
            prev,
            next: 0,
            ranges: [(0, 0); 3],
            clusters: Vec::new(),
        }
    }

    /// Physical records covered by this directory's clusters
    pub fn span(&self) -> u32 {
        self.clusters.iter().map(|(_, n)| n).sum()
    }

    pub fn decode(number: u32, record: &Record, order: ByteOrder) -> Result<Self> {
        let mut buf = &record[..];
        let words: Vec<i32> = (0..DIRECTORY_WORDS).map(|_| order.get_i32(&mut buf)).collect();
        let corrupt = |what: String| {
            KernelError::new(
                ErrorKind::InvalidFormat,
                format!("cluster directory record {}: {}", number, what),
            )
        };

        let pointer = |w: i32| u32::try_from(w).map_err(|_| corrupt(format!("bad pointer {}", w)));
        let prev = pointer(words[0])?;
        let next = pointer(words[1])?;

        let mut ranges = [(0, 0); 3];
        for (i, range) in ranges.iter_mut().enumerate() {
            let lo = pointer(words[RANGE_WORD + 2 * i])?;
            let hi = pointer(words[RANGE_WORD + 2 * i + 1])?;
            *range = (lo, hi);
        }

        let mut clusters = Vec::new();
        if words[FIRST_TYPE_WORD] != 0 {
            let mut kind = DataKind::from_code(words[FIRST_TYPE_WORD])
                .ok_or_else(|| corrupt(format!("bad cluster type {}", words[FIRST_TYPE_WORD])))?;
            for (i, &count) in words[COUNT_WORD..].iter().enumerate() {
                if count == 0 {
                    break;
                }
                if i == 0 {
                    if count < 0 {
                        return Err(corrupt(format!("negative first cluster count {}", count)));
                    }
                } else if count > 0 {
                    kind = kind.next();
                } else {
                    kind = kind.previous();
                }
                clusters.push((kind, count.unsigned_abs()));
            }
        }

        Ok(Self {
            number,
            prev,
            next,
            ranges,
            clusters,
        })
    }

    pub fn encode(&self, order: ByteOrder) -> Record {
        let mut words = [0i32; DIRECTORY_WORDS];
        words[0] = self.prev as i32;
        words[1] = self.next as i32;
        for (i, (lo, hi)) in self.ranges.iter().enumerate() {
            words[RANGE_WORD + 2 * i] = *lo as i32;
            words[RANGE_WORD + 2 * i + 1] = *hi as i32;
        }
        let mut previous: Option<DataKind> = None;
        for (i, &(kind, count)) in self.clusters.iter().enumerate() {
            let count = count as i32;
            words[COUNT_WORD + i] = match previous {
                None => {
                    words[FIRST_TYPE_WORD] = kind.code();
                    count
                }
                Some(p) if p.next() == kind => count,
                Some(_) => -count,
            };
            previous = Some(kind);
        }

        let mut record = [0u8; RECORD_LEN];
        let mut buf = &mut record[..];
        for word in words {
            order.put_i32(&mut buf, word);
        }
        record
    }
}

/// In-memory view of every cluster directory in a file
#[derive(Debug, Clone, Default)]
pub(crate) struct ClusterMap {
    pub directories: Vec<DirectoryRecord>,
    /// Physical record and owning directory of each logical record, per type
    records: [Vec<(u32, usize)>; 3],
    last: [u32; 3],
}

impl ClusterMap {
    /// Map of a new file holding one empty directory record.
    pub fn new(directory: DirectoryRecord) -> Self {
        Self {
            directories: vec![directory],
            ..Default::default()
        }
    }

    /// Read the directory chain starting at record `first`.
    pub fn load(store: &RecordStore, first: u32, order: ByteOrder) -> Result<Self> {
        let mut map = Self::default();
        let mut number = first;
        let mut prev = 0;
        while number != 0 {
            if map.directories.len() as u32 >= store.record_count() {
                return Err(KernelError::new(
                    ErrorKind::InvalidFormat,
                    "cluster directory list is cyclic",
                ));
            }
            let directory = DirectoryRecord::decode(number, &store.read_record(number)?, order)?;
            if directory.prev != prev {
                return Err(KernelError::new(
                    ErrorKind::InvalidFormat,
                    format!(
                        "cluster directory record {} points back to {}, expected {}",
                        number, directory.prev, prev
                    ),
                ));
            }
            let owner = map.directories.len();
            let mut physical = number + 1;
            for &(kind, count) in &directory.clusters {
                for _ in 0..count {
                    map.records[kind.index()].push((physical, owner));
                    physical += 1;
                }
            }
            for kind in DataKind::ALL {
                let i = kind.index();
                map.last[i] = map.last[i].max(directory.ranges[i].1);
            }
            prev = number;
            number = directory.next;
            map.directories.push(directory);
        }

        if map.directories.is_empty() {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                "file has no cluster directory",
            ));
        }
        for kind in DataKind::ALL {
            let i = kind.index();
            if map.last[i] > map.records[i].len() as u32 * kind.per_record() {
                return Err(KernelError::new(
                    ErrorKind::InvalidFormat,
                    format!(
                        "last {:?} address {} lies beyond the {} allocated records",
                        kind,
                        map.last[i],
                        map.records[i].len()
                    ),
                ));
            }
        }
        Ok(map)
    }

    pub fn last_address(&self, kind: DataKind) -> u32 {
        self.last[kind.index()]
    }

    /// Physical record and word offset holding logical `address`
    pub fn locate(&self, kind: DataKind, address: u32) -> Result<(u32, usize)> {
        let per = kind.per_record();
        address
            .checked_sub(1)
            .and_then(|a| self.records[kind.index()].get((a / per) as usize))
            .map(|&(physical, _)| (physical, ((address - 1) % per) as usize))
            .ok_or_else(|| {
                KernelError::new(
                    ErrorKind::InvalidValue,
                    format!("{:?} address {} has no record", kind, address),
                )
            })
    }

    /// Physical record following the last cluster of the last directory
    fn end_of_clusters(&self) -> u32 {
        self.directories
            .last()
            .map(|d| d.number + d.span() + 1)
            .unwrap_or(0)
    }

    /// Allocate one new physical record of `kind` at the end of a file
    /// holding `file_records` records.
    ///
    /// Returns the data record and, when a new directory record was needed
    /// (and must be written first), its index.
    pub fn allocate(
        &mut self,
        kind: DataKind,
        file_records: u32,
        dirty: &mut BTreeSet<usize>,
    ) -> Result<(u32, Option<usize>)> {
        if self.end_of_clusters() != file_records + 1 {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "clusters end before record {} but the file holds {} records",
                    self.end_of_clusters(),
                    file_records
                ),
            ));
        }
        let current = self.directories.len() - 1;
        let directory = &mut self.directories[current];

        let extend = matches!(directory.clusters.last(), Some((last, _)) if *last == kind);
        let (physical, owner, created) = if extend {
            if let Some((_, count)) = directory.clusters.last_mut() {
                *count += 1;
            }
            (file_records + 1, current, None)
        } else if directory.clusters.len() < MAX_CLUSTERS {
            directory.clusters.push((kind, 1));
            (file_records + 1, current, None)
        } else {
            let number = file_records + 1;
            directory.next = number;
            let mut fresh = DirectoryRecord::empty(number, directory.number);
            fresh.clusters.push((kind, 1));
            self.directories.push(fresh);
            (number + 1, current + 1, Some(current + 1))
        };
        dirty.insert(current);
        dirty.insert(owner);
        self.records[kind.index()].push((physical, owner));
        Ok((physical, created))
    }

    /// Record a new last address for `kind` and refresh per-directory ranges.
    pub fn set_last(&mut self, kind: DataKind, last: u32, dirty: &mut BTreeSet<usize>) {
        let i = kind.index();
        self.last[i] = last;
        let per = kind.per_record();

        let mut ranges = vec![(0u32, 0u32); self.directories.len()];
        for (j, &(_, owner)) in self.records[i].iter().enumerate() {
            let lo = j as u32 * per + 1;
            if lo > last {
                break;
            }
            let hi = ((j as u32 + 1) * per).min(last);
            let range = &mut ranges[owner];
            if range.0 == 0 {
                range.0 = lo;
            }
            range.1 = hi;
        }
        for (d, range) in ranges.into_iter().enumerate() {
            if self.directories[d].ranges[i] != range {
                self.directories[d].ranges[i] = range;
                dirty.insert(d);
            }
        }
    }
}

/// Words storable in a DAS address space
pub trait Word: Copy {
    const KIND: DataKind;
    /// Bytes per word
    const SIZE: usize;

    fn get(order: ByteOrder, buf: &mut &[u8]) -> Self;

    fn put(self, order: ByteOrder, buf: &mut &mut [u8]);
}

impl Word for u8 {
    const KIND: DataKind = DataKind::Char;
    const SIZE: usize = 1;

    fn get(_order: ByteOrder, buf: &mut &[u8]) -> Self {
        buf.get_u8()
    }

    fn put(self, _order: ByteOrder, buf: &mut &mut [u8]) {
        buf.put_u8(self);
    }
}

impl Word for f64 {
    const KIND: DataKind = DataKind::Double;
    const SIZE: usize = 8;

    fn get(order: ByteOrder, buf: &mut &[u8]) -> Self {
        order.get_f64(buf)
    }

    fn put(self, order: ByteOrder, buf: &mut &mut [u8]) {
        order.put_f64(buf, self);
    }
}

impl Word for i32 {
    const KIND: DataKind = DataKind::Int;
    const SIZE: usize = 4;

    fn get(order: ByteOrder, buf: &mut &[u8]) -> Self {
        order.get_i32(buf)
    }

    fn put(self, order: ByteOrder, buf: &mut &mut [u8]) {
        order.put_i32(buf, self);
    }
}
