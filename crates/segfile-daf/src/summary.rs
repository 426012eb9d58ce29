//! Segment summaries and the summary/name directory records.
//!
//! A summary holds `ND` doubles followed by `NI` integers. On disk the
//! integers are packed two per double precision word, so a summary occupies
//! `ND + (NI+1)/2` words. A summary record carries three control words
//! (`NEXT`, `PREV`, `NSUM`) and as many summaries as fit in the remaining
//! 125 words; the name record that follows it holds one `8 * SS` character
//! name per summary.

use serde::Serialize;

use segfile_record::format::{read_text, write_text};
use segfile_record::{ByteOrder, ErrorKind, KernelError, Record, Result, RECORD_LEN};

use crate::file_record::MAX_SUMMARY_SIZE;

const CONTROL_WORDS: usize = 3;

/// Summary size in double precision words
pub fn summary_size(nd: usize, ni: usize) -> usize {
    nd + ni.div_ceil(2)
}

/// Summaries that fit in one summary record
pub fn summaries_per_record(nd: usize, ni: usize) -> usize {
    MAX_SUMMARY_SIZE / summary_size(nd, ni)
}

/// Characters in one segment name
pub fn name_len(nd: usize, ni: usize) -> usize {
    8 * summary_size(nd, ni)
}

/// One unpacked segment summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub doubles: Vec<f64>,
    pub ints: Vec<i32>,
}

impl Summary {
    pub fn new(doubles: Vec<f64>, ints: Vec<i32>) -> Self {
        Self { doubles, ints }
    }

    /// Build a summary, checking it has exactly `nd` doubles and `ni` ints.
    pub fn with_dimensions(nd: usize, ni: usize, doubles: &[f64], ints: &[i32]) -> Result<Self> {
        let summary = Self::new(doubles.to_vec(), ints.to_vec());
        summary.check_dimensions(nd, ni)?;
        Ok(summary)
    }

    pub fn check_dimensions(&self, nd: usize, ni: usize) -> Result<()> {
        if self.doubles.len() != nd || self.ints.len() != ni {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!(
                    "summary has {} doubles and {} integers; the file requires {} and {}",
                    self.doubles.len(),
                    self.ints.len(),
                    nd,
                    ni
                ),
            ));
        }
        Ok(())
    }

    /// Data address of the first element of the segment
    pub fn begin_address(&self) -> i32 {
        self.ints.get(self.ints.len().wrapping_sub(2)).copied().unwrap_or(0)
    }

    /// Data address of the last element of the segment
    pub fn end_address(&self) -> i32 {
        self.ints.last().copied().unwrap_or(0)
    }

    pub fn set_addresses(&mut self, begin: i32, end: i32) {
        let n = self.ints.len();
        if n >= 2 {
            self.ints[n - 2] = begin;
            self.ints[n - 1] = end;
        }
    }

    /// Bytes occupied by the packed summary
    pub fn packed_len(&self) -> usize {
        8 * summary_size(self.doubles.len(), self.ints.len())
    }

    /// Pack into `dst`, which must be `packed_len()` bytes.
    pub fn encode(&self, order: ByteOrder, dst: &mut [u8]) {
        let (head, tail) = dst.split_at_mut(8 * self.doubles.len());
        let mut head = head;
        for &d in &self.doubles {
            order.put_f64(&mut head, d);
        }
        let mut tail = tail;
        for &i in &self.ints {
            order.put_i32(&mut tail, i);
        }
        // odd NI leaves half a word of padding
        tail.fill(0);
    }

    /// Unpack a summary of the given dimensions from `src`.
    pub fn decode(order: ByteOrder, nd: usize, ni: usize, src: &[u8]) -> Self {
        let mut buf = src;
        let doubles = (0..nd).map(|_| order.get_f64(&mut buf)).collect();
        let ints = (0..ni).map(|_| order.get_i32(&mut buf)).collect();
        Self { doubles, ints }
    }
}

/// Typed descriptors that convert to and from raw summaries
pub trait DescriptorCodec: Sized {
    /// Doubles per summary
    const ND: usize;
    /// Integers per summary, including the begin/end addresses
    const NI: usize;

    fn to_summary(&self) -> Summary;

    fn from_summary(summary: &Summary) -> Result<Self>;
}

/// One decoded summary record
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    /// Next summary record, 0 at the end of the list
    pub next: u32,
    /// Previous summary record, 0 at the start of the list
    pub prev: u32,
    pub summaries: Vec<Summary>,
}

impl SummaryRecord {
    pub fn empty() -> Self {
        Self {
            next: 0,
            prev: 0,
            summaries: Vec::new(),
        }
    }

    pub fn decode(record: &Record, order: ByteOrder, nd: usize, ni: usize) -> Result<Self> {
        let mut control = &record[..8 * CONTROL_WORDS];
        let next = order.get_f64(&mut control);
        let prev = order.get_f64(&mut control);
        let nsum = order.get_f64(&mut control);

        let per_record = summaries_per_record(nd, ni);
        let valid = |v: f64| v >= 0.0 && v.fract() == 0.0 && v < u32::MAX as f64;
        if !valid(next) || !valid(prev) || !valid(nsum) || nsum as usize > per_record {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "corrupt summary record control words NEXT={} PREV={} NSUM={}",
                    next, prev, nsum
                ),
            ));
        }

        let size = 8 * summary_size(nd, ni);
        let summaries = (0..nsum as usize)
            .map(|i| {
                let start = 8 * CONTROL_WORDS + i * size;
                Summary::decode(order, nd, ni, &record[start..start + size])
            })
            .collect();

        Ok(Self {
            next: next as u32,
            prev: prev as u32,
            summaries,
        })
    }

    pub fn encode(&self, order: ByteOrder) -> Record {
        let mut record = [0u8; RECORD_LEN];
        let mut control = &mut record[..8 * CONTROL_WORDS];
        order.put_f64(&mut control, self.next as f64);
        order.put_f64(&mut control, self.prev as f64);
        order.put_f64(&mut control, self.summaries.len() as f64);

        let mut offset = 8 * CONTROL_WORDS;
        for summary in &self.summaries {
            let len = summary.packed_len();
            summary.encode(order, &mut record[offset..offset + len]);
            offset += len;
        }
        record
    }
}

/// Read name `slot` from a name record.
pub fn read_name(record: &Record, nd: usize, ni: usize, slot: usize) -> String {
    let nc = name_len(nd, ni);
    read_text(&record[slot * nc..(slot + 1) * nc])
}

/// Store `name` at `slot`, truncating to the name length.
pub fn write_name(record: &mut Record, nd: usize, ni: usize, slot: usize, name: &str) {
    let nc = name_len(nd, ni);
    write_text(&mut record[slot * nc..(slot + 1) * nc], name);
}

/// A name record with every slot blank
pub fn blank_name_record() -> Record {
    [b' '; RECORD_LEN]
}
