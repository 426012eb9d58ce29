//! Segment data: appending new segments, reading data ranges and shifting
//! the directory when the comment area changes size.

use tracing::instrument;

use segfile_config::{log_daf_debug, log_daf_warn};
use segfile_record::format::check_printable;
use segfile_record::{Access, ErrorKind, KernelError, Result, RECORD_LEN};

use crate::summary::{self, Summary, SummaryRecord};
use crate::{Daf, DafSegment, DOUBLES_PER_RECORD};

/// Record holding double precision address `address`
fn record_of(address: u32) -> u32 {
    (address - 1) / DOUBLES_PER_RECORD + 1
}

impl Daf {
    /// Append one segment: `data` is written at the first free address,
    /// the begin/end addresses are stored in the last two summary integers,
    /// and the summary and name join the end of the directory.
    #[instrument(level = "debug", skip(self, summary, data), fields(len = data.len()))]
    pub fn append_segment(&mut self, summary: &Summary, name: &str, data: &[f64]) -> Result<DafSegment> {
        self.check_access(Access::Write)?;
        summary.check_dimensions(self.record.nd, self.record.ni)?;
        check_printable("segment name", name)?;
        if data.is_empty() {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                "a segment must contain at least one data element",
            ));
        }
        let nc = summary::name_len(self.record.nd, self.record.ni);
        if name.len() > nc {
            log_daf_warn!("Segment name truncated", len = name.len(), max = nc);
        }

        let begin = self.record.free;
        let end = begin + data.len() as u32 - 1;
        self.write_data(begin, data)?;

        let mut summary = summary.clone();
        summary.set_addresses(begin as i32, end as i32);

        let last = self.record.bward;
        let mut tail = self.read_summary_record(last)?;
        let per_record = summary::summaries_per_record(self.record.nd, self.record.ni);

        let segment = if tail.summaries.len() < per_record {
            let slot = tail.summaries.len();
            tail.summaries.push(summary.clone());
            self.write_summary_record(last, &tail)?;
            let mut names = self.store.read_record(last + 1)?;
            summary::write_name(&mut names, self.record.nd, self.record.ni, slot, name);
            self.store.write_record(last + 1, &names)?;
            self.record.free = end + 1;
            DafSegment {
                record: last,
                slot,
                summary,
            }
        } else {
            // new summary/name pair right after the data just written
            let number = record_of(end) + 1;
            let fresh = SummaryRecord {
                next: 0,
                prev: last,
                summaries: vec![summary.clone()],
            };
            self.write_summary_record(number, &fresh)?;
            let mut names = summary::blank_name_record();
            summary::write_name(&mut names, self.record.nd, self.record.ni, 0, name);
            self.store.write_record(number + 1, &names)?;

            tail.next = number;
            self.write_summary_record(last, &tail)?;
            self.record.bward = number;
            self.record.free = (number + 1) * DOUBLES_PER_RECORD + 1;
            log_daf_debug!("Added summary record", record = number, prev = last);
            DafSegment {
                record: number,
                slot: 0,
                summary,
            }
        };

        self.write_file_record()?;
        log_daf_debug!("Appended segment", begin = begin, end = end);
        Ok(segment)
    }

    /// Read the doubles at addresses `begin..=end`.
    pub fn read_data(&self, begin: u32, end: u32) -> Result<Vec<f64>> {
        self.check_access(Access::Read)?;
        if begin == 0 || end < begin || end >= self.record.free {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "address range {}..={} is outside the data area (free address {})",
                    begin, end, self.record.free
                ),
            ));
        }
        let order = self.record.byte_order;
        let mut values = Vec::with_capacity((end - begin + 1) as usize);
        let mut address = begin;
        while address <= end {
            let number = record_of(address);
            let record = self.store.read_record(number)?;
            let first = (address - 1) % DOUBLES_PER_RECORD;
            let last = if record_of(end) == number {
                (end - 1) % DOUBLES_PER_RECORD
            } else {
                DOUBLES_PER_RECORD - 1
            };
            let mut buf = &record[first as usize * 8..(last as usize + 1) * 8];
            for _ in first..=last {
                values.push(order.get_f64(&mut buf));
            }
            address += last - first + 1;
        }
        Ok(values)
    }

    /// Read the data of one segment.
    pub fn segment_data(&self, segment: &DafSegment) -> Result<Vec<f64>> {
        let begin = segment.summary.begin_address();
        let end = segment.summary.end_address();
        if begin < 1 || end < begin {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("segment has invalid address range {}..={}", begin, end),
            ));
        }
        self.read_data(begin as u32, end as u32)
    }

    fn write_data(&mut self, begin: u32, data: &[f64]) -> Result<()> {
        let order = self.record.byte_order;
        let mut address = begin;
        let mut remaining = data;
        while !remaining.is_empty() {
            let number = record_of(address);
            let mut record = if number <= self.store.record_count() {
                self.store.read_record(number)?
            } else {
                [0u8; RECORD_LEN]
            };
            let first = ((address - 1) % DOUBLES_PER_RECORD) as usize;
            let count = remaining.len().min(DOUBLES_PER_RECORD as usize - first);
            let mut buf = &mut record[first * 8..(first + count) * 8];
            for &value in &remaining[..count] {
                order.put_f64(&mut buf, value);
            }
            self.store.write_record(number, &record)?;
            remaining = &remaining[count..];
            address += count as u32;
        }
        Ok(())
    }

    /// Move every record from the first summary record onward by `delta`
    /// records, then fix the directory pointers and data addresses.
    pub(crate) fn shift_directory(&mut self, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let first = self.record.fward;
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

        let word_delta = delta * DOUBLES_PER_RECORD as i32;
        let mut number = moved(first);
        while number != 0 {
            let mut record = self.read_summary_record(number)?;
            if record.next != 0 {
                record.next = moved(record.next);
            }
            if record.prev != 0 {
                record.prev = moved(record.prev);
            }
            for summary in &mut record.summaries {
                let begin = summary.begin_address() + word_delta;
                let end = summary.end_address() + word_delta;
                summary.set_addresses(begin, end);
            }
            self.write_summary_record(number, &record)?;
            number = record.next;
        }

        self.record.fward = moved(self.record.fward);
        self.record.bward = moved(self.record.bward);
        self.record.free = (self.record.free as i64 + word_delta as i64) as u32;
        self.write_file_record()?;
        log_daf_debug!("Shifted directory", delta = delta, first = moved(first));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_of() {
        assert_eq!(record_of(1), 1);
        assert_eq!(record_of(128), 1);
        assert_eq!(record_of(129), 2);
    }

    #[test]
    fn test_data_spanning_records() {
        let temp = TempDir::new().unwrap();
        let mut daf = Daf::create(temp.path().join("span.bsp"), "SPAN", 2, 6, 0, "SPK").unwrap();
        let data: Vec<f64> = (0..300).map(|i| i as f64 * 0.5).collect();
        let summary = Summary::new(vec![0.0, 1.0], vec![1, 0, 1, 2, 0, 0]);
        let segment = daf.append_segment(&summary, "long", &data).unwrap();

        assert_eq!(segment.summary.begin_address(), 3 * 128 + 1);
        assert_eq!(segment.summary.end_address(), 3 * 128 + 300);
        assert_eq!(daf.segment_data(&segment).unwrap(), data);
        assert_eq!(daf.read_data(3 * 128 + 128, 3 * 128 + 130).unwrap(), vec![63.5, 64.0, 64.5]);
        assert!(daf.read_data(3 * 128 + 1, 3 * 128 + 301).is_err());
    }

    #[test]
    fn test_empty_data_rejected() {
        let temp = TempDir::new().unwrap();
        let mut daf = Daf::create(temp.path().join("empty.bsp"), "E", 2, 6, 0, "SPK").unwrap();
        let summary = Summary::new(vec![0.0, 1.0], vec![1, 0, 1, 2, 0, 0]);
        let err = daf.append_segment(&summary, "none", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArraySize);
    }

    #[test]
    fn test_wrong_summary_size_rejected() {
        let temp = TempDir::new().unwrap();
        let mut daf = Daf::create(temp.path().join("size.bpc"), "S", 2, 5, 0, "PCK").unwrap();
        let summary = Summary::new(vec![0.0, 1.0], vec![1, 0, 1, 2, 0, 0]);
        let err = daf.append_segment(&summary, "x", &[1.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArraySize);
    }
}
