//! CK: spacecraft and instrument attitude kernels.
//!
//! Descriptor times are continuous spacecraft clock ticks. Writers take TDB
//! epochs and convert them through the instrument's [`TickClock`].
//!
//! [`TickClock`]: crate::time::TickClock

use std::collections::BTreeSet;

use serde::Serialize;

use segfile_daf::{Daf, DafSegment, DescriptorCodec, Summary};
use segfile_record::{ErrorKind, KernelError, Result};

use crate::daf_view::{check_increasing, epoch_directory};
use crate::time::{Et, Instrument, SclkDuration, Ticks, TimeSystem};
use crate::window::Window;

/// Words per type 2 pointing record: quaternion, angular velocity, rate
const TYPE02_RECORD: usize = 8;

/// Decoded CK segment descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CkDescriptor {
    pub instrument: i32,
    pub frame: i32,
    pub data_type: i32,
    pub has_angular_velocity: bool,
    pub start: Ticks,
    pub stop: Ticks,
    pub begin: i32,
    pub end: i32,
}

impl DescriptorCodec for CkDescriptor {
    const ND: usize = 2;
    const NI: usize = 6;

    fn to_summary(&self) -> Summary {
        Summary::new(
            vec![self.start, self.stop],
            vec![
                self.instrument,
                self.frame,
                self.data_type,
                i32::from(self.has_angular_velocity),
                self.begin,
                self.end,
            ],
        )
    }

    fn from_summary(summary: &Summary) -> Result<Self> {
        summary.check_dimensions(Self::ND, Self::NI)?;
        let (d, i) = (&summary.doubles, &summary.ints);
        Ok(Self {
            instrument: i[0],
            frame: i[1],
            data_type: i[2],
            has_angular_velocity: i[3] != 0,
            start: d[0],
            stop: d[1],
            begin: i[4],
            end: i[5],
        })
    }
}

/// What a new CK segment describes
#[derive(Debug, Clone, Copy)]
pub struct CkSegment<'a> {
    pub instrument: Instrument<'a>,
    pub frame: i32,
    pub first: Et,
    pub last: Et,
    pub name: &'a str,
}

impl CkSegment<'_> {
    fn descriptor(&self, data_type: i32, has_angular_velocity: bool) -> Result<CkDescriptor> {
        let clock = self.instrument.clock;
        Ok(CkDescriptor {
            instrument: self.instrument.id,
            frame: self.frame,
            data_type,
            has_angular_velocity,
            start: clock.to_ticks(self.first)?,
            stop: clock.to_ticks(self.last)?,
            begin: 0,
            end: 0,
        })
    }

    fn ticks(&self, times: &[Et]) -> Result<Vec<Ticks>> {
        times
            .iter()
            .map(|&t| self.instrument.clock.to_ticks(t))
            .collect()
    }
}

/// Type 2 input: constant angular velocity over each interval
#[derive(Debug, Clone, Copy)]
pub struct CkType02Records<'a> {
    pub starts: &'a [Et],
    pub stops: &'a [Et],
    pub quaternions: &'a [[f64; 4]],
    pub angular_velocities: &'a [[f64; 3]],
    /// Seconds per tick over each interval
    pub rates: &'a [f64],
}

/// Type 3 input: discrete pointing, linearly interpolated
#[derive(Debug, Clone, Copy)]
pub struct CkType03Records<'a> {
    pub tags: &'a [Et],
    pub quaternions: &'a [[f64; 4]],
    /// Present when the segment carries angular velocity
    pub angular_velocities: Option<&'a [[f64; 3]]>,
    /// Start of each interpolation interval; each must equal one of `tags`
    pub interval_starts: &'a [Et],
}

/// Granularity of a CK coverage window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverageLevel {
    /// One interval per segment, from its descriptor bounds
    Segment,
    /// One interval per interpolation interval inside each segment
    Interval,
}

/// Parameters of a CK coverage query
#[derive(Debug, Clone, Copy)]
pub struct CkCoverageOptions {
    /// Only count segments that carry angular velocity
    pub need_av: bool,
    pub level: CoverageLevel,
    /// Each interval is widened by this much on both sides
    pub tolerance: SclkDuration,
    pub time_system: TimeSystem,
}

impl CkCoverageOptions {
    /// Segment level, no tolerance, ticks.
    pub fn segment_level(instrument: &Instrument<'_>) -> Self {
        Self {
            need_av: false,
            level: CoverageLevel::Segment,
            tolerance: SclkDuration::zero(instrument.clock),
            time_system: TimeSystem::Sclk,
        }
    }
}

fn length_mismatch(what: &str, got: usize, expected: usize) -> KernelError {
    KernelError::new(
        ErrorKind::InvalidArraySize,
        format!("{} has {} entries; expected {}", what, got, expected),
    )
}

/// Number of type 2 records in a segment of `len` words.
fn type02_record_count(len: usize) -> Result<usize> {
    let mut n = len / (TYPE02_RECORD + 2);
    while n > 0 {
        let size = (TYPE02_RECORD + 2) * n + (n - 1) / 100;
        if size == len {
            return Ok(n);
        }
        if size < len {
            break;
        }
        n -= 1;
    }
    Err(KernelError::new(
        ErrorKind::InvalidFormat,
        format!("{} words do not form a type 2 segment", len),
    ))
}

/// Interpolation intervals of a type 2 segment, in ticks
fn type02_intervals(data: &[f64]) -> Result<Vec<(Ticks, Ticks)>> {
    let n = type02_record_count(data.len())?;
    let starts = &data[TYPE02_RECORD * n..(TYPE02_RECORD + 1) * n];
    let stops = &data[(TYPE02_RECORD + 1) * n..(TYPE02_RECORD + 2) * n];
    Ok(starts.iter().copied().zip(stops.iter().copied()).collect())
}

/// Interpolation intervals of a type 3 segment, in ticks
fn type03_intervals(data: &[f64], has_av: bool) -> Result<Vec<(Ticks, Ticks)>> {
    let corrupt = || KernelError::new(ErrorKind::InvalidFormat, "malformed type 3 segment");
    let len = data.len();
    if len < 2 {
        return Err(corrupt());
    }
    let n = data[len - 1] as usize;
    let nints = data[len - 2] as usize;
    let record = if has_av { 7 } else { 4 };
    let tags_at = record * n;
    let starts_at = tags_at + n + n.saturating_sub(1) / 100;
    if n == 0 || nints == 0 || starts_at + nints > len {
        return Err(corrupt());
    }
    let tags = &data[tags_at..tags_at + n];
    let starts = &data[starts_at..starts_at + nints];

    let mut intervals = Vec::with_capacity(nints);
    for (i, &start) in starts.iter().enumerate() {
        let end = match starts.get(i + 1) {
            Some(&next) => {
                let before = tags.partition_point(|&t| t < next);
                tags[before.saturating_sub(1)]
            }
            None => tags[n - 1],
        };
        intervals.push((start, end.max(start)));
    }
    Ok(intervals)
}

/// A CK file
#[derive(Debug)]
pub struct Ck {
    daf: Daf,
}

daf_view!(Ck, "CK", CkDescriptor);

impl Ck {
    /// Write a type 2 segment.
    ///
    /// Record `i` holds constant angular velocity over `[starts[i], stops[i]]`.
    pub fn write_type02(
        &mut self,
        segment: &CkSegment<'_>,
        records: &CkType02Records<'_>,
    ) -> Result<DafSegment> {
        let n = records.starts.len();
        if n == 0 {
            return Err(length_mismatch("interval starts", 0, 1));
        }
        for (what, got) in [
            ("interval stops", records.stops.len()),
            ("quaternions", records.quaternions.len()),
            ("angular velocities", records.angular_velocities.len()),
            ("rates", records.rates.len()),
        ] {
            if got != n {
                return Err(length_mismatch(what, got, n));
            }
        }
        if let Some(rate) = records.rates.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("clock rate must be positive, got {}", rate),
            ));
        }
        check_increasing("interval starts", records.starts)?;
        for i in 0..n {
            let ends_before_next = records.starts.get(i + 1).map_or(true, |&next| records.stops[i] <= next);
            if records.stops[i] < records.starts[i] || !ends_before_next {
                return Err(KernelError::new(
                    ErrorKind::InvalidValue,
                    format!(
                        "interval {} [{}, {}] is reversed or overlaps its successor",
                        i, records.starts[i], records.stops[i]
                    ),
                ));
            }
        }

        let descriptor = segment.descriptor(2, true)?;
        let starts = segment.ticks(records.starts)?;
        let stops = segment.ticks(records.stops)?;

        let mut data = Vec::with_capacity((TYPE02_RECORD + 2) * n + n / 100);
        for i in 0..n {
            data.extend_from_slice(&records.quaternions[i]);
            data.extend_from_slice(&records.angular_velocities[i]);
            data.push(records.rates[i]);
        }
        data.extend_from_slice(&starts);
        data.extend_from_slice(&stops);
        data.extend(epoch_directory(&starts));
        self.append(&descriptor, segment.name, &data)
    }

    /// Write a type 3 segment.
    pub fn write_type03(
        &mut self,
        segment: &CkSegment<'_>,
        records: &CkType03Records<'_>,
    ) -> Result<DafSegment> {
        let n = records.tags.len();
        if n == 0 {
            return Err(length_mismatch("time tags", 0, 1));
        }
        if records.quaternions.len() != n {
            return Err(length_mismatch("quaternions", records.quaternions.len(), n));
        }
        if let Some(av) = records.angular_velocities {
            if av.len() != n {
                return Err(length_mismatch("angular velocities", av.len(), n));
            }
        }
        check_increasing("time tags", records.tags)?;
        check_increasing("interval starts", records.interval_starts)?;
        match records.interval_starts.first() {
            Some(&first) if first == records.tags[0] => {}
            _ => {
                return Err(KernelError::new(
                    ErrorKind::InvalidValue,
                    "the first interval must start at the first time tag",
                ))
            }
        }
        if let Some(start) = records
            .interval_starts
            .iter()
            .find(|&&s| records.tags.binary_search_by(|t| t.total_cmp(&s)).is_err())
        {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("interval start {} is not one of the time tags", start),
            ));
        }
        if !records.tags.iter().any(|&t| segment.first <= t && t <= segment.last) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "no time tag falls within the segment bounds [{}, {}]",
                    segment.first, segment.last
                ),
            ));
        }

        let has_av = records.angular_velocities.is_some();
        let descriptor = segment.descriptor(3, has_av)?;
        let tags = segment.ticks(records.tags)?;
        let starts = segment.ticks(records.interval_starts)?;

        let record = if has_av { 7 } else { 4 };
        let mut data = Vec::with_capacity((record + 1) * n + starts.len() + n / 50 + 2);
        for i in 0..n {
            data.extend_from_slice(&records.quaternions[i]);
            if let Some(av) = records.angular_velocities {
                data.extend_from_slice(&av[i]);
            }
        }
        data.extend_from_slice(&tags);
        data.extend(epoch_directory(&tags));
        data.extend_from_slice(&starts);
        data.extend(epoch_directory(&starts));
        data.extend_from_slice(&[starts.len() as f64, n as f64]);
        self.append(&descriptor, segment.name, &data)
    }

    /// Instruments with at least one segment. Empty for an empty file.
    pub fn instruments(&self) -> Result<BTreeSet<i32>> {
        let mut ids = BTreeSet::new();
        self.instruments_into(&mut ids)?;
        Ok(ids)
    }

    pub fn instruments_into(&self, ids: &mut BTreeSet<i32>) -> Result<()> {
        for (_, descriptor) in self.descriptors()? {
            ids.insert(descriptor.instrument);
        }
        Ok(())
    }

    /// Coverage of `instrument` in this file.
    pub fn coverage(
        &self,
        instrument: &Instrument<'_>,
        options: &CkCoverageOptions,
    ) -> Result<Window> {
        let mut window = Window::new();
        self.coverage_into(instrument, options, &mut window)?;
        Ok(window)
    }

    /// Merge the coverage of `instrument` into an existing window.
    ///
    /// The window must already be in `options.time_system`.
    pub fn coverage_into(
        &self,
        instrument: &Instrument<'_>,
        options: &CkCoverageOptions,
        window: &mut Window,
    ) -> Result<()> {
        let clock = instrument.clock;
        if options.tolerance.clock_id != clock.clock_id() {
            return Err(KernelError::new(
                ErrorKind::ClockMismatch,
                format!(
                    "instrument {} uses clock {} but the tolerance is measured on clock {}",
                    instrument.id,
                    clock.clock_id(),
                    options.tolerance.clock_id
                ),
            ));
        }
        let tol = options.tolerance.ticks;
        if !(tol.is_finite() && tol >= 0.0) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("coverage tolerance must be non-negative, got {}", tol),
            ));
        }

        for (segment, descriptor) in self.descriptors()? {
            if descriptor.instrument != instrument.id
                || (options.need_av && !descriptor.has_angular_velocity)
            {
                continue;
            }
            let intervals = match (options.level, descriptor.data_type) {
                (CoverageLevel::Segment, _) => vec![(descriptor.start, descriptor.stop)],
                (CoverageLevel::Interval, 2) => type02_intervals(&self.segment_data(&segment)?)?,
                (CoverageLevel::Interval, 3) => type03_intervals(
                    &self.segment_data(&segment)?,
                    descriptor.has_angular_velocity,
                )?,
                (CoverageLevel::Interval, other) => {
                    return Err(KernelError::new(
                        ErrorKind::UnsupportedType,
                        format!("interval coverage is not available for CK type {}", other),
                    ))
                }
            };

            for (left, right) in intervals {
                let left = left.max(descriptor.start);
                let right = right.min(descriptor.stop);
                if left > right {
                    continue;
                }
                let left = (left - tol).max(0.0);
                let right = right + tol;
                match options.time_system {
                    TimeSystem::Sclk => window.insert(left, right)?,
                    TimeSystem::Tdb => window.insert(clock.to_et(left)?, clock.to_et(right)?)?,
                }
            }
        }
        Ok(())
    }
}
