//! SPK: ephemeris kernels.
//!
//! Descriptors hold the segment time bounds as two doubles and
//! `[body, center, frame, type, begin, end]` as integers.

use std::collections::BTreeSet;

use serde::Serialize;

use segfile_daf::{Daf, DafSegment, DescriptorCodec, Summary};
use segfile_record::{ErrorKind, KernelError, Result};

use crate::chebyshev::ChebyshevSeries;
use crate::daf_view::{check_increasing, epoch_directory};
use crate::time::Et;
use crate::window::Window;

/// Highest Lagrange or Hermite interpolation degree for types 9 and 13
pub const MAX_INTERPOLATION_DEGREE: usize = 27;

/// Decoded SPK segment descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpkDescriptor {
    pub body: i32,
    pub center: i32,
    pub frame: i32,
    pub data_type: i32,
    pub start: Et,
    pub stop: Et,
    /// Data addresses, filled in when the segment is written
    pub begin: i32,
    pub end: i32,
}

impl DescriptorCodec for SpkDescriptor {
    const ND: usize = 2;
    const NI: usize = 6;

    fn to_summary(&self) -> Summary {
        Summary::new(
            vec![self.start, self.stop],
            vec![
                self.body,
                self.center,
                self.frame,
                self.data_type,
                self.begin,
                self.end,
            ],
        )
    }

    fn from_summary(summary: &Summary) -> Result<Self> {
        summary.check_dimensions(Self::ND, Self::NI)?;
        let (d, i) = (&summary.doubles, &summary.ints);
        Ok(Self {
            body: i[0],
            center: i[1],
            frame: i[2],
            data_type: i[3],
            start: d[0],
            stop: d[1],
            begin: i[4],
            end: i[5],
        })
    }
}

/// What a new SPK segment describes
#[derive(Debug, Clone, Copy)]
pub struct SpkSegment<'a> {
    pub body: i32,
    pub center: i32,
    pub frame: i32,
    pub start: Et,
    pub stop: Et,
    pub name: &'a str,
}

impl SpkSegment<'_> {
    fn descriptor(&self, data_type: i32) -> Result<SpkDescriptor> {
        if self.body == self.center {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("body {} cannot be its own center", self.body),
            ));
        }
        Ok(SpkDescriptor {
            body: self.body,
            center: self.center,
            frame: self.frame,
            data_type,
            start: self.start,
            stop: self.stop,
            begin: 0,
            end: 0,
        })
    }

    /// The segment bounds must lie within the epochs of discrete states.
    fn check_epoch_coverage(&self, epochs: &[Et]) -> Result<()> {
        check_increasing("epochs", epochs)?;
        match (epochs.first(), epochs.last()) {
            (Some(&first), Some(&last)) if first <= self.start && self.stop <= last => Ok(()),
            (Some(&first), Some(&last)) => Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "segment bounds [{}, {}] are not covered by epochs [{}, {}]",
                    self.start, self.stop, first, last
                ),
            )),
            _ => Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                "a segment needs at least one state",
            )),
        }
    }
}

fn check_state_count(states: &[[f64; 6]], epochs: &[Et]) -> Result<()> {
    if states.len() != epochs.len() {
        return Err(KernelError::new(
            ErrorKind::InvalidArraySize,
            format!("{} states but {} epochs", states.len(), epochs.len()),
        ));
    }
    Ok(())
}

/// States, epochs and the epoch directory, the common body of types 5, 9, 13
fn discrete_states(states: &[[f64; 6]], epochs: &[Et]) -> Vec<f64> {
    let mut data = Vec::with_capacity(7 * states.len() + states.len() / 100 + 2);
    data.extend(states.iter().flatten());
    data.extend_from_slice(epochs);
    data.extend(epoch_directory(epochs));
    data
}

/// An SPK file
#[derive(Debug)]
pub struct Spk {
    daf: Daf,
}

daf_view!(Spk, "SPK", SpkDescriptor);

impl Spk {
    /// Write a type 2 segment: Chebyshev position coefficients.
    pub fn write_type02(
        &mut self,
        segment: &SpkSegment<'_>,
        series: &ChebyshevSeries<'_>,
    ) -> Result<DafSegment> {
        let descriptor = segment.descriptor(2)?;
        let data = series.pack(3)?;
        self.append(&descriptor, segment.name, &data)
    }

    /// Write a type 3 segment: Chebyshev position and velocity coefficients.
    pub fn write_type03(
        &mut self,
        segment: &SpkSegment<'_>,
        series: &ChebyshevSeries<'_>,
    ) -> Result<DafSegment> {
        let descriptor = segment.descriptor(3)?;
        let data = series.pack(6)?;
        self.append(&descriptor, segment.name, &data)
    }

    /// Write a type 5 segment: discrete states propagated as two-body
    /// motion about a center of gravitational parameter `gm`.
    pub fn write_type05(
        &mut self,
        segment: &SpkSegment<'_>,
        gm: f64,
        states: &[[f64; 6]],
        epochs: &[Et],
    ) -> Result<DafSegment> {
        if !(gm.is_finite() && gm > 0.0) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("gravitational parameter must be positive, got {}", gm),
            ));
        }
        check_state_count(states, epochs)?;
        segment.check_epoch_coverage(epochs)?;

        let descriptor = segment.descriptor(5)?;
        let mut data = discrete_states(states, epochs);
        data.extend_from_slice(&[gm, states.len() as f64]);
        self.append(&descriptor, segment.name, &data)
    }

    /// Write a type 9 segment: unequally spaced states, Lagrange interpolation.
    pub fn write_type09(
        &mut self,
        segment: &SpkSegment<'_>,
        degree: usize,
        states: &[[f64; 6]],
        epochs: &[Et],
    ) -> Result<DafSegment> {
        if degree == 0 || degree > MAX_INTERPOLATION_DEGREE {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "interpolation degree must be in 1..={}, got {}",
                    MAX_INTERPOLATION_DEGREE, degree
                ),
            ));
        }
        self.write_interpolated(segment, 9, degree + 1, degree, states, epochs)
    }

    /// Write a type 13 segment: unequally spaced states, Hermite
    /// interpolation. The degree must be odd.
    pub fn write_type13(
        &mut self,
        segment: &SpkSegment<'_>,
        degree: usize,
        states: &[[f64; 6]],
        epochs: &[Et],
    ) -> Result<DafSegment> {
        if degree % 2 == 0 || degree > MAX_INTERPOLATION_DEGREE {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!(
                    "Hermite degree must be odd and at most {}, got {}",
                    MAX_INTERPOLATION_DEGREE, degree
                ),
            ));
        }
        let window = (degree + 1) / 2;
        self.write_interpolated(segment, 13, window, window - 1, states, epochs)
    }

    fn write_interpolated(
        &mut self,
        segment: &SpkSegment<'_>,
        data_type: i32,
        window: usize,
        trailer: usize,
        states: &[[f64; 6]],
        epochs: &[Et],
    ) -> Result<DafSegment> {
        check_state_count(states, epochs)?;
        if states.len() < window {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!(
                    "type {} segment needs at least {} states, got {}",
                    data_type,
                    window,
                    states.len()
                ),
            ));
        }
        segment.check_epoch_coverage(epochs)?;

        let descriptor = segment.descriptor(data_type)?;
        let mut data = discrete_states(states, epochs);
        data.extend_from_slice(&[trailer as f64, states.len() as f64]);
        self.append(&descriptor, segment.name, &data)
    }

    /// Bodies with at least one segment. Empty for an empty file.
    pub fn bodies(&self) -> Result<BTreeSet<i32>> {
        let mut ids = BTreeSet::new();
        self.bodies_into(&mut ids)?;
        Ok(ids)
    }

    /// Add the bodies of this file to `ids`.
    pub fn bodies_into(&self, ids: &mut BTreeSet<i32>) -> Result<()> {
        for (_, descriptor) in self.descriptors()? {
            ids.insert(descriptor.body);
        }
        Ok(())
    }

    /// Union of the segment time bounds for `body`.
    pub fn coverage(&self, body: i32) -> Result<Window> {
        let mut window = Window::new();
        self.coverage_into(body, &mut window)?;
        Ok(window)
    }

    /// Merge the coverage of `body` into an existing window.
    pub fn coverage_into(&self, body: i32, window: &mut Window) -> Result<()> {
        for (_, descriptor) in self.descriptors()? {
            if descriptor.body == body {
                window.insert(descriptor.start, descriptor.stop)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segment(body: i32, start: Et, stop: Et) -> SpkSegment<'static> {
        SpkSegment {
            body,
            center: 10,
            frame: 1,
            start,
            stop,
            name: "TEST",
        }
    }

    #[test]
    fn test_descriptor_codec() {
        let descriptor = SpkDescriptor {
            body: 399,
            center: 3,
            frame: 1,
            data_type: 2,
            start: -1.0e6,
            stop: 1.0e6,
            begin: 641,
            end: 1280,
        };
        let summary = descriptor.to_summary();
        assert_eq!(summary.ints, vec![399, 3, 1, 2, 641, 1280]);
        assert_eq!(SpkDescriptor::from_summary(&summary).unwrap(), descriptor);

        let short = Summary::new(vec![0.0], vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            SpkDescriptor::from_summary(&short).unwrap_err().kind(),
            ErrorKind::InvalidArraySize
        );
    }

    #[test]
    fn test_type05_layout() {
        let temp = TempDir::new().unwrap();
        let mut spk = Spk::create(temp.path().join("t5.bsp"), "T5", 0).unwrap();

        let epochs: Vec<f64> = (0..150).map(|i| i as f64 * 60.0).collect();
        let states: Vec<[f64; 6]> = epochs.iter().map(|&t| [t, 0.0, 0.0, 1.0, 0.0, 0.0]).collect();
        let written = spk
            .write_type05(&segment(-5, 0.0, 8940.0), 398600.4, &states, &epochs)
            .unwrap();

        let data = spk.segment_data(&written).unwrap();
        assert_eq!(data.len(), 150 * 7 + 1 + 2);
        assert_eq!(data[6], 60.0);
        assert_eq!(data[900], 0.0);
        assert_eq!(data[1050], 99.0 * 60.0);
        assert_eq!(&data[1051..], &[398600.4, 150.0]);
    }

    #[test]
    fn test_type13_trailer_and_degree() {
        let temp = TempDir::new().unwrap();
        let mut spk = Spk::create(temp.path().join("t13.bsp"), "T13", 0).unwrap();
        let epochs = [0.0, 1.0, 2.0, 3.0];
        let states = [[0.0; 6]; 4];

        assert_eq!(
            spk.write_type13(&segment(-5, 0.0, 3.0), 4, &states, &epochs)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidValue
        );
        let written = spk
            .write_type13(&segment(-5, 0.0, 3.0), 3, &states, &epochs)
            .unwrap();
        let data = spk.segment_data(&written).unwrap();
        assert_eq!(&data[data.len() - 2..], &[1.0, 4.0]);
    }

    #[test]
    fn test_type09_validation() {
        let temp = TempDir::new().unwrap();
        let mut spk = Spk::create(temp.path().join("t9.bsp"), "T9", 0).unwrap();
        let states = [[0.0; 6]; 3];

        let unordered = [0.0, 2.0, 1.0];
        assert_eq!(
            spk.write_type09(&segment(-5, 0.0, 1.0), 2, &states, &unordered)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidValue
        );
        let epochs = [0.0, 1.0, 2.0];
        assert_eq!(
            spk.write_type09(&segment(-5, 0.0, 1.0), 3, &states, &epochs)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArraySize
        );
        assert_eq!(
            spk.write_type09(&segment(-5, -1.0, 1.0), 2, &states, &epochs)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidValue
        );
        assert!(spk.write_type09(&segment(-5, 0.0, 2.0), 2, &states, &epochs).is_ok());
        assert_eq!(spk.count_segments().unwrap(), 1);
    }

    #[test]
    fn test_long_segment_name_rejected() {
        let temp = TempDir::new().unwrap();
        let mut spk = Spk::create(temp.path().join("name.bsp"), "NAME", 0).unwrap();
        let coefficients = [0.0; 6];
        let series = ChebyshevSeries {
            first: 0.0,
            interval_length: 10.0,
            degree: 1,
            coefficients: &coefficients,
        };
        let long = "N".repeat(41);
        let mut named = segment(301, 0.0, 10.0);
        named.name = &long;
        assert_eq!(
            spk.write_type02(&named, &series).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
    }
}
