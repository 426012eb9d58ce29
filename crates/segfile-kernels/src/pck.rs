//! Binary PCK: body orientation kernels.
//!
//! Descriptors hold the time bounds as two doubles and
//! `[class_id, frame, type, begin, end]` as integers, where `class_id` is
//! the frame class id of the oriented body frame and `frame` the base frame.

use std::collections::BTreeSet;

use serde::Serialize;

use segfile_daf::{Daf, DafSegment, DescriptorCodec, Summary};
use segfile_record::Result;

use crate::chebyshev::ChebyshevSeries;
use crate::time::Et;
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PckDescriptor {
    pub class_id: i32,
    pub frame: i32,
    pub data_type: i32,
    pub start: Et,
    pub stop: Et,
    pub begin: i32,
    pub end: i32,
}

impl DescriptorCodec for PckDescriptor {
    const ND: usize = 2;
    const NI: usize = 5;

    fn to_summary(&self) -> Summary {
        Summary::new(
            vec![self.start, self.stop],
            vec![self.class_id, self.frame, self.data_type, self.begin, self.end],
        )
    }

    fn from_summary(summary: &Summary) -> Result<Self> {
        summary.check_dimensions(Self::ND, Self::NI)?;
        let (d, i) = (&summary.doubles, &summary.ints);
        Ok(Self {
            class_id: i[0],
            frame: i[1],
            data_type: i[2],
            start: d[0],
            stop: d[1],
            begin: i[3],
            end: i[4],
        })
    }
}

/// What a new PCK segment describes
#[derive(Debug, Clone, Copy)]
pub struct PckSegment<'a> {
    pub class_id: i32,
    pub frame: i32,
    pub start: Et,
    pub stop: Et,
    pub name: &'a str,
}

#[derive(Debug)]
pub struct Pck {
    daf: Daf,
}

daf_view!(Pck, "PCK", PckDescriptor);

impl Pck {
    /// Write a type 2 segment: Chebyshev coefficients for the three Euler
    /// angles of the body frame.
    pub fn write_type02(
        &mut self,
        segment: &PckSegment<'_>,
        series: &ChebyshevSeries<'_>,
    ) -> Result<DafSegment> {
        let descriptor = PckDescriptor {
            class_id: segment.class_id,
            frame: segment.frame,
            data_type: 2,
            start: segment.start,
            stop: segment.stop,
            begin: 0,
            end: 0,
        };
        let data = series.pack(3)?;
        self.append(&descriptor, segment.name, &data)
    }

    /// Frame class ids with at least one segment. Empty for an empty file.
    pub fn frame_class_ids(&self) -> Result<BTreeSet<i32>> {
        let mut ids = BTreeSet::new();
        for (_, descriptor) in self.descriptors()? {
            ids.insert(descriptor.class_id);
        }
        Ok(ids)
    }

    /// Union of the segment time bounds for `class_id`.
    pub fn coverage(&self, class_id: i32) -> Result<Window> {
        let mut window = Window::new();
        self.coverage_into(class_id, &mut window)?;
        Ok(window)
    }

    pub fn coverage_into(&self, class_id: i32, window: &mut Window) -> Result<()> {
        for (_, descriptor) in self.descriptors()? {
            if descriptor.class_id == class_id {
                window.insert(descriptor.start, descriptor.stop)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segfile_record::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_descriptor_codec() {
        let descriptor = PckDescriptor {
            class_id: 31006,
            frame: 17,
            data_type: 2,
            start: 0.0,
            stop: 86400.0,
            begin: 513,
            end: 900,
        };
        let summary = descriptor.to_summary();
        assert_eq!(summary.ints.len(), 5);
        assert_eq!(PckDescriptor::from_summary(&summary).unwrap(), descriptor);
    }

    #[test]
    fn test_type02_coverage() {
        let temp = TempDir::new().unwrap();
        let mut pck = Pck::create(temp.path().join("moon.bpc"), "MOON", 0).unwrap();
        let coefficients = vec![0.5; 3 * 4 * 3];
        let series = ChebyshevSeries {
            first: 0.0,
            interval_length: 100.0,
            degree: 3,
            coefficients: &coefficients,
        };
        let segment = PckSegment {
            class_id: 31006,
            frame: 17,
            start: 0.0,
            stop: 300.0,
            name: "MOON_ME",
        };
        pck.write_type02(&segment, &series).unwrap();

        assert_eq!(pck.frame_class_ids().unwrap().into_iter().collect::<Vec<_>>(), vec![31006]);
        assert_eq!(pck.coverage(31006).unwrap().intervals(), &[(0.0, 300.0)]);
        assert!(pck.coverage(31007).unwrap().is_empty());

        let reversed = PckSegment { start: 300.0, stop: 0.0, ..segment };
        assert_eq!(
            pck.write_type02(&reversed, &series).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
    }
}
