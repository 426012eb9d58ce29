//! DSK: shape kernels stored as DLA segments.
//!
//! Every segment starts its double component with a 24-element descriptor:
//!
//! ```text
//! SRF CTR CLS TYP FRM SYS PARAMS(10) MN1 MX1 MN2 MX2 MN3 MX3 BTM ETM
//! ```
//!
//! Coordinates in the bounds follow the segment's coordinate system:
//! latitudinal (lon, lat, radius), cylindrical (radius, lon, z),
//! rectangular (x, y, z) or planetodetic (lon, lat, altitude).

use std::collections::BTreeSet;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use serde::Serialize;
use tracing::instrument;

use segfile_config::{log_kernel_debug, log_kernel_info, ToleranceConfig, ToleranceKey};
use segfile_das::{Dla, DlaDescriptor};
use segfile_record::{
    Architecture, CommentStore, ErrorKind, KernelError, Result, SegmentDirectory,
};

use crate::dsk02::{Dsk02Segment, DOUBLE_HEADER_LEN, INT_HEADER_LEN, IX_NP, IX_NV};
use crate::time::Et;

/// Doubles in a DSK descriptor
pub const DESCRIPTOR_LEN: usize = 24;

/// Coordinate system parameters per descriptor
pub const PARAMETER_COUNT: usize = 10;

const IX_SURFACE: usize = 0;
const IX_CENTER: usize = 1;
const IX_CLASS: usize = 2;
const IX_TYPE: usize = 3;
const IX_FRAME: usize = 4;
const IX_SYSTEM: usize = 5;
const IX_PARAMS: usize = 6;
const IX_BOUNDS: usize = IX_PARAMS + PARAMETER_COUNT;
const IX_START: usize = IX_BOUNDS + 6;
const IX_STOP: usize = IX_START + 1;

fn unknown_code(what: &str, code: f64) -> KernelError {
    KernelError::new(
        ErrorKind::InvalidValue,
        format!("unknown {} code {}", what, code),
    )
}

/// Topology of the surface a segment describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataClass {
    /// Each ray from the center meets the surface once
    SingleValued,
    /// Arbitrary closed or open surfaces
    General,
}

impl DataClass {
    pub fn code(self) -> i32 {
        match self {
            DataClass::SingleValued => 1,
            DataClass::General => 2,
        }
    }

    pub fn from_code(code: f64) -> Result<Self> {
        match code as i32 {
            1 if code == 1.0 => Ok(DataClass::SingleValued),
            2 if code == 2.0 => Ok(DataClass::General),
            _ => Err(unknown_code("data class", code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinateSystem {
    Latitudinal,
    Cylindrical,
    Rectangular,
    /// Parameters 0 and 1 hold the equatorial radius and flattening
    Planetodetic,
}

impl CoordinateSystem {
    pub fn code(self) -> i32 {
        match self {
            CoordinateSystem::Latitudinal => 1,
            CoordinateSystem::Cylindrical => 2,
            CoordinateSystem::Rectangular => 3,
            CoordinateSystem::Planetodetic => 4,
        }
    }

    pub fn from_code(code: f64) -> Result<Self> {
        let system = match code as i32 {
            1 => CoordinateSystem::Latitudinal,
            2 => CoordinateSystem::Cylindrical,
            3 => CoordinateSystem::Rectangular,
            4 => CoordinateSystem::Planetodetic,
            _ => return Err(unknown_code("coordinate system", code)),
        };
        if f64::from(system.code()) != code {
            return Err(unknown_code("coordinate system", code));
        }
        Ok(system)
    }

    /// Index of the longitude coordinate, if the system has one
    fn longitude_axis(self) -> Option<usize> {
        match self {
            CoordinateSystem::Latitudinal | CoordinateSystem::Planetodetic => Some(0),
            CoordinateSystem::Cylindrical => Some(1),
            CoordinateSystem::Rectangular => None,
        }
    }

    /// Index of the latitude coordinate, if the system has one
    fn latitude_axis(self) -> Option<usize> {
        match self {
            CoordinateSystem::Latitudinal | CoordinateSystem::Planetodetic => Some(1),
            CoordinateSystem::Cylindrical | CoordinateSystem::Rectangular => None,
        }
    }

    /// Convert a body-fixed rectangular point into this system.
    pub fn coordinates_of(self, point: [f64; 3], parameters: &[f64; PARAMETER_COUNT]) -> Result<[f64; 3]> {
        let [x, y, z] = point;
        let rho = x.hypot(y);
        let lon = if rho == 0.0 { 0.0 } else { y.atan2(x) };
        Ok(match self {
            CoordinateSystem::Rectangular => point,
            CoordinateSystem::Cylindrical => [rho, lon, z],
            CoordinateSystem::Latitudinal => {
                let r = rho.hypot(z);
                let lat = if r == 0.0 { 0.0 } else { z.atan2(rho) };
                [lon, lat, r]
            }
            CoordinateSystem::Planetodetic => {
                let (lat, alt) = geodetic(rho, z, parameters[0], parameters[1])?;
                [lon, lat, alt]
            }
        })
    }
}

/// Geodetic latitude and altitude of a point at distance `rho` from the
/// polar axis and height `z`, on a spheroid of equatorial radius `re`
/// and flattening `f`.
fn geodetic(rho: f64, z: f64, re: f64, f: f64) -> Result<(f64, f64)> {
    if !(re > 0.0 && f < 1.0) {
        return Err(KernelError::new(
            ErrorKind::NotComputable,
            format!(
                "planetodetic coordinates need a positive radius and flattening below 1, got {} and {}",
                re, f
            ),
        ));
    }
    let e2 = f * (2.0 - f);
    let rp = re * (1.0 - f);
    if rho == 0.0 {
        return Ok((FRAC_PI_2.copysign(z), z.abs() - rp));
    }
    let mut lat = z.atan2(rho * (1.0 - e2));
    let mut alt = 0.0;
    for _ in 0..8 {
        let (sin, cos) = lat.sin_cos();
        let n = re / (1.0 - e2 * sin * sin).sqrt();
        alt = if cos.abs() > sin.abs() {
            rho / cos - n
        } else {
            z / sin - n * (1.0 - e2)
        };
        lat = z.atan2(rho * (1.0 - e2 * n / (n + alt)));
    }
    Ok((lat, alt))
}

/// Decoded DSK segment descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DskDescriptor {
    pub surface: i32,
    pub center: i32,
    pub data_class: DataClass,
    pub data_type: i32,
    pub frame: i32,
    pub coordinate_system: CoordinateSystem,
    pub parameters: [f64; PARAMETER_COUNT],
    /// (min, max) of each coordinate
    pub bounds: [[f64; 2]; 3],
    pub start: Et,
    pub stop: Et,
}

impl DskDescriptor {
    pub fn to_array(&self) -> [f64; DESCRIPTOR_LEN] {
        let mut out = [0.0; DESCRIPTOR_LEN];
        out[IX_SURFACE] = f64::from(self.surface);
        out[IX_CENTER] = f64::from(self.center);
        out[IX_CLASS] = f64::from(self.data_class.code());
        out[IX_TYPE] = f64::from(self.data_type);
        out[IX_FRAME] = f64::from(self.frame);
        out[IX_SYSTEM] = f64::from(self.coordinate_system.code());
        out[IX_PARAMS..IX_BOUNDS].copy_from_slice(&self.parameters);
        for (axis, [lo, hi]) in self.bounds.iter().enumerate() {
            out[IX_BOUNDS + 2 * axis] = *lo;
            out[IX_BOUNDS + 2 * axis + 1] = *hi;
        }
        out[IX_START] = self.start;
        out[IX_STOP] = self.stop;
        out
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!("a DSK descriptor has {} elements, got {}", DESCRIPTOR_LEN, values.len()),
            ));
        }
        let mut parameters = [0.0; PARAMETER_COUNT];
        parameters.copy_from_slice(&values[IX_PARAMS..IX_BOUNDS]);
        let b = &values[IX_BOUNDS..IX_START];
        Ok(Self {
            surface: values[IX_SURFACE] as i32,
            center: values[IX_CENTER] as i32,
            data_class: DataClass::from_code(values[IX_CLASS])?,
            data_type: values[IX_TYPE] as i32,
            frame: values[IX_FRAME] as i32,
            coordinate_system: CoordinateSystem::from_code(values[IX_SYSTEM])?,
            parameters,
            bounds: [[b[0], b[1]], [b[2], b[3]], [b[4], b[5]]],
            start: values[IX_START],
            stop: values[IX_STOP],
        })
    }

    /// Whether `coords` (in this segment's system) fall inside the bounds,
    /// widened by the greedy selection margin.
    pub fn contains(&self, coords: [f64; 3], tolerances: &ToleranceConfig) -> bool {
        let system = self.coordinate_system;
        let greed = tolerances.get(ToleranceKey::SegmentGreed);
        (0..3).all(|axis| {
            let [lo, hi] = self.bounds[axis];
            let value = coords[axis];
            if system.longitude_axis() == Some(axis) {
                let margin = greed + tolerances.get(ToleranceKey::LongitudeAlias);
                [value, value + TAU, value - TAU]
                    .iter()
                    .any(|v| lo - margin <= *v && *v <= hi + margin)
            } else if system.latitude_axis() == Some(axis) {
                let margin = greed + tolerances.get(ToleranceKey::AngularRounding);
                lo - margin <= value && value <= hi + margin
            } else {
                let margin = greed * lo.abs().max(hi.abs());
                lo - margin <= value && value <= hi + margin
            }
        })
    }
}

/// A DSK file
#[derive(Debug)]
pub struct Dsk {
    dla: Dla,
}

impl Dsk {
    /// Create a new, empty DSK open for write.
    pub fn create<P: AsRef<Path>>(path: P, internal_name: &str, comment_records: u32) -> Result<Self> {
        let dla = Dla::create(path, internal_name, "DSK", comment_records)?;
        log_kernel_info!("Created kernel", kind = "DSK");
        Ok(Self { dla })
    }

    pub fn open_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_dla(Dla::open_read(path)?)
    }

    pub fn open_write<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_dla(Dla::open_write(path)?)
    }

    fn from_dla(dla: Dla) -> Result<Self> {
        dla.file_record().file_type.expect(Architecture::Das, &["DSK"])?;
        Ok(Self { dla })
    }

    /// The underlying segment list
    pub fn dla(&self) -> &Dla {
        &self.dla
    }

    pub fn segment_count(&self) -> Result<usize> {
        self.dla.segment_count()
    }

    pub fn close(&mut self) -> Result<()> {
        self.dla.close()
    }

    /// Descriptor at the head of a segment's double component.
    pub fn descriptor(&self, segment: &DlaDescriptor) -> Result<DskDescriptor> {
        if (segment.double_size as usize) < DESCRIPTOR_LEN {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "segment has {} doubles, too few for a DSK descriptor",
                    segment.double_size
                ),
            ));
        }
        let first = segment.double_base as u32 + 1;
        let values = self
            .dla
            .das()
            .read_doubles(first, first + DESCRIPTOR_LEN as u32 - 1)?;
        DskDescriptor::from_slice(&values)
    }

    /// Every segment with its DSK descriptor, in list order.
    pub fn segments(&self) -> Result<Vec<(DlaDescriptor, DskDescriptor)>> {
        self.dla
            .segments()
            .map(|segment| {
                let segment = segment?;
                let descriptor = self.descriptor(&segment)?;
                Ok((segment, descriptor))
            })
            .collect()
    }

    /// Central bodies with at least one segment. Empty for an empty file.
    pub fn bodies(&self) -> Result<BTreeSet<i32>> {
        Ok(self.segments()?.into_iter().map(|(_, d)| d.center).collect())
    }

    /// Surfaces of `body` with at least one segment.
    pub fn surfaces(&self, body: i32) -> Result<BTreeSet<i32>> {
        Ok(self
            .segments()?
            .into_iter()
            .filter(|(_, d)| d.center == body)
            .map(|(_, d)| d.surface)
            .collect())
    }

    /// Append a type 2 plate model segment.
    #[instrument(level = "debug", skip(self, segment), fields(plates = segment.plates.len()))]
    pub fn write_type02(&mut self, segment: &Dsk02Segment) -> Result<DlaDescriptor> {
        segment.validate()?;
        let ints = segment.to_ints();
        let doubles = segment.to_doubles();

        self.dla.begin_segment()?;
        self.dla.das_mut().append_ints(&ints)?;
        self.dla.das_mut().append_doubles(&doubles)?;
        let written = self.dla.end_segment()?;
        log_kernel_debug!(
            "Wrote DSK segment",
            surface = segment.descriptor.surface,
            vertices = segment.vertices.len(),
            plates = segment.plates.len()
        );
        Ok(written)
    }

    fn check_type02(&self, segment: &DlaDescriptor) -> Result<()> {
        let descriptor = self.descriptor(segment)?;
        if descriptor.data_type != 2 {
            return Err(KernelError::new(
                ErrorKind::UnsupportedType,
                format!("segment has DSK type {}, expected 2", descriptor.data_type),
            ));
        }
        Ok(())
    }

    /// Vertex and plate counts of a type 2 segment.
    pub fn plate_model_counts(&self, segment: &DlaDescriptor) -> Result<(usize, usize)> {
        self.check_type02(segment)?;
        let first = segment.int_base as u32 + 1;
        let header = self.dla.das().read_ints(first, first + 1)?;
        Ok((header[IX_NV].max(0) as usize, header[IX_NP].max(0) as usize))
    }

    /// `count` vertices starting at 1-based vertex `first`.
    pub fn vertices(&self, segment: &DlaDescriptor, first: usize, count: usize) -> Result<Vec<[f64; 3]>> {
        let (nv, _) = self.plate_model_counts(segment)?;
        check_range("vertex", first, count, nv)?;
        let at = segment.double_base as u32 + (DOUBLE_HEADER_LEN + 3 * (first - 1)) as u32 + 1;
        let values = self.dla.das().read_doubles(at, at + 3 * count as u32 - 1)?;
        Ok(values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    /// `count` plates starting at 1-based plate `first`.
    pub fn plates(&self, segment: &DlaDescriptor, first: usize, count: usize) -> Result<Vec<[i32; 3]>> {
        let (_, np) = self.plate_model_counts(segment)?;
        check_range("plate", first, count, np)?;
        let at = segment.int_base as u32 + (INT_HEADER_LEN + 3 * (first - 1)) as u32 + 1;
        let values = self.dla.das().read_ints(at, at + 3 * count as u32 - 1)?;
        Ok(values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    /// Read back a whole type 2 segment.
    pub fn segment_type02(&self, segment: &DlaDescriptor) -> Result<Dsk02Segment> {
        self.check_type02(segment)?;
        let das = self.dla.das();
        let ints = das.read_ints(
            segment.int_base as u32 + 1,
            (segment.int_base + segment.int_size) as u32,
        )?;
        let doubles = das.read_doubles(
            segment.double_base as u32 + 1,
            (segment.double_base + segment.double_size) as u32,
        )?;
        Dsk02Segment::from_components(&ints, &doubles)
    }

    /// Segments of `body` that may contain the body-fixed `point` at `et`,
    /// restricted to `surfaces` unless it is empty.
    pub fn select_segments(
        &self,
        body: i32,
        surfaces: &[i32],
        et: Et,
        point: [f64; 3],
        tolerances: &ToleranceConfig,
    ) -> Result<Vec<DlaDescriptor>> {
        let mut selected = Vec::new();
        for (segment, descriptor) in self.segments()? {
            if descriptor.center != body
                || !(surfaces.is_empty() || surfaces.contains(&descriptor.surface))
                || et < descriptor.start
                || et > descriptor.stop
            {
                continue;
            }
            let coords = descriptor
                .coordinate_system
                .coordinates_of(point, &descriptor.parameters)?;
            if descriptor.contains(coords, tolerances) {
                selected.push(segment);
            }
        }
        Ok(selected)
    }
}

fn check_range(what: &str, first: usize, count: usize, total: usize) -> Result<()> {
    if first == 0 || count == 0 || first - 1 + count > total {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!(
                "{} range starting at {} with {} entries is outside 1..={}",
                what, first, count, total
            ),
        ));
    }
    Ok(())
}

impl CommentStore for Dsk {
    fn add_comments(&mut self, lines: &[&str]) -> Result<()> {
        self.dla.add_comments(lines)
    }

    fn read_comments(&self, max_line_len: usize) -> Result<Vec<String>> {
        self.dla.read_comments(max_line_len)
    }

    fn delete_comments(&mut self) -> Result<()> {
        self.dla.delete_comments()
    }
}
