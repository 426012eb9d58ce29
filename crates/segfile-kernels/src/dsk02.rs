//! DSK type 2: triangular plate models with a voxel spatial index.
//!
//! Integer component:
//!
//! ```text
//! NV NP NVXTOT VGREXT(3) CGSCAL VOXNPT VOXNPL VTXNPL
//! PLATES(3*NP) VOXPTR(VOXNPT) VOXPLT(VOXNPL) VTXPTR(NV) VTXPLT(VTXNPL)
//! CGRPTR(NVXTOT / CGSCAL^3)
//! ```
//!
//! Double component:
//!
//! ```text
//! DESCRIPTOR(24) VTXBDS(6) VOXORI(3) VOXSIZ VERTICES(3*NV)
//! ```

use serde::Serialize;

use segfile_record::{ErrorKind, KernelError, Result};

use crate::dsk::{DskDescriptor, DESCRIPTOR_LEN};

/// Integers before the plate array
pub const INT_HEADER_LEN: usize = 10;

/// Doubles before the vertex array
pub const DOUBLE_HEADER_LEN: usize = DESCRIPTOR_LEN + 10;

pub(crate) const IX_NV: usize = 0;
pub(crate) const IX_NP: usize = 1;
const IX_NVXTOT: usize = 2;
const IX_VGREXT: usize = 3;
const IX_CGSCAL: usize = 6;
const IX_VOXNPT: usize = 7;
const IX_VOXNPL: usize = 8;
const IX_VTXNPL: usize = 9;

/// Voxel-based spatial index of a plate model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialIndex {
    /// (min, max) of the vertex coordinates along each axis
    pub vertex_bounds: [[f64; 2]; 3],
    pub voxel_origin: [f64; 3],
    /// Edge length of one fine voxel
    pub voxel_size: f64,
    /// Fine voxel grid extent along each axis
    pub grid_extent: [i32; 3],
    /// Fine voxels per coarse voxel edge
    pub coarse_scale: i32,
    pub voxel_pointers: Vec<i32>,
    pub voxel_plates: Vec<i32>,
    /// One entry per vertex, pointing into `vertex_plates`
    pub vertex_pointers: Vec<i32>,
    pub vertex_plates: Vec<i32>,
    pub coarse_grid: Vec<i32>,
}

impl SpatialIndex {
    /// A one-voxel index enclosing every plate.
    ///
    /// Lookups degrade to a linear scan, which is fine for small models.
    pub fn single_voxel(vertices: &[[f64; 3]], plates: &[[i32; 3]]) -> Result<Self> {
        if vertices.is_empty() {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                "a plate model needs vertices",
            ));
        }
        let mut bounds = [[f64::INFINITY, f64::NEG_INFINITY]; 3];
        for vertex in vertices {
            for (axis, &value) in vertex.iter().enumerate() {
                bounds[axis][0] = bounds[axis][0].min(value);
                bounds[axis][1] = bounds[axis][1].max(value);
            }
        }
        let size = bounds
            .iter()
            .map(|[lo, hi]| hi - lo)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        // voxel list: [count, plate ids...]
        let mut voxel_plates = Vec::with_capacity(plates.len() + 1);
        voxel_plates.push(plates.len() as i32);
        voxel_plates.extend(1..=plates.len() as i32);

        // vertex list: per vertex [count, plate ids...]
        let mut touching = vec![Vec::new(); vertices.len()];
        for (p, plate) in plates.iter().enumerate() {
            for &v in plate {
                if let Some(list) = usize::try_from(v - 1).ok().and_then(|i| touching.get_mut(i)) {
                    if !list.contains(&(p as i32 + 1)) {
                        list.push(p as i32 + 1);
                    }
                }
            }
        }
        let mut vertex_pointers = Vec::with_capacity(vertices.len());
        let mut vertex_plates = Vec::new();
        for list in &touching {
            vertex_pointers.push(vertex_plates.len() as i32 + 1);
            vertex_plates.push(list.len() as i32);
            vertex_plates.extend_from_slice(list);
        }

        Ok(Self {
            vertex_bounds: bounds,
            voxel_origin: [bounds[0][0], bounds[1][0], bounds[2][0]],
            voxel_size: size,
            grid_extent: [1, 1, 1],
            coarse_scale: 1,
            voxel_pointers: vec![1],
            voxel_plates,
            vertex_pointers,
            vertex_plates,
            coarse_grid: vec![1],
        })
    }

    /// Total number of fine voxels
    pub fn voxel_count(&self) -> i64 {
        self.grid_extent.iter().map(|&e| i64::from(e)).product()
    }

    /// Number of coarse grid entries
    pub fn coarse_grid_len(&self) -> i64 {
        let scale = i64::from(self.coarse_scale);
        self.voxel_count() / (scale * scale * scale)
    }

    fn validate(&self, vertex_count: usize) -> Result<()> {
        let invalid = |detail: String| Err(KernelError::new(ErrorKind::InvalidValue, detail));
        if self.grid_extent.iter().any(|&e| e < 1) {
            return invalid(format!("voxel grid extent {:?} must be positive", self.grid_extent));
        }
        if self.coarse_scale < 1 || self.grid_extent.iter().any(|e| e % self.coarse_scale != 0) {
            return invalid(format!(
                "coarse scale {} must be positive and divide the grid extent {:?}",
                self.coarse_scale, self.grid_extent
            ));
        }
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return invalid(format!("voxel size must be positive, got {}", self.voxel_size));
        }
        if self.vertex_bounds.iter().any(|[lo, hi]| !(lo <= hi)) {
            return invalid("vertex bounds are not ordered".to_string());
        }
        let size_error = |what: &str, got: usize, expected: String| {
            Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!("{} has {} entries; expected {}", what, got, expected),
            ))
        };
        if self.vertex_pointers.len() != vertex_count {
            return size_error(
                "vertex pointer array",
                self.vertex_pointers.len(),
                vertex_count.to_string(),
            );
        }
        if self.coarse_grid.len() as i64 != self.coarse_grid_len() {
            return size_error(
                "coarse grid",
                self.coarse_grid.len(),
                self.coarse_grid_len().to_string(),
            );
        }
        if self.voxel_pointers.is_empty() || self.voxel_plates.is_empty() {
            return size_error("voxel arrays", 0, "at least one entry".to_string());
        }
        Ok(())
    }
}

/// A complete type 2 segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dsk02Segment {
    pub descriptor: DskDescriptor,
    pub vertices: Vec<[f64; 3]>,
    /// Vertex indices of each plate, 1-based
    pub plates: Vec<[i32; 3]>,
    pub index: SpatialIndex,
}

impl Dsk02Segment {
    /// Check the descriptor, the plate model and the index against each other.
    pub fn validate(&self) -> Result<()> {
        let d = &self.descriptor;
        if d.data_type != 2 {
            return Err(KernelError::new(
                ErrorKind::UnsupportedType,
                format!("descriptor names data type {}, expected 2", d.data_type),
            ));
        }
        if !(d.start <= d.stop) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("time bounds [{}, {}] are not ordered", d.start, d.stop),
            ));
        }
        if d.bounds.iter().any(|[lo, hi]| !(lo <= hi)) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("coordinate bounds {:?} are not ordered", d.bounds),
            ));
        }

        let nv = self.vertices.len();
        if nv < 3 || self.plates.is_empty() {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!(
                    "a plate model needs at least 3 vertices and 1 plate, got {} and {}",
                    nv,
                    self.plates.len()
                ),
            ));
        }
        if let Some((p, plate)) = self
            .plates
            .iter()
            .enumerate()
            .find(|(_, plate)| plate.iter().any(|&v| v < 1 || v as usize > nv))
        {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("plate {} refers to a vertex outside 1..={}: {:?}", p + 1, nv, plate),
            ));
        }
        self.index.validate(nv)
    }

    /// Integer component in file order.
    pub fn to_ints(&self) -> Vec<i32> {
        let index = &self.index;
        let mut ints = Vec::with_capacity(
            INT_HEADER_LEN
                + 3 * self.plates.len()
                + index.voxel_pointers.len()
                + index.voxel_plates.len()
                + index.vertex_pointers.len()
                + index.vertex_plates.len()
                + index.coarse_grid.len(),
        );
        ints.extend_from_slice(&[
            self.vertices.len() as i32,
            self.plates.len() as i32,
            index.voxel_count() as i32,
        ]);
        ints.extend_from_slice(&index.grid_extent);
        ints.extend_from_slice(&[
            index.coarse_scale,
            index.voxel_pointers.len() as i32,
            index.voxel_plates.len() as i32,
            index.vertex_plates.len() as i32,
        ]);
        ints.extend(self.plates.iter().flatten());
        ints.extend_from_slice(&index.voxel_pointers);
        ints.extend_from_slice(&index.voxel_plates);
        ints.extend_from_slice(&index.vertex_pointers);
        ints.extend_from_slice(&index.vertex_plates);
        ints.extend_from_slice(&index.coarse_grid);
        ints
    }

    /// Double component in file order.
    pub fn to_doubles(&self) -> Vec<f64> {
        let index = &self.index;
        let mut doubles = Vec::with_capacity(DOUBLE_HEADER_LEN + 3 * self.vertices.len());
        doubles.extend_from_slice(&self.descriptor.to_array());
        doubles.extend(index.vertex_bounds.iter().flatten());
        doubles.extend_from_slice(&index.voxel_origin);
        doubles.push(index.voxel_size);
        doubles.extend(self.vertices.iter().flatten());
        doubles
    }

    /// Rebuild a segment from its two components.
    pub fn from_components(ints: &[i32], doubles: &[f64]) -> Result<Self> {
        let corrupt = |detail: &str| {
            KernelError::new(
                ErrorKind::InvalidFormat,
                format!("malformed type 2 segment: {}", detail),
            )
        };
        if ints.len() < INT_HEADER_LEN || doubles.len() < DOUBLE_HEADER_LEN {
            return Err(corrupt("header is truncated"));
        }
        let count = |at: usize| usize::try_from(ints[at]).map_err(|_| corrupt("negative count"));
        let nv = count(IX_NV)?;
        let np = count(IX_NP)?;
        let grid_extent = [ints[IX_VGREXT], ints[IX_VGREXT + 1], ints[IX_VGREXT + 2]];
        let coarse_scale = ints[IX_CGSCAL];
        let nvxtot = i64::from(ints[IX_NVXTOT]);
        if coarse_scale < 1 {
            return Err(corrupt("coarse scale is not positive"));
        }
        let scale = i64::from(coarse_scale);
        let ncgr = usize::try_from(nvxtot / (scale * scale * scale))
            .map_err(|_| corrupt("negative voxel count"))?;

        let mut rest = &ints[INT_HEADER_LEN..];
        let mut take = |n: usize| -> Result<Vec<i32>> {
            if rest.len() < n {
                return Err(corrupt("integer component is truncated"));
            }
            let (head, tail) = rest.split_at(n);
            rest = tail;
            Ok(head.to_vec())
        };
        let plate_words = take(3 * np)?;
        let voxel_pointers = take(count(IX_VOXNPT)?)?;
        let voxel_plates = take(count(IX_VOXNPL)?)?;
        let vertex_pointers = take(nv)?;
        let vertex_plates = take(count(IX_VTXNPL)?)?;
        let coarse_grid = take(ncgr)?;

        if doubles.len() < DOUBLE_HEADER_LEN + 3 * nv {
            return Err(corrupt("double component is truncated"));
        }
        let descriptor = DskDescriptor::from_slice(&doubles[..DESCRIPTOR_LEN])?;
        let h = &doubles[DESCRIPTOR_LEN..DOUBLE_HEADER_LEN];

        Ok(Self {
            descriptor,
            vertices: doubles[DOUBLE_HEADER_LEN..DOUBLE_HEADER_LEN + 3 * nv]
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
            plates: plate_words
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
            index: SpatialIndex {
                vertex_bounds: [[h[0], h[1]], [h[2], h[3]], [h[4], h[5]]],
                voxel_origin: [h[6], h[7], h[8]],
                voxel_size: h[9],
                grid_extent,
                coarse_scale,
                voxel_pointers,
                voxel_plates,
                vertex_pointers,
                vertex_plates,
                coarse_grid,
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dsk::{CoordinateSystem, DataClass};

    /// A unit tetrahedron about the origin of body 1000, surface 1.
    pub(crate) fn tetrahedron() -> Dsk02Segment {
        let vertices = vec![
            [0.0, 0.0, 1.0],
            [0.9428, 0.0, -0.3333],
            [-0.4714, 0.8165, -0.3333],
            [-0.4714, -0.8165, -0.3333],
        ];
        let plates = vec![[1, 2, 3], [1, 3, 4], [1, 4, 2], [2, 4, 3]];
        let index = SpatialIndex::single_voxel(&vertices, &plates).unwrap();
        Dsk02Segment {
            descriptor: DskDescriptor {
                surface: 1,
                center: 1000,
                data_class: DataClass::SingleValued,
                data_type: 2,
                frame: 10000,
                coordinate_system: CoordinateSystem::Latitudinal,
                parameters: [0.0; 10],
                bounds: [
                    [-std::f64::consts::PI, std::f64::consts::PI],
                    [-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2],
                    [0.3, 1.0],
                ],
                start: -1.0e9,
                stop: 1.0e9,
            },
            vertices,
            plates,
            index,
        }
    }

    #[test]
    fn test_single_voxel_index() {
        let segment = tetrahedron();
        let index = &segment.index;
        assert_eq!(index.voxel_plates, vec![4, 1, 2, 3, 4]);
        // vertex 1 touches plates 1, 2, 3
        assert_eq!(index.vertex_pointers[0], 1);
        assert_eq!(&index.vertex_plates[..4], &[3, 1, 2, 3]);
        assert_eq!(index.vertex_pointers[1], 5);
        assert!(segment.validate().is_ok());
    }

    #[test]
    fn test_component_layout() {
        let segment = tetrahedron();
        let ints = segment.to_ints();
        assert_eq!(&ints[..INT_HEADER_LEN], &[4, 4, 1, 1, 1, 1, 1, 1, 5, 16]);
        assert_eq!(&ints[INT_HEADER_LEN..INT_HEADER_LEN + 3], &[1, 2, 3]);
        assert_eq!(*ints.last().unwrap(), 1);

        let doubles = segment.to_doubles();
        assert_eq!(doubles.len(), DOUBLE_HEADER_LEN + 12);
        assert_eq!(doubles[DOUBLE_HEADER_LEN + 2], 1.0);

        let back = Dsk02Segment::from_components(&ints, &doubles).unwrap();
        assert_eq!(back, segment);
    }

    #[test]
    fn test_validation() {
        let mut segment = tetrahedron();
        segment.plates[2] = [1, 5, 2];
        assert_eq!(segment.validate().unwrap_err().kind(), ErrorKind::InvalidValue);

        let mut segment = tetrahedron();
        segment.index.coarse_grid.push(1);
        assert_eq!(segment.validate().unwrap_err().kind(), ErrorKind::InvalidArraySize);

        let mut segment = tetrahedron();
        segment.descriptor.data_type = 4;
        assert_eq!(segment.validate().unwrap_err().kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn test_truncated_components() {
        let segment = tetrahedron();
        let ints = segment.to_ints();
        let doubles = segment.to_doubles();
        assert!(Dsk02Segment::from_components(&ints[..ints.len() - 1], &doubles).is_err());
        assert!(Dsk02Segment::from_components(&ints, &doubles[..40]).is_err());
    }
}
