//! Voxel grids and label masks
//!
//! A [`Grid`] is a flat buffer in Fortran order (`i + j*nx + k*nx*ny`) with a
//! region (start index and size), voxel spacing and origin. Physical point of
//! index `n` on axis `a` is `origin[a] + spacing[a] * n[a]`.
//!
//! 2D grids are stored with `nz = 1` and report `dimension() == 2`.

pub mod mask;

pub use mask::LabelMask;

use crate::error::{EnhanceError, EnhanceResult};

/// Start index and size of a grid along each axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub index: [i64; 3],
    pub size: [usize; 3],
}

impl Region {
    pub fn new(index: [i64; 3], size: [usize; 3]) -> Self {
        Self { index, size }
    }

    pub fn num_voxels(&self) -> usize {
        self.size[0] * self.size[1] * self.size[2]
    }

    /// True if the absolute index lies inside this region
    pub fn contains(&self, index: [i64; 3]) -> bool {
        (0..3).all(|a| index[a] >= self.index[a] && index[a] < self.index[a] + self.size[a] as i64)
    }
}

/// Regular 2D/3D voxel grid
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    region: Region,
    spacing: [f64; 3],
    origin: [f64; 3],
    dimension: usize,
    data: Vec<T>,
}

fn validate_geometry(size: [usize; 3], spacing: [f64; 3]) -> EnhanceResult<()> {
    if size.iter().any(|&n| n == 0) {
        return Err(EnhanceError::InvalidParameter(format!(
            "grid size must be non-zero on every axis, got {:?}",
            size
        )));
    }
    if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
        return Err(EnhanceError::InvalidParameter(format!(
            "voxel spacing must be positive, got {:?}",
            spacing
        )));
    }
    Ok(())
}

impl<T: Clone> Grid<T> {
    /// 3D grid with every voxel set to `value`
    pub fn filled(size: [usize; 3], spacing: [f64; 3], value: T) -> EnhanceResult<Self> {
        validate_geometry(size, spacing)?;
        let n = size[0] * size[1] * size[2];
        Self::from_vec(vec![value; n], size, spacing)
    }
}

impl<T> Grid<T> {
    /// Wrap a Fortran-order buffer as a 3D grid
    pub fn from_vec(data: Vec<T>, size: [usize; 3], spacing: [f64; 3]) -> EnhanceResult<Self> {
        validate_geometry(size, spacing)?;
        let expected = size[0] * size[1] * size[2];
        if data.len() != expected {
            return Err(EnhanceError::DimensionMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            region: Region::new([0; 3], size),
            spacing,
            origin: [0.0; 3],
            dimension: 3,
            data,
        })
    }

    /// Wrap a Fortran-order buffer as a 2D grid
    pub fn new_2d(data: Vec<T>, size: [usize; 2], spacing: [f64; 2]) -> EnhanceResult<Self> {
        let mut grid = Self::from_vec(data, [size[0], size[1], 1], [spacing[0], spacing[1], 1.0])?;
        grid.dimension = 2;
        Ok(grid)
    }

    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    /// Move the region start; the buffer is unchanged
    pub fn with_start_index(mut self, index: [i64; 3]) -> Self {
        self.region.index = index;
        self
    }

    /// New grid on the same geometry holding `data`
    pub fn with_data<U>(&self, data: Vec<U>) -> EnhanceResult<Grid<U>> {
        if data.len() != self.data.len() {
            return Err(EnhanceError::DimensionMismatch {
                expected: self.data.len(),
                found: data.len(),
            });
        }
        Ok(Grid {
            region: self.region,
            spacing: self.spacing,
            origin: self.origin,
            dimension: self.dimension,
            data,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn size(&self) -> [usize; 3] {
        self.region.size
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Buffer offset of local coordinates (i, j, k)
    #[inline]
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.region.size;
        i + j * nx + k * nx * ny
    }

    /// Local coordinates of a buffer offset
    #[inline]
    pub fn coords(&self, offset: usize) -> [usize; 3] {
        let [nx, ny, _] = self.region.size;
        [offset % nx, (offset / nx) % ny, offset / (nx * ny)]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> &T {
        &self.data[self.offset(i, j, k)]
    }

    /// Physical point of an absolute index
    pub fn index_to_point(&self, index: [i64; 3]) -> [f64; 3] {
        let mut p = [0.0; 3];
        for a in 0..3 {
            p[a] = self.origin[a] + self.spacing[a] * index[a] as f64;
        }
        p
    }

    /// Physical point of the voxel stored at `offset`
    pub fn offset_to_point(&self, offset: usize) -> [f64; 3] {
        let c = self.coords(offset);
        let index = [
            self.region.index[0] + c[0] as i64,
            self.region.index[1] + c[1] as i64,
            self.region.index[2] + c[2] as i64,
        ];
        self.index_to_point(index)
    }

    /// Nearest absolute index of a physical point
    pub fn point_to_index(&self, point: [f64; 3]) -> [i64; 3] {
        let mut index = [0i64; 3];
        for a in 0..3 {
            index[a] = ((point[a] - self.origin[a]) / self.spacing[a]).round() as i64;
        }
        index
    }

    /// Physical positions of the first and last voxel centres
    pub fn physical_bounds(&self) -> ([f64; 3], [f64; 3]) {
        let first = self.region.index;
        let mut last = first;
        for a in 0..3 {
            last[a] += self.region.size[a] as i64 - 1;
        }
        let p0 = self.index_to_point(first);
        let p1 = self.index_to_point(last);
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for a in 0..3 {
            lo[a] = p0[a].min(p1[a]);
            hi[a] = p0[a].max(p1[a]);
        }
        (lo, hi)
    }

    /// True if both grids cover the same voxels at the same positions
    pub fn same_geometry<U>(&self, other: &Grid<U>) -> bool {
        self.region == other.region
            && self.dimension == other.dimension
            && (0..3).all(|a| {
                (self.spacing[a] - other.spacing[a]).abs() < 1e-12
                    && (self.origin[a] - other.origin[a]).abs() < 1e-12
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_length_mismatch() {
        let err = Grid::from_vec(vec![0.0f64; 7], [2, 2, 2], [1.0; 3]).unwrap_err();
        assert_eq!(err, EnhanceError::DimensionMismatch { expected: 8, found: 7 });
    }

    #[test]
    fn test_bad_spacing_rejected() {
        let err = Grid::filled([2, 2, 2], [1.0, 0.0, 1.0], 0.0f64).unwrap_err();
        assert!(matches!(err, EnhanceError::InvalidParameter(_)));
    }

    #[test]
    fn test_offset_coords_roundtrip() {
        let grid = Grid::filled([4, 3, 2], [1.0; 3], 0u32).unwrap();
        for off in 0..grid.len() {
            let [i, j, k] = grid.coords(off);
            assert_eq!(grid.offset(i, j, k), off);
        }
    }

    #[test]
    fn test_physical_mapping_with_origin_and_start() {
        let grid = Grid::filled([4, 4, 4], [0.5, 1.0, 2.0], 0.0f64)
            .unwrap()
            .with_origin([10.0, 0.0, -4.0])
            .with_start_index([2, 0, 1]);

        let p = grid.offset_to_point(0);
        assert!((p[0] - 11.0).abs() < 1e-12);
        assert!((p[1] - 0.0).abs() < 1e-12);
        assert!((p[2] + 2.0).abs() < 1e-12);
        assert_eq!(grid.point_to_index(p), [2, 0, 1]);
        assert!(grid.region().contains([5, 3, 4]));
        assert!(!grid.region().contains([6, 3, 4]));
    }

    #[test]
    fn test_new_2d_dimension() {
        let grid = Grid::new_2d(vec![1.0f64; 12], [4, 3], [1.0, 1.0]).unwrap();
        assert_eq!(grid.dimension(), 2);
        assert_eq!(grid.size(), [4, 3, 1]);
    }
}
