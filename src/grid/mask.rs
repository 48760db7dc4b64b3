//! Label masks restricting estimation and response to a region of interest

use super::Grid;
use crate::error::{EnhanceError, EnhanceResult};

/// Label grid with a designated background value
///
/// A voxel is inside the mask when its physical point falls in the label grid
/// and the label there differs from the background value.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelMask {
    labels: Grid<u32>,
    background: u32,
}

impl LabelMask {
    pub fn new(labels: Grid<u32>, background: u32) -> Self {
        Self { labels, background }
    }

    /// Mask where every non-zero label is foreground
    pub fn from_labels(labels: Grid<u32>) -> Self {
        Self::new(labels, 0)
    }

    pub fn with_background(mut self, background: u32) -> Self {
        self.background = background;
        self
    }

    pub fn labels(&self) -> &Grid<u32> {
        &self.labels
    }

    pub fn background(&self) -> u32 {
        self.background
    }

    /// Fail unless the mask's physical extent lies within the image's
    pub fn check_contained_in<T>(&self, image: &Grid<T>) -> EnhanceResult<()> {
        let (mask_lo, mask_hi) = self.labels.physical_bounds();
        let (img_lo, img_hi) = image.physical_bounds();
        let spacing = image.spacing();

        for a in 0..3 {
            let tol = 1e-6 * spacing[a];
            if mask_lo[a] < img_lo[a] - tol || mask_hi[a] > img_hi[a] + tol {
                return Err(EnhanceError::Domain(format!(
                    "mask extent [{:.4}, {:.4}] on axis {} is outside image extent [{:.4}, {:.4}]",
                    mask_lo[a], mask_hi[a], a, img_lo[a], img_hi[a]
                )));
            }
        }
        Ok(())
    }

    /// Foreground test at a physical point
    #[inline]
    pub fn is_inside(&self, point: [f64; 3]) -> bool {
        let index = self.labels.point_to_index(point);
        let region = self.labels.region();
        if !region.contains(index) {
            return false;
        }
        let i = (index[0] - region.index[0]) as usize;
        let j = (index[1] - region.index[1]) as usize;
        let k = (index[2] - region.index[2]) as usize;
        *self.labels.get(i, j, k) != self.background
    }

    /// Foreground test for the voxel stored at `offset` of `image`
    #[inline]
    pub fn is_inside_voxel<T>(&self, image: &Grid<T>, offset: usize) -> bool {
        self.is_inside(image.offset_to_point(offset))
    }
}
