//! Separable Gaussian smoothing and finite differences on 3D volumes
//!
//! All volumes are Fortran order (`i + j*nx + k*nx*ny`). Every routine writes
//! each output z-slice independently, so slices are processed in parallel.

use rayon::prelude::*;

/// Volume axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Step between neighbours along `axis` and the axis length
#[inline]
fn stride_and_len(dims: [usize; 3], axis: Axis) -> (usize, usize) {
    let [nx, ny, nz] = dims;
    match axis {
        Axis::X => (1, nx),
        Axis::Y => (nx, ny),
        Axis::Z => (nx * ny, nz),
    }
}

/// Normalised 1D Gaussian kernel truncated at 3 sigma
///
/// `sigma` is in voxels. Returns `[1.0]` for non-positive sigma.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (3.0 * sigma).ceil() as usize;
    let mut kernel: Vec<f64> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Convolve along one axis
///
/// Kernel taps falling outside the volume are dropped and the remaining
/// weights renormalised, so constant regions stay constant at the borders.
pub fn convolve_axis(data: &[f64], dims: [usize; 3], kernel: &[f64], axis: Axis) -> Vec<f64> {
    let [nx, ny, _] = dims;
    let slice_len = nx * ny;
    let radius = (kernel.len() / 2) as isize;
    let (stride, len) = stride_and_len(dims, axis);
    let mut result = vec![0.0f64; data.len()];

    result
        .par_chunks_mut(slice_len)
        .enumerate()
        .for_each(|(k, slice)| {
            for j in 0..ny {
                for i in 0..nx {
                    let pos = [i, j, k][axis.index()] as isize;
                    let centre = i + j * nx + k * slice_len;

                    let mut sum = 0.0;
                    let mut weight_sum = 0.0;
                    for (t, &w) in kernel.iter().enumerate() {
                        let n = pos + t as isize - radius;
                        if n >= 0 && n < len as isize {
                            let src = (centre as isize + (n - pos) * stride as isize) as usize;
                            sum += data[src] * w;
                            weight_sum += w;
                        }
                    }

                    slice[i + j * nx] = if weight_sum > 0.0 { sum / weight_sum } else { 0.0 };
                }
            }
        });

    result
}

/// Separable Gaussian smoothing with a per-axis sigma in voxels
pub fn gaussian_smooth_3d(data: &[f64], dims: [usize; 3], sigma: [f64; 3]) -> Vec<f64> {
    let mut smoothed = data.to_vec();
    for axis in Axis::ALL {
        let s = sigma[axis.index()];
        if s > 0.0 && dims[axis.index()] > 1 {
            smoothed = convolve_axis(&smoothed, dims, &gaussian_kernel(s), axis);
        }
    }
    smoothed
}

/// First derivative along `axis` by central differences
///
/// One-sided differences at the borders; zero along axes of length 1.
pub fn central_difference(data: &[f64], dims: [usize; 3], axis: Axis, spacing: f64) -> Vec<f64> {
    let [nx, ny, _] = dims;
    let slice_len = nx * ny;
    let (stride, len) = stride_and_len(dims, axis);
    let mut grad = vec![0.0f64; data.len()];

    if len < 2 {
        return grad;
    }

    grad.par_chunks_mut(slice_len)
        .enumerate()
        .for_each(|(k, slice)| {
            for j in 0..ny {
                for i in 0..nx {
                    let pos = [i, j, k][axis.index()];
                    let c = i + j * nx + k * slice_len;

                    slice[i + j * nx] = if pos == 0 {
                        (data[c + stride] - data[c]) / spacing
                    } else if pos == len - 1 {
                        (data[c] - data[c - stride]) / spacing
                    } else {
                        (data[c + stride] - data[c - stride]) / (2.0 * spacing)
                    };
                }
            }
        });

    grad
}
