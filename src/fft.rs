//! 3D FFT over Fortran-order volumes using rustfft
//!
//! Conventions follow numpy: the forward transform is unnormalised and the
//! inverse applies the 1/N factor.

use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

use crate::utils::Axis;

/// Linear index in Fortran order
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Transform every line along `axis` in place
fn transform_axis(data: &mut [Complex64], dims: [usize; 3], fft: &Arc<dyn Fft<f64>>, axis: Axis) {
    let [nx, ny, nz] = dims;
    if dims[axis.index()] < 2 {
        return;
    }

    match axis {
        Axis::X => {
            data.par_chunks_mut(nx).for_each(|line| fft.process(line));
        }
        Axis::Y => {
            data.par_chunks_mut(nx * ny).for_each(|slice| {
                let mut buffer = vec![Complex64::new(0.0, 0.0); ny];
                for i in 0..nx {
                    for j in 0..ny {
                        buffer[j] = slice[i + j * nx];
                    }
                    fft.process(&mut buffer);
                    for j in 0..ny {
                        slice[i + j * nx] = buffer[j];
                    }
                }
            });
        }
        Axis::Z => {
            let mut buffer = vec![Complex64::new(0.0, 0.0); nz];
            let mut scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
            for j in 0..ny {
                for i in 0..nx {
                    for k in 0..nz {
                        buffer[k] = data[idx3d(i, j, k, nx, ny)];
                    }
                    fft.process_with_scratch(&mut buffer, &mut scratch);
                    for k in 0..nz {
                        data[idx3d(i, j, k, nx, ny)] = buffer[k];
                    }
                }
            }
        }
    }
}

fn fft3d_direction(data: &mut [Complex64], dims: [usize; 3], direction: FftDirection) {
    let mut planner = FftPlanner::new();
    for axis in Axis::ALL {
        let fft = planner.plan_fft(dims[axis.index()], direction);
        transform_axis(data, dims, &fft, axis);
    }
}

/// 3D FFT (in-place, complex-to-complex)
pub fn fft3d(data: &mut [Complex64], dims: [usize; 3]) {
    fft3d_direction(data, dims, FftDirection::Forward);
}

/// 3D inverse FFT (in-place, includes 1/N normalisation)
pub fn ifft3d(data: &mut [Complex64], dims: [usize; 3]) {
    fft3d_direction(data, dims, FftDirection::Inverse);

    let n_total = (dims[0] * dims[1] * dims[2]) as f64;
    data.par_iter_mut().for_each(|v| *v /= n_total);
}

/// 3D FFT of real data
pub fn fft3d_real(data: &[f64], dims: [usize; 3]) -> Vec<Complex64> {
    let mut complex_data: Vec<Complex64> = data.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    fft3d(&mut complex_data, dims);
    complex_data
}

/// Sample frequencies for a transform of length `n` and sample spacing `d`
///
/// Matches `numpy.fft.fftfreq(n, d)`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    let positive = (n - 1) / 2 + 1;
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64 * val
            } else {
                (i as i64 - n as i64) as f64 * val
            }
        })
        .collect()
}
