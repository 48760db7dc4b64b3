//! Scale-normalised Hessian computation
//!
//! For a scale `sigma` (physical units) every voxel receives the second
//! derivatives of the Gaussian-smoothed intensity multiplied by `sigma^2`,
//! which keeps responses comparable across scales.
//!
//! Two backends:
//! - `FiniteDifference`: separable truncated Gaussian followed by central
//!   differences applied twice
//! - `Fourier`: exact Gaussian derivatives in the frequency domain (periodic
//!   boundaries)

use log::debug;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{EnhanceError, EnhanceResult};
use crate::fft::{fft3d_real, fftfreq, ifft3d};
use crate::grid::Grid;
use crate::utils::{central_difference, gaussian_smooth_3d, Axis};

/// Component layout of a stored tensor: xx, yy, zz, xy, xz, yz
pub const COMPONENT_AXES: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (0, 2), (1, 2)];

/// How second derivatives are computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeMethod {
    #[default]
    FiniteDifference,
    Fourier,
}

/// Symmetric second-derivative tensor per voxel at one scale
#[derive(Clone, Debug)]
pub struct HessianField {
    sigma: f64,
    components: Grid<[f64; 6]>,
}

impl HessianField {
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Dimensionality of the grid the field was computed on
    pub fn dimension(&self) -> usize {
        self.components.dimension()
    }

    pub fn components(&self) -> &Grid<[f64; 6]> {
        &self.components
    }

    /// Full symmetric matrix of the voxel stored at `offset`
    pub fn tensor(&self, offset: usize) -> [[f64; 3]; 3] {
        let [xx, yy, zz, xy, xz, yz] = self.components.data()[offset];
        [[xx, xy, xz], [xy, yy, yz], [xz, yz, zz]]
    }
}

/// Compute the scale-normalised Hessian of `input` at `sigma`
pub fn compute_hessian(
    input: &Grid<f64>,
    sigma: f64,
    method: DerivativeMethod,
) -> EnhanceResult<HessianField> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(EnhanceError::InvalidParameter(format!(
            "sigma must be positive, got {}",
            sigma
        )));
    }

    debug!(
        "compute_hessian: {:?} sigma={:.4} method={:?}",
        input.size(),
        sigma,
        method
    );

    let derivatives = match method {
        DerivativeMethod::FiniteDifference => finite_difference_derivatives(input, sigma),
        DerivativeMethod::Fourier => fourier_derivatives(input, sigma),
    };

    let scale = sigma * sigma;
    let tensors: Vec<[f64; 6]> = (0..input.len())
        .into_par_iter()
        .map(|i| {
            let mut t = [0.0; 6];
            for (c, d) in derivatives.iter().enumerate() {
                if let Some(values) = d {
                    t[c] = values[i] * scale;
                }
            }
            t
        })
        .collect();

    Ok(HessianField {
        sigma,
        components: input.with_data(tensors)?,
    })
}

/// Axes along which derivatives are non-trivial
fn active(dims: [usize; 3], a: usize, b: usize) -> bool {
    dims[a] > 1 && dims[b] > 1
}

fn finite_difference_derivatives(input: &Grid<f64>, sigma: f64) -> [Option<Vec<f64>>; 6] {
    let dims = input.size();
    let spacing = input.spacing();

    let mut sigma_voxels = [0.0; 3];
    for a in 0..3 {
        if dims[a] > 1 {
            sigma_voxels[a] = sigma / spacing[a];
        }
    }
    let smoothed = gaussian_smooth_3d(input.data(), dims, sigma_voxels);

    let first: Vec<Vec<f64>> = Axis::ALL
        .iter()
        .map(|&axis| central_difference(&smoothed, dims, axis, spacing[axis.index()]))
        .collect();

    let mut out: [Option<Vec<f64>>; 6] = Default::default();
    for (c, &(a, b)) in COMPONENT_AXES.iter().enumerate() {
        if active(dims, a, b) {
            let axis = Axis::ALL[b];
            out[c] = Some(central_difference(&first[a], dims, axis, spacing[b]));
        }
    }
    out
}

fn fourier_derivatives(input: &Grid<f64>, sigma: f64) -> [Option<Vec<f64>>; 6] {
    let dims = input.size();
    let spacing = input.spacing();
    let [nx, ny, nz] = dims;

    let spectrum = fft3d_real(input.data(), dims);
    let freqs: Vec<Vec<f64>> = (0..3).map(|a| fftfreq(dims[a], spacing[a])).collect();
    let two_pi = 2.0 * PI;

    let mut out: [Option<Vec<f64>>; 6] = Default::default();
    for (c, &(a, b)) in COMPONENT_AXES.iter().enumerate() {
        if !active(dims, a, b) {
            continue;
        }

        let mut buf: Vec<Complex64> = spectrum.clone();
        buf.par_chunks_mut(nx * ny)
            .enumerate()
            .for_each(|(k, slice)| {
                for j in 0..ny {
                    for i in 0..nx {
                        let f = [freqs[0][i], freqs[1][j], freqs[2][k]];
                        let f2 = f[0] * f[0] + f[1] * f[1] + f[2] * f[2];
                        let gauss = (-2.0 * PI * PI * sigma * sigma * f2).exp();
                        let deriv = -(two_pi * two_pi) * f[a] * f[b];
                        slice[i + j * nx] *= gauss * deriv;
                    }
                }
            });

        ifft3d(&mut buf, dims);
        out[c] = Some(buf.iter().map(|v| v.re).collect());
    }

    debug!("fourier_derivatives: {}x{}x{}", nx, ny, nz);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_zero_hessian() {
        let input = Grid::filled([8, 8, 8], [1.0; 3], 4.0).unwrap();
        for method in [DerivativeMethod::FiniteDifference, DerivativeMethod::Fourier] {
            let field = compute_hessian(&input, 1.5, method).unwrap();
            for t in field.components().data() {
                for &v in t {
                    assert!(v.abs() < 1e-9, "{:?} gave {}", method, v);
                }
            }
        }
    }

    #[test]
    fn test_invalid_sigma() {
        let input = Grid::filled([4, 4, 4], [1.0; 3], 0.0).unwrap();
        for sigma in [0.0, -1.0, f64::NAN] {
            let err = compute_hessian(&input, sigma, DerivativeMethod::FiniteDifference)
                .unwrap_err();
            assert!(matches!(err, EnhanceError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_quadratic_scale_normalised() {
        // f = x^2: interior dxx = 2 * sigma^2, all other components zero
        let (nx, ny, nz) = (15, 5, 5);
        let mut data = vec![0.0; nx * ny * nz];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let x = i as f64;
                    data[i + j * nx + k * nx * ny] = x * x;
                }
            }
        }
        let input = Grid::from_vec(data, [nx, ny, nz], [1.0; 3]).unwrap();
        let sigma = 1.0;
        let field = compute_hessian(&input, sigma, DerivativeMethod::FiniteDifference).unwrap();

        let t = field.components().get(7, 2, 2);
        assert!((t[0] - 2.0 * sigma * sigma).abs() < 1e-9);
        for &v in &t[1..] {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn test_fourier_cosine_second_derivative() {
        let n = 16;
        let data: Vec<f64> = (0..n).map(|i| (2.0 * PI * i as f64 / n as f64).cos()).collect();
        let input = Grid::from_vec(data, [n, 1, 1], [1.0; 3]).unwrap();
        let sigma = 1.0;
        let field = compute_hessian(&input, sigma, DerivativeMethod::Fourier).unwrap();

        let f = 1.0 / n as f64;
        let w = 2.0 * PI * f;
        let expected = -w * w * (-2.0 * PI * PI * sigma * sigma * f * f).exp() * sigma * sigma;
        let t = field.components().data()[0];
        assert!((t[0] - expected).abs() < 1e-10);
    }

    #[test]
    fn test_2d_field_has_no_z_components() {
        let data: Vec<f64> = (0..36).map(|v| ((v % 6) as f64).powi(2)).collect();
        let input = Grid::new_2d(data, [6, 6], [1.0, 1.0]).unwrap();
        let field = compute_hessian(&input, 1.0, DerivativeMethod::FiniteDifference).unwrap();
        assert_eq!(field.dimension(), 2);
        for t in field.components().data() {
            assert_eq!(t[2], 0.0);
            assert_eq!(t[4], 0.0);
            assert_eq!(t[5], 0.0);
        }
    }

    #[test]
    fn test_tensor_is_symmetric() {
        let data: Vec<f64> = (0..125).map(|v| (v as f64 * 0.1).sin()).collect();
        let input = Grid::from_vec(data, [5, 5, 5], [1.0; 3]).unwrap();
        let field = compute_hessian(&input, 1.0, DerivativeMethod::FiniteDifference).unwrap();
        let m = field.tensor(62);
        for a in 0..3 {
            for b in 0..3 {
                assert_eq!(m[a][b], m[b][a]);
            }
        }
    }
}
