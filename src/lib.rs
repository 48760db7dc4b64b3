//! Hessian-Enhance-WASM: multi-scale Hessian structure enhancement
//!
//! Enhances sheet-, bone- and vessel-like structures in 3D images by analysing
//! the eigenvalues of the scale-normalised Hessian at several scales and
//! keeping, per voxel, the strongest response.
//!
//! # Modules
//! - `grid`: image/label grids with physical geometry
//! - `hessian`: Gaussian-derivative Hessian (finite differences or FFT)
//! - `eigen`: symmetric eigen-decomposition and eigenvalue ordering
//! - `measure`: Descoteaux, Krcah and Frangi measures with parameter estimation
//! - `multiscale`: scale schedules and the multi-scale driver
//! - `config`: serde run configuration
//! - `fft`: 3D FFT operations using rustfft
//! - `utils`: separable Gaussian smoothing and finite differences

// Core modules
pub mod error;
pub mod fft;
pub mod grid;
pub mod utils;

// Algorithm modules
pub mod eigen;
pub mod hessian;
pub mod measure;
pub mod multiscale;

pub mod config;

use wasm_bindgen::prelude::*;

use crate::config::EnhancementConfig;
use crate::eigen::{decompose, EigenOrder};
use crate::error::{EnhanceError, EnhanceResult};
use crate::grid::Grid;
use crate::hessian::compute_hessian;
use crate::measure::{DescoteauxParameterEstimator, DescoteauxParameters};
use crate::multiscale::SigmaStepMethod;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

impl From<EnhanceError> for JsValue {
    fn from(err: EnhanceError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn volume(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
) -> EnhanceResult<Grid<f64>> {
    Grid::from_vec(data.to_vec(), [nx, ny, nz], [vsx, vsy, vsz])
}

/// Empty string means defaults
fn parse_config(config_json: &str) -> EnhanceResult<EnhancementConfig> {
    if config_json.trim().is_empty() {
        Ok(EnhancementConfig::default())
    } else {
        EnhancementConfig::from_json(config_json)
    }
}

/// Run the configured pipeline, reporting `(completed_scales, total_scales)`
#[allow(clippy::too_many_arguments)]
fn run_enhancement<F: Fn(usize, usize)>(
    data: &[f64],
    mask: &[u32],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    config_json: &str,
    progress: F,
) -> EnhanceResult<Vec<f64>> {
    let config = parse_config(config_json)?;

    let image = volume(data, nx, ny, nz, vsx, vsy, vsz)?;
    let mut enhancement = config.build()?;
    if !mask.is_empty() {
        let labels = image.with_data(mask.to_vec())?;
        enhancement = enhancement.with_mask(config.label_mask(labels));
    }

    let response = enhancement.run_with_progress(&image, progress)?;
    Ok(response.into_vec())
}

// ============================================================================
// WASM Exports: Multi-Scale Enhancement
// ============================================================================

/// Multi-scale Hessian enhancement
///
/// # Arguments
/// * `data` - Image values (nx * ny * nz), x varies fastest
/// * `mask` - Label mask (nx * ny * nz), empty for no mask
/// * `nx`, `ny`, `nz` - Array dimensions
/// * `vsx`, `vsy`, `vsz` - Voxel sizes in mm
/// * `config_json` - JSON run configuration, empty for defaults
///
/// # Returns
/// Enhanced image as Float64Array
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn multiscale_enhancement_wasm(
    data: &[f64],
    mask: &[u32],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    config_json: &str,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM multiscale_enhancement: {}x{}x{}, voxel=({:.2},{:.2},{:.2}), mask={}",
                 nx, ny, nz, vsx, vsy, vsz, !mask.is_empty());

    let result = run_enhancement(
        data, mask, nx, ny, nz, vsx, vsy, vsz, config_json, |_, _| {}
    )?;

    console_log!("WASM multiscale_enhancement complete");
    Ok(result)
}

/// Multi-scale enhancement with progress callback
///
/// The callback receives (completed_scales, total_scales)
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn multiscale_enhancement_wasm_with_progress(
    data: &[f64],
    mask: &[u32],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    config_json: &str,
    progress_callback: &js_sys::Function,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM multiscale_enhancement with progress: {}x{}x{}", nx, ny, nz);

    let callback = progress_callback.clone();
    let result = run_enhancement(
        data, mask, nx, ny, nz, vsx, vsy, vsz, config_json,
        |current, total| {
            let this = JsValue::null();
            let _ = callback.call2(&this,
                &JsValue::from(current as u32),
                &JsValue::from(total as u32));
        }
    )?;

    console_log!("WASM multiscale_enhancement complete");
    Ok(result)
}

// ============================================================================
// WASM Exports: Parameter Estimation
// ============================================================================

/// Descoteaux constants at one scale, using the configured backend and background label
#[allow(clippy::too_many_arguments)]
fn estimate_descoteaux(
    data: &[f64],
    mask: &[u32],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    config_json: &str,
    sigma: f64,
    frobenius_norm_weight: f64,
) -> EnhanceResult<DescoteauxParameters> {
    let config = parse_config(config_json)?;

    let image = volume(data, nx, ny, nz, vsx, vsy, vsz)?;
    let labels = if mask.is_empty() {
        None
    } else {
        Some(config.label_mask(image.with_data(mask.to_vec())?))
    };

    let hessian = compute_hessian(&image, sigma, config.derivative)?;
    let field = decompose(&hessian, EigenOrder::ByMagnitude)?;
    DescoteauxParameterEstimator::new(frobenius_norm_weight).estimate(&field, labels.as_ref())
}

/// Estimate Descoteaux constants at a single scale
///
/// # Arguments
/// * `data`, `mask`, dims and voxel sizes as in `multiscale_enhancement_wasm`
/// * `config_json` - JSON run configuration; `derivative` and `mask_background` are used
/// * `sigma` - Scale in mm
/// * `frobenius_norm_weight` - Weight applied to the maximum Frobenius norm
///
/// # Returns
/// [alpha, beta, c]
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn descoteaux_parameters_wasm(
    data: &[f64],
    mask: &[u32],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    config_json: &str,
    sigma: f64,
    frobenius_norm_weight: f64,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM descoteaux_parameters: {}x{}x{}, sigma={:.3}, weight={:.3}",
                 nx, ny, nz, sigma, frobenius_norm_weight);

    let params = estimate_descoteaux(
        data, mask, nx, ny, nz, vsx, vsy, vsz, config_json, sigma, frobenius_norm_weight
    )?;

    console_log!("WASM descoteaux_parameters: alpha={:.3}, beta={:.3}, c={:.6}",
                 params.alpha(), params.beta(), params.c());
    Ok(vec![params.alpha(), params.beta(), params.c()])
}

/// Generate a scale schedule
///
/// `logarithmic` selects logarithmic rather than equal spacing.
#[wasm_bindgen]
pub fn generate_sigma_array_wasm(
    sigma_minimum: f64,
    sigma_maximum: f64,
    number_of_sigma_steps: usize,
    logarithmic: bool,
) -> Result<Vec<f64>, JsValue> {
    let method = if logarithmic {
        SigmaStepMethod::Logarithmic
    } else {
        SigmaStepMethod::Equispaced
    };
    let sigmas = multiscale::generate_sigma_array(
        sigma_minimum, sigma_maximum, number_of_sigma_steps, method
    )?;
    Ok(sigmas)
}

// ============================================================================
// WASM Exports: Utilities
// ============================================================================

/// Check if WASM module is loaded and working
#[wasm_bindgen]
pub fn wasm_health_check() -> bool {
    console_log!("Hessian-Enhance-WASM module loaded successfully!");
    true
}

/// Get version string
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_run_enhancement_with_mask() {
        let (nx, ny, nz) = (10, 10, 13);
        let mut data = vec![0.0; nx * ny * nz];
        let mut mask = vec![0u32; nx * ny * nz];
        for j in 0..ny {
            for i in 0..nx {
                data[i + j * nx + 6 * nx * ny] = 1.0;
                if i < 5 {
                    mask[i + j * nx + 6 * nx * ny] = 2;
                }
            }
        }

        let config = r#"{ "sigma_minimum": 1.0, "sigma_maximum": 1.0 }"#;
        let out = run_enhancement(
            &data, &mask, nx, ny, nz, 1.0, 1.0, 1.0, config, |_, _| {}
        ).unwrap();
        assert_eq!(out.len(), data.len());
        assert!(out[2 + 5 * nx + 6 * nx * ny] > 0.0);
        assert_eq!(out[8 + 5 * nx + 6 * nx * ny], 0.0);
    }

    #[test]
    fn test_run_enhancement_length_mismatch() {
        let err = run_enhancement(
            &[0.0; 10], &[], 2, 2, 2, 1.0, 1.0, 1.0, "", |_, _| {}
        ).unwrap_err();
        assert_eq!(err, EnhanceError::DimensionMismatch { expected: 8, found: 10 });
    }

    #[test]
    fn test_run_enhancement_bad_config() {
        let err = run_enhancement(
            &[0.0; 8], &[], 2, 2, 2, 1.0, 1.0, 1.0, "{", |_, _| {}
        ).unwrap_err();
        assert!(matches!(err, EnhanceError::Configuration(_)));
    }

    /// Bright plate at z = 6 in a 10x10x13 volume
    fn plate_data() -> (Vec<f64>, [usize; 3]) {
        let (nx, ny, nz) = (10, 10, 13);
        let mut data = vec![0.0; nx * ny * nz];
        for j in 0..ny {
            for i in 0..nx {
                data[i + j * nx + 6 * nx * ny] = 1.0;
            }
        }
        (data, [nx, ny, nz])
    }

    #[test]
    fn test_estimate_descoteaux_follows_configured_backend() {
        let (data, [nx, ny, nz]) = plate_data();
        let config = r#"{ "derivative": "fourier" }"#;
        let params = estimate_descoteaux(
            &data, &[], nx, ny, nz, 1.0, 1.0, 1.0, config, 1.0, 0.5
        ).unwrap();

        let image = Grid::from_vec(data, [nx, ny, nz], [1.0; 3]).unwrap();
        let hessian = compute_hessian(&image, 1.0, hessian::DerivativeMethod::Fourier).unwrap();
        let field = decompose(&hessian, EigenOrder::ByMagnitude).unwrap();
        let expected = DescoteauxParameterEstimator::new(0.5).estimate(&field, None).unwrap();

        assert_eq!(params, expected);
        assert!(params.c() > 0.0);
        assert!((params.alpha() - 0.5).abs() < 1e-12);
        assert!((params.beta() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_descoteaux_uses_configured_background() {
        let (data, [nx, ny, nz]) = plate_data();
        let mask = vec![4u32; data.len()];

        let everything = estimate_descoteaux(
            &data, &mask, nx, ny, nz, 1.0, 1.0, 1.0, "", 1.0, 0.5
        ).unwrap();
        assert!(everything.c() > 0.0);

        let config = r#"{ "mask_background": 4 }"#;
        let nothing = estimate_descoteaux(
            &data, &mask, nx, ny, nz, 1.0, 1.0, 1.0, config, 1.0, 0.5
        ).unwrap();
        assert_eq!(nothing.c(), 0.0);
    }
}
