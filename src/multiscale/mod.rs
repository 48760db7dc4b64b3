//! Multi-scale Hessian enhancement
//!
//! For every scale in the schedule: Hessian -> eigenvalues -> (parameter
//! estimation ->) measure. Responses of consecutive scales are merged by
//! keeping, per voxel, the value with the larger magnitude. Only the running
//! result survives from one scale to the next.

pub mod sigma;

pub use sigma::*;

use log::{debug, info};
use rayon::prelude::*;

use crate::eigen::{decompose, TENSOR_DIMENSION};
use crate::error::{EnhanceError, EnhanceResult};
use crate::grid::{Grid, LabelMask};
use crate::hessian::{compute_hessian, DerivativeMethod};
use crate::measure::{apply_measure, EigenToMeasure};

/// Response of the full single-scale pipeline
pub fn response_at_scale(
    input: &Grid<f64>,
    sigma: f64,
    measure: &dyn EigenToMeasure,
    mask: Option<&LabelMask>,
    derivative: DerivativeMethod,
) -> EnhanceResult<Grid<f64>> {
    let hessian = compute_hessian(input, sigma, derivative)?;
    let eigen = decompose(&hessian, measure.eigenvalue_order())?;
    drop(hessian);

    let params = measure.parameters(&eigen, mask)?;
    debug!("response_at_scale: sigma={:.4} params={:?}", sigma, params);

    apply_measure(&eigen, measure, &params, mask)
}

/// Keep the larger-magnitude value per voxel; ties keep `running`
pub fn combine_maximum_absolute(
    running: &mut Grid<f64>,
    candidate: &Grid<f64>,
) -> EnhanceResult<()> {
    if running.len() != candidate.len() {
        return Err(EnhanceError::DimensionMismatch {
            expected: running.len(),
            found: candidate.len(),
        });
    }
    if !running.same_geometry(candidate) {
        return Err(EnhanceError::Domain(format!(
            "cannot combine a {:?} grid with a {:?} grid",
            running.size(),
            candidate.size()
        )));
    }

    running
        .data_mut()
        .par_iter_mut()
        .zip(candidate.data().par_iter())
        .for_each(|(r, &c)| {
            if c.abs() > r.abs() {
                *r = c;
            }
        });
    Ok(())
}

/// Voxel-wise `|a| >= |b| ? a : b`
pub fn maximum_absolute_value(a: &Grid<f64>, b: &Grid<f64>) -> EnhanceResult<Grid<f64>> {
    let mut result = a.clone();
    combine_maximum_absolute(&mut result, b)?;
    Ok(result)
}

/// Multi-scale enhancement driver
#[derive(Debug, Default)]
pub struct MultiScaleEnhancement {
    measure: Option<Box<dyn EigenToMeasure>>,
    sigmas: Vec<f64>,
    mask: Option<LabelMask>,
    derivative: DerivativeMethod,
}

impl MultiScaleEnhancement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measure(mut self, measure: Box<dyn EigenToMeasure>) -> Self {
        self.measure = Some(measure);
        self
    }

    pub fn with_sigmas(mut self, sigmas: Vec<f64>) -> Self {
        self.sigmas = sigmas;
        self
    }

    /// Generate the schedule from a range
    pub fn with_sigma_range(
        self,
        minimum: f64,
        maximum: f64,
        count: usize,
        method: SigmaStepMethod,
    ) -> EnhanceResult<Self> {
        let sigmas = generate_sigma_array(minimum, maximum, count, method)?;
        Ok(self.with_sigmas(sigmas))
    }

    pub fn with_mask(mut self, mask: LabelMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_derivative_method(mut self, derivative: DerivativeMethod) -> Self {
        self.derivative = derivative;
        self
    }

    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    pub fn measure(&self) -> Option<&dyn EigenToMeasure> {
        self.measure.as_deref()
    }

    pub fn mask(&self) -> Option<&LabelMask> {
        self.mask.as_ref()
    }

    pub fn derivative_method(&self) -> DerivativeMethod {
        self.derivative
    }

    /// Enhance `input` across all scales
    pub fn run(&self, input: &Grid<f64>) -> EnhanceResult<Grid<f64>> {
        self.run_with_progress(input, |_, _| {})
    }

    /// Enhance `input`, reporting `(completed_scales, total_scales)`
    pub fn run_with_progress<F>(
        &self,
        input: &Grid<f64>,
        progress: F,
    ) -> EnhanceResult<Grid<f64>>
    where
        F: Fn(usize, usize),
    {
        let measure = self.validate(input)?;
        let mask = self.mask.as_ref();
        let total = self.sigmas.len();

        info!(
            "MultiScaleEnhancement: {:?} over {} scales {:?}, order {:?}",
            input.size(),
            total,
            self.sigmas,
            measure.eigenvalue_order()
        );

        progress(0, total);
        let mut running =
            response_at_scale(input, self.sigmas[0], measure, mask, self.derivative)?;
        progress(1, total);

        for (level, &sigma) in self.sigmas.iter().enumerate().skip(1) {
            let candidate = response_at_scale(input, sigma, measure, mask, self.derivative)?;
            combine_maximum_absolute(&mut running, &candidate)?;
            debug!(
                "MultiScaleEnhancement: merged scale {}/{} (sigma={:.4})",
                level + 1,
                total,
                sigma
            );
            progress(level + 1, total);
        }

        info!("MultiScaleEnhancement: complete");
        Ok(running)
    }

    fn validate(&self, input: &Grid<f64>) -> EnhanceResult<&dyn EigenToMeasure> {
        let measure = self.measure.as_deref().ok_or_else(|| {
            EnhanceError::Configuration("eigenvalue-to-measure functor is not set".to_string())
        })?;

        if self.sigmas.is_empty() {
            return Err(EnhanceError::Configuration(
                "sigma array must have at least one sigma value".to_string(),
            ));
        }
        if let Some(&bad) = self.sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(EnhanceError::InvalidParameter(format!(
                "sigma must be positive, got {}",
                bad
            )));
        }
        if input.dimension() != TENSOR_DIMENSION {
            return Err(EnhanceError::DimensionMismatch {
                expected: TENSOR_DIMENSION,
                found: input.dimension(),
            });
        }
        if let Some(mask) = &self.mask {
            mask.check_contained_in(input)?;
        }

        Ok(measure)
    }
}
