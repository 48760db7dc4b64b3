//! Descoteaux sheetness and its Frobenius-norm parameter estimator
//!
//! Based on:
//! - Descoteaux et al., "Bone enhancement filtering: application to sinus bone
//!   segmentation and simulation of pituitary surgery", MICCAI 2005
//!
//! With |l1| <= |l2| <= |l3|:
//!
//! ```text
//! Rsheet = |l2| / |l3|
//! Rblob  = |2|l3| - |l2| - |l1|| / |l3|
//! Rnoise = sqrt(l1^2 + l2^2 + l3^2)
//! S = exp(-Rsheet^2 / 2a^2) * (1 - exp(-Rblob^2 / 2b^2)) * (1 - exp(-Rnoise^2 / 2c^2))
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use super::estimation::partition_accumulators;
use super::{EigenToMeasure, EnhanceType, MeasureParameters, EIGENVALUE_EPSILON};
use crate::eigen::{EigenField, EigenOrder};
use crate::error::{EnhanceError, EnhanceResult};
use crate::grid::LabelMask;

/// Weight applied to the maximum Frobenius norm when estimating `c`
pub const DEFAULT_FROBENIUS_NORM_WEIGHT: f64 = 0.5;

/// Constants of the Descoteaux formula
///
/// Only `c` is data-driven; `alpha` and `beta` stay at 0.5.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescoteauxParameters {
    alpha: f64,
    beta: f64,
    c: f64,
}

impl Default for DescoteauxParameters {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            c: 0.5,
        }
    }
}

impl DescoteauxParameters {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn c(&self) -> f64 {
        self.c
    }
}

impl From<DescoteauxParameters> for MeasureParameters {
    fn from(p: DescoteauxParameters) -> Self {
        MeasureParameters {
            alpha: p.alpha,
            beta: p.beta,
            c: p.c,
        }
    }
}

/// Frobenius norm of a symmetric matrix from its eigenvalues
#[inline]
pub fn frobenius_norm(eigenvalues: &[f64; 3]) -> f64 {
    eigenvalues.iter().map(|l| l * l).sum::<f64>().sqrt()
}

/// Largest Frobenius norm over the foreground of `field`
///
/// Zero when the foreground is empty.
pub fn max_frobenius_norm(field: &EigenField, mask: Option<&LabelMask>) -> EnhanceResult<f64> {
    let partitions = partition_accumulators(field, mask, 0.0f64, |acc, ev| {
        acc.max(frobenius_norm(ev))
    })?;
    Ok(partitions.into_iter().fold(0.0, f64::max))
}

/// Estimates `c = weight * max Frobenius norm` over the foreground
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescoteauxParameterEstimator {
    pub frobenius_norm_weight: f64,
}

impl Default for DescoteauxParameterEstimator {
    fn default() -> Self {
        Self {
            frobenius_norm_weight: DEFAULT_FROBENIUS_NORM_WEIGHT,
        }
    }
}

impl DescoteauxParameterEstimator {
    pub fn new(frobenius_norm_weight: f64) -> Self {
        Self { frobenius_norm_weight }
    }

    pub fn estimate(
        &self,
        field: &EigenField,
        mask: Option<&LabelMask>,
    ) -> EnhanceResult<DescoteauxParameters> {
        if !self.frobenius_norm_weight.is_finite() {
            return Err(EnhanceError::InvalidParameter(format!(
                "Frobenius norm weight must be finite, got {}",
                self.frobenius_norm_weight
            )));
        }

        let max_norm = max_frobenius_norm(field, mask)?;
        let params = DescoteauxParameters {
            c: self.frobenius_norm_weight * max_norm,
            ..DescoteauxParameters::default()
        };

        debug!(
            "Descoteaux estimate: max Frobenius norm {:.6}, c={:.6}",
            max_norm, params.c
        );
        Ok(params)
    }
}

/// Descoteaux sheetness measure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescoteauxSheetness {
    /// Sheet sensitivity (Rsheet term)
    pub alpha: f64,
    /// Blob sensitivity (Rblob term)
    pub beta: f64,
    /// Noise threshold (Rnoise term), used when `estimation` is `None`
    pub c: f64,
    pub enhance: EnhanceType,
    /// Estimate `c` from each eigenvalue field instead of using the fixed value
    pub estimation: Option<DescoteauxParameterEstimator>,
}

impl Default for DescoteauxSheetness {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            c: 0.5,
            enhance: EnhanceType::Bright,
            estimation: Some(DescoteauxParameterEstimator::default()),
        }
    }
}

impl EigenToMeasure for DescoteauxSheetness {
    fn eigenvalue_order(&self) -> EigenOrder {
        EigenOrder::ByMagnitude
    }

    fn parameters(
        &self,
        field: &EigenField,
        mask: Option<&LabelMask>,
    ) -> EnhanceResult<MeasureParameters> {
        match &self.estimation {
            Some(estimator) => Ok(estimator.estimate(field, mask)?.into()),
            None => Ok(MeasureParameters {
                alpha: self.alpha,
                beta: self.beta,
                c: self.c,
            }),
        }
    }

    fn evaluate(&self, eigenvalues: &[f64; 3], params: &MeasureParameters) -> f64 {
        descoteaux_sheetness(eigenvalues, params, self.enhance)
    }
}

/// Sheetness of one magnitude-ordered triple
pub fn descoteaux_sheetness(
    ev: &[f64; 3],
    params: &MeasureParameters,
    enhance: EnhanceType,
) -> f64 {
    let l1 = ev[0].abs();
    let l2 = ev[1].abs();
    let l3 = ev[2].abs();

    if !enhance.accepts(ev[2]) || l3 < EIGENVALUE_EPSILON {
        return 0.0;
    }

    let r_sheet = l2 / l3;
    let r_blob = (2.0 * l3 - l2 - l1).abs() / l3;
    let r_noise = frobenius_norm(ev);

    let a = 2.0 * params.alpha * params.alpha;
    let b = 2.0 * params.beta * params.beta;
    let c = 2.0 * params.c * params.c;

    let sheet = (-r_sheet * r_sheet / a).exp();
    let blob = 1.0 - (-r_blob * r_blob / b).exp();
    let noise = if c > 0.0 { 1.0 - (-r_noise * r_noise / c).exp() } else { 1.0 };

    let s = sheet * blob * noise;
    if s.is_finite() { s } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    const TOL: f64 = 1e-6;

    fn uniform_field(value: f64) -> EigenField {
        EigenField::from_grid(
            Grid::filled([10, 10, 10], [1.0; 3], [value; 3]).unwrap(),
            EigenOrder::ByMagnitude,
        )
    }

    /// (-1,-1,-1) everywhere except (3,3,3) inside [2,10)^3
    fn field_with_block() -> EigenField {
        let mut grid = Grid::filled([10, 10, 10], [1.0; 3], [-1.0; 3]).unwrap();
        for k in 2..10 {
            for j in 2..10 {
                for i in 2..10 {
                    let off = grid.offset(i, j, k);
                    grid.data_mut()[off] = [3.0; 3];
                }
            }
        }
        EigenField::from_grid(grid, EigenOrder::ByMagnitude)
    }

    /// Background label 1, block [2,10)^3 labelled 2
    fn block_mask() -> Grid<u32> {
        let mut labels = Grid::filled([10, 10, 10], [1.0; 3], 1u32).unwrap();
        for k in 2..10 {
            for j in 2..10 {
                for i in 2..10 {
                    let off = labels.offset(i, j, k);
                    labels.data_mut()[off] = 2;
                }
            }
        }
        labels
    }

    #[test]
    fn test_defaults() {
        let p = DescoteauxParameters::default();
        assert!((p.alpha() - 0.5).abs() < TOL);
        assert!((p.beta() - 0.5).abs() < TOL);
        assert!((p.c() - 0.5).abs() < TOL);
        assert_eq!(DescoteauxParameterEstimator::default().frobenius_norm_weight, 0.5);
    }

    #[test]
    fn test_uniform_field_no_mask() {
        let field = uniform_field(-1.0);

        let p = DescoteauxParameterEstimator::default().estimate(&field, None).unwrap();
        assert!((p.alpha() - 0.5).abs() < TOL);
        assert!((p.beta() - 0.5).abs() < TOL);
        assert!((p.c() - 3f64.sqrt() * 0.5).abs() < TOL);

        let p = DescoteauxParameterEstimator::new(0.25).estimate(&field, None).unwrap();
        assert!((p.alpha() - 0.5).abs() < TOL);
        assert!((p.beta() - 0.5).abs() < TOL);
        assert!((p.c() - 3f64.sqrt() * 0.25).abs() < TOL);
    }

    #[test]
    fn test_background_label_selects_region() {
        let field = field_with_block();
        let estimator = DescoteauxParameterEstimator::default();

        // Block labelled 2 treated as background: only the (-1,-1,-1) shell counts
        let mask = LabelMask::new(block_mask(), 2);
        let p = estimator.estimate(&field, Some(&mask)).unwrap();
        assert!((p.c() - 3f64.sqrt() * 1.0 * 0.5).abs() < TOL);

        // Shell labelled 1 treated as background: only the (3,3,3) block counts
        let mask = LabelMask::new(block_mask(), 1);
        let p = estimator.estimate(&field, Some(&mask)).unwrap();
        assert!((p.alpha() - 0.5).abs() < TOL);
        assert!((p.beta() - 0.5).abs() < TOL);
        assert!((p.c() - 3f64.sqrt() * 3.0 * 0.5).abs() < TOL);
    }

    #[test]
    fn test_sub_region_mask() {
        let field = uniform_field(-1.0);
        let labels = Grid::filled([8, 8, 8], [1.0; 3], 2u32)
            .unwrap()
            .with_start_index([2, 2, 2]);
        let mask = LabelMask::new(labels, 1);

        let p = DescoteauxParameterEstimator::default().estimate(&field, Some(&mask)).unwrap();
        assert!((p.c() - 3f64.sqrt() * 0.5).abs() < TOL);
    }

    #[test]
    fn test_empty_foreground_gives_zero() {
        let field = uniform_field(-1.0);
        let mask = LabelMask::new(Grid::filled([10, 10, 10], [1.0; 3], 4u32).unwrap(), 4);
        let p = DescoteauxParameterEstimator::default().estimate(&field, Some(&mask)).unwrap();
        assert_eq!(p.c(), 0.0);

        let p = DescoteauxParameterEstimator::default()
            .estimate(&uniform_field(0.0), None)
            .unwrap();
        assert_eq!(p.c(), 0.0);
    }

    #[test]
    fn test_2d_field_rejected() {
        let field = EigenField::from_grid(
            Grid::new_2d(vec![[0.0; 3]; 9], [3, 3], [1.0, 1.0]).unwrap(),
            EigenOrder::ByMagnitude,
        );
        let err = DescoteauxParameterEstimator::default().estimate(&field, None).unwrap_err();
        assert_eq!(err, EnhanceError::DimensionMismatch { expected: 3, found: 2 });
    }

    #[test]
    fn test_sheetness_ideal_sheet() {
        // l1 = l2 = 0, l3 strongly negative: Rsheet = 0, Rblob = 2
        let params = MeasureParameters { alpha: 0.5, beta: 0.5, c: 1.0 };
        let s = descoteaux_sheetness(&[0.0, 0.0, -10.0], &params, EnhanceType::Bright);
        let expected = (1.0 - (-4.0f64 / 0.5).exp()) * (1.0 - (-100.0f64 / 2.0).exp());
        assert!((s - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sheetness_polarity_and_degenerate() {
        let params = MeasureParameters::default();
        assert_eq!(descoteaux_sheetness(&[0.0, 0.0, 10.0], &params, EnhanceType::Bright), 0.0);
        assert!(descoteaux_sheetness(&[0.0, 0.0, 10.0], &params, EnhanceType::Dark) > 0.0);
        assert_eq!(descoteaux_sheetness(&[0.0, 0.0, 0.0], &params, EnhanceType::Bright), 0.0);
    }

    #[test]
    fn test_fixed_parameters_without_estimation() {
        let measure = DescoteauxSheetness {
            c: 7.0,
            estimation: None,
            ..Default::default()
        };
        let p = measure.parameters(&uniform_field(-1.0), None).unwrap();
        assert_eq!(p, MeasureParameters { alpha: 0.5, beta: 0.5, c: 7.0 });
    }
}
