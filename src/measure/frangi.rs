//! Frangi vesselness for tubular structures
//!
//! Frangi et al., "Multiscale vessel enhancement filtering", MICCAI 1998
//!
//! With |l1| <= |l2| <= |l3|:
//!
//! ```text
//! Ra = |l2| / |l3|             plate vs line
//! Rb = |l1| / sqrt(|l2 l3|)    blob vs line
//! S  = sqrt(l1^2 + l2^2 + l3^2)
//! V  = (1 - exp(-Ra^2 / 2a^2)) * exp(-Rb^2 / 2b^2) * (1 - exp(-S^2 / 2c^2))
//! ```

use serde::{Deserialize, Serialize};

use super::{EigenToMeasure, EnhanceType, MeasureParameters, EIGENVALUE_EPSILON};
use crate::eigen::{EigenField, EigenOrder};
use crate::error::EnhanceResult;
use crate::grid::LabelMask;

/// Frangi vesselness with fixed constants
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrangiVesselness {
    /// Sensitivity to plate-like structures (Ra term)
    pub alpha: f64,
    /// Sensitivity to blob-like structures (Rb term)
    pub beta: f64,
    /// Threshold between background noise and vessel structure (S term)
    pub c: f64,
    pub enhance: EnhanceType,
}

impl Default for FrangiVesselness {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            c: 500.0,
            enhance: EnhanceType::Bright,
        }
    }
}

impl EigenToMeasure for FrangiVesselness {
    fn eigenvalue_order(&self) -> EigenOrder {
        EigenOrder::ByMagnitude
    }

    fn parameters(
        &self,
        _field: &EigenField,
        _mask: Option<&LabelMask>,
    ) -> EnhanceResult<MeasureParameters> {
        Ok(MeasureParameters {
            alpha: self.alpha,
            beta: self.beta,
            c: self.c,
        })
    }

    fn evaluate(&self, eigenvalues: &[f64; 3], params: &MeasureParameters) -> f64 {
        frangi_vesselness(eigenvalues, params, self.enhance)
    }
}

/// Vesselness of one magnitude-ordered triple, in [0, 1]
pub fn frangi_vesselness(ev: &[f64; 3], params: &MeasureParameters, enhance: EnhanceType) -> f64 {
    let [l1, l2, l3] = *ev;
    let abs_l2 = l2.abs();
    let abs_l3 = l3.abs();

    if abs_l3 < EIGENVALUE_EPSILON || abs_l2 < EIGENVALUE_EPSILON {
        return 0.0;
    }

    // Both cross-sectional curvatures must match the polarity
    if !enhance.accepts(l2) || !enhance.accepts(l3) {
        return 0.0;
    }

    let ra = abs_l2 / abs_l3;
    let rb = l1.abs() / (abs_l2 * abs_l3).sqrt();
    let s = (l1 * l1 + l2 * l2 + l3 * l3).sqrt();

    let a = 2.0 * params.alpha * params.alpha;
    let b = 2.0 * params.beta * params.beta;
    let c2 = 2.0 * params.c * params.c;

    let exp_ra = 1.0 - (-ra * ra / a).exp();
    let exp_rb = (-rb * rb / b).exp();
    let exp_s = 1.0 - (-s * s / c2).exp();

    let v = exp_ra * exp_rb * exp_s;
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}
