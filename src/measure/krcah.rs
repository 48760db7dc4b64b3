//! Krcah bone measure
//!
//! Krcah et al., "Fully automatic and fast segmentation of the femur bone from
//! 3D-CT images with no shape prior", ISBI 2011.
//!
//! With |l1| <= |l2| <= |l3|:
//!
//! ```text
//! Rsheet = |l2| / |l3|
//! Rtube  = |l1| / (|l2| |l3|)
//! Rnoise = |l1| + |l2| + |l3|
//! K = exp(-Rsheet^2 / 2a^2) * exp(-Rtube^2 / 2b^2) * (1 - exp(-Rnoise^2 / 2c^2))
//! ```
//!
//! `c` is `gamma` times the mean trace magnitude over the foreground.

use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

use super::estimation::partition_accumulators;
use super::{EigenToMeasure, EnhanceType, MeasureParameters, EIGENVALUE_EPSILON};
use crate::eigen::{EigenField, EigenOrder};
use crate::error::EnhanceResult;
use crate::grid::LabelMask;

/// Published constants or the ones used by the reference implementation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KrcahParameterSet {
    /// alpha = 0.5, beta = 0.5, gamma = 0.25
    #[default]
    Journal,
    /// Journal constants scaled by sqrt(2)
    Implementation,
}

impl KrcahParameterSet {
    /// (alpha, beta, gamma)
    pub fn constants(self) -> (f64, f64, f64) {
        match self {
            KrcahParameterSet::Journal => (0.5, 0.5, 0.25),
            KrcahParameterSet::Implementation => (SQRT_2 * 0.5, SQRT_2 * 0.5, SQRT_2 * 0.25),
        }
    }
}

/// Estimated Krcah constants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KrcahParameters {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Mean of |l1| + |l2| + |l3| over the foreground
    pub average_trace: f64,
}

impl KrcahParameters {
    pub fn c(&self) -> f64 {
        self.gamma * self.average_trace
    }
}

impl From<KrcahParameters> for MeasureParameters {
    fn from(p: KrcahParameters) -> Self {
        MeasureParameters {
            alpha: p.alpha,
            beta: p.beta,
            c: p.c(),
        }
    }
}

#[inline]
fn trace_magnitude(ev: &[f64; 3]) -> f64 {
    ev.iter().map(|l| l.abs()).sum()
}

/// Estimates the mean trace magnitude over the foreground
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrcahParameterEstimator {
    pub parameter_set: KrcahParameterSet,
}

impl KrcahParameterEstimator {
    pub fn estimate(
        &self,
        field: &EigenField,
        mask: Option<&LabelMask>,
    ) -> EnhanceResult<KrcahParameters> {
        let partitions = partition_accumulators(field, mask, (0.0f64, 0usize), |(sum, n), ev| {
            (sum + trace_magnitude(ev), n + 1)
        })?;
        let (sum, count) = partitions
            .into_iter()
            .fold((0.0, 0usize), |(s0, n0), (s1, n1)| (s0 + s1, n0 + n1));

        let average_trace = if count > 0 { sum / count as f64 } else { 0.0 };
        let (alpha, beta, gamma) = self.parameter_set.constants();

        debug!(
            "Krcah estimate: {} foreground voxels, mean trace {:.6}",
            count, average_trace
        );

        Ok(KrcahParameters {
            alpha,
            beta,
            gamma,
            average_trace,
        })
    }
}

/// Krcah bone sheetness measure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrcahBoneMeasure {
    pub alpha: f64,
    pub beta: f64,
    /// Used when `estimation` is `None`
    pub c: f64,
    pub enhance: EnhanceType,
    pub estimation: Option<KrcahParameterEstimator>,
}

impl Default for KrcahBoneMeasure {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            c: 0.25,
            enhance: EnhanceType::Bright,
            estimation: Some(KrcahParameterEstimator::default()),
        }
    }
}

impl EigenToMeasure for KrcahBoneMeasure {
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
        krcah_bone(eigenvalues, params, self.enhance)
    }
}

/// Bone measure of one magnitude-ordered triple
pub fn krcah_bone(ev: &[f64; 3], params: &MeasureParameters, enhance: EnhanceType) -> f64 {
    let l1 = ev[0].abs();
    let l2 = ev[1].abs();
    let l3 = ev[2].abs();

    if !enhance.accepts(ev[2]) || l2 * l3 < EIGENVALUE_EPSILON {
        return 0.0;
    }

    let r_sheet = l2 / l3;
    let r_tube = l1 / (l2 * l3);
    let r_noise = l1 + l2 + l3;

    let a = 2.0 * params.alpha * params.alpha;
    let b = 2.0 * params.beta * params.beta;
    let c = 2.0 * params.c * params.c;

    let sheet = (-r_sheet * r_sheet / a).exp();
    let tube = (-r_tube * r_tube / b).exp();
    let noise = if c > 0.0 { 1.0 - (-r_noise * r_noise / c).exp() } else { 1.0 };

    let k = sheet * tube * noise;
    if k.is_finite() { k } else { 0.0 }
}
