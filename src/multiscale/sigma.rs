//! Scale schedule generation

use serde::{Deserialize, Serialize};

use crate::error::{EnhanceError, EnhanceResult};

/// Spacing between consecutive scales
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaStepMethod {
    #[default]
    Equispaced,
    Logarithmic,
}

/// Generate `count` scales between `minimum` and `maximum`
///
/// Bounds given in the wrong order are swapped. Equal bounds always produce a
/// single scale. The first scale is exactly the minimum.
pub fn generate_sigma_array(
    minimum: f64,
    maximum: f64,
    count: usize,
    method: SigmaStepMethod,
) -> EnhanceResult<Vec<f64>> {
    if count < 1 {
        return Err(EnhanceError::InvalidParameter(
            "number of sigma values requested is less than 1".to_string(),
        ));
    }
    if !(minimum.is_finite() && maximum.is_finite() && minimum > 0.0 && maximum > 0.0) {
        return Err(EnhanceError::InvalidParameter(format!(
            "sigma bounds must be positive, got [{}, {}]",
            minimum, maximum
        )));
    }

    let (lo, hi) = if minimum > maximum { (maximum, minimum) } else { (minimum, maximum) };
    let count = if lo == hi { 1 } else { count };

    let mut sigmas = Vec::with_capacity(count);
    sigmas.push(lo);

    if count > 1 {
        let steps = (count - 1) as f64;
        match method {
            SigmaStepMethod::Equispaced => {
                let step = ((hi - lo) / steps).max(1e-10);
                sigmas.extend((1..count).map(|i| lo + step * i as f64));
            }
            SigmaStepMethod::Logarithmic => {
                let step = ((hi.ln() - lo.ln()) / steps).max(1e-10);
                sigmas.extend((1..count).map(|i| (lo.ln() + step * i as f64).exp()));
            }
        }
    }

    Ok(sigmas)
}

pub fn generate_equispaced_sigma_array(
    minimum: f64,
    maximum: f64,
    count: usize,
) -> EnhanceResult<Vec<f64>> {
    generate_sigma_array(minimum, maximum, count, SigmaStepMethod::Equispaced)
}

pub fn generate_logarithmic_sigma_array(
    minimum: f64,
    maximum: f64,
    count: usize,
) -> EnhanceResult<Vec<f64>> {
    generate_sigma_array(minimum, maximum, count, SigmaStepMethod::Logarithmic)
}
