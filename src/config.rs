//! Run configuration
//!
//! Every field has a default, so partial JSON documents are accepted:
//!
//! ```json
//! {
//!   "sigma_minimum": 0.5,
//!   "sigma_maximum": 2.0,
//!   "number_of_sigma_steps": 4,
//!   "step_method": "logarithmic",
//!   "measure": { "type": "krcah", "estimation": { "parameter_set": "implementation" } }
//! }
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EnhanceResult;
use crate::grid::{Grid, LabelMask};
use crate::hessian::DerivativeMethod;
use crate::measure::MeasureConfig;
use crate::multiscale::{MultiScaleEnhancement, SigmaStepMethod};

/// Parameters of one multi-scale enhancement run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub sigma_minimum: f64,
    pub sigma_maximum: f64,
    pub number_of_sigma_steps: usize,
    pub step_method: SigmaStepMethod,
    pub derivative: DerivativeMethod,
    pub measure: MeasureConfig,
    /// Label treated as background when a label mask is supplied
    pub mask_background: u32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            sigma_minimum: 1.0,
            sigma_maximum: 3.0,
            number_of_sigma_steps: 3,
            step_method: SigmaStepMethod::Equispaced,
            derivative: DerivativeMethod::FiniteDifference,
            measure: MeasureConfig::default(),
            mask_background: 0,
        }
    }
}

impl EnhancementConfig {
    pub fn from_json(json: &str) -> EnhanceResult<Self> {
        let config: EnhancementConfig = serde_json::from_str(json)?;
        debug!("EnhancementConfig: {:?}", config);
        Ok(config)
    }

    pub fn to_json(&self) -> EnhanceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wrap a label image using the configured background label
    pub fn label_mask(&self, labels: Grid<u32>) -> LabelMask {
        LabelMask::new(labels, self.mask_background)
    }

    /// Aggregator with the generated schedule, measure and derivative backend
    pub fn build(&self) -> EnhanceResult<MultiScaleEnhancement> {
        MultiScaleEnhancement::new()
            .with_measure(self.measure.clone().into_measure())
            .with_derivative_method(self.derivative)
            .with_sigma_range(
                self.sigma_minimum,
                self.sigma_maximum,
                self.number_of_sigma_steps,
                self.step_method,
            )
    }
}
