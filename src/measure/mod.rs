//! Eigenvalue-to-measure functors
//!
//! Each formula maps one eigenvalue triple to a scalar enhancement score and
//! declares the eigenvalue ordering it expects. Formulas with data-driven
//! constants compute them from the whole eigenvalue field before any voxel is
//! evaluated.
//!
//! Available formulas:
//! - [`DescoteauxSheetness`]: sheet measure with Frobenius-norm normalisation
//! - [`KrcahBoneMeasure`]: bone sheetness normalised by the mean trace
//! - [`FrangiVesselness`]: tubular vesselness

pub mod descoteaux;
pub mod estimation;
pub mod frangi;
pub mod krcah;

pub use descoteaux::*;
pub use frangi::*;
pub use krcah::*;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::eigen::{EigenField, EigenOrder};
use crate::error::{EnhanceError, EnhanceResult};
use crate::grid::{Grid, LabelMask};

/// Below this magnitude an eigenvalue is treated as zero
pub const EIGENVALUE_EPSILON: f64 = 1e-10;

/// Polarity of the structures to enhance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceType {
    /// Bright structures on a dark background (negative curvature)
    #[default]
    Bright,
    /// Dark structures on a bright background (positive curvature)
    Dark,
}

impl EnhanceType {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            EnhanceType::Bright => -1.0,
            EnhanceType::Dark => 1.0,
        }
    }

    /// True if `lambda` has the curvature sign this polarity enhances
    #[inline]
    pub fn accepts(self, lambda: f64) -> bool {
        self.sign() * lambda >= 0.0
    }
}

/// Run-global constants consumed by a formula
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureParameters {
    pub alpha: f64,
    pub beta: f64,
    pub c: f64,
}

impl Default for MeasureParameters {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            c: 0.5,
        }
    }
}

/// A scalar response formula over eigenvalue triples
pub trait EigenToMeasure: Send + Sync + std::fmt::Debug {
    /// Ordering the formula expects its triples in
    fn eigenvalue_order(&self) -> EigenOrder;

    /// Constants for this field: fixed, or estimated from the (masked) field
    fn parameters(
        &self,
        field: &EigenField,
        mask: Option<&LabelMask>,
    ) -> EnhanceResult<MeasureParameters>;

    /// Response of one voxel
    fn evaluate(&self, eigenvalues: &[f64; 3], params: &MeasureParameters) -> f64;
}

/// Evaluate `measure` on every voxel of `field`
///
/// Voxels outside `mask` are set to zero without evaluating the formula.
pub fn apply_measure(
    field: &EigenField,
    measure: &dyn EigenToMeasure,
    params: &MeasureParameters,
    mask: Option<&LabelMask>,
) -> EnhanceResult<Grid<f64>> {
    field.check_dimension()?;
    if field.order() != measure.eigenvalue_order() {
        return Err(EnhanceError::Configuration(format!(
            "measure expects {:?} eigenvalues, field is ordered {:?}",
            measure.eigenvalue_order(),
            field.order()
        )));
    }
    if let Some(m) = mask {
        m.check_contained_in(field.values())?;
    }

    debug!("apply_measure: {:?} with {:?}", measure, params);

    let values = field.values();
    let response: Vec<f64> = values
        .data()
        .par_iter()
        .enumerate()
        .map(|(offset, ev)| match mask {
            Some(m) if !m.is_inside_voxel(values, offset) => 0.0,
            _ => measure.evaluate(ev, params),
        })
        .collect();

    values.with_data(response)
}

/// Measure selection as it appears in configuration files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureConfig {
    Descoteaux(DescoteauxSheetness),
    Krcah(KrcahBoneMeasure),
    Frangi(FrangiVesselness),
}

impl Default for MeasureConfig {
    fn default() -> Self {
        MeasureConfig::Descoteaux(DescoteauxSheetness::default())
    }
}

impl MeasureConfig {
    pub fn into_measure(self) -> Box<dyn EigenToMeasure> {
        match self {
            MeasureConfig::Descoteaux(m) => Box::new(m),
            MeasureConfig::Krcah(m) => Box::new(m),
            MeasureConfig::Frangi(m) => Box::new(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with(values: Vec<[f64; 3]>, size: [usize; 3]) -> EigenField {
        EigenField::from_grid(
            Grid::from_vec(values, size, [1.0; 3]).unwrap(),
            EigenOrder::ByMagnitude,
        )
    }

    #[test]
    fn test_enhance_type_polarity() {
        assert!(EnhanceType::Bright.accepts(-2.0));
        assert!(!EnhanceType::Bright.accepts(2.0));
        assert!(EnhanceType::Dark.accepts(2.0));
        assert!(!EnhanceType::Dark.accepts(-2.0));
    }

    #[test]
    fn test_mask_zeroes_outside_for_every_formula() {
        let field = field_with(vec![[-0.1, -1.0, -3.0]; 64], [4, 4, 4]);
        let mut labels = Grid::filled([4, 4, 4], [1.0; 3], 0u32).unwrap();
        let inside = labels.offset(1, 1, 1);
        labels.data_mut()[inside] = 1;
        let mask = LabelMask::from_labels(labels);

        let measures: Vec<Box<dyn EigenToMeasure>> = vec![
            Box::new(DescoteauxSheetness::default()),
            Box::new(KrcahBoneMeasure::default()),
            Box::new(FrangiVesselness {
                c: 1.0,
                ..Default::default()
            }),
        ];

        for measure in measures {
            let params = measure.parameters(&field, Some(&mask)).unwrap();
            let out = apply_measure(&field, measure.as_ref(), &params, Some(&mask)).unwrap();
            for (offset, &v) in out.data().iter().enumerate() {
                if offset == inside {
                    assert!(v > 0.0, "{:?} should respond inside the mask", measure);
                } else {
                    assert_eq!(v, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_order_mismatch_is_rejected() {
        let field = EigenField::from_grid(
            Grid::filled([2, 2, 2], [1.0; 3], [0.0; 3]).unwrap(),
            EigenOrder::ByValue,
        );
        let measure = DescoteauxSheetness::default();
        let err = apply_measure(&field, &measure, &MeasureParameters::default(), None).unwrap_err();
        assert!(matches!(err, EnhanceError::Configuration(_)));
    }

    #[test]
    fn test_mask_outside_domain_rejected() {
        let field = field_with(vec![[0.0; 3]; 8], [2, 2, 2]);
        let labels = Grid::filled([2, 2, 2], [1.0; 3], 1u32)
            .unwrap()
            .with_origin([5.0, 0.0, 0.0]);
        let mask = LabelMask::from_labels(labels);
        let measure = DescoteauxSheetness::default();
        let params = MeasureParameters::default();
        let err = apply_measure(&field, &measure, &params, Some(&mask)).unwrap_err();
        assert!(matches!(err, EnhanceError::Domain(_)));
    }

    #[test]
    fn test_measure_config_from_json() {
        let config: MeasureConfig =
            serde_json::from_str(r#"{"type": "frangi", "c": 2.0, "enhance": "dark"}"#).unwrap();
        match config {
            MeasureConfig::Frangi(f) => {
                assert_eq!(f.c, 2.0);
                assert_eq!(f.alpha, 0.5);
                assert_eq!(f.enhance, EnhanceType::Dark);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
