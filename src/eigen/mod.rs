//! Per-voxel eigen-decomposition of a Hessian field
//!
//! The symmetric 3x3 eigen-solver comes from nalgebra; this module only
//! decides the ordering of the returned triple.

use log::debug;
use nalgebra::Matrix3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EnhanceError, EnhanceResult};
use crate::grid::Grid;
use crate::hessian::HessianField;

/// Dimension of every tensor handled by this module
pub const TENSOR_DIMENSION: usize = 3;

/// Ordering applied to each eigenvalue triple
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EigenOrder {
    /// lambda1 <= lambda2 <= lambda3
    ByValue,
    /// |lambda1| <= |lambda2| <= |lambda3|, signs kept
    #[default]
    ByMagnitude,
    /// Solver's native order
    Unordered,
}

/// Eigenvalue triple per voxel, tagged with its ordering
#[derive(Clone, Debug)]
pub struct EigenField {
    order: EigenOrder,
    values: Grid<[f64; 3]>,
}

impl EigenField {
    /// Wrap precomputed eigenvalues, e.g. produced outside this crate
    pub fn from_grid(values: Grid<[f64; 3]>, order: EigenOrder) -> Self {
        Self { order, values }
    }

    pub fn order(&self) -> EigenOrder {
        self.order
    }

    pub fn values(&self) -> &Grid<[f64; 3]> {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.dimension()
    }

    /// Fail unless the field was built on a 3D grid
    pub fn check_dimension(&self) -> EnhanceResult<()> {
        if self.dimension() != TENSOR_DIMENSION {
            return Err(EnhanceError::DimensionMismatch {
                expected: TENSOR_DIMENSION,
                found: self.dimension(),
            });
        }
        Ok(())
    }
}

/// Eigenvalues of a symmetric 3x3 matrix in the solver's order
pub fn symmetric_eigenvalues(m: &[[f64; 3]; 3]) -> [f64; 3] {
    let matrix = Matrix3::new(
        m[0][0], m[0][1], m[0][2],
        m[1][0], m[1][1], m[1][2],
        m[2][0], m[2][1], m[2][2],
    );
    let ev = matrix.symmetric_eigenvalues();
    [ev[0], ev[1], ev[2]]
}

/// Reorder a triple according to `order`
pub fn order_eigenvalues(mut values: [f64; 3], order: EigenOrder) -> [f64; 3] {
    match order {
        EigenOrder::ByValue => values.sort_by(|a, b| a.total_cmp(b)),
        EigenOrder::ByMagnitude => values.sort_by(|a, b| a.abs().total_cmp(&b.abs())),
        EigenOrder::Unordered => {}
    }
    values
}

/// Eigen-decompose every voxel of `field`
pub fn decompose(field: &HessianField, order: EigenOrder) -> EnhanceResult<EigenField> {
    if field.dimension() != TENSOR_DIMENSION {
        return Err(EnhanceError::DimensionMismatch {
            expected: TENSOR_DIMENSION,
            found: field.dimension(),
        });
    }

    debug!("decompose: sigma={:.4} order={:?}", field.sigma(), order);

    let values: Vec<[f64; 3]> = (0..field.components().len())
        .into_par_iter()
        .map(|i| order_eigenvalues(symmetric_eigenvalues(&field.tensor(i)), order))
        .collect();

    Ok(EigenField {
        order,
        values: field.components().with_data(values)?,
    })
}
