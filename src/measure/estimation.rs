//! Partitioned scans used by the parameter estimators
//!
//! The field is split into z-slices. Each slice folds its foreground voxels
//! into a private accumulator; the accumulators are returned as a `Vec` once
//! every slice has finished, and callers merge them with a pure reduction.

use rayon::prelude::*;

use crate::eigen::EigenField;
use crate::error::EnhanceResult;
use crate::grid::LabelMask;

/// Fold foreground voxels of each z-slice into its own accumulator
///
/// Voxels count as foreground when there is no mask, or when the mask label
/// at their position differs from the mask's background value.
pub fn partition_accumulators<A, F>(
    field: &EigenField,
    mask: Option<&LabelMask>,
    init: A,
    fold: F,
) -> EnhanceResult<Vec<A>>
where
    A: Clone + Send + Sync,
    F: Fn(A, &[f64; 3]) -> A + Sync,
{
    field.check_dimension()?;
    if let Some(m) = mask {
        m.check_contained_in(field.values())?;
    }

    let values = field.values();
    let [nx, ny, _] = values.size();
    let slice_len = nx * ny;

    let partitions = values
        .data()
        .par_chunks(slice_len)
        .enumerate()
        .map(|(k, slice)| {
            let mut acc = init.clone();
            for (n, ev) in slice.iter().enumerate() {
                let inside = mask.map_or(true, |m| m.is_inside_voxel(values, k * slice_len + n));
                if inside {
                    acc = fold(acc, ev);
                }
            }
            acc
        })
        .collect();

    Ok(partitions)
}
