//! Reduction operations: sum, mean, variance, max, min, argmax.

use rayon::prelude::*;

use crate::ndarray::NdArray;
use crate::ops::{axis_extents, normalize_axis};
use crate::shape::Shape;
use crate::Result;

const PAR_THRESHOLD: usize = 8192;

impl NdArray {
    /// Sum all elements, returning a scalar array.
    pub fn sum(&self) -> NdArray {
        let slice = self.as_slice();
        let total: f32 = if slice.len() >= PAR_THRESHOLD {
            slice.par_iter().sum()
        } else {
            slice.iter().sum()
        };
        NdArray::scalar(total)
    }

    /// Mean of all elements, returning a scalar array.
    pub fn mean(&self) -> NdArray {
        self.sum().div_scalar(self.numel() as f32)
    }

    /// Sum along `axis`. With `keepdims` the axis stays as size 1, otherwise
    /// it is removed.
    pub fn sum_axis(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| lane.iter().sum())
    }

    pub fn mean_axis(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| {
            lane.iter().sum::<f32>() / lane.len() as f32
        })
    }

    /// Population variance along `axis`.
    pub fn var_axis(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| {
            let n = lane.len() as f32;
            let mean = lane.iter().sum::<f32>() / n;
            lane.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / n
        })
    }

    pub fn max_axis(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| {
            lane.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        })
    }

    pub fn min_axis(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| {
            lane.iter().copied().fold(f32::INFINITY, f32::min)
        })
    }

    /// Index of the maximum element along `axis` (first one on ties).
    pub fn argmax(&self, axis: isize, keepdims: bool) -> Result<NdArray> {
        reduce_axis(self, axis, keepdims, |lane| {
            let mut best_val = f32::NEG_INFINITY;
            let mut best_idx = 0usize;
            for (k, &v) in lane.iter().enumerate() {
                if v > best_val {
                    best_val = v;
                    best_idx = k;
                }
            }
            best_idx as f32
        })
    }

    /// Maximum element.
    pub fn max_value(&self) -> f32 {
        let slice = self.as_slice();
        if slice.len() >= PAR_THRESHOLD {
            slice.par_iter().cloned().reduce(|| f32::NEG_INFINITY, f32::max)
        } else {
            slice.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
        }
    }

    /// Minimum element.
    pub fn min_value(&self) -> f32 {
        let slice = self.as_slice();
        if slice.len() >= PAR_THRESHOLD {
            slice.par_iter().cloned().reduce(|| f32::INFINITY, f32::min)
        } else {
            slice.iter().cloned().fold(f32::INFINITY, f32::min)
        }
    }
}

/// Collapse `axis` by applying `reduce` to each lane along it.
fn reduce_axis(
    a: &NdArray,
    axis: isize,
    keepdims: bool,
    reduce: impl Fn(&[f32]) -> f32,
) -> Result<NdArray> {
    let dims = a.shape().dims();
    let axis = normalize_axis(axis, dims.len())?;
    let (outer, axis_size, inner) = axis_extents(dims, axis);
    let src = a.as_slice();

    let mut result = vec![0.0f32; outer * inner];
    let mut lane = vec![0.0f32; axis_size];
    for o in 0..outer {
        for i in 0..inner {
            for (k, slot) in lane.iter_mut().enumerate() {
                *slot = src[(o * axis_size + k) * inner + i];
            }
            result[o * inner + i] = reduce(&lane);
        }
    }

    Ok(NdArray::from_parts(result, reduced_shape(dims, axis, keepdims)))
}

pub(crate) fn reduced_shape(dims: &[usize], axis: usize, keepdims: bool) -> Shape {
    let mut out: Vec<usize> = dims.to_vec();
    if keepdims {
        out[axis] = 1;
    } else {
        out.remove(axis);
    }
    Shape::from(out)
}
