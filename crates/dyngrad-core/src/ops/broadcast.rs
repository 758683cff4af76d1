//! `broadcast_to` and its adjoint `sum_to`.
//!
//! Both walk the same output-to-source index map: `broadcast_to` gathers
//! through it, `sum_to` scatter-adds through it. That shared map is what
//! makes `sum_to` route every replicated gradient entry back to the single
//! source element it was copied from.

use crate::error::CoreError;
use crate::ndarray::NdArray;
use crate::ops::broadcast_index;
use crate::shape::Shape;
use crate::Result;

impl NdArray {
    /// Expand to `shape` by replicating along every size-1 (or missing
    /// leading) dimension.
    pub fn broadcast_to(&self, shape: &Shape) -> Result<NdArray> {
        if self.shape() == shape {
            return Ok(self.clone());
        }
        if !self.shape().is_broadcastable_to(shape) {
            return Err(CoreError::mismatch("broadcast_to", self.shape(), shape));
        }
        let src = self.as_slice();
        let data = (0..shape.numel())
            .map(|i| src[broadcast_index(i, shape, self.shape())])
            .collect();
        Ok(NdArray::from_parts(data, shape.clone()))
    }

    /// Sum the broadcast dimensions away so the result has `shape`.
    ///
    /// `shape` must be broadcastable to this array's shape.
    pub fn sum_to(&self, shape: &Shape) -> Result<NdArray> {
        if self.shape() == shape {
            return Ok(self.clone());
        }
        if !shape.is_broadcastable_to(self.shape()) {
            return Err(CoreError::mismatch("sum_to", self.shape(), shape));
        }
        let mut out = vec![0.0f32; shape.numel()];
        for (i, &v) in self.as_slice().iter().enumerate() {
            out[broadcast_index(i, self.shape(), shape)] += v;
        }
        Ok(NdArray::from_parts(out, shape.clone()))
    }
}
