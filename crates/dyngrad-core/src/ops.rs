//! Array operations: arithmetic, reduction, comparison, broadcasting,
//! manipulation.
//!
//! All operations return new arrays (functional style).

pub mod arithmetic;
pub mod broadcast;
pub mod comparison;
pub mod manipulation;
pub mod reduction;

use crate::error::CoreError;
use crate::shape::Shape;
use crate::Result;

/// Resolve a possibly negative axis against `ndim`.
pub(crate) fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    let resolved = if axis < 0 { ndim as isize + axis } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(CoreError::InvalidAxis { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Compute the source index for a broadcasted element.
///
/// `src_shape` must be broadcastable to `out_shape`.
pub(crate) fn broadcast_index(flat_idx: usize, out_shape: &Shape, src_shape: &Shape) -> usize {
    let out_dims = out_shape.dims();
    let src_dims = src_shape.dims();
    let offset = out_dims.len() - src_dims.len();

    let out_strides = out_shape.contiguous_strides();
    let src_strides = src_shape.contiguous_strides();

    let mut remaining = flat_idx;
    let mut src_idx = 0;
    for i in 0..out_dims.len() {
        let coord = remaining / out_strides[i];
        remaining %= out_strides[i];

        // dims missing from the source, or of size 1, map to coordinate 0
        if i >= offset && src_dims[i - offset] > 1 {
            src_idx += coord * src_strides[i - offset];
        }
    }
    src_idx
}

/// Split `dims` around `axis` into (outer, axis_size, inner) extents.
pub(crate) fn axis_extents(dims: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis + 1..].iter().product();
    (outer, dims[axis], inner)
}
