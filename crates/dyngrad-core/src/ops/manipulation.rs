//! Array manipulation: softmax, log-softmax, concatenation and row/element
//! indexing.

use crate::error::CoreError;
use crate::ndarray::NdArray;
use crate::ops::{axis_extents, normalize_axis};
use crate::shape::Shape;
use crate::Result;

impl NdArray {
    /// Softmax over the last axis, with max-subtraction for numerical
    /// stability.
    pub fn softmax(&self) -> Result<NdArray> {
        self.softmax_axis(-1)
    }

    /// Softmax over an arbitrary axis.
    pub fn softmax_axis(&self, axis: isize) -> Result<NdArray> {
        let axis = normalize_axis(axis, self.ndim())?;
        let (outer, axis_size, inner) = axis_extents(self.shape().dims(), axis);
        let mut result = self.to_vec();

        for o in 0..outer {
            for i in 0..inner {
                let idx = |a: usize| (o * axis_size + a) * inner + i;

                // Find max for numerical stability
                let mut max_val = f32::NEG_INFINITY;
                for a in 0..axis_size {
                    max_val = max_val.max(result[idx(a)]);
                }

                // Exp and sum
                let mut sum = 0.0f32;
                for a in 0..axis_size {
                    let e = (result[idx(a)] - max_val).exp();
                    result[idx(a)] = e;
                    sum += e;
                }

                // Normalize
                if sum > 0.0 {
                    for a in 0..axis_size {
                        result[idx(a)] /= sum;
                    }
                }
            }
        }

        Ok(NdArray::from_parts(result, self.shape().clone()))
    }

    /// Log-softmax over the last axis.
    pub fn log_softmax(&self) -> Result<NdArray> {
        let axis = normalize_axis(-1, self.ndim())?;
        let (outer, axis_size, _) = axis_extents(self.shape().dims(), axis);
        let mut result = self.to_vec();

        for row in result.chunks_mut(axis_size.max(1)).take(outer) {
            let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_sum_exp = max_val + row.iter().map(|&v| (v - max_val).exp()).sum::<f32>().ln();
            for v in row.iter_mut() {
                *v -= log_sum_exp;
            }
        }

        Ok(NdArray::from_parts(result, self.shape().clone()))
    }

    /// Concatenate arrays along a given axis.
    ///
    /// All arrays must have the same shape except along `axis`.
    pub fn cat(arrays: &[&NdArray], axis: isize) -> Result<NdArray> {
        let first = arrays
            .first()
            .ok_or_else(|| CoreError::InvalidData("cat: empty array list".into()))?;
        let ndim = first.ndim();
        let axis = normalize_axis(axis, ndim)?;

        // Validate shapes match on all non-cat axes
        for t in &arrays[1..] {
            let compatible = t.ndim() == ndim
                && (0..ndim).all(|d| d == axis || t.shape().dims()[d] == first.shape().dims()[d]);
            if !compatible {
                return Err(CoreError::mismatch("cat", first.shape(), t.shape()));
            }
        }

        let mut out_dims: Vec<usize> = first.shape().dims().to_vec();
        let cat_dim: usize = arrays.iter().map(|t| t.shape().dims()[axis]).sum();
        out_dims[axis] = cat_dim;

        let (outer, _, inner) = axis_extents(&out_dims, axis);
        let mut result = vec![0.0f32; outer * cat_dim * inner];

        let mut cat_offset = 0;
        for t in arrays {
            let t_data = t.as_slice();
            let t_axis_size = t.shape().dims()[axis];

            for o in 0..outer {
                for a in 0..t_axis_size {
                    let src_start = (o * t_axis_size + a) * inner;
                    let dst_start = (o * cat_dim + (cat_offset + a)) * inner;
                    result[dst_start..dst_start + inner]
                        .copy_from_slice(&t_data[src_start..src_start + inner]);
                }
            }
            cat_offset += t_axis_size;
        }

        Ok(NdArray::from_parts(result, Shape::from(out_dims)))
    }

    /// Gather whole rows of a matrix; the result is `[indices.len(), cols]`.
    pub fn get_rows(&self, indices: &[usize]) -> Result<NdArray> {
        let (rows, cols) = self.matrix_dims("get_rows")?;
        let src = self.as_slice();
        let mut out = Vec::with_capacity(indices.len() * cols);
        for &r in indices {
            check_index("get_rows", r, rows)?;
            out.extend_from_slice(&src[r * cols..(r + 1) * cols]);
        }
        Ok(NdArray::from_parts(out, Shape::new(&[indices.len(), cols])))
    }

    /// Paired gather `[self[rows[k], cols[k]] for k]`, as a row vector `[1, n]`.
    pub fn get_item(&self, rows: &[usize], cols: &[usize]) -> Result<NdArray> {
        let (n_rows, n_cols) = self.matrix_dims("get_item")?;
        check_pairs("get_item", rows, cols)?;
        let src = self.as_slice();
        let mut out = Vec::with_capacity(rows.len());
        for (&r, &c) in rows.iter().zip(cols) {
            check_index("get_item", r, n_rows)?;
            check_index("get_item", c, n_cols)?;
            out.push(src[r * n_cols + c]);
        }
        Ok(NdArray::from_parts(out, Shape::new(&[1, rows.len()])))
    }

    /// Scatter-add `values[k]` into `self[rows[k], cols[k]]`. Repeated
    /// positions accumulate.
    pub fn add_at(&self, rows: &[usize], cols: &[usize], values: &NdArray) -> Result<NdArray> {
        let (n_rows, n_cols) = self.matrix_dims("add_at")?;
        check_pairs("add_at", rows, cols)?;
        if values.numel() != rows.len() {
            return Err(CoreError::InvalidData(format!(
                "add_at: {} positions but {} values",
                rows.len(),
                values.numel()
            )));
        }
        let mut out = self.clone();
        let dst = out.as_mut_slice();
        for ((&r, &c), &v) in rows.iter().zip(cols).zip(values.as_slice()) {
            check_index("add_at", r, n_rows)?;
            check_index("add_at", c, n_cols)?;
            dst[r * n_cols + c] += v;
        }
        Ok(out)
    }

    /// Rows `start..end` of a matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<NdArray> {
        let (rows, cols) = self.matrix_dims("slice_rows")?;
        if start > end || end > rows {
            return Err(CoreError::InvalidData(format!(
                "slice_rows: range {start}..{end} out of bounds for {rows} rows"
            )));
        }
        let data = self.as_slice()[start * cols..end * cols].to_vec();
        Ok(NdArray::from_parts(data, Shape::new(&[end - start, cols])))
    }

    fn matrix_dims(&self, op: &str) -> Result<(usize, usize)> {
        match self.shape().dims() {
            &[r, c] => Ok((r, c)),
            _ => Err(CoreError::Shape(format!(
                "{op}: expected a matrix, got shape {}",
                self.shape()
            ))),
        }
    }
}

fn check_index(op: &str, idx: usize, len: usize) -> Result<()> {
    if idx < len {
        Ok(())
    } else {
        Err(CoreError::InvalidData(format!(
            "{op}: index {idx} out of range for size {len}"
        )))
    }
}

fn check_pairs(op: &str, rows: &[usize], cols: &[usize]) -> Result<()> {
    if rows.len() == cols.len() {
        Ok(())
    } else {
        Err(CoreError::InvalidData(format!(
            "{op}: {} row indices but {} column indices",
            rows.len(),
            cols.len()
        )))
    }
}
