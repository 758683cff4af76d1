//! Element-wise arithmetic and matrix multiplication.

use crate::error::CoreError;
use crate::ndarray::NdArray;
use crate::ops::broadcast_index;
use crate::Result;

impl NdArray {
    /// Element-wise addition: self + other.
    pub fn add(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("add", self, other, |a, b| a + b)
    }

    /// Element-wise subtraction: self - other.
    pub fn sub(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("sub", self, other, |a, b| a - b)
    }

    /// Element-wise multiplication: self * other.
    pub fn mul(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("mul", self, other, |a, b| a * b)
    }

    /// Element-wise division: self / other.
    pub fn div(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("div", self, other, |a, b| a / b)
    }

    /// Element-wise maximum of two arrays.
    pub fn maximum_elem(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("maximum", self, other, f32::max)
    }

    pub fn neg(&self) -> NdArray {
        self.map(|a| -a)
    }

    pub fn abs(&self) -> NdArray {
        self.map(f32::abs)
    }

    pub fn square(&self) -> NdArray {
        self.map(|a| a * a)
    }

    pub fn sqrt(&self) -> NdArray {
        self.map(f32::sqrt)
    }

    /// Element-wise reciprocal: 1/self.
    pub fn reciprocal(&self) -> NdArray {
        self.map(|a| 1.0 / a)
    }

    pub fn exp(&self) -> NdArray {
        self.map(f32::exp)
    }

    /// Element-wise natural logarithm.
    pub fn log(&self) -> NdArray {
        self.map(f32::ln)
    }

    pub fn sin(&self) -> NdArray {
        self.map(f32::sin)
    }

    pub fn cos(&self) -> NdArray {
        self.map(f32::cos)
    }

    pub fn tanh(&self) -> NdArray {
        self.map(f32::tanh)
    }

    /// Logistic sigmoid `1 / (1 + e^-x)`.
    pub fn sigmoid(&self) -> NdArray {
        self.map(|a| 1.0 / (1.0 + (-a).exp()))
    }

    pub fn relu(&self) -> NdArray {
        self.map(|a| a.max(0.0))
    }

    /// Element-wise power: self^exponent.
    pub fn pow_scalar(&self, exponent: f32) -> NdArray {
        self.map(|a| a.powf(exponent))
    }

    pub fn add_scalar(&self, scalar: f32) -> NdArray {
        self.map(|a| a + scalar)
    }

    pub fn mul_scalar(&self, scalar: f32) -> NdArray {
        self.map(|a| a * scalar)
    }

    pub fn div_scalar(&self, scalar: f32) -> NdArray {
        self.map(|a| a / scalar)
    }

    /// Floor every element at `value`.
    pub fn maximum(&self, value: f32) -> NdArray {
        self.map(|a| a.max(value))
    }

    /// 1.0 where the element is strictly greater than `value`, else 0.0.
    pub fn mask(&self, value: f32) -> NdArray {
        self.map(|a| if a > value { 1.0 } else { 0.0 })
    }

    /// Saturate all elements to `[min, max]`.
    pub fn clip(&self, min: f32, max: f32) -> Result<NdArray> {
        if min.is_nan() || max.is_nan() {
            return Err(CoreError::InvalidData(format!(
                "clip: bounds must not be NaN (min {min}, max {max})"
            )));
        }
        if min > max {
            return Err(CoreError::InvalidData(format!(
                "clip: min {min} is greater than max {max}"
            )));
        }
        Ok(self.map(|a| a.clamp(min, max)))
    }

    /// Matrix multiplication: self @ other.
    ///
    /// Supports:
    /// - [M, K] @ [K, N] → [M, N]
    /// - [B, M, K] @ [B, K, N] → [B, M, N] (batched)
    pub fn matmul(&self, other: &NdArray) -> Result<NdArray> {
        let a_dims = self.shape().dims();
        let b_dims = other.shape().dims();
        match (a_dims, b_dims) {
            (&[m, k1], &[k2, n]) if k1 == k2 => {
                let data = matmul_block(self.as_slice(), other.as_slice(), m, k1, n);
                NdArray::from_vec(data, [m, n])
            }
            (&[b1, m, k1], &[b2, k2, n]) if b1 == b2 && k1 == k2 => {
                let a_data = self.as_slice();
                let b_data = other.as_slice();
                let mut out = Vec::with_capacity(b1 * m * n);
                for bi in 0..b1 {
                    let a_blk = &a_data[bi * m * k1..(bi + 1) * m * k1];
                    let b_blk = &b_data[bi * k1 * n..(bi + 1) * k1 * n];
                    out.extend(matmul_block(a_blk, b_blk, m, k1, n));
                }
                NdArray::from_vec(out, [b1, m, n])
            }
            _ => Err(CoreError::mismatch("matmul", self.shape(), other.shape())),
        }
    }
}

/// Apply a binary operation element-wise with broadcasting.
///
/// One operand's shape must be broadcastable to the other's; the result has
/// the larger shape.
pub(crate) fn binary_op(
    op_name: &'static str,
    a: &NdArray,
    b: &NdArray,
    op: impl Fn(f32, f32) -> f32,
) -> Result<NdArray> {
    let out_shape = a
        .shape()
        .broadcast_with(b.shape())
        .ok_or_else(|| CoreError::mismatch(op_name, a.shape(), b.shape()))?;

    let a_data = a.as_slice();
    let b_data = b.as_slice();

    // Fast path: same shape
    let result: Vec<f32> = if a.shape() == b.shape() {
        a_data
            .iter()
            .zip(b_data.iter())
            .map(|(&x, &y)| op(x, y))
            .collect()
    } else {
        (0..out_shape.numel())
            .map(|i| {
                let a_idx = broadcast_index(i, &out_shape, a.shape());
                let b_idx = broadcast_index(i, &out_shape, b.shape());
                op(a_data[a_idx], b_data[b_idx])
            })
            .collect()
    };

    Ok(NdArray::from_parts(result, out_shape))
}

/// Row-major [M, K] @ [K, N] kernel.
fn matmul_block(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            for j in 0..n {
                c[i * n + j] += a_ip * b[p * n + j];
            }
        }
    }
    c
}
