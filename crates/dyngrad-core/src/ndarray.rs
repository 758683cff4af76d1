use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::convert::IntoNdArray;
use crate::error::CoreError;
use crate::shape::Shape;
use crate::storage::Storage;
use crate::Result;

/// Largest array `arange` will build.
const ARANGE_MAX_LEN: usize = i32::MAX as usize;

/// A dense, row-major, multi-dimensional array of `f32`.
///
/// `NdArray` is a value type. Every operation returns a new array; the
/// buffer is shared between clones and copied on first write, so no
/// operation can mutate another array's data through aliasing.
///
/// # Examples
///
/// ```
/// use dyngrad_core::NdArray;
///
/// let a = NdArray::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
/// assert_eq!(a.shape().dims(), &[2, 3]);
/// assert_eq!(a.numel(), 6);
///
/// let flat = a.reshape([6]).unwrap();
/// assert_eq!(flat.shape().dims(), &[6]);
/// ```
#[derive(Clone, PartialEq)]
pub struct NdArray {
    storage: Storage,
    shape: Shape,
}

impl NdArray {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Build an array from a flat row-major buffer and a shape.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if !shape.is_bound() {
            return Err(CoreError::Shape(format!(
                "cannot allocate data for unbound shape {shape}"
            )));
        }
        if shape.numel() != data.len() {
            return Err(CoreError::InvalidData(format!(
                "shape {shape} requires {} elements, got {}",
                shape.numel(),
                data.len()
            )));
        }
        Ok(Self {
            storage: Storage::from_vec(data),
            shape,
        })
    }

    /// Build an array from nested Rust data (scalars, slices, fixed arrays,
    /// nested `Vec`s).
    pub fn new(data: impl IntoNdArray) -> Result<Self> {
        data.into_ndarray()
    }

    /// Assemble an array whose buffer length is already known to match.
    pub(crate) fn from_parts(data: Vec<f32>, shape: Shape) -> Self {
        debug_assert_eq!(data.len(), shape.numel());
        Self {
            storage: Storage::from_vec(data),
            shape,
        }
    }

    /// Create a scalar array from a single value.
    pub fn scalar(value: f32) -> Self {
        Self::from_parts(vec![value], Shape::scalar())
    }

    /// Array filled with `value`.
    pub fn full(shape: impl Into<Shape>, value: f32) -> Result<Self> {
        let shape = bound(shape.into())?;
        Ok(Self {
            storage: Storage::filled(shape.numel(), value),
            shape,
        })
    }

    pub fn zeros(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 1.0)
    }

    /// Array with the same shape as `self`, filled with `value`.
    pub fn like(&self, value: f32) -> Self {
        Self {
            storage: Storage::filled(self.numel(), value),
            shape: self.shape.clone(),
        }
    }

    pub fn zeros_like(&self) -> Self {
        self.like(0.0)
    }

    pub fn ones_like(&self) -> Self {
        self.like(1.0)
    }

    /// `n x n` identity matrix.
    pub fn eye(n: usize) -> Self {
        let mut data = vec![0.0f32; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self::from_parts(data, Shape::new(&[n, n]))
    }

    /// `num` evenly spaced values over `[min, max]`, as a row vector `[1, num]`.
    pub fn linspace(min: f32, max: f32, num: usize) -> Result<Self> {
        if num == 0 {
            return Err(CoreError::InvalidData("linspace: num must be > 0".into()));
        }
        let step = if num > 1 {
            (max - min) / (num - 1) as f32
        } else {
            0.0
        };
        let data: Vec<f32> = (0..num).map(|i| min + step * i as f32).collect();
        Ok(Self::from_parts(data, Shape::new(&[1, num])))
    }

    /// 1-D array with values from `start` to `end` (exclusive).
    pub fn arange(start: f32, end: f32, step: f32) -> Result<Self> {
        if step == 0.0 {
            return Err(CoreError::InvalidData("arange: step must be non-zero".into()));
        }
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(CoreError::InvalidData(format!(
                "arange: non-finite argument (start {start}, end {end}, step {step})"
            )));
        }
        let (start, step) = (f64::from(start), f64::from(step));
        let count = ((f64::from(end) - start) / step).ceil().max(0.0);
        if count > ARANGE_MAX_LEN as f64 {
            return Err(CoreError::InvalidData(format!(
                "arange: {count} elements exceeds the limit of {ARANGE_MAX_LEN}"
            )));
        }
        let len = count as usize;
        let data = (0..len).map(|i| (start + i as f64 * step) as f32).collect();
        Ok(Self::from_parts(data, Shape::new(&[len])))
    }

    /// Standard normal N(0, 1) samples from the thread-local RNG.
    pub fn randn(shape: impl Into<Shape>) -> Result<Self> {
        let shape = bound(shape.into())?;
        let data = normal_samples(&mut rand::thread_rng(), shape.numel());
        Ok(Self::from_parts(data, shape))
    }

    /// Standard normal samples from a seeded RNG (reproducible).
    pub fn randn_seeded(shape: impl Into<Shape>, seed: u64) -> Result<Self> {
        let shape = bound(shape.into())?;
        let data = normal_samples(&mut StdRng::seed_from_u64(seed), shape.numel());
        Ok(Self::from_parts(data, shape))
    }

    /// Uniform samples in `[low, high)`.
    pub fn rand_uniform(shape: impl Into<Shape>, low: f32, high: f32) -> Result<Self> {
        let shape = bound(shape.into())?;
        check_range(low, high)?;
        let mut rng = rand::thread_rng();
        let data = (0..shape.numel()).map(|_| rng.gen_range(low..high)).collect();
        Ok(Self::from_parts(data, shape))
    }

    pub fn rand_uniform_seeded(
        shape: impl Into<Shape>,
        low: f32,
        high: f32,
        seed: u64,
    ) -> Result<Self> {
        let shape = bound(shape.into())?;
        check_range(low, high)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..shape.numel()).map(|_| rng.gen_range(low..high)).collect();
        Ok(Self::from_parts(data, shape))
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    // =========================================================================
    // Data access
    // =========================================================================

    /// Flat row-major view of the data.
    pub fn as_slice(&self) -> &[f32] {
        self.storage.as_slice()
    }

    /// Mutable flat view (copy-on-write).
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.storage.make_mut()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.storage.as_slice().to_vec()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.storage.into_vec()
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Result<f32> {
        let flat = self.shape.linear_index(index)?;
        Ok(self.as_slice()[flat])
    }

    /// Overwrite the element at a multi-dimensional index.
    pub fn set(&mut self, index: &[usize], value: f32) -> Result<()> {
        let flat = self.shape.linear_index(index)?;
        self.as_mut_slice()[flat] = value;
        Ok(())
    }

    /// First element, typically of a scalar or single-element array.
    pub fn item(&self) -> Result<f32> {
        self.as_slice()
            .first()
            .copied()
            .ok_or_else(|| CoreError::InvalidData("item: array is empty".into()))
    }

    /// Copy a matrix (or a 1-D array, as a single row) into nested rows.
    pub fn to_matrix(&self) -> Result<Vec<Vec<f32>>> {
        let (rows, cols) = match self.shape.dims() {
            [n] => (1, *n),
            [r, c] => (*r, *c),
            _ => {
                return Err(CoreError::Shape(format!(
                    "to_matrix: expected a 1-D or 2-D array, got {}",
                    self.shape
                )))
            }
        };
        let data = self.as_slice();
        Ok((0..rows)
            .map(|r| data[r * cols..(r + 1) * cols].to_vec())
            .collect())
    }

    // =========================================================================
    // Shape operations
    // =========================================================================

    /// Reshape to `shape`, which must hold the same number of elements.
    ///
    /// A target with a wildcard batch dimension is bound from this array's
    /// element count.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<NdArray> {
        let target = shape.into();
        let resolved = if target.is_bound() {
            target
        } else {
            self.bind_wildcard(&target)?
        };
        if resolved.numel() != self.numel() {
            return Err(CoreError::InvalidReshape {
                numel: self.numel(),
                target: resolved.signed_dims(),
            });
        }
        Ok(NdArray {
            storage: self.storage.clone(),
            shape: resolved,
        })
    }

    /// Reshape with a single `-1` entry inferred from the element count.
    pub fn reshape_infer(&self, target: &[isize]) -> Result<NdArray> {
        let resolved =
            self.shape
                .resolve_reshape(target)
                .ok_or_else(|| CoreError::InvalidReshape {
                    numel: self.numel(),
                    target: target.to_vec(),
                })?;
        Ok(NdArray {
            storage: self.storage.clone(),
            shape: resolved,
        })
    }

    fn bind_wildcard(&self, target: &Shape) -> Result<Shape> {
        let rest: usize = target.dims()[1..].iter().product();
        if rest == 0 || self.numel() % rest != 0 {
            return Err(CoreError::InvalidReshape {
                numel: self.numel(),
                target: target.signed_dims(),
            });
        }
        target.bind_batch(self.numel() / rest)
    }

    /// Flatten into a row vector of shape `[1, numel]`.
    pub fn flatten(&self) -> NdArray {
        NdArray {
            storage: self.storage.clone(),
            shape: Shape::new(&[1, self.numel()]),
        }
    }

    /// Swap the last two axes. Arrays with fewer than two axes are returned
    /// unchanged.
    pub fn transpose(&self) -> NdArray {
        let ndim = self.ndim();
        if ndim < 2 {
            return self.clone();
        }
        let mut axes: Vec<usize> = (0..ndim).collect();
        axes.swap(ndim - 2, ndim - 1);
        self.permute_unchecked(&axes)
    }

    /// Reorder axes: output axis `i` is input axis `axes[i]`.
    pub fn permute(&self, axes: &[usize]) -> Result<NdArray> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        if axes.len() != ndim {
            return Err(CoreError::Shape(format!(
                "permute: {} axes given for {ndim}-d array",
                axes.len()
            )));
        }
        for &a in axes {
            if a >= ndim || seen[a] {
                return Err(CoreError::Shape(format!(
                    "permute: {axes:?} is not a permutation of 0..{ndim}"
                )));
            }
            seen[a] = true;
        }
        Ok(self.permute_unchecked(axes))
    }

    fn permute_unchecked(&self, axes: &[usize]) -> NdArray {
        let src_dims = self.shape.dims();
        let src_strides = self.shape.contiguous_strides();
        let out_dims: Vec<usize> = axes.iter().map(|&a| src_dims[a]).collect();
        let out_shape = Shape::new(&out_dims);
        let out_strides = out_shape.contiguous_strides();
        let src = self.as_slice();

        let numel = self.numel();
        let mut out = vec![0.0f32; numel];
        for (flat, slot) in out.iter_mut().enumerate() {
            let mut remaining = flat;
            let mut src_idx = 0;
            for (i, &a) in axes.iter().enumerate() {
                let coord = remaining / out_strides[i];
                remaining %= out_strides[i];
                src_idx += coord * src_strides[a];
            }
            *slot = src[src_idx];
        }
        NdArray::from_parts(out, out_shape)
    }

    /// Apply `f` to every element, keeping the shape.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> NdArray {
        let data = self.as_slice().iter().map(|&v| f(v)).collect();
        NdArray::from_parts(data, self.shape.clone())
    }
}

fn bound(shape: Shape) -> Result<Shape> {
    if shape.is_bound() {
        Ok(shape)
    } else {
        Err(CoreError::Shape(format!(
            "cannot allocate data for unbound shape {shape}"
        )))
    }
}

fn check_range(low: f32, high: f32) -> Result<()> {
    if low < high {
        Ok(())
    } else {
        Err(CoreError::InvalidData(format!(
            "empty sampling range [{low}, {high})"
        )))
    }
}

fn normal_samples<R: Rng>(rng: &mut R, numel: usize) -> Vec<f32> {
    // Box-Muller transform for normal distribution
    (0..numel)
        .map(|_| {
            let u1: f32 = rng.gen_range(1e-7f32..1.0f32);
            let u2: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
            (-2.0 * u1.ln()).sqrt() * u2.cos()
        })
        .collect()
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NdArray(shape={}, data={:?})", self.shape, self.as_slice())
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.as_slice();
        if self.numel() <= 20 {
            write!(f, "ndarray({:?}, shape={})", data, self.shape)
        } else {
            write!(
                f,
                "ndarray([{:.4}, {:.4}, ..., {:.4}], shape={})",
                data[0],
                data[1],
                data[self.numel() - 1],
                self.shape
            )
        }
    }
}
