use smallvec::SmallVec;
use std::fmt;

use crate::error::CoreError;
use crate::Result;

/// Immutable array shape with stack-allocated storage for ≤4 dimensions.
///
/// A shape may carry a leading wildcard dimension (written `-1`) that stands
/// for a batch size unknown at construction time. Such a shape describes a
/// family of arrays; it is bound to a concrete batch size with
/// [`Shape::bind_batch`] (or by `NdArray::reshape`) on the first forward call.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
    /// When set, `dims[0]` is a placeholder (0) for the unbound batch size.
    wildcard_batch: bool,
}

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
            wildcard_batch: false,
        }
    }

    /// Scalar shape (0 dimensions).
    pub fn scalar() -> Self {
        Self {
            dims: SmallVec::new(),
            wildcard_batch: false,
        }
    }

    /// Build a shape from signed dimensions.
    ///
    /// `-1` is accepted only as the leading dimension, where it marks the
    /// batch size as unknown. Any other negative value is a shape error.
    pub fn of(dims: &[isize]) -> Result<Self> {
        let mut out: SmallVec<[usize; 4]> = SmallVec::with_capacity(dims.len());
        let mut wildcard_batch = false;
        for (i, &d) in dims.iter().enumerate() {
            match d {
                -1 if i == 0 => {
                    wildcard_batch = true;
                    out.push(0);
                }
                d if d < 0 => {
                    return Err(CoreError::Shape(format!(
                        "dimension {i} has invalid size {d}; only a leading -1 is allowed"
                    )));
                }
                d => out.push(d as usize),
            }
        }
        Ok(Self {
            dims: out,
            wildcard_batch,
        })
    }

    /// Shape `[-1, rest...]` whose batch dimension is bound later.
    pub fn with_wildcard_batch(rest: &[usize]) -> Self {
        let mut dims = SmallVec::with_capacity(rest.len() + 1);
        dims.push(0);
        dims.extend_from_slice(rest);
        Self {
            dims,
            wildcard_batch: true,
        }
    }

    /// Whether every dimension is known (no wildcard batch).
    pub fn is_bound(&self) -> bool {
        !self.wildcard_batch
    }

    /// Resolve the wildcard batch dimension to `batch`.
    pub fn bind_batch(&self, batch: usize) -> Result<Shape> {
        if !self.wildcard_batch {
            return Err(CoreError::Shape(format!(
                "shape {self} has no wildcard batch dimension to bind"
            )));
        }
        let mut dims = self.dims.clone();
        dims[0] = batch;
        Ok(Shape {
            dims,
            wildcard_batch: false,
        })
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements. Unbound shapes hold no data and report 0.
    pub fn numel(&self) -> usize {
        if self.wildcard_batch {
            0
        } else if self.dims.is_empty() {
            1 // scalar
        } else {
            self.dims.iter().product()
        }
    }

    /// Get dimension sizes as a slice.
    ///
    /// For an unbound shape the leading entry is a 0 placeholder; use
    /// [`Shape::signed_dims`] to see the wildcard.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Dimensions with the wildcard rendered as `-1`.
    pub fn signed_dims(&self) -> Vec<isize> {
        self.dims
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if i == 0 && self.wildcard_batch {
                    -1
                } else {
                    d as isize
                }
            })
            .collect()
    }

    /// Get size of a specific dimension.
    pub fn dim(&self, axis: usize) -> Result<usize> {
        if axis >= self.dims.len() {
            return Err(CoreError::Shape(format!(
                "dimension index {axis} out of range for {}-d shape {self}",
                self.ndim()
            )));
        }
        if axis == 0 && self.wildcard_batch {
            return Err(CoreError::Shape(format!(
                "dimension 0 of {self} is an unbound batch wildcard"
            )));
        }
        Ok(self.dims[axis])
    }

    /// Whether this is a scalar (0-dimensional).
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn is_matrix(&self) -> bool {
        self.dims.len() == 2
    }

    /// Row count of a matrix shape.
    pub fn row(&self) -> Result<usize> {
        self.require_matrix()?;
        self.dim(0)
    }

    /// Column count of a matrix shape.
    pub fn column(&self) -> Result<usize> {
        self.require_matrix()?;
        self.dim(1)
    }

    fn require_matrix(&self) -> Result<()> {
        if self.is_matrix() {
            Ok(())
        } else {
            Err(CoreError::Shape(format!("expected a matrix shape, got {self}")))
        }
    }

    /// Compute default strides for a contiguous row-major layout.
    pub fn contiguous_strides(&self) -> SmallVec<[usize; 4]> {
        let ndim = self.dims.len();
        if ndim == 0 {
            return SmallVec::new();
        }
        let mut strides = SmallVec::from_elem(0usize, ndim);
        strides[ndim - 1] = 1;
        for i in (0..ndim - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Row-major flat offset of a multi-dimensional index.
    pub fn linear_index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.ndim() {
            return Err(CoreError::Shape(format!(
                "index of rank {} used with {}-d shape {self}",
                index.len(),
                self.ndim()
            )));
        }
        let strides = self.contiguous_strides();
        let mut flat = 0;
        for (axis, (&i, &stride)) in index.iter().zip(strides.iter()).enumerate() {
            let size = self.dim(axis)?;
            if i >= size {
                return Err(CoreError::Shape(format!(
                    "index {i} out of range for dimension {axis} of {self}"
                )));
            }
            flat += i * stride;
        }
        Ok(flat)
    }

    /// Whether an array of this shape can be broadcast to `target`.
    ///
    /// Dimensions are aligned from the trailing end; each of ours must equal
    /// the target's or be 1. Missing leading dimensions count as 1.
    pub fn is_broadcastable_to(&self, target: &Shape) -> bool {
        if !self.is_bound() || !target.is_bound() || self.ndim() > target.ndim() {
            return false;
        }
        self.dims
            .iter()
            .rev()
            .zip(target.dims.iter().rev())
            .all(|(&s, &t)| s == t || s == 1)
    }

    /// Output shape of an elementwise op between `self` and `other`.
    ///
    /// Returns the larger shape when the other one broadcasts to it, or
    /// `None` when neither shape broadcasts to the other.
    pub fn broadcast_with(&self, other: &Shape) -> Option<Shape> {
        if self == other && self.is_bound() {
            Some(self.clone())
        } else if other.is_broadcastable_to(self) {
            Some(self.clone())
        } else if self.is_broadcastable_to(other) {
            Some(other.clone())
        } else {
            None
        }
    }

    /// Validate and compute a reshape target.
    /// At most one dimension can be -1 (inferred).
    pub fn resolve_reshape(&self, target: &[isize]) -> Option<Shape> {
        let numel = self.numel();
        let mut inferred_idx = None;
        let mut known_product: usize = 1;

        for (i, &d) in target.iter().enumerate() {
            if d == -1 {
                if inferred_idx.is_some() {
                    return None; // multiple -1s
                }
                inferred_idx = Some(i);
            } else if d < 0 {
                return None;
            } else {
                known_product = known_product.checked_mul(d as usize)?;
            }
        }

        let mut result: SmallVec<[usize; 4]> = target
            .iter()
            .map(|&d| if d == -1 { 0 } else { d as usize })
            .collect();

        if let Some(idx) = inferred_idx {
            if known_product == 0 || numel % known_product != 0 {
                return None;
            }
            result[idx] = numel / known_product;
        }

        let result_shape = Shape {
            dims: result,
            wildcard_batch: false,
        };
        if result_shape.numel() != numel {
            return None;
        }
        Some(result_shape)
    }

    /// Compute the transposed shape (swap last two dimensions).
    pub fn transpose(&self) -> Option<Shape> {
        if self.ndim() < 2 {
            return None;
        }
        let mut dims = self.dims.clone();
        let n = dims.len();
        dims.swap(n - 2, n - 1);
        Some(Shape {
            dims,
            wildcard_batch: self.wildcard_batch && n > 2,
        })
    }

    /// Copy of this shape with a size-1 axis inserted at `axis`.
    pub fn insert_axis(&self, axis: usize) -> Shape {
        let mut dims = self.dims.clone();
        dims.insert(axis.min(dims.len()), 1);
        Shape {
            dims,
            wildcard_batch: self.wildcard_batch && axis > 0,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.signed_dims())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.signed_dims().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape {
            dims: SmallVec::from_vec(dims),
            wildcard_batch: false,
        }
    }
}

impl From<&Shape> for Shape {
    fn from(shape: &Shape) -> Self {
        shape.clone()
    }
}

macro_rules! impl_shape_from_array {
    ($($n:expr),*) => {
        $(
            impl From<[usize; $n]> for Shape {
                fn from(dims: [usize; $n]) -> Self {
                    Shape::new(&dims)
                }
            }
        )*
    };
}

impl_shape_from_array!(0, 1, 2, 3, 4, 5, 6);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        let s = Shape::scalar();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
        assert!(s.is_scalar());
    }

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(&[2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(0).unwrap(), 2);
        assert_eq!(s.dim(1).unwrap(), 3);
        assert_eq!(s.dim(2).unwrap(), 4);
        assert!(matches!(s.dim(3), Err(CoreError::Shape(_))));
    }

    #[test]
    fn test_equality() {
        assert_eq!(Shape::new(&[2, 3]), Shape::new(&[2, 3]));
        assert_ne!(Shape::new(&[2, 3]), Shape::new(&[3, 2]));
        assert_ne!(Shape::new(&[2, 3]), Shape::new(&[2, 3, 1]));
        assert_ne!(Shape::new(&[0, 3]), Shape::with_wildcard_batch(&[3]));
    }

    #[test]
    fn test_contiguous_strides() {
        let s = Shape::new(&[2, 3, 4]);
        let strides = s.contiguous_strides();
        assert_eq!(strides.as_slice(), &[12, 4, 1]);
    }

    #[test]
    fn test_linear_index() {
        let s = Shape::new(&[3, 4]);
        assert_eq!(s.linear_index(&[1, 2]).unwrap(), 6);
        assert!(s.linear_index(&[1, 4]).is_err());
        assert!(s.linear_index(&[1]).is_err());
    }

    #[test]
    fn test_broadcast() {
        let a = Shape::new(&[2, 3]);
        let b = Shape::new(&[3]);
        assert_eq!(a.broadcast_with(&b).unwrap().dims(), &[2, 3]);
        assert_eq!(b.broadcast_with(&a).unwrap().dims(), &[2, 3]);

        let a = Shape::new(&[2, 3]);
        let b = Shape::new(&[1, 3]);
        assert_eq!(a.broadcast_with(&b).unwrap().dims(), &[2, 3]);

        let a = Shape::new(&[2, 3]);
        let b = Shape::new(&[4, 3]);
        assert!(a.broadcast_with(&b).is_none());

        // expansion in both directions at once is not supported
        let a = Shape::new(&[3, 1]);
        let b = Shape::new(&[1, 4]);
        assert!(a.broadcast_with(&b).is_none());
    }

    #[test]
    fn test_broadcastable_to() {
        let target = Shape::new(&[4, 2, 3]);
        assert!(Shape::scalar().is_broadcastable_to(&target));
        assert!(Shape::new(&[1, 3]).is_broadcastable_to(&target));
        assert!(Shape::new(&[2, 1]).is_broadcastable_to(&target));
        assert!(!Shape::new(&[2, 2]).is_broadcastable_to(&target));
        assert!(!Shape::new(&[1, 4, 2, 3]).is_broadcastable_to(&target));
    }

    #[test]
    fn test_wildcard_batch() {
        let s = Shape::of(&[-1, 3]).unwrap();
        assert!(!s.is_bound());
        assert_eq!(s.numel(), 0);
        assert_eq!(s.dim(1).unwrap(), 3);
        assert!(s.dim(0).is_err());
        assert_eq!(s.to_string(), "[-1, 3]");
        assert_eq!(s, Shape::with_wildcard_batch(&[3]));

        let bound = s.bind_batch(8).unwrap();
        assert!(bound.is_bound());
        assert_eq!(bound, Shape::new(&[8, 3]));
        assert!(bound.bind_batch(2).is_err());
    }

    #[test]
    fn test_of_rejects_inner_wildcard() {
        assert!(Shape::of(&[2, -1]).is_err());
        assert!(Shape::of(&[-2, 3]).is_err());
        assert_eq!(Shape::of(&[2, 3]).unwrap(), Shape::new(&[2, 3]));
    }

    #[test]
    fn test_reshape() {
        let s = Shape::new(&[2, 3, 4]);
        let r = s.resolve_reshape(&[6, 4]).unwrap();
        assert_eq!(r.dims(), &[6, 4]);

        let r = s.resolve_reshape(&[-1, 4]).unwrap();
        assert_eq!(r.dims(), &[6, 4]);

        let r = s.resolve_reshape(&[2, -1]).unwrap();
        assert_eq!(r.dims(), &[2, 12]);

        assert!(s.resolve_reshape(&[-1, -1]).is_none());
        assert!(s.resolve_reshape(&[5, 5]).is_none());
    }

    #[test]
    fn test_transpose() {
        let s = Shape::new(&[2, 3, 4]);
        let t = s.transpose().unwrap();
        assert_eq!(t.dims(), &[2, 4, 3]);

        let s = Shape::new(&[5]);
        assert!(s.transpose().is_none());
    }

    #[test]
    fn test_matrix_accessors() {
        let s = Shape::new(&[3, 4]);
        assert_eq!(s.row().unwrap(), 3);
        assert_eq!(s.column().unwrap(), 4);
        assert!(Shape::new(&[3]).row().is_err());
    }

    #[test]
    fn test_from_array() {
        let s: Shape = [2, 3].into();
        assert_eq!(s.dims(), &[2, 3]);

        let s: Shape = [1, 2, 3, 4].into();
        assert_eq!(s.numel(), 24);
    }
}
