use thiserror::Error;

use crate::shape::Shape;

/// Errors raised by array construction and array operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Invalid shape construction or a dimension lookup outside the shape.
    #[error("shape error: {0}")]
    Shape(String),

    /// Operand shapes are neither identical nor broadcast-compatible.
    #[error("{op}: incompatible shapes {lhs} and {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    #[error("axis {axis} out of range for {ndim}-d array")]
    InvalidAxis { axis: isize, ndim: usize },

    #[error("cannot reshape {numel} elements into {target:?}")]
    InvalidReshape { numel: usize, target: Vec<isize> },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl CoreError {
    pub(crate) fn mismatch(op: &'static str, lhs: &Shape, rhs: &Shape) -> Self {
        CoreError::ShapeMismatch {
            op,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_names_both_shapes() {
        let err = CoreError::mismatch("add", &Shape::new(&[2, 3]), &Shape::new(&[4]));
        let msg = err.to_string();
        assert!(msg.contains("add"));
        assert!(msg.contains("[2, 3]"));
        assert!(msg.contains("[4]"));
    }
}
