//! Comparison operations on arrays.
//!
//! Results are 0/1-valued arrays of the broadcast shape, suitable for
//! accuracy bookkeeping (`argmax(..).eq_elem(&labels)?.mean()`).

use crate::ndarray::NdArray;
use crate::ops::arithmetic::binary_op;
use crate::Result;

impl NdArray {
    /// Element-wise equality check. Returns an array of 1.0 (true) or 0.0 (false).
    pub fn eq_elem(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("eq", self, other, |a, b| indicator((a - b).abs() < 1e-7))
    }

    /// Element-wise greater-than. Returns 1.0 where self > other.
    pub fn gt(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("gt", self, other, |a, b| indicator(a > b))
    }

    /// Element-wise less-than. Returns 1.0 where self < other.
    pub fn lt(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("lt", self, other, |a, b| indicator(a < b))
    }

    /// Element-wise greater-than-or-equal. Returns 1.0 where self >= other.
    pub fn ge(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("ge", self, other, |a, b| indicator(a >= b))
    }

    /// Element-wise less-than-or-equal. Returns 1.0 where self <= other.
    pub fn le(&self, other: &NdArray) -> Result<NdArray> {
        binary_op("le", self, other, |a, b| indicator(a <= b))
    }

    /// Whether every element is strictly greater than its counterpart.
    pub fn is_larger(&self, other: &NdArray) -> Result<bool> {
        Ok(self.gt(other)?.as_slice().iter().all(|&v| v == 1.0))
    }
}

fn indicator(cond: bool) -> f32 {
    if cond {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use crate::NdArray;

    #[test]
    fn test_eq() {
        let a = NdArray::new([1.0, 2.0, 3.0]).unwrap();
        let b = NdArray::new([1.0, 0.0, 3.0]).unwrap();
        let c = a.eq_elem(&b).unwrap();
        assert_eq!(c.as_slice(), &[1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_gt_lt() {
        let a = NdArray::new([1.0, 2.0, 3.0]).unwrap();
        let b = NdArray::new([2.0, 2.0, 1.0]).unwrap();
        assert_eq!(a.gt(&b).unwrap().as_slice(), &[0.0, 0.0, 1.0]);
        assert_eq!(a.lt(&b).unwrap().as_slice(), &[1.0, 0.0, 0.0]);
        assert_eq!(a.ge(&b).unwrap().as_slice(), &[0.0, 1.0, 1.0]);
        assert_eq!(a.le(&b).unwrap().as_slice(), &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_compare_broadcast() {
        let a = NdArray::new([[1.0, 5.0], [3.0, 0.0]]).unwrap();
        let threshold = NdArray::scalar(2.0);
        assert_eq!(a.gt(&threshold).unwrap().as_slice(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_is_larger() {
        let a = NdArray::new([3.0, 4.0]).unwrap();
        let b = NdArray::new([1.0, 2.0]).unwrap();
        assert!(a.is_larger(&b).unwrap());
        assert!(!b.is_larger(&a).unwrap());
        assert!(!a.is_larger(&a).unwrap());
    }

    #[test]
    fn test_accuracy_pattern() {
        let logits = NdArray::new([[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]]).unwrap();
        let labels = NdArray::new([1.0, 1.0, 1.0]).unwrap();
        let hits = logits.argmax(-1, false).unwrap().eq_elem(&labels).unwrap();
        assert!((hits.mean().item().unwrap() - 2.0 / 3.0).abs() < 1e-6);
    }
}
