//! Conversion of plain Rust numeric data into `NdArray`s.

use crate::error::CoreError;
use crate::ndarray::NdArray;
use crate::shape::Shape;
use crate::Result;

/// Data that can be turned into an [`NdArray`].
///
/// Implemented for scalars, flat slices and vectors (1-D), fixed-size
/// nested arrays up to three levels, and nested `Vec`s (which must not be
/// ragged).
pub trait IntoNdArray {
    /// # Errors
    /// Returns `CoreError::InvalidData` if nested rows disagree in length.
    fn into_ndarray(self) -> Result<NdArray>;
}

impl IntoNdArray for NdArray {
    fn into_ndarray(self) -> Result<NdArray> {
        Ok(self)
    }
}

impl IntoNdArray for f32 {
    fn into_ndarray(self) -> Result<NdArray> {
        Ok(NdArray::scalar(self))
    }
}

impl IntoNdArray for Vec<f32> {
    fn into_ndarray(self) -> Result<NdArray> {
        let len = self.len();
        NdArray::from_vec(self, [len])
    }
}

impl IntoNdArray for &[f32] {
    fn into_ndarray(self) -> Result<NdArray> {
        self.to_vec().into_ndarray()
    }
}

impl<const N: usize> IntoNdArray for [f32; N] {
    fn into_ndarray(self) -> Result<NdArray> {
        NdArray::from_vec(self.to_vec(), [N])
    }
}

impl<const N0: usize, const N1: usize> IntoNdArray for [[f32; N1]; N0] {
    fn into_ndarray(self) -> Result<NdArray> {
        let buf: Vec<f32> = self.into_iter().flatten().collect();
        NdArray::from_vec(buf, [N0, N1])
    }
}

impl<const N0: usize, const N1: usize, const N2: usize> IntoNdArray for [[[f32; N2]; N1]; N0] {
    fn into_ndarray(self) -> Result<NdArray> {
        let buf: Vec<f32> = self
            .into_iter()
            .flat_map(|plane| plane.into_iter().flatten())
            .collect();
        NdArray::from_vec(buf, [N0, N1, N2])
    }
}

impl IntoNdArray for Vec<Vec<f32>> {
    fn into_ndarray(self) -> Result<NdArray> {
        let rows = self.len();
        let cols = self.first().map_or(0, Vec::len);
        if let Some((i, row)) = self.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(CoreError::InvalidData(format!(
                "ragged rows: row 0 has {cols} elements but row {i} has {}",
                row.len()
            )));
        }
        let buf: Vec<f32> = self.into_iter().flatten().collect();
        NdArray::from_vec(buf, Shape::new(&[rows, cols]))
    }
}
