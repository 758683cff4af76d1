use std::sync::Arc;

/// Shared, reference-counted f32 buffer backing an `NdArray`.
///
/// Clones share the same allocation. Writes go through [`Storage::make_mut`],
/// which copies the buffer first if anyone else still holds it, so a value
/// handed out to a caller can never be changed behind its back.
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    data: Arc<Vec<f32>>,
}

impl Storage {
    /// Take ownership of an existing buffer.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    /// Create storage from a slice of f32 values.
    pub fn from_slice(data: &[f32]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Allocate `numel` elements all set to `value`.
    pub fn filled(numel: usize, value: f32) -> Self {
        Self::from_vec(vec![value; numel])
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access (copy-on-write).
    pub fn make_mut(&mut self) -> &mut [f32] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Recover the buffer, copying only if it is still shared.
    pub fn into_vec(self) -> Vec<f32> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    /// Whether other `Storage` handles point at the same allocation.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }
}
