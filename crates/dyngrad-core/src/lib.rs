//! # dyngrad-core
//!
//! Dense array engine for the dyngrad automatic differentiation framework.
//!
//! Provides the foundational `NdArray` type with:
//! - Immutable `Shape` descriptors (with an optional wildcard batch dimension)
//! - Copy-on-write f32 storage, so clones are cheap and never alias writes
//! - Broadcasting elementwise arithmetic, comparisons and reductions
//! - `broadcast_to` / `sum_to`, the adjoint pair used by gradient routing

pub mod error;
pub mod shape;
pub mod storage;
pub mod ndarray;
pub mod convert;
pub mod ops;
pub mod prelude;

pub use convert::IntoNdArray;
pub use error::CoreError;
pub use ndarray::NdArray;
pub use shape::Shape;
pub use storage::Storage;

pub type Result<T> = std::result::Result<T, CoreError>;
