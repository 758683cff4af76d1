//! Convenience re-exports for common dyngrad-core types.
//!
//! ```rust
//! use dyngrad_core::prelude::*;
//! ```

pub use crate::CoreError;
pub use crate::IntoNdArray;
pub use crate::NdArray;
pub use crate::Result;
pub use crate::Shape;
