//! # dyngrad-autograd
//!
//! Define-by-run reverse-mode automatic differentiation over `dyngrad-core`
//! arrays.
//!
//! Provides:
//! - `Function` trait for differentiable operations, applied with `call`
//! - `Variable` handles whose creators form the computation graph
//! - Generation-ordered backward pass with gradient accumulation
//! - `Parameter` / `ParameterStore` for named trainable leaves
//! - `no_grad` scope and an explicit `ForwardConfig` for train/eval behaviour

pub mod error;
pub mod scope;
pub mod config;
pub mod graph;
pub mod function;
pub mod variable;
pub mod parameter;
pub mod functions;
mod backward;

pub use config::ForwardConfig;
pub use error::AutogradError;
pub use function::{call, Function};
pub use graph::FunctionNode;
pub use parameter::{clear_grads, Parameter, ParameterStore};
pub use scope::{enable_grad, is_grad_enabled, no_grad, GradModeGuard, NoGradGuard};
pub use variable::{Variable, VariableKind};

pub type Result<T> = std::result::Result<T, AutogradError>;
