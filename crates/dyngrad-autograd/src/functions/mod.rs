//! Built-in differentiable functions.
//!
//! Every function follows the same contract: `forward` saves what
//! `backward` needs, `backward` returns one gradient per input shaped like
//! that input. Binary elementwise functions accept broadcast-compatible
//! operands and route each gradient through `sum_to` back to its operand's
//! shape.
//!
//! Each module also adds the matching convenience methods to [`Variable`](crate::Variable).

mod activation;
mod arithmetic;
mod linalg;
mod math;
mod shape;

pub use activation::{Clip, Dropout, Gelu, Relu, Sigmoid, SoftMax, Tanh};
pub use arithmetic::{Add, AddScalar, Div, Mul, MulScalar, Neg, PowScalar, Sub};
pub use linalg::MatMul;
pub use math::{Cos, Exp, Log, Sin, Square};
pub use shape::{BroadcastTo, MeanAxis, Reshape, Sum, SumAxis, SumTo, Transpose};
