//! The differentiable-function trait and the entry point that splices a
//! function application into the graph.

use std::sync::Arc;

use dyngrad_core::NdArray;
use tracing::trace;

use crate::error::AutogradError;
use crate::graph::FunctionNode;
use crate::scope::is_grad_enabled;
use crate::variable::Variable;
use crate::Result;

/// A differentiable operation.
///
/// Each call site creates a fresh instance. `forward` computes the output
/// value and stores whatever `backward` will need (inputs, outputs, masks);
/// `backward` maps the output gradient to one gradient per input,
/// positionally aligned with the forward inputs and shaped like them.
pub trait Function: Send + Sync {
    /// Name of this function (for errors and tracing).
    fn name(&self) -> &'static str;

    /// Number of inputs `forward` expects.
    fn arity(&self) -> usize;

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray>;

    /// # Errors
    /// `AutogradError::GraphState` if this instance never ran `forward`.
    fn backward(&self, grad_output: &NdArray) -> Result<Vec<NdArray>>;
}

/// Apply `func` to `inputs`, returning the output variable.
///
/// While gradient recording is enabled the output owns a new graph node
/// pointing at `func` and the inputs; otherwise the output is a detached
/// internal variable.
pub fn call<F: Function + 'static>(mut func: F, inputs: &[&Variable]) -> Result<Variable> {
    if inputs.len() != func.arity() {
        return Err(AutogradError::Arity {
            function: func.name(),
            expected: func.arity(),
            got: inputs.len(),
        });
    }

    let values: Vec<NdArray> = inputs.iter().map(|v| v.value()).collect();
    let refs: Vec<&NdArray> = values.iter().collect();
    let out = func.forward(&refs)?;

    let generation = inputs.iter().map(|v| v.generation()).max().unwrap_or(0);
    let requires_grad = inputs.iter().any(|v| v.requires_grad());
    let output = Variable::internal(out, generation + 1, requires_grad);

    if is_grad_enabled() {
        trace!(function = func.name(), generation, "recording function");
        let node = FunctionNode::new(
            Box::new(func),
            inputs.iter().map(|&v| v.clone()).collect(),
            output.downgrade(),
        );
        output.set_creator(Arc::new(node));
    }
    Ok(output)
}

/// Fetch state saved by `forward`, or fail if `forward` never ran.
pub(crate) fn saved<'a, T>(slot: &'a Option<T>, function: &str) -> Result<&'a T> {
    slot.as_ref().ok_or_else(|| {
        AutogradError::graph_state(format!("{function}: backward called before forward"))
    })
}

/// Check the input count inside `forward` for direct (non-`call`) use.
pub(crate) fn expect_inputs<'a, const N: usize>(
    function: &'static str,
    inputs: &[&'a NdArray],
) -> Result<[&'a NdArray; N]> {
    inputs.try_into().map_err(|_| AutogradError::Arity {
        function,
        expected: N,
        got: inputs.len(),
    })
}
