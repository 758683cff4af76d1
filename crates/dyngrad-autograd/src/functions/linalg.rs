use dyngrad_core::NdArray;

use crate::function::{call, expect_inputs, saved, Function};
use crate::variable::Variable;
use crate::Result;

/// Matrix product `x @ w` of 2-D (or batched 3-D) operands.
///
/// Backward: `gx = gy @ wᵀ`, `gw = xᵀ @ gy`.
#[derive(Debug, Default)]
pub struct MatMul {
    inputs: Option<(NdArray, NdArray)>,
}

impl MatMul {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for MatMul {
    fn name(&self) -> &'static str {
        "MatMul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x, w] = expect_inputs(self.name(), inputs)?;
        let y = x.matmul(w)?;
        self.inputs = Some((x.clone(), w.clone()));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let (x, w) = saved(&self.inputs, self.name())?;
        Ok(vec![gy.matmul(&w.transpose())?, x.transpose().matmul(gy)?])
    }
}

impl Variable {
    pub fn matmul(&self, other: &Variable) -> Result<Variable> {
        call(MatMul::new(), &[self, other])
    }
}
