//! Elementwise math: exp, log, square, sin, cos.

use dyngrad_core::NdArray;

use crate::function::{call, expect_inputs, saved, Function};
use crate::variable::Variable;
use crate::Result;

/// `e^x`. Saves its output, which is also its derivative.
#[derive(Debug, Default)]
pub struct Exp {
    output: Option<NdArray>,
}

impl Exp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Exp {
    fn name(&self) -> &'static str {
        "Exp"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.exp();
        self.output = Some(y.clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let y = saved(&self.output, self.name())?;
        Ok(vec![gy.mul(y)?])
    }
}

/// Natural logarithm.
#[derive(Debug, Default)]
pub struct Log {
    input: Option<NdArray>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Log {
    fn name(&self) -> &'static str {
        "Log"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.log())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        Ok(vec![gy.div(x)?])
    }
}

#[derive(Debug, Default)]
pub struct Square {
    input: Option<NdArray>,
}

impl Square {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Square {
    fn name(&self) -> &'static str {
        "Square"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.square())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        Ok(vec![gy.mul(&x.mul_scalar(2.0))?])
    }
}

#[derive(Debug, Default)]
pub struct Sin {
    input: Option<NdArray>,
}

impl Sin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Sin {
    fn name(&self) -> &'static str {
        "Sin"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.sin())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        Ok(vec![gy.mul(&x.cos())?])
    }
}

#[derive(Debug, Default)]
pub struct Cos {
    input: Option<NdArray>,
}

impl Cos {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Cos {
    fn name(&self) -> &'static str {
        "Cos"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.cos())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        Ok(vec![gy.mul(&x.sin().neg())?])
    }
}

impl Variable {
    pub fn exp(&self) -> Result<Variable> {
        call(Exp::new(), &[self])
    }

    pub fn log(&self) -> Result<Variable> {
        call(Log::new(), &[self])
    }

    pub fn square(&self) -> Result<Variable> {
        call(Square::new(), &[self])
    }

    pub fn sin(&self) -> Result<Variable> {
        call(Sin::new(), &[self])
    }

    pub fn cos(&self) -> Result<Variable> {
        call(Cos::new(), &[self])
    }
}
