//! Arithmetic functions: add, sub, mul, div, neg and scalar variants.

use dyngrad_core::{NdArray, Shape};

use crate::function::{call, expect_inputs, saved, Function};
use crate::variable::Variable;
use crate::Result;

/// `x0 + x1` with broadcasting.
#[derive(Debug, Default)]
pub struct Add {
    shapes: Option<(Shape, Shape)>,
}

impl Add {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x0, x1] = expect_inputs(self.name(), inputs)?;
        let y = x0.add(x1)?;
        self.shapes = Some((x0.shape().clone(), x1.shape().clone()));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let (s0, s1) = saved(&self.shapes, self.name())?;
        Ok(vec![gy.sum_to(s0)?, gy.sum_to(s1)?])
    }
}

/// `x0 - x1` with broadcasting.
#[derive(Debug, Default)]
pub struct Sub {
    shapes: Option<(Shape, Shape)>,
}

impl Sub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Sub {
    fn name(&self) -> &'static str {
        "Sub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x0, x1] = expect_inputs(self.name(), inputs)?;
        let y = x0.sub(x1)?;
        self.shapes = Some((x0.shape().clone(), x1.shape().clone()));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let (s0, s1) = saved(&self.shapes, self.name())?;
        Ok(vec![gy.sum_to(s0)?, gy.neg().sum_to(s1)?])
    }
}

/// `x0 * x1` with broadcasting.
#[derive(Debug, Default)]
pub struct Mul {
    inputs: Option<(NdArray, NdArray)>,
}

impl Mul {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Mul {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x0, x1] = expect_inputs(self.name(), inputs)?;
        let y = x0.mul(x1)?;
        self.inputs = Some((x0.clone(), x1.clone()));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let (x0, x1) = saved(&self.inputs, self.name())?;
        Ok(vec![
            gy.mul(x1)?.sum_to(x0.shape())?,
            gy.mul(x0)?.sum_to(x1.shape())?,
        ])
    }
}

/// `x0 / x1` with broadcasting.
#[derive(Debug, Default)]
pub struct Div {
    inputs: Option<(NdArray, NdArray)>,
}

impl Div {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Div {
    fn name(&self) -> &'static str {
        "Div"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x0, x1] = expect_inputs(self.name(), inputs)?;
        let y = x0.div(x1)?;
        self.inputs = Some((x0.clone(), x1.clone()));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let (x0, x1) = saved(&self.inputs, self.name())?;
        // d/dx1 (x0 / x1) = -x0 / x1^2
        let g1 = gy.mul(x0)?.div(&x1.square())?.neg();
        Ok(vec![gy.div(x1)?.sum_to(x0.shape())?, g1.sum_to(x1.shape())?])
    }
}

#[derive(Debug, Default)]
pub struct Neg {
    forwarded: Option<()>,
}

impl Neg {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Neg {
    fn name(&self) -> &'static str {
        "Neg"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.forwarded = Some(());
        Ok(x.neg())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        saved(&self.forwarded, self.name())?;
        Ok(vec![gy.neg()])
    }
}

/// `x + c` for a constant `c`.
#[derive(Debug)]
pub struct AddScalar {
    c: f32,
    forwarded: Option<()>,
}

impl AddScalar {
    pub fn new(c: f32) -> Self {
        Self { c, forwarded: None }
    }
}

impl Function for AddScalar {
    fn name(&self) -> &'static str {
        "AddScalar"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.forwarded = Some(());
        Ok(x.add_scalar(self.c))
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        saved(&self.forwarded, self.name())?;
        Ok(vec![gy.clone()])
    }
}

/// `x * c` for a constant `c`.
#[derive(Debug)]
pub struct MulScalar {
    c: f32,
    forwarded: Option<()>,
}

impl MulScalar {
    pub fn new(c: f32) -> Self {
        Self { c, forwarded: None }
    }
}

impl Function for MulScalar {
    fn name(&self) -> &'static str {
        "MulScalar"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.forwarded = Some(());
        Ok(x.mul_scalar(self.c))
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        saved(&self.forwarded, self.name())?;
        Ok(vec![gy.mul_scalar(self.c)])
    }
}

/// `x^c` for a constant exponent `c`.
#[derive(Debug)]
pub struct PowScalar {
    c: f32,
    input: Option<NdArray>,
}

impl PowScalar {
    pub fn new(c: f32) -> Self {
        Self { c, input: None }
    }
}

impl Function for PowScalar {
    fn name(&self) -> &'static str {
        "PowScalar"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.pow_scalar(self.c))
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        let c = self.c;
        let dx = x.map(|v| c * v.powf(c - 1.0));
        Ok(vec![gy.mul(&dx)?])
    }
}

impl Variable {
    pub fn add(&self, other: &Variable) -> Result<Variable> {
        call(Add::new(), &[self, other])
    }

    pub fn sub(&self, other: &Variable) -> Result<Variable> {
        call(Sub::new(), &[self, other])
    }

    pub fn mul(&self, other: &Variable) -> Result<Variable> {
        call(Mul::new(), &[self, other])
    }

    pub fn div(&self, other: &Variable) -> Result<Variable> {
        call(Div::new(), &[self, other])
    }

    pub fn neg(&self) -> Result<Variable> {
        call(Neg::new(), &[self])
    }

    pub fn add_scalar(&self, c: f32) -> Result<Variable> {
        call(AddScalar::new(c), &[self])
    }

    pub fn mul_scalar(&self, c: f32) -> Result<Variable> {
        call(MulScalar::new(c), &[self])
    }

    pub fn pow_scalar(&self, c: f32) -> Result<Variable> {
        call(PowScalar::new(c), &[self])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AutogradError;

    fn var(data: &[f32], dims: &[usize]) -> Variable {
        Variable::new(NdArray::from_vec(data.to_vec(), dims).unwrap())
    }

    #[test]
    fn test_add_broadcast_grad_shape() {
        let a = var(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = var(&[10.0, 20.0, 30.0], &[1, 3]);
        let c = a.add(&b).unwrap().sum().unwrap();
        c.backward().unwrap();

        assert_eq!(a.grad().unwrap().as_slice(), &[1.0; 6]);
        let gb = b.grad().unwrap();
        assert_eq!(gb.shape().dims(), &[1, 3]);
        assert_eq!(gb.as_slice(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_sub_grads() {
        let a = var(&[5.0, 6.0], &[2]);
        let b = var(&[1.0], &[1]);
        a.sub(&b).unwrap().sum().unwrap().backward().unwrap();
        assert_eq!(a.grad().unwrap().as_slice(), &[1.0, 1.0]);
        assert_eq!(b.grad().unwrap().as_slice(), &[-2.0]);
    }

    #[test]
    fn test_mul_broadcast_grads() {
        let a = var(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b = var(&[10.0, 100.0], &[2]);
        a.mul(&b).unwrap().sum().unwrap().backward().unwrap();
        assert_eq!(a.grad().unwrap().as_slice(), &[10.0, 100.0, 10.0, 100.0]);
        let gb = b.grad().unwrap();
        assert_eq!(gb.shape().dims(), &[2]);
        assert_eq!(gb.as_slice(), &[4.0, 6.0]);
    }

    #[test]
    fn test_div_grads() {
        let a = var(&[6.0], &[1]);
        let b = var(&[2.0], &[1]);
        a.div(&b).unwrap().backward().unwrap();
        assert_eq!(a.grad().unwrap().as_slice(), &[0.5]);
        assert_eq!(b.grad().unwrap().as_slice(), &[-1.5]);
    }

    #[test]
    fn test_scalar_functions() {
        let x = var(&[2.0], &[1]);
        let y = x.pow_scalar(3.0).unwrap().mul_scalar(2.0).unwrap().add_scalar(1.0).unwrap();
        assert_eq!(y.value().as_slice(), &[17.0]);
        y.backward().unwrap();
        // d/dx 2x^3 + 1 = 6x^2
        assert_eq!(x.grad().unwrap().as_slice(), &[24.0]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = var(&[1.0, 2.0], &[2]);
        let b = var(&[1.0, 2.0, 3.0], &[3]);
        assert!(matches!(a.add(&b), Err(AutogradError::Core(_))));
    }

    #[test]
    fn test_backward_without_forward() {
        let g = NdArray::scalar(1.0);
        for f in [
            Box::new(Add::new()) as Box<dyn Function>,
            Box::new(Sub::new()),
            Box::new(Mul::new()),
            Box::new(Div::new()),
            Box::new(Neg::new()),
            Box::new(PowScalar::new(2.0)),
        ] {
            assert!(matches!(f.backward(&g), Err(AutogradError::GraphState(_))));
        }
    }
}
