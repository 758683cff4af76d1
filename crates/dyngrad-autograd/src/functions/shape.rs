//! Shape-changing functions: reshape, transpose, broadcast_to, sum_to and
//! the reductions.

use dyngrad_core::{NdArray, Shape};

use crate::function::{call, expect_inputs, saved, Function};
use crate::variable::Variable;
use crate::Result;

/// Reshape to a target shape. A wildcard batch dimension in the target is
/// bound from the input's element count on each forward call.
#[derive(Debug)]
pub struct Reshape {
    target: Shape,
    input_shape: Option<Shape>,
}

impl Reshape {
    pub fn new(target: impl Into<Shape>) -> Self {
        Self {
            target: target.into(),
            input_shape: None,
        }
    }
}

impl Function for Reshape {
    fn name(&self) -> &'static str {
        "Reshape"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.reshape(&self.target)?;
        self.input_shape = Some(x.shape().clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shape = saved(&self.input_shape, self.name())?;
        Ok(vec![gy.reshape(shape)?])
    }
}

/// Swap the last two axes.
#[derive(Debug, Default)]
pub struct Transpose {
    forwarded: Option<()>,
}

impl Transpose {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Transpose {
    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.forwarded = Some(());
        Ok(x.transpose())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        saved(&self.forwarded, self.name())?;
        Ok(vec![gy.transpose()])
    }
}

/// Expand to a larger shape; the gradient is summed back with `sum_to`.
#[derive(Debug)]
pub struct BroadcastTo {
    shape: Shape,
    input_shape: Option<Shape>,
}

impl BroadcastTo {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            input_shape: None,
        }
    }
}

impl Function for BroadcastTo {
    fn name(&self) -> &'static str {
        "BroadcastTo"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.broadcast_to(&self.shape)?;
        self.input_shape = Some(x.shape().clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shape = saved(&self.input_shape, self.name())?;
        Ok(vec![gy.sum_to(shape)?])
    }
}

/// Sum the broadcast dimensions away; the gradient is broadcast back to the
/// input shape.
#[derive(Debug)]
pub struct SumTo {
    shape: Shape,
    input_shape: Option<Shape>,
}

impl SumTo {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            input_shape: None,
        }
    }
}

impl Function for SumTo {
    fn name(&self) -> &'static str {
        "SumTo"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.sum_to(&self.shape)?;
        self.input_shape = Some(x.shape().clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shape = saved(&self.input_shape, self.name())?;
        Ok(vec![gy.broadcast_to(shape)?])
    }
}

/// Sum of every element, as a scalar.
#[derive(Debug, Default)]
pub struct Sum {
    input_shape: Option<Shape>,
}

impl Sum {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input_shape = Some(x.shape().clone());
        Ok(x.sum())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shape = saved(&self.input_shape, self.name())?;
        Ok(vec![gy.broadcast_to(shape)?])
    }
}

/// Shapes recorded by an axis reduction: the input shape and the output
/// shape with the reduced axis kept as size 1.
#[derive(Debug)]
struct AxisShapes {
    input: Shape,
    kept: Shape,
    axis_len: usize,
}

impl AxisShapes {
    fn record(x: &NdArray, axis: isize) -> Self {
        let dims = x.shape().dims();
        // the reduction already validated `axis`
        let axis = axis.rem_euclid(dims.len() as isize) as usize;
        let mut kept = dims.to_vec();
        kept[axis] = 1;
        Self {
            input: x.shape().clone(),
            kept: Shape::from(kept),
            axis_len: dims[axis],
        }
    }

    /// Spread a reduced gradient back over the input shape.
    fn expand(&self, gy: &NdArray) -> Result<NdArray> {
        Ok(gy.reshape(&self.kept)?.broadcast_to(&self.input)?)
    }
}

/// Sum along one axis.
#[derive(Debug)]
pub struct SumAxis {
    axis: isize,
    keepdims: bool,
    shapes: Option<AxisShapes>,
}

impl SumAxis {
    pub fn new(axis: isize, keepdims: bool) -> Self {
        Self {
            axis,
            keepdims,
            shapes: None,
        }
    }
}

impl Function for SumAxis {
    fn name(&self) -> &'static str {
        "SumAxis"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.sum_axis(self.axis, self.keepdims)?;
        self.shapes = Some(AxisShapes::record(x, self.axis));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shapes = saved(&self.shapes, self.name())?;
        Ok(vec![shapes.expand(gy)?])
    }
}

/// Mean along one axis.
#[derive(Debug)]
pub struct MeanAxis {
    axis: isize,
    keepdims: bool,
    shapes: Option<AxisShapes>,
}

impl MeanAxis {
    pub fn new(axis: isize, keepdims: bool) -> Self {
        Self {
            axis,
            keepdims,
            shapes: None,
        }
    }
}

impl Function for MeanAxis {
    fn name(&self) -> &'static str {
        "MeanAxis"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.mean_axis(self.axis, self.keepdims)?;
        self.shapes = Some(AxisShapes::record(x, self.axis));
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let shapes = saved(&self.shapes, self.name())?;
        let scale = 1.0 / shapes.axis_len as f32;
        Ok(vec![shapes.expand(&gy.mul_scalar(scale))?])
    }
}

impl Variable {
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Variable> {
        call(Reshape::new(shape), &[self])
    }

    pub fn transpose(&self) -> Result<Variable> {
        call(Transpose::new(), &[self])
    }

    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<Variable> {
        call(BroadcastTo::new(shape), &[self])
    }

    pub fn sum_to(&self, shape: impl Into<Shape>) -> Result<Variable> {
        call(SumTo::new(shape), &[self])
    }

    pub fn sum(&self) -> Result<Variable> {
        call(Sum::new(), &[self])
    }

    pub fn sum_axis(&self, axis: isize, keepdims: bool) -> Result<Variable> {
        call(SumAxis::new(axis, keepdims), &[self])
    }

    pub fn mean_axis(&self, axis: isize, keepdims: bool) -> Result<Variable> {
        call(MeanAxis::new(axis, keepdims), &[self])
    }
}
