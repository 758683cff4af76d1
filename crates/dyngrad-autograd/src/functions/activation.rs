//! Activation functions: sigmoid, tanh, GELU, ReLU, clip, softmax, dropout.

use dyngrad_core::{CoreError, NdArray};
use rand::Rng;

use crate::config::ForwardConfig;
use crate::function::{call, expect_inputs, saved, Function};
use crate::variable::Variable;
use crate::Result;

/// Logistic sigmoid. Saves its output `s`; the derivative is `s * (1 - s)`.
#[derive(Debug, Default)]
pub struct Sigmoid {
    output: Option<NdArray>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Sigmoid {
    fn name(&self) -> &'static str {
        "Sigmoid"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.sigmoid();
        self.output = Some(y.clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let s = saved(&self.output, self.name())?;
        let ds = s.map(|v| v * (1.0 - v));
        Ok(vec![gy.mul(&ds)?])
    }
}

/// Hyperbolic tangent. Saves its output `t`; the derivative is `1 - t^2`.
#[derive(Debug, Default)]
pub struct Tanh {
    output: Option<NdArray>,
}

impl Tanh {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Tanh {
    fn name(&self) -> &'static str {
        "Tanh"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.tanh();
        self.output = Some(y.clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let t = saved(&self.output, self.name())?;
        let dt = t.map(|v| 1.0 - v * v);
        Ok(vec![gy.mul(&dt)?])
    }
}

const GELU_COEF: f32 = 0.044_715;
// sqrt(2 / pi)
const SQRT_2_OVER_PI: f32 = 0.797_884_6;

/// GELU, tanh approximation:
/// `0.5 x (1 + tanh(sqrt(2/pi) (x + 0.044715 x^3)))`.
#[derive(Debug, Default)]
pub struct Gelu {
    input: Option<NdArray>,
}

impl Gelu {
    pub fn new() -> Self {
        Self::default()
    }
}

fn gelu_inner(x: f32) -> f32 {
    (SQRT_2_OVER_PI * (x + GELU_COEF * x * x * x)).tanh()
}

impl Function for Gelu {
    fn name(&self) -> &'static str {
        "Gelu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.map(|v| 0.5 * v * (1.0 + gelu_inner(v))))
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        let dx = x.map(|v| {
            let t = gelu_inner(v);
            let dinner = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEF * v * v);
            0.5 * (1.0 + t) + 0.5 * v * (1.0 - t * t) * dinner
        });
        Ok(vec![gy.mul(&dx)?])
    }
}

#[derive(Debug, Default)]
pub struct Relu {
    input: Option<NdArray>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for Relu {
    fn name(&self) -> &'static str {
        "Relu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        self.input = Some(x.clone());
        Ok(x.relu())
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        Ok(vec![gy.mul(&x.mask(0.0))?])
    }
}

/// Saturate to `[min, max]`. The gradient passes only where the input lay
/// inside the range (bounds included).
#[derive(Debug)]
pub struct Clip {
    min: f32,
    max: f32,
    input: Option<NdArray>,
}

impl Clip {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            input: None,
        }
    }
}

impl Function for Clip {
    fn name(&self) -> &'static str {
        "Clip"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.clip(self.min, self.max)?;
        self.input = Some(x.clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let x = saved(&self.input, self.name())?;
        let (min, max) = (self.min, self.max);
        let pass = x.map(|v| if (min..=max).contains(&v) { 1.0 } else { 0.0 });
        Ok(vec![gy.mul(&pass)?])
    }
}

/// Softmax over the last axis. Backward needs the forward output `y`:
/// `gx = y * g - y * sum(y * g)` per row.
#[derive(Debug, Default)]
pub struct SoftMax {
    output: Option<NdArray>,
}

impl SoftMax {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Function for SoftMax {
    fn name(&self) -> &'static str {
        "SoftMax"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        let y = x.softmax()?;
        self.output = Some(y.clone());
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let y = saved(&self.output, self.name())?;
        let gx = y.mul(gy)?;
        let row_sums = gx.sum_axis(-1, true)?;
        Ok(vec![gx.sub(&y.mul(&row_sums)?)?])
    }
}

/// Inverted dropout: in training, zero each element with probability
/// `ratio` and scale survivors by `1 / (1 - ratio)`. Identity in eval mode.
#[derive(Debug)]
pub struct Dropout {
    ratio: f32,
    config: ForwardConfig,
    mask: Option<NdArray>,
}

impl Dropout {
    pub fn new(ratio: f32, config: ForwardConfig) -> Self {
        Self {
            ratio,
            config,
            mask: None,
        }
    }
}

impl Function for Dropout {
    fn name(&self) -> &'static str {
        "Dropout"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&NdArray]) -> Result<NdArray> {
        let [x] = expect_inputs(self.name(), inputs)?;
        if !(0.0..1.0).contains(&self.ratio) {
            return Err(CoreError::InvalidData(format!(
                "dropout ratio {} outside [0, 1)",
                self.ratio
            ))
            .into());
        }
        let mask = if self.config.training {
            let mut rng = self.config.rng();
            let (ratio, scale) = (self.ratio, 1.0 / (1.0 - self.ratio));
            let data = (0..x.numel())
                .map(|_| if rng.gen::<f32>() >= ratio { scale } else { 0.0 })
                .collect();
            NdArray::from_vec(data, x.shape().clone())?
        } else {
            x.ones_like()
        };
        let y = x.mul(&mask)?;
        self.mask = Some(mask);
        Ok(y)
    }

    fn backward(&self, gy: &NdArray) -> Result<Vec<NdArray>> {
        let mask = saved(&self.mask, self.name())?;
        Ok(vec![gy.mul(mask)?])
    }
}

impl Variable {
    pub fn sigmoid(&self) -> Result<Variable> {
        call(Sigmoid::new(), &[self])
    }

    pub fn tanh(&self) -> Result<Variable> {
        call(Tanh::new(), &[self])
    }

    pub fn gelu(&self) -> Result<Variable> {
        call(Gelu::new(), &[self])
    }

    pub fn relu(&self) -> Result<Variable> {
        call(Relu::new(), &[self])
    }

    pub fn clip(&self, min: f32, max: f32) -> Result<Variable> {
        call(Clip::new(min, max), &[self])
    }

    pub fn softmax(&self) -> Result<Variable> {
        call(SoftMax::new(), &[self])
    }

    pub fn dropout(&self, ratio: f32, config: ForwardConfig) -> Result<Variable> {
        call(Dropout::new(ratio, config), &[self])
    }
}
