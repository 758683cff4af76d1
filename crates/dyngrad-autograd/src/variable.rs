use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dyngrad_core::{CoreError, NdArray, Shape};
use parking_lot::RwLock;

use crate::backward;
use crate::graph::{next_id, FunctionNode};
use crate::{AutogradError, Result};

/// Whether a variable was supplied by the user or produced by a function.
/// Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Leaf,
    Internal,
}

pub(crate) struct VariableInner {
    id: usize,
    kind: VariableKind,
    generation: usize,
    name: RwLock<Option<String>>,
    value: RwLock<NdArray>,
    grad: RwLock<Option<NdArray>>,
    creator: RwLock<Option<Arc<FunctionNode>>>,
    requires_grad: AtomicBool,
    // parameters may not opt out of gradients
    pinned: bool,
}

/// A node of the computation graph: a value, its accumulated gradient and
/// the function that produced it.
///
/// `Variable` is a shared handle; clones refer to the same node. Gradients
/// accumulate (`+=`) across backward passes until cleared with
/// [`Variable::clear_grad`].
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableInner>,
}

impl Variable {
    /// A leaf that requires gradients.
    pub fn new(value: NdArray) -> Self {
        Self::build(value, VariableKind::Leaf, 0, true)
    }

    /// A leaf whose `requires_grad` can never be switched off.
    pub(crate) fn pinned(value: NdArray) -> Self {
        let mut var = Self::build(value, VariableKind::Leaf, 0, true);
        if let Some(inner) = Arc::get_mut(&mut var.inner) {
            inner.pinned = true;
        }
        var
    }

    /// A leaf that does not require gradients (input data, labels).
    pub fn constant(value: NdArray) -> Self {
        Self::build(value, VariableKind::Leaf, 0, false)
    }

    pub(crate) fn internal(value: NdArray, generation: usize, requires_grad: bool) -> Self {
        Self::build(value, VariableKind::Internal, generation, requires_grad)
    }

    fn build(value: NdArray, kind: VariableKind, generation: usize, requires_grad: bool) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                id: next_id(),
                kind,
                generation,
                name: RwLock::new(None),
                value: RwLock::new(value),
                grad: RwLock::new(None),
                creator: RwLock::new(None),
                requires_grad: AtomicBool::new(requires_grad),
                pinned: false,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<VariableInner>) -> Self {
        Self { inner }
    }

    /// Consume the last strong handle and hand back its creator; `None`
    /// when other handles still exist or there is no creator.
    pub(crate) fn into_sole_creator(self) -> Option<Arc<FunctionNode>> {
        Arc::try_unwrap(self.inner)
            .ok()
            .and_then(|inner| inner.creator.into_inner())
    }

    pub(crate) fn downgrade(&self) -> Weak<VariableInner> {
        Arc::downgrade(&self.inner)
    }

    /// Attach a display name.
    pub fn named(self, name: impl Into<String>) -> Self {
        *self.inner.name.write() = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name.read().clone()
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Whether both handles refer to the same graph node.
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Value and gradient
    // =========================================================================

    /// Current value (cheap: the buffer is shared copy-on-write).
    pub fn value(&self) -> NdArray {
        self.inner.value.read().clone()
    }

    /// Replace the value, keeping the shape.
    pub fn set_value(&self, value: NdArray) -> Result<()> {
        let mut slot = self.inner.value.write();
        if slot.shape() != value.shape() {
            return Err(CoreError::ShapeMismatch {
                op: "set_value",
                lhs: slot.shape().clone(),
                rhs: value.shape().clone(),
            }
            .into());
        }
        *slot = value;
        Ok(())
    }

    pub fn shape(&self) -> Shape {
        self.inner.value.read().shape().clone()
    }

    pub fn grad(&self) -> Option<NdArray> {
        self.inner.grad.read().clone()
    }

    pub fn set_grad(&self, grad: Option<NdArray>) {
        *self.inner.grad.write() = grad;
    }

    pub fn clear_grad(&self) {
        *self.inner.grad.write() = None;
    }

    /// `grad = grad + g`, or `grad = g` when no gradient is present yet.
    pub(crate) fn accumulate_grad(&self, g: &NdArray) -> Result<()> {
        let mut lock = self.inner.grad.write();
        let next = match lock.as_ref() {
            Some(existing) => existing.add(g)?,
            None => g.clone(),
        };
        *lock = Some(next);
        Ok(())
    }

    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad.load(Ordering::Relaxed)
    }

    /// Fails with `GraphState` when switching off a parameter's gradients.
    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<()> {
        if self.inner.pinned && !requires_grad {
            return Err(AutogradError::graph_state(format!(
                "variable {:?} is a parameter and always requires grad",
                self.name().unwrap_or_default()
            )));
        }
        self.inner
            .requires_grad
            .store(requires_grad, Ordering::Relaxed);
        Ok(())
    }

    // =========================================================================
    // Graph structure
    // =========================================================================

    pub fn kind(&self) -> VariableKind {
        self.inner.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.kind == VariableKind::Leaf
    }

    /// Topological depth: 0 for leaves, `1 + max(inputs)` for outputs.
    pub fn generation(&self) -> usize {
        self.inner.generation
    }

    pub fn creator(&self) -> Option<Arc<FunctionNode>> {
        self.inner.creator.read().clone()
    }

    pub fn creator_name(&self) -> Option<&'static str> {
        self.inner.creator.read().as_ref().map(|c| c.name())
    }

    pub(crate) fn set_creator(&self, node: Arc<FunctionNode>) {
        *self.inner.creator.write() = Some(node);
    }

    /// Detach from the producing function. Backward passes from downstream
    /// stop here.
    pub fn unchain(&self) {
        *self.inner.creator.write() = None;
    }

    /// Detach every variable upstream of (and including) this one, releasing
    /// the recorded graph.
    pub fn unchain_backward(&self) {
        let mut stack = vec![self.clone()];
        let mut seen = HashSet::new();
        while let Some(var) = stack.pop() {
            if !seen.insert(var.id()) {
                continue;
            }
            if let Some(node) = var.inner.creator.write().take() {
                stack.extend(node.inputs.iter().cloned());
            }
        }
    }

    // =========================================================================
    // Backward
    // =========================================================================

    /// Back-propagate from this variable, seeding its gradient with ones if
    /// none is present.
    pub fn backward(&self) -> Result<()> {
        backward::run(self, None)
    }

    /// Back-propagate from this variable with an explicit seed gradient.
    pub fn backward_with_grad(&self, seed: NdArray) -> Result<()> {
        backward::run(self, Some(seed))
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("shape", &self.shape())
            .field("kind", &self.kind())
            .field("generation", &self.generation())
            .field("creator", &self.creator_name())
            .field("has_grad", &self.inner.grad.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_defaults() {
        let v = Variable::new(NdArray::ones([2, 2]).unwrap()).named("w");
        assert!(v.is_leaf());
        assert!(v.requires_grad());
        assert_eq!(v.generation(), 0);
        assert!(v.grad().is_none());
        assert!(v.creator().is_none());
        assert_eq!(v.name().as_deref(), Some("w"));

        let c = Variable::constant(NdArray::scalar(1.0));
        assert!(!c.requires_grad());
    }

    #[test]
    fn test_requires_grad_toggle() {
        let v = Variable::new(NdArray::scalar(1.0));
        v.set_requires_grad(false).unwrap();
        assert!(!v.requires_grad());

        let p = Variable::pinned(NdArray::scalar(1.0)).named("w");
        assert!(matches!(
            p.set_requires_grad(false),
            Err(AutogradError::GraphState(_))
        ));
        assert!(p.requires_grad());
        p.set_requires_grad(true).unwrap();
    }

    #[test]
    fn test_clone_shares_identity() {
        let v = Variable::new(NdArray::scalar(1.0));
        let w = v.clone();
        w.set_grad(Some(NdArray::scalar(3.0)));
        assert!(v.ptr_eq(&w));
        assert_eq!(v.grad().unwrap().item().unwrap(), 3.0);
    }

    #[test]
    fn test_grad_accumulation() {
        let v = Variable::new(NdArray::zeros([2]).unwrap());
        v.accumulate_grad(&NdArray::new([1.0, 2.0]).unwrap()).unwrap();
        v.accumulate_grad(&NdArray::new([3.0, 4.0]).unwrap()).unwrap();
        assert_eq!(v.grad().unwrap().as_slice(), &[4.0, 6.0]);

        v.clear_grad();
        assert!(v.grad().is_none());
    }

    #[test]
    fn test_set_value_keeps_shape() {
        let v = Variable::new(NdArray::zeros([2]).unwrap());
        v.set_value(NdArray::new([5.0, 6.0]).unwrap()).unwrap();
        assert_eq!(v.value().as_slice(), &[5.0, 6.0]);
        assert!(v.set_value(NdArray::zeros([3]).unwrap()).is_err());
    }

    #[test]
    fn test_unchain_backward_releases_graph() {
        let x = Variable::new(NdArray::scalar(0.5));
        let y = x.exp().unwrap();
        let z = y.sin().unwrap();
        z.unchain_backward();
        assert!(z.creator().is_none());
        assert!(y.creator().is_none());
        assert!(!z.is_leaf());
    }

    #[test]
    fn test_unchain_stops_backward() {
        let x = Variable::new(NdArray::scalar(2.0));
        let y = x.square().unwrap();
        y.unchain();
        let z = y.mul_scalar(3.0).unwrap();
        z.backward().unwrap();
        assert_eq!(y.grad().unwrap().item().unwrap(), 3.0);
        assert!(x.grad().is_none());
    }
}
