//! Named trainable leaves and a registry to address them by name.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use dyngrad_core::NdArray;
use tracing::debug;

use crate::variable::Variable;

/// A persistent, trainable leaf variable with a stable name.
///
/// A parameter always requires gradients and never has a creator, so it
/// survives any number of forward/backward cycles. Optimizers read
/// `value()`/`grad()` through `Deref` and write back with `set_value`;
/// `set_requires_grad(false)` through the same `Deref` is refused.
#[derive(Clone)]
pub struct Parameter {
    name: Arc<str>,
    var: Variable,
}

impl Parameter {
    pub fn new(name: impl Into<Arc<str>>, value: NdArray) -> Self {
        let name = name.into();
        let var = Variable::pinned(value).named(name.as_ref());
        Self { name, var }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable(&self) -> &Variable {
        &self.var
    }
}

impl Deref for Parameter {
    type Target = Variable;

    fn deref(&self) -> &Variable {
        &self.var
    }
}

impl AsRef<Variable> for Parameter {
    fn as_ref(&self) -> &Variable {
        &self.var
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("shape", &self.var.shape())
            .field("has_grad", &self.var.grad().is_some())
            .finish()
    }
}

/// Parameters keyed by name, iterated in name order.
#[derive(Debug, Default, Clone)]
pub struct ParameterStore {
    params: BTreeMap<Arc<str>, Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `param`, returning the parameter it replaced, if any.
    pub fn insert(&mut self, param: Parameter) -> Option<Parameter> {
        self.params.insert(Arc::clone(&param.name), param)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.params.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of scalar weights across all parameters.
    pub fn total_numel(&self) -> usize {
        self.iter().map(|p| p.shape().numel()).sum()
    }

    /// Reset every parameter's gradient to absent.
    pub fn clear_grads(&self) {
        clear_grads(self.iter().map(Parameter::variable));
    }
}

impl<'a> IntoIterator for &'a ParameterStore {
    type Item = &'a Parameter;
    type IntoIter = std::collections::btree_map::Values<'a, Arc<str>, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.values()
    }
}

impl FromIterator<Parameter> for ParameterStore {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut store = Self::new();
        for p in iter {
            store.insert(p);
        }
        store
    }
}

/// Reset the gradient of every variable in `vars` to absent.
pub fn clear_grads<'a>(vars: impl IntoIterator<Item = &'a Variable>) {
    let mut cleared = 0usize;
    for v in vars {
        v.clear_grad();
        cleared += 1;
    }
    debug!(cleared, "cleared gradients");
}
