use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::function::Function;
use crate::variable::{Variable, VariableInner};

/// Unique identifier for nodes and variables in the computation graph.
static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn next_id() -> usize {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// One recorded function application in the computation graph.
///
/// Each node holds:
/// - The function instance, with whatever it saved during forward
/// - Shared handles to its input variables (kept alive for backward)
/// - A weak handle to its output (the output owns the node, not vice versa)
/// - The generation of its newest input, which orders the backward pass
pub struct FunctionNode {
    pub(crate) id: usize,
    pub(crate) generation: usize,
    pub(crate) func: Box<dyn Function>,
    pub(crate) inputs: Vec<Variable>,
    pub(crate) output: Weak<VariableInner>,
}

impl FunctionNode {
    pub(crate) fn new(
        func: Box<dyn Function>,
        inputs: Vec<Variable>,
        output: Weak<VariableInner>,
    ) -> Self {
        let generation = inputs.iter().map(Variable::generation).max().unwrap_or(0);
        Self {
            id: next_id(),
            generation,
            func,
            inputs,
            output,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn name(&self) -> &'static str {
        self.func.name()
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    /// The produced variable, if it is still alive.
    pub fn output(&self) -> Option<Variable> {
        self.output.upgrade().map(Variable::from_inner)
    }
}

impl Drop for FunctionNode {
    /// Release the upstream graph with an explicit work stack. Dropping the
    /// inputs recursively would use one stack frame per generation.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.inputs);
        while let Some(var) = stack.pop() {
            // shared variables and nodes are left to their other owners
            let Some(creator) = var.into_sole_creator() else {
                continue;
            };
            if let Ok(mut node) = Arc::try_unwrap(creator) {
                stack.append(&mut node.inputs);
            }
        }
    }
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("generation", &self.generation)
            .field("inputs", &self.inputs.len())
            .finish()
    }
}
