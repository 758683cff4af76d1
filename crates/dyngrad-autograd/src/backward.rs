//! Backward pass execution.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use dyngrad_core::{CoreError, NdArray};
use tracing::{debug, trace};

use crate::error::AutogradError;
use crate::graph::FunctionNode;
use crate::variable::Variable;
use crate::Result;

/// Heap entry ordering function nodes by (generation, id), highest first.
struct Candidate(Arc<FunctionNode>);

impl Candidate {
    fn key(&self) -> (usize, usize) {
        (self.0.generation, self.0.id)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Execute the backward pass from `root`.
///
/// Function nodes are processed in descending generation order, so every
/// consumer of a variable has contributed to its gradient before the
/// variable's own creator runs. Each node is fed only the gradient flowing
/// in this pass; the stored `grad` of every reached variable accumulates
/// those contributions with `+=`.
pub(crate) fn run(root: &Variable, seed: Option<NdArray>) -> Result<()> {
    let Some(creator) = root.creator() else {
        if root.is_leaf() {
            trace!(variable = root.id(), "backward on leaf is a no-op");
            return Ok(());
        }
        return Err(AutogradError::graph_state(format!(
            "backward on variable {} which has no recorded creator \
             (produced without gradient recording, or unchained)",
            root.id()
        )));
    };

    let seed = match seed {
        Some(seed) => {
            check_shape("backward seed", &root.shape(), &seed)?;
            root.accumulate_grad(&seed)?;
            seed
        }
        None => {
            let ones = root.value().ones_like();
            if root.grad().is_none() {
                root.set_grad(Some(ones.clone()));
            }
            ones
        }
    };

    // gradients flowing in this pass, keyed by variable id
    let mut flowing: HashMap<usize, NdArray> = HashMap::new();
    flowing.insert(root.id(), seed);

    let mut candidates = BinaryHeap::new();
    let mut seen = HashSet::new();
    seen.insert(creator.id);
    candidates.push(Candidate(creator));

    let mut processed = 0usize;
    while let Some(Candidate(node)) = candidates.pop() {
        let Some(output) = node.output() else {
            continue;
        };
        let Some(grad_output) = flowing.remove(&output.id()) else {
            continue;
        };
        trace!(
            function = node.name(),
            generation = node.generation,
            pending = candidates.len(),
            "backward step"
        );

        let grads = node.func.backward(&grad_output)?;
        if grads.len() != node.inputs.len() {
            return Err(AutogradError::graph_state(format!(
                "{} returned {} gradient(s) for {} input(s)",
                node.name(),
                grads.len(),
                node.inputs.len()
            )));
        }

        for (input, grad) in node.inputs.iter().zip(grads) {
            check_shape(node.name(), &input.shape(), &grad)?;
            if input.is_leaf() && !input.requires_grad() {
                continue;
            }
            input.accumulate_grad(&grad)?;
            let Some(upstream) = input.creator() else {
                continue;
            };
            match flowing.entry(input.id()) {
                Entry::Occupied(mut slot) => {
                    let sum = slot.get().add(&grad)?;
                    slot.insert(sum);
                }
                Entry::Vacant(slot) => {
                    slot.insert(grad);
                }
            }
            if seen.insert(upstream.id) {
                candidates.push(Candidate(upstream));
            }
        }
        processed += 1;
    }

    debug!(root = root.id(), functions = processed, "backward complete");
    Ok(())
}

fn check_shape(op: &'static str, expected: &dyngrad_core::Shape, grad: &NdArray) -> Result<()> {
    if expected == grad.shape() {
        Ok(())
    } else {
        Err(CoreError::ShapeMismatch {
            op,
            lhs: expected.clone(),
            rhs: grad.shape().clone(),
        }
        .into())
    }
}
