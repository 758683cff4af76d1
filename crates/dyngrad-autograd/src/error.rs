use dyngrad_core::CoreError;
use thiserror::Error;

/// Errors raised while building or differentiating a computation graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutogradError {
    /// A shape or data error from the underlying array operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Backward was asked of a function or variable that lacks the state
    /// recorded by a forward pass, or a graph invariant would be broken.
    #[error("graph state error: {0}")]
    GraphState(String),

    /// A function was called with the wrong number of inputs.
    #[error("{function} expects {expected} input(s), got {got}")]
    Arity {
        function: &'static str,
        expected: usize,
        got: usize,
    },
}

impl AutogradError {
    pub(crate) fn graph_state(msg: impl Into<String>) -> Self {
        AutogradError::GraphState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyngrad_core::Shape;

    #[test]
    fn test_core_errors_convert() {
        let core = CoreError::ShapeMismatch {
            op: "add",
            lhs: Shape::new(&[2]),
            rhs: Shape::new(&[3]),
        };
        let err: AutogradError = core.clone().into();
        assert_eq!(err, AutogradError::Core(core));
        assert!(err.to_string().contains("[2]"));
    }

    #[test]
    fn test_arity_message() {
        let err = AutogradError::Arity {
            function: "Add",
            expected: 2,
            got: 1,
        };
        assert_eq!(err.to_string(), "Add expects 2 input(s), got 1");
    }
}
