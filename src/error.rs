use thiserror::Error;

/// Errors raised while building a graph or querying its derivatives.
///
/// Every variant is fatal to the call that produced it. Querying a node that
/// cannot reach the root is not an error; it yields a zero gradient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Value {value} is outside the domain of {op}")]
    Domain { op: &'static str, value: f64 },

    #[error("Cycle detected in the computation graph at node {node}")]
    CyclicGraph { node: u32 },

    #[error("Node {root} is not the seeded root of the current episode. Call `seed()` first.")]
    UnseededRoot { root: u32 },

    #[error("Shape mismatch in {op}: {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    #[error("At least one operand of {op} must be a node")]
    ConstantOperands { op: &'static str },

    #[error("The node belongs to another tape")]
    ForeignNode,

    #[error("Node {node} does not exist in this tape")]
    InvalidNode { node: u32 },

    #[error("The tape cannot hold more than 2^32 nodes")]
    TapeFull,
}

pub type Result<T> = std::result::Result<T, AdError>;
