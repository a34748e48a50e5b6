//! Error taxonomy of the BDD manager.
//!
//! Every fallible public operation returns [`Result<T>`]. Usage errors (bad
//! variable, bad varset, malformed input) are reported to the caller and leave
//! the manager untouched; resource exhaustion ([`BddError::NodeLimit`]) aborts
//! the running operation but keeps the manager usable.

use std::fmt::{Display, Formatter};

use crate::reference::Ref;

pub type Result<T> = std::result::Result<T, BddError>;

#[derive(Debug)]
pub enum BddError {
    /// Variable index is not below the current number of variables.
    UnknownVar { var: u32, var_num: u32 },
    /// Argument is out of the allowed range.
    Range(String),
    /// Two sequences that must have equal length do not.
    VarNum { expected: usize, actual: usize },
    /// The number of variables can only grow.
    DecreaseVarNum { current: u32, requested: u32 },
    /// Replacement would put a variable at a level already used by the result.
    Replace { level: u32 },
    /// Argument is not a valid variable set.
    VarSet,
    /// Illegal variable block (overlap, non-contiguous, or blocks forbid the operation).
    VarBlock(String),
    /// Unknown binary operator id.
    UnknownOperator(u32),
    /// Malformed persisted input.
    Format(String),
    /// Illegal size (cache or table).
    Size(String),
    /// Illegal variable order, or an ordering invariant is broken.
    Order(String),
    /// Illegal node table setting, or a structural invariant is broken.
    Nodes(String),
    /// The node table cannot grow any further.
    NodeLimit,
    /// Handle is stale, out of range, or points at a free slot.
    InvalidNode(Ref),
    /// Reference count decrement on an unreferenced node.
    RefUnderflow(Ref),
    Io(std::io::Error),
}

impl Display for BddError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BddError::UnknownVar { var, var_num } => {
                write!(f, "unknown variable x{} (only {} variables declared)", var, var_num)
            }
            BddError::Range(msg) => write!(f, "argument out of range: {}", msg),
            BddError::VarNum { expected, actual } => {
                write!(f, "size mismatch: expected {}, got {}", expected, actual)
            }
            BddError::DecreaseVarNum { current, requested } => write!(
                f,
                "cannot decrease the number of variables from {} to {}",
                current, requested
            ),
            BddError::Replace { level } => {
                write!(f, "replacement collides at level {}", level)
            }
            BddError::VarSet => write!(f, "illegal variable set"),
            BddError::VarBlock(msg) => write!(f, "illegal variable block: {}", msg),
            BddError::UnknownOperator(op) => write!(f, "unknown operator id {}", op),
            BddError::Format(msg) => write!(f, "malformed input: {}", msg),
            BddError::Size(msg) => write!(f, "illegal size: {}", msg),
            BddError::Order(msg) => write!(f, "bad variable order: {}", msg),
            BddError::Nodes(msg) => write!(f, "node table error: {}", msg),
            BddError::NodeLimit => write!(f, "node table limit reached"),
            BddError::InvalidNode(r) => write!(f, "invalid node handle {}", r),
            BddError::RefUnderflow(r) => write!(f, "reference count underflow on {}", r),
            BddError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for BddError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BddError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BddError {
    fn from(e: std::io::Error) -> Self {
        BddError::Io(e)
    }
}
