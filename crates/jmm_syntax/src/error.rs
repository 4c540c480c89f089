//! Fatal generation errors shared by lowering, allocation, and emission.
//! Any of these aborts the whole compilation unit.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// A syntax-tree node the lowering engine cannot handle in its position.
    #[error("unsupported {kind} node: {detail}")]
    UnsupportedNode { kind: String, detail: String },

    /// An IR instruction the emitter cannot translate.
    #[error("unsupported instruction: {detail}")]
    UnsupportedInstruction { detail: String },

    /// A type with no IR or descriptor mapping.
    #[error("unmapped type '{ty}'")]
    UnmappedType { ty: String },

    #[error("class {class} declares {count} constructors; at most one is allowed")]
    MultipleConstructors { class: String, count: usize },

    #[error("identifier '{name}' does not resolve inside method '{method}'")]
    UnresolvedIdentifier { name: String, method: String },

    #[error("method '{method}' needs {needed} local slots but only {limit} are allowed")]
    RegisterLimit {
        method: String,
        needed: u16,
        limit: u32,
    },

    #[error("operand stack underflow while emitting '{method}'")]
    StackUnderflow { method: String },

    /// The front end handed over a unit with error reports.
    #[error("unit rejected by semantic analysis ({errors} error(s))")]
    RejectedUnit { errors: usize },
}

impl GenerationError {
    pub fn unmapped(ty: impl ToString) -> Self {
        GenerationError::UnmappedType { ty: ty.to_string() }
    }

    pub fn unsupported_instruction(detail: impl Into<String>) -> Self {
        GenerationError::UnsupportedInstruction {
            detail: detail.into(),
        }
    }
}
