//! Errors raised while building or encoding a tree.

use crate::codec::CodecPhase;
use crate::tree::SaplingId;
use crate::types::ValueKind;

/// Errors that can occur with tree operations.
#[derive(Debug)]
pub enum TreeError {
    /// A value of one kind was written to a field declared with another.
    TypeMismatch {
        field: String,
        declared: ValueKind,
        actual: ValueKind,
    },
    /// The field is not declared and auto-declaration is disabled.
    UnknownField(String),
    /// The field name is already declared in this schema.
    DuplicateField(String),
    /// The schema no longer accepts declarations.
    SchemaFrozen(String),
    /// The handle does not belong to this tree.
    UnknownSapling(SaplingId),
    /// The sapling is not a branch of the given parent.
    NotAChild { parent: SaplingId, child: SaplingId },
    /// No branch matched a required lookup.
    BranchNotFound { key: String, value: String },
    /// A branch was never marked ready and cannot be serialized.
    BranchNotReady { parent: SaplingId, child: SaplingId },
    /// `branch_ready` was called twice for the same branch.
    BranchAlreadyReady(SaplingId),
    /// A string value exceeds the configured maximum length.
    ValueTooLong { field: String, len: usize, max: usize },
    /// Writing to the output stream failed.
    StreamWrite(std::io::Error),
    /// The encoder was used out of order.
    EncoderPhase {
        expected: CodecPhase,
        actual: CodecPhase,
    },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                field,
                declared,
                actual,
            } => write!(
                f,
                "type mismatch for field '{field}': declared {declared}, got {actual}"
            ),
            Self::UnknownField(name) => write!(f, "unknown field: '{name}'"),
            Self::DuplicateField(name) => write!(f, "duplicate field: '{name}'"),
            Self::SchemaFrozen(name) => {
                write!(f, "schema is frozen, cannot declare '{name}'")
            }
            Self::UnknownSapling(id) => write!(f, "sapling {id} does not belong to this tree"),
            Self::NotAChild { parent, child } => {
                write!(f, "sapling {child} is not a branch of {parent}")
            }
            Self::BranchNotFound { key, value } => {
                write!(f, "no branch with {key}={value}")
            }
            Self::BranchNotReady { parent, child } => {
                write!(f, "branch {child} of {parent} was never marked ready")
            }
            Self::BranchAlreadyReady(id) => write!(f, "branch {id} is already ready"),
            Self::ValueTooLong { field, len, max } => write!(
                f,
                "value for field '{field}' is {len} bytes, maximum is {max}"
            ),
            Self::StreamWrite(e) => write!(f, "stream write failed: {e}"),
            Self::EncoderPhase { expected, actual } => {
                write!(f, "encoder is {actual}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StreamWrite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TreeError {
    fn from(e: std::io::Error) -> Self {
        Self::StreamWrite(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_type_mismatch() {
        let error = TreeError::TypeMismatch {
            field: "hp".to_string(),
            declared: ValueKind::Int,
            actual: ValueKind::String,
        };
        assert_eq!(
            error.to_string(),
            "type mismatch for field 'hp': declared int, got string"
        );
    }

    #[test]
    fn test_display_not_ready() {
        let error = TreeError::BranchNotReady {
            parent: SaplingId::ROOT,
            child: SaplingId::from_index(4),
        };
        assert_eq!(error.to_string(), "branch #4 of #0 was never marked ready");
    }

    #[test]
    fn test_stream_write_has_source() {
        use std::error::Error;
        let error = TreeError::from(std::io::Error::other("disk full"));
        assert!(error.source().is_some());
        assert_eq!(error.to_string(), "stream write failed: disk full");
    }
}
