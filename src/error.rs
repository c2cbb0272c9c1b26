//! Unified error hierarchy for vectridx.
//!
//! Every public operation fails with exactly one [`IndexError`] variant.
//! The set is closed: hosts can match exhaustively and map each variant to
//! a stable error code.
//!
//! # Recovery contract
//!
//! After `Buffer`, `Dimension`, `Duplicate`, `KeyMissing`, `Path`, `Config`
//! or `Busy` the index is unchanged and fully usable. After `Allocation`
//! during a reserve the index is unchanged. After `Format` or `Corrupted`
//! while loading into an existing index, the receiving index must be
//! destroyed. `Internal` means an invariant was violated; destroy and
//! rebuild.

use thiserror::Error;

/// The unified vectridx error type.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Input buffer is missing, misaligned, or has the wrong element size.
    #[error("buffer error: {0}")]
    Buffer(String),

    /// Vector element count does not match the configured dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension {
        /// Dimensions the index was constructed with.
        expected: usize,
        /// Element count actually provided.
        actual: usize,
    },

    /// Key already holds a live vector (use `update` to replace it).
    #[error("duplicate key: {key}")]
    Duplicate {
        /// The offending external key.
        key: i64,
    },

    /// Key has no live vector.
    #[error("key not found: {key}")]
    KeyMissing {
        /// The absent external key.
        key: i64,
    },

    /// Invalid construction argument.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A conflicting background operation is in progress.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// The index has been destroyed.
    #[error("index has been deleted")]
    DeletedState,

    /// Path rejected by sanitization.
    #[error("invalid path: {0}")]
    Path(String),

    /// On-disk magic, version, or size check failed.
    #[error("format error: {0}")]
    Format(String),

    /// Checksum verification failed.
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// Underlying file-system failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory request denied by the host.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Internal invariant violation. Treat as a defect.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Stable machine-readable code for host-side dispatch.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Dimension { .. } => "dimension",
            Self::Duplicate { .. } => "duplicate",
            Self::KeyMissing { .. } => "key-missing",
            Self::Config(_) => "config",
            Self::Busy(_) => "busy",
            Self::DeletedState => "deleted-state",
            Self::Path(_) => "path",
            Self::Format(_) => "format",
            Self::Corrupted(_) => "corrupted",
            Self::Io(_) => "io",
            Self::Allocation(_) => "allocation",
            Self::Internal(_) => "internal",
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(IndexError::DeletedState.code(), "deleted-state");
        assert_eq!(
            IndexError::Dimension {
                expected: 4,
                actual: 3
            }
            .code(),
            "dimension"
        );
        assert_eq!(IndexError::Duplicate { key: 7 }.code(), "duplicate");
    }

    #[test]
    fn messages_carry_context() {
        let err = IndexError::Dimension {
            expected: 128,
            actual: 64,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 64");
    }
}
