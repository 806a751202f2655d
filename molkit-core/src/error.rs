//! Structured error types for molkit.

use thiserror::Error;

/// Unified error type for all molkit operations.
#[derive(Debug, Error)]
pub enum MolkitError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed molecule text (SMILES, MOL, MOL2, PDB)
    #[error("parse error: {0}")]
    Parse(String),

    /// Violated precondition (bad arguments, out-of-range indices, length mismatch)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Input shape or file extension the format dispatcher does not handle
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Force-field selector outside the recognised keys
    #[error("invalid force field selector '{0}' (expected MMFF94 or UFF)")]
    InvalidSelector(String),

    /// A chemistry computation failed (embedding, sanitisation, minimisation)
    #[error("computation failed: {0}")]
    Computation(String),
}

impl MolkitError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        MolkitError::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }
}

/// Convenience alias used throughout molkit.
pub type Result<T> = std::result::Result<T, MolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_at_keeps_kind_and_path() {
        let err = MolkitError::io_at(
            std::path::Path::new("/tmp/missing.pdb"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        match err {
            MolkitError::Io(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::NotFound);
                assert!(inner.to_string().contains("missing.pdb"));
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn selector_message_names_the_key() {
        let msg = MolkitError::InvalidSelector("GAFF".into()).to_string();
        assert!(msg.contains("GAFF"));
    }
}
