//! Error types for revidx

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An upstream contract was violated: unsorted input, size mismatch,
    /// merge cursors that did not run dry together.
    #[error("Index corruption: {0}")]
    Corruption(String),

    #[error("Too many entries for 32-bit addressing: {0}")]
    TooManyEntries(u64),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Invariant violations indicate a bug or damaged input rather than an
    /// environmental failure. Both abort construction; the constructor logs
    /// them apart.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::TooManyEntries(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TooManyEntries(1 << 33);
        assert_eq!(
            err.to_string(),
            "Too many entries for 32-bit addressing: 8589934592"
        );

        let err = Error::Corruption("left has more to go".into());
        assert_eq!(err.to_string(), "Index corruption: left has more to go");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Corruption("x".into()).is_fatal());
        assert!(Error::TooManyEntries(0).is_fatal());
        assert!(!Error::Io(io::Error::other("disk full")).is_fatal());
        assert!(!Error::Journal("truncated".into()).is_fatal());
    }
}
