//! Error types for SigV4 signing.
//!
//! Every failure the signer can report is a variant of [`SigV4Error`]. On any
//! error the output buffers must be treated as holding no meaningful result.

/// Errors that can occur while generating a SigV4 authorization value or
/// converting a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SigV4Error {
    /// A required parameter is missing, empty, or out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A write would have exceeded the capacity of a fixed-size buffer.
    #[error("insufficient memory: {required} bytes required, {remaining} remaining")]
    InsufficientMemory {
        /// Bytes the failed write needed.
        required: usize,
        /// Bytes left in the buffer at that point.
        remaining: usize,
    },

    /// The date input is malformed or names an impossible calendar date.
    #[error("date is not a valid RFC 3339 or RFC 5322 timestamp")]
    IsoFormatting,

    /// The header block holds more entries than the signer supports.
    #[error("more than {max} HTTP headers")]
    MaxHeaderPairCountExceeded {
        /// The configured limit.
        max: usize,
    },

    /// The query string holds more parameters than the signer supports.
    #[error("more than {max} query parameters")]
    MaxQueryPairCountExceeded {
        /// The configured limit.
        max: usize,
    },

    /// The injected hash primitive reported a failure.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Failure reported by a [`HashFunction`](crate::crypto::HashFunction) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("hash operation failed")]
pub struct HashError;

/// Convenience result type for SigV4 operations.
pub type SigV4Result<T> = Result<T, SigV4Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_hash_error() {
        let err: SigV4Error = HashError.into();
        assert_eq!(err, SigV4Error::Hash(HashError));
        assert_eq!(err.to_string(), "hash operation failed");
    }

    #[test]
    fn test_should_describe_insufficient_memory() {
        let err = SigV4Error::InsufficientMemory {
            required: 64,
            remaining: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient memory: 64 bytes required, 10 remaining"
        );
    }
}
