//! Signing limits and configuration.
//!
//! The limits are compile-time constants: several working arrays inside the
//! signer are sized from them, so they bound stack usage as well as input size.
//! Anything that may legitimately vary per call lives in [`SigningConfig`].

/// Maximum number of header entries accepted in a single request.
pub const MAX_HTTP_HEADER_COUNT: usize = 100;

/// Maximum number of query parameters accepted in a single request.
pub const MAX_QUERY_PAIR_COUNT: usize = 100;

/// Largest hash block length, in bytes, a [`HashFunction`](crate::crypto::HashFunction)
/// may declare. Sized for the SHA-2 family (SHA-512 uses 128-byte blocks).
pub const HASH_MAX_BLOCK_LENGTH: usize = 128;

/// Largest digest length, in bytes, a [`HashFunction`](crate::crypto::HashFunction)
/// may declare.
pub const HASH_MAX_DIGEST_LENGTH: usize = 64;

/// Size of the working buffer used by
/// [`generate_http_authorization`](crate::sigv4::generate_http_authorization).
pub const PROCESSING_BUFFER_LENGTH: usize = 2048;

/// Capacity of the explicit index stack used by [`quick_sort`](crate::sort::quick_sort).
///
/// The sort always defers the larger partition, so at most `log2(n) + 1`
/// ranges are pending at once. Two entries per range for every bit of `usize`
/// covers any slice length.
pub const WORST_CASE_SORT_STACK_SIZE: usize = 2 * (usize::BITS as usize + 1);

/// Services whose canonical URI is encoded only once.
pub const DEFAULT_SINGLE_ENCODE_SERVICES: &[&str] = &["s3"];

/// Per-call signing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningConfig<'a> {
    /// Services whose path is URI-encoded once instead of twice.
    pub single_encode_services: &'a [&'a str],
}

impl Default for SigningConfig<'_> {
    fn default() -> Self {
        Self {
            single_encode_services: DEFAULT_SINGLE_ENCODE_SERVICES,
        }
    }
}

impl<'a> SigningConfig<'a> {
    /// Replace the list of single-encode services.
    #[must_use]
    pub fn with_single_encode_services(mut self, services: &'a [&'a str]) -> Self {
        self.single_encode_services = services;
        self
    }

    /// Whether the canonical URI for `service` is encoded twice.
    #[must_use]
    pub fn double_encodes_path(&self, service: &str) -> bool {
        !self.single_encode_services.contains(&service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_single_encode_s3_by_default() {
        let config = SigningConfig::default();
        assert!(!config.double_encodes_path("s3"));
        assert!(config.double_encodes_path("iam"));
        assert!(config.double_encodes_path("S3"));
    }

    #[test]
    fn test_should_honor_custom_single_encode_services() {
        let config = SigningConfig::default().with_single_encode_services(&["s3", "s3-outposts"]);
        assert!(!config.double_encodes_path("s3-outposts"));
        assert!(config.double_encodes_path("execute-api"));
    }

    #[test]
    fn test_should_size_sort_stack_for_any_slice() {
        assert!(WORST_CASE_SORT_STACK_SIZE >= 2 * (usize::BITS as usize));
    }
}
