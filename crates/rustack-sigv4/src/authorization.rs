//! Layout of the `Authorization` header value.
//!
//! ```text
//! <algorithm> Credential=<access key>/<date>/<region>/<service>/aws4_request, SignedHeaders=<signed headers>, Signature=<hex signature>
//! ```
//!
//! The signer sizes the whole value up front with [`AuthorizationLayout`] and
//! writes everything but the signature before any hashing happens. The hex
//! signature is spliced in at [`AuthorizationLayout::prefix_len`] at the end.

use tracing::debug;

use crate::buffer::WorkingBuffer;
use crate::error::{SigV4Error, SigV4Result};

/// Last component of every credential scope.
pub const SCOPE_TERMINATOR: &str = "aws4_request";

const CREDENTIAL_LABEL: &str = " Credential=";
const SIGNED_HEADERS_LABEL: &str = ", SignedHeaders=";
const SIGNATURE_LABEL: &str = ", Signature=";

/// `date/region/service/aws4_request`, scoping a signing key to one day,
/// region and service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialScope<'a> {
    /// `YYYYMMDD`.
    pub date: &'a str,
    /// Region name, e.g. `us-east-1`.
    pub region: &'a str,
    /// Service name, e.g. `s3`.
    pub service: &'a str,
}

impl<'a> CredentialScope<'a> {
    /// Build a scope from its components.
    #[must_use]
    pub fn new(date: &'a str, region: &'a str, service: &'a str) -> Self {
        Self {
            date,
            region,
            service,
        }
    }

    /// Length of the scope string in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts().iter().map(|part| part.len()).sum()
    }

    /// Whether the scope string is empty. It never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append the scope string to `buf`.
    pub fn write_to(&self, buf: &mut WorkingBuffer<'_>) -> SigV4Result<()> {
        for part in self.parts() {
            buf.extend(part.as_bytes())?;
        }
        Ok(())
    }

    fn parts(&self) -> [&'a str; 7] {
        [
            self.date,
            "/",
            self.region,
            "/",
            self.service,
            "/",
            SCOPE_TERMINATOR,
        ]
    }
}

/// Exact byte layout of an `Authorization` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationLayout {
    /// Bytes before the signature, ending with `Signature=`.
    pub prefix_len: usize,
    /// Length of the hex signature: twice the digest length.
    pub signature_len: usize,
}

impl AuthorizationLayout {
    /// Compute the layout for the given components.
    ///
    /// # Examples
    ///
    /// ```
    /// use rustack_sigv4::authorization::{AuthorizationLayout, CredentialScope};
    ///
    /// let scope = CredentialScope::new("20150830", "us-east-1", "iam");
    /// let layout = AuthorizationLayout::new(
    ///     "AWS4-HMAC-SHA256",
    ///     "AKIDEXAMPLE",
    ///     &scope,
    ///     "content-type;host;x-amz-date".len(),
    ///     32,
    /// );
    /// assert_eq!(layout.prefix_len, 131);
    /// assert_eq!(layout.total_len(), 195);
    /// ```
    #[must_use]
    pub fn new(
        algorithm: &str,
        access_key_id: &str,
        scope: &CredentialScope<'_>,
        signed_headers_len: usize,
        digest_len: usize,
    ) -> Self {
        let prefix_len = algorithm.len()
            + CREDENTIAL_LABEL.len()
            + access_key_id.len()
            + 1
            + scope.len()
            + SIGNED_HEADERS_LABEL.len()
            + signed_headers_len
            + SIGNATURE_LABEL.len();
        Self {
            prefix_len,
            signature_len: digest_len * 2,
        }
    }

    /// Total length of the value.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.prefix_len + self.signature_len
    }
}

/// Write everything up to and including `Signature=` into `out`.
///
/// Fails without writing anything when `out` cannot hold the complete value,
/// signature included.
pub(crate) fn write_prefix(
    out: &mut [u8],
    layout: &AuthorizationLayout,
    algorithm: &str,
    access_key_id: &str,
    scope: &CredentialScope<'_>,
    signed_headers: &[u8],
) -> SigV4Result<()> {
    if out.len() < layout.total_len() {
        debug!(
            required = layout.total_len(),
            available = out.len(),
            "Authorization buffer too small"
        );
        return Err(SigV4Error::InsufficientMemory {
            required: layout.total_len(),
            remaining: out.len(),
        });
    }

    let mut out = WorkingBuffer::new(out);
    out.extend(algorithm.as_bytes())?;
    out.extend(CREDENTIAL_LABEL.as_bytes())?;
    out.extend(access_key_id.as_bytes())?;
    out.push(b'/')?;
    scope.write_to(&mut out)?;
    out.extend(SIGNED_HEADERS_LABEL.as_bytes())?;
    out.extend(signed_headers)?;
    out.extend(SIGNATURE_LABEL.as_bytes())?;
    debug_assert_eq!(out.len(), layout.prefix_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGORITHM: &str = "AWS4-HMAC-SHA256";

    fn scope() -> CredentialScope<'static> {
        CredentialScope::new("20130524", "us-east-1", "s3")
    }

    #[test]
    fn test_should_measure_credential_scope() {
        let scope = scope();
        assert_eq!(scope.len(), "20130524/us-east-1/s3/aws4_request".len());

        let mut storage = [0u8; 64];
        let mut buf = WorkingBuffer::new(&mut storage);
        scope.write_to(&mut buf).unwrap();
        assert_eq!(buf.written(), b"20130524/us-east-1/s3/aws4_request");
    }

    #[test]
    fn test_should_write_prefix_matching_layout() {
        let scope = scope();
        let layout = AuthorizationLayout::new(ALGORITHM, "AKID", &scope, 4, 32);
        let mut out = vec![0u8; layout.total_len()];
        write_prefix(&mut out, &layout, ALGORITHM, "AKID", &scope, b"host").unwrap();

        let expected = "AWS4-HMAC-SHA256 Credential=AKID/20130524/us-east-1/s3/aws4_request, \
                        SignedHeaders=host, Signature=";
        assert_eq!(layout.prefix_len, expected.len());
        assert_eq!(&out[..layout.prefix_len], expected.as_bytes());
        assert_eq!(layout.signature_len, 64);
    }

    #[test]
    fn test_should_reject_buffer_one_byte_short_without_writing() {
        let scope = scope();
        let layout = AuthorizationLayout::new(ALGORITHM, "AKID", &scope, 4, 32);
        let mut out = vec![0u8; layout.total_len() - 1];
        let result = write_prefix(&mut out, &layout, ALGORITHM, "AKID", &scope, b"host");
        assert_eq!(
            result,
            Err(SigV4Error::InsufficientMemory {
                required: layout.total_len(),
                remaining: layout.total_len() - 1,
            })
        );
        assert!(out.iter().all(|&b| b == 0));
    }
}
