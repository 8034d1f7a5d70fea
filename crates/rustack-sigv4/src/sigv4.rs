//! AWS Signature Version 4 request signing.
//!
//! The signer runs a fixed pipeline over a single [`WorkingBuffer`]:
//!
//! 1. Validate the parameters.
//! 2. Build the canonical request (method, URI, query, headers, payload hash).
//! 3. Size the `Authorization` value and write its prefix.
//! 4. Hash the canonical request and overwrite it with the string to sign.
//! 5. Derive the signing key after the string to sign.
//! 6. Sign the string to sign and hex-encode the result into the output.
//!
//! See <https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv.html>.

use std::fmt;
use std::ops::Range;

use tracing::debug;

use crate::authorization::{self, AuthorizationLayout, CredentialScope, SCOPE_TERMINATOR};
use crate::buffer::WorkingBuffer;
use crate::canonical::{
    RequestPart, write_canonical_headers, write_canonical_query, write_canonical_uri,
};
use crate::config::{
    HASH_MAX_BLOCK_LENGTH, HASH_MAX_DIGEST_LENGTH, PROCESSING_BUFFER_LENGTH, SigningConfig,
};
use crate::crypto::{self, HashFunction};
use crate::date::ISO_STRING_LEN;
use crate::error::{SigV4Error, SigV4Result};

/// Default signing algorithm identifier.
pub const AWS4_HMAC_SHA256: &str = "AWS4-HMAC-SHA256";

/// Header carrying the request timestamp.
pub const HTTP_X_AMZ_DATE_HEADER: &str = "x-amz-date";

/// Header carrying the session token of temporary credentials.
pub const HTTP_X_AMZ_SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";

/// Header carrying the payload hash for S3 requests.
pub const HTTP_X_AMZ_CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";

/// Header selecting the S3 storage class.
pub const HTTP_X_AMZ_STORAGE_CLASS_HEADER: &str = "x-amz-storage-class";

/// Payload hash value for requests whose body is not signed.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Payload hash value for chunked uploads signed per chunk.
pub const STREAMING_AWS4_HMAC_SHA256_PAYLOAD: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// Length of a long-term AWS access key ID.
pub const ACCESS_KEY_ID_LENGTH: usize = 20;

/// Length of a long-term AWS secret access key.
pub const SECRET_ACCESS_KEY_LENGTH: usize = 40;

const SIGNING_KEY_PREFIX: &[u8] = b"AWS4";

/// Borrowed AWS credentials.
///
/// The secret is redacted from `Debug` output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// Access key ID.
    pub access_key_id: &'a str,
    /// Secret access key.
    pub secret_access_key: &'a str,
    /// Session token for temporary credentials. Not part of the signature
    /// unless the caller also sends it as a signed header.
    pub security_token: Option<&'a str>,
    /// Expiration timestamp of temporary credentials.
    pub expiration: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    /// Long-term credentials.
    #[must_use]
    pub fn new(access_key_id: &'a str, secret_access_key: &'a str) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            security_token: None,
            expiration: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_security_token(mut self, token: &'a str) -> Self {
        self.security_token = Some(token);
        self
    }

    /// Attach an expiration timestamp.
    #[must_use]
    pub fn with_expiration(mut self, expiration: &'a str) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("security_token", &self.security_token.map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Request body as seen by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Body bytes, hashed with the signing hash.
    Bytes(&'a [u8]),
    /// A precomputed hex digest or a sentinel such as [`UNSIGNED_PAYLOAD`],
    /// used verbatim.
    Hashed(&'a str),
}

impl Default for Payload<'_> {
    fn default() -> Self {
        Self::Bytes(&[])
    }
}

/// The HTTP request to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpParameters<'a> {
    /// Method, e.g. `GET`.
    pub method: &'a str,
    /// Absolute path without the query string.
    pub path: RequestPart<'a>,
    /// Query string without the leading `?`.
    pub query: RequestPart<'a>,
    /// Header block: CRLF-separated when raw, LF-separated when canonical.
    pub headers: RequestPart<'a>,
    /// Request body.
    pub payload: Payload<'a>,
}

impl<'a> HttpParameters<'a> {
    /// A request with an empty path, query, header block and body.
    #[must_use]
    pub fn new(method: &'a str) -> Self {
        Self {
            method,
            path: RequestPart::default(),
            query: RequestPart::default(),
            headers: RequestPart::default(),
            payload: Payload::default(),
        }
    }

    /// Set the path.
    #[must_use]
    pub fn with_path(mut self, path: RequestPart<'a>) -> Self {
        self.path = path;
        self
    }

    /// Set the query string.
    #[must_use]
    pub fn with_query(mut self, query: RequestPart<'a>) -> Self {
        self.query = query;
        self
    }

    /// Set the header block.
    #[must_use]
    pub fn with_headers(mut self, headers: RequestPart<'a>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload<'a>) -> Self {
        self.payload = payload;
        self
    }
}

/// Everything needed to sign one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigV4Parameters<'a> {
    /// Signing credentials.
    pub credentials: Credentials<'a>,
    /// Request time as `YYYYMMDDThhmmssZ`. See
    /// [`convert_date_to_iso8601`](crate::date::convert_date_to_iso8601).
    pub date_iso8601: &'a str,
    /// Algorithm identifier; `None` means [`AWS4_HMAC_SHA256`].
    pub algorithm: Option<&'a str>,
    /// Region, e.g. `us-east-1`.
    pub region: &'a str,
    /// Service, e.g. `s3`.
    pub service: &'a str,
    /// The request.
    pub http: HttpParameters<'a>,
    /// URI encoding policy.
    pub config: SigningConfig<'a>,
}

impl<'a> SigV4Parameters<'a> {
    /// Parameters with the default algorithm and configuration.
    #[must_use]
    pub fn new(
        credentials: Credentials<'a>,
        date_iso8601: &'a str,
        region: &'a str,
        service: &'a str,
        http: HttpParameters<'a>,
    ) -> Self {
        Self {
            credentials,
            date_iso8601,
            algorithm: None,
            region,
            service,
            http,
            config: SigningConfig::default(),
        }
    }

    /// Override the algorithm identifier.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: &'a str) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Override the signing configuration.
    #[must_use]
    pub fn with_config(mut self, config: SigningConfig<'a>) -> Self {
        self.config = config;
        self
    }

    /// The algorithm identifier in effect.
    #[must_use]
    pub fn algorithm(&self) -> &'a str {
        self.algorithm.unwrap_or(AWS4_HMAC_SHA256)
    }
}

/// A generated `Authorization` value, borrowed from the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization<'b> {
    value: &'b str,
    signature_offset: usize,
}

impl<'b> Authorization<'b> {
    /// The complete header value.
    #[must_use]
    pub fn as_str(&self) -> &'b str {
        self.value
    }

    /// Bytes written to the output buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the value is empty. A successful signing never produces one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The hex signature at the end of the value.
    #[must_use]
    pub fn signature(&self) -> &'b str {
        self.value.get(self.signature_offset..).unwrap_or_default()
    }

    /// Location of the signature within the output buffer.
    #[must_use]
    pub fn signature_range(&self) -> Range<usize> {
        self.signature_offset..self.value.len()
    }
}

impl fmt::Display for Authorization<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value)
    }
}

impl AsRef<str> for Authorization<'_> {
    fn as_ref(&self) -> &str {
        self.value
    }
}

/// Generate the `Authorization` header value for a request.
///
/// Uses a working buffer of [`PROCESSING_BUFFER_LENGTH`] bytes on the stack.
/// The value is written to the front of `auth_buf`.
///
/// # Errors
///
/// - [`SigV4Error::InvalidParameter`] when a required parameter is empty or
///   the hash declares unsupported lengths.
/// - [`SigV4Error::InsufficientMemory`] when the working buffer or `auth_buf`
///   is too small.
/// - [`SigV4Error::MaxHeaderPairCountExceeded`] /
///   [`SigV4Error::MaxQueryPairCountExceeded`] when the request exceeds the
///   configured limits.
/// - [`SigV4Error::Hash`] when the hash primitive fails.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::canonical::RequestPart;
/// use rustack_sigv4::crypto::Sha256Hash;
/// use rustack_sigv4::sigv4::{
///     Credentials, HttpParameters, SigV4Parameters, generate_http_authorization,
/// };
///
/// let http = HttpParameters::new("GET")
///     .with_path(RequestPart::Raw("/"))
///     .with_query(RequestPart::Raw("Action=ListUsers&Version=2010-05-08"))
///     .with_headers(RequestPart::Raw(
///         "Content-Type: application/x-www-form-urlencoded; charset=utf-8\r\n\
///          Host: iam.amazonaws.com\r\n\
///          X-Amz-Date: 20150830T123600Z\r\n",
///     ));
/// let params = SigV4Parameters::new(
///     Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
///     "20150830T123600Z",
///     "us-east-1",
///     "iam",
///     http,
/// );
///
/// let mut out = [0u8; 256];
/// let auth = generate_http_authorization(&params, &mut Sha256Hash::default(), &mut out).unwrap();
/// assert_eq!(
///     auth.signature(),
///     "5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
/// );
/// ```
pub fn generate_http_authorization<'b, H>(
    params: &SigV4Parameters<'_>,
    hash: &mut H,
    auth_buf: &'b mut [u8],
) -> SigV4Result<Authorization<'b>>
where
    H: HashFunction + ?Sized,
{
    let mut working = [0u8; PROCESSING_BUFFER_LENGTH];
    generate_http_authorization_with_buffer(params, hash, &mut working, auth_buf)
}

/// Like [`generate_http_authorization`], with a caller-supplied working buffer.
///
/// The working buffer must hold the canonical request, and later the string
/// to sign followed by the signing key material.
///
/// # Errors
///
/// Same as [`generate_http_authorization`].
pub fn generate_http_authorization_with_buffer<'b, H>(
    params: &SigV4Parameters<'_>,
    hash: &mut H,
    working: &mut [u8],
    auth_buf: &'b mut [u8],
) -> SigV4Result<Authorization<'b>>
where
    H: HashFunction + ?Sized,
{
    validate_parameters(params, &*hash)?;

    let algorithm = params.algorithm();
    let digest_len = hash.digest_len();
    let scope = CredentialScope::new(
        params.date_iso8601.get(..8).unwrap_or_default(),
        params.region,
        params.service,
    );
    let mut buf = WorkingBuffer::new(working);

    let signed_headers = write_canonical_request_head(&mut buf, params)?;

    let layout = AuthorizationLayout::new(
        algorithm,
        params.credentials.access_key_id,
        &scope,
        signed_headers.len(),
        digest_len,
    );
    authorization::write_prefix(
        auth_buf,
        &layout,
        algorithm,
        params.credentials.access_key_id,
        &scope,
        buf.slice(signed_headers),
    )?;

    write_payload_hash(&mut buf, params.http.payload, hash)?;
    debug!(
        canonical_request = std::str::from_utf8(buf.written()).unwrap_or_default(),
        "Built canonical request"
    );

    let mut request_digest = [0u8; HASH_MAX_DIGEST_LENGTH];
    crypto::digest(hash, buf.written(), &mut request_digest[..digest_len])?;
    buf.truncate(0);
    write_string_to_sign(
        &mut buf,
        algorithm,
        params.date_iso8601,
        &scope,
        &request_digest[..digest_len],
    )?;
    let string_to_sign_len = buf.len();
    debug!(
        string_to_sign = std::str::from_utf8(buf.written()).unwrap_or_default(),
        "Built string to sign"
    );

    let key = derive_signing_key(&mut buf, hash, params.credentials.secret_access_key, &scope)?;

    let mut signature = [0u8; HASH_MAX_DIGEST_LENGTH];
    crypto::hmac(
        hash,
        buf.slice(key),
        buf.slice(0..string_to_sign_len),
        &mut signature[..digest_len],
    )?;

    let out = auth_buf
        .get_mut(layout.prefix_len..layout.total_len())
        .ok_or(SigV4Error::InsufficientMemory {
            required: layout.signature_len,
            remaining: 0,
        })?;
    let overflow = SigV4Error::InsufficientMemory {
        required: layout.signature_len,
        remaining: out.len(),
    };
    hex::encode_to_slice(&signature[..digest_len], out).map_err(|_| overflow)?;

    let auth_buf: &'b [u8] = auth_buf;
    let value = std::str::from_utf8(&auth_buf[..layout.total_len()])
        .map_err(|_| SigV4Error::InvalidParameter("authorization value is not valid UTF-8"))?;
    debug!(len = value.len(), "Generated authorization value");
    Ok(Authorization {
        value,
        signature_offset: layout.prefix_len,
    })
}

fn validate_parameters<H>(params: &SigV4Parameters<'_>, hash: &H) -> SigV4Result<()>
where
    H: HashFunction + ?Sized,
{
    let block_len = hash.block_len();
    let digest_len = hash.digest_len();
    let checks: [(bool, &'static str); 9] = [
        (
            !params.credentials.access_key_id.is_empty(),
            "access key ID is empty",
        ),
        (
            !params.credentials.secret_access_key.is_empty(),
            "secret access key is empty",
        ),
        (
            params.date_iso8601.len() == ISO_STRING_LEN && params.date_iso8601.is_ascii(),
            "date must be a 16-byte YYYYMMDDThhmmssZ timestamp",
        ),
        (!params.region.is_empty(), "region is empty"),
        (!params.service.is_empty(), "service is empty"),
        (!params.http.method.is_empty(), "HTTP method is empty"),
        (params.algorithm != Some(""), "algorithm is empty"),
        (
            (1..=HASH_MAX_BLOCK_LENGTH).contains(&block_len)
                && (1..=HASH_MAX_DIGEST_LENGTH).contains(&digest_len),
            "hash block or digest length is out of range",
        ),
        (
            digest_len <= block_len,
            "hash digest length exceeds its block length",
        ),
    ];

    for (ok, reason) in checks {
        if !ok {
            debug!(reason, "Rejected signing parameters");
            return Err(SigV4Error::InvalidParameter(reason));
        }
    }
    if let Payload::Hashed(value) = params.http.payload
        && value.is_empty()
    {
        debug!("Rejected empty precomputed payload hash");
        return Err(SigV4Error::InvalidParameter("precomputed payload hash is empty"));
    }
    Ok(())
}

/// Write the canonical request up to the signed headers line, returning the
/// location of the signed headers list.
fn write_canonical_request_head(
    buf: &mut WorkingBuffer<'_>,
    params: &SigV4Parameters<'_>,
) -> SigV4Result<Range<usize>> {
    buf.extend(params.http.method.as_bytes())?;
    buf.push(b'\n')?;
    write_canonical_uri(
        buf,
        params.http.path,
        params.config.double_encodes_path(params.service),
    )?;
    write_canonical_query(buf, params.http.query)?;
    let headers = write_canonical_headers(buf, params.http.headers)?;
    Ok(headers.signed_headers)
}

fn write_payload_hash<H>(
    buf: &mut WorkingBuffer<'_>,
    payload: Payload<'_>,
    hash: &mut H,
) -> SigV4Result<()>
where
    H: HashFunction + ?Sized,
{
    match payload {
        Payload::Bytes(body) => {
            let digest_len = hash.digest_len();
            let mut body_digest = [0u8; HASH_MAX_DIGEST_LENGTH];
            crypto::digest(hash, body, &mut body_digest[..digest_len])?;
            buf.extend_hex(&body_digest[..digest_len])
        }
        Payload::Hashed(value) => buf.extend(value.as_bytes()),
    }
}

fn write_string_to_sign(
    buf: &mut WorkingBuffer<'_>,
    algorithm: &str,
    date_iso8601: &str,
    scope: &CredentialScope<'_>,
    request_digest: &[u8],
) -> SigV4Result<()> {
    buf.extend(algorithm.as_bytes())?;
    buf.push(b'\n')?;
    buf.extend(date_iso8601.as_bytes())?;
    buf.push(b'\n')?;
    scope.write_to(buf)?;
    buf.push(b'\n')?;
    buf.extend_hex(request_digest)
}

/// Derive the signing key right after the current cursor and return its
/// location. Each intermediate key overwrites the previous one.
fn derive_signing_key<H>(
    buf: &mut WorkingBuffer<'_>,
    hash: &mut H,
    secret_access_key: &str,
    scope: &CredentialScope<'_>,
) -> SigV4Result<Range<usize>>
where
    H: HashFunction + ?Sized,
{
    let start = buf.len();
    let digest_len = hash.digest_len();
    let mut key = [0u8; HASH_MAX_DIGEST_LENGTH];

    buf.extend(SIGNING_KEY_PREFIX)?;
    buf.extend(secret_access_key.as_bytes())?;
    crypto::hmac(
        hash,
        buf.slice(start..buf.len()),
        scope.date.as_bytes(),
        &mut key[..digest_len],
    )?;

    for part in [scope.region, scope.service, SCOPE_TERMINATOR] {
        buf.truncate(start);
        buf.extend(&key[..digest_len])?;
        crypto::hmac(
            hash,
            buf.slice(start..start + digest_len),
            part.as_bytes(),
            &mut key[..digest_len],
        )?;
    }

    buf.truncate(start);
    buf.extend(&key[..digest_len])?;
    Ok(start..start + digest_len)
}
