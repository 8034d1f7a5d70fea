//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is written straight into a [`WorkingBuffer`]:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n
//! \n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Each writer in this module emits its line(s) including the terminating
//! newline and returns how many bytes it consumed. Header and query entries are
//! parsed into fixed-capacity arrays of borrowed spans, sorted with
//! [`quick_sort`], and encoded byte by byte so that running out of buffer is
//! reported at the exact write that would overflow.

use std::cmp::Ordering;
use std::ops::Range;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use tracing::{debug, warn};

use crate::buffer::WorkingBuffer;
use crate::config::{MAX_HTTP_HEADER_COUNT, MAX_QUERY_PAIR_COUNT};
use crate::error::{SigV4Error, SigV4Result};
use crate::sort::quick_sort;

/// Characters left as-is by URI encoding: RFC 3986 unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`). Everything else, `/` included, is
/// percent-encoded with uppercase hex digits.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// [`URI_ENCODE_SET`] with `/` preserved, for paths.
const PATH_ENCODE_SET: &AsciiSet = &URI_ENCODE_SET.remove(b'/');

/// Header entries end at CRLF in raw HTTP form.
const RAW_HEADER_SEPARATOR: &[u8] = b"\r\n";

/// Header entries end at LF once canonical.
const CANONICAL_HEADER_SEPARATOR: &[u8] = b"\n";

/// One component of the HTTP request, tagged with whether it still needs
/// canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPart<'a> {
    /// Raw request text; the signer encodes, sorts and normalizes it.
    Raw(&'a str),
    /// Already in canonical form; copied verbatim. The caller is responsible
    /// for its correctness.
    Canonical(&'a str),
}

impl<'a> RequestPart<'a> {
    /// The underlying text.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Raw(s) | Self::Canonical(s) => *s,
        }
    }

    /// Whether the text is already canonical.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }
}

impl Default for RequestPart<'_> {
    fn default() -> Self {
        Self::Raw("")
    }
}

/// Outcome of [`write_canonical_headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHeaders {
    /// Bytes written, including the signed headers line.
    pub consumed: usize,
    /// Location of the signed headers list (without its newline) in the buffer.
    pub signed_headers: Range<usize>,
}

/// A key/value pair borrowed from the request text.
#[derive(Debug, Clone, Copy, Default)]
struct KeyValue<'a> {
    key: &'a [u8],
    value: &'a [u8],
    position: usize,
}

/// URI-encode `input` into `buf`, returning the number of bytes written.
///
/// `/` is encoded only when `encode_slash` is set. With `double_encode`, the
/// encoded output is encoded a second time in place.
///
/// # Errors
///
/// [`SigV4Error::InsufficientMemory`] when the output does not fit. Double
/// encoding also needs room to stage the first pass at the end of the buffer.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::buffer::WorkingBuffer;
/// use rustack_sigv4::canonical::encode_uri;
///
/// let mut storage = [0u8; 64];
/// let mut buf = WorkingBuffer::new(&mut storage);
/// encode_uri(&mut buf, b"/my file", false, true).unwrap();
/// assert_eq!(buf.written(), b"/my%2520file");
/// ```
pub fn encode_uri(
    buf: &mut WorkingBuffer<'_>,
    input: &[u8],
    encode_slash: bool,
    double_encode: bool,
) -> SigV4Result<usize> {
    let start = buf.len();
    write_encoded(buf, input, encode_slash)?;
    if double_encode {
        buf.reencode_tail(start, |window, staged| {
            write_encoded(window, staged, encode_slash)
        })?;
    }
    Ok(buf.len() - start)
}

/// Write the canonical URI line.
///
/// An empty path becomes `/`. Raw paths are encoded with `/` preserved, twice
/// when `double_encode` is set.
///
/// # Errors
///
/// [`SigV4Error::InsufficientMemory`] when the line does not fit.
pub fn write_canonical_uri(
    buf: &mut WorkingBuffer<'_>,
    path: RequestPart<'_>,
    double_encode: bool,
) -> SigV4Result<usize> {
    let start = buf.len();
    match path {
        _ if path.as_str().is_empty() => buf.push(b'/')?,
        RequestPart::Canonical(path) => buf.extend(path.as_bytes())?,
        RequestPart::Raw(path) => {
            encode_uri(buf, path.as_bytes(), false, double_encode)?;
        }
    }
    buf.push(b'\n')?;
    Ok(buf.len() - start)
}

/// Write the canonical query string line.
///
/// Raw queries are split on `&` into `field=value` pairs (a missing `=` means
/// an empty value), sorted by field and then value, and re-joined with every
/// field and value URI-encoded, `/` and `=` included.
///
/// # Errors
///
/// [`SigV4Error::MaxQueryPairCountExceeded`] when the query holds more than
/// [`MAX_QUERY_PAIR_COUNT`] parameters, [`SigV4Error::InsufficientMemory`]
/// when the line does not fit.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::buffer::WorkingBuffer;
/// use rustack_sigv4::canonical::{RequestPart, write_canonical_query};
///
/// let mut storage = [0u8; 64];
/// let mut buf = WorkingBuffer::new(&mut storage);
/// write_canonical_query(&mut buf, RequestPart::Raw("b=2&a=1&a=2")).unwrap();
/// assert_eq!(buf.written(), b"a=1&a=2&b=2\n");
/// ```
pub fn write_canonical_query(
    buf: &mut WorkingBuffer<'_>,
    query: RequestPart<'_>,
) -> SigV4Result<usize> {
    let start = buf.len();
    match query {
        RequestPart::Canonical(query) => buf.extend(query.as_bytes())?,
        RequestPart::Raw(query) => {
            let mut pairs = [KeyValue::default(); MAX_QUERY_PAIR_COUNT];
            let count = parse_query(query.as_bytes(), &mut pairs)?;
            let pairs = &mut pairs[..count];
            quick_sort(pairs, compare_query_pairs);

            for (index, pair) in pairs.iter().enumerate() {
                if index > 0 {
                    buf.push(b'&')?;
                }
                encode_uri(buf, pair.key, true, false)?;
                buf.push(b'=')?;
                encode_uri(buf, pair.value, true, false)?;
            }
            debug!(count, "Canonicalized query parameters");
        }
    }
    buf.push(b'\n')?;
    Ok(buf.len() - start)
}

/// Write the canonical headers block, the blank line after it, and the signed
/// headers line.
///
/// Raw headers are `key: value` entries separated by CRLF. Keys are
/// lowercased; keys and values are trimmed and inner whitespace runs collapse
/// to one space. Entries are sorted by key, and repeated keys are merged into
/// one line with their values comma-joined in request order.
///
/// Canonical headers are `key:value` entries separated by LF; they are copied
/// verbatim and only their keys are read to build the signed headers list.
///
/// # Errors
///
/// [`SigV4Error::MaxHeaderPairCountExceeded`] when the block holds more than
/// [`MAX_HTTP_HEADER_COUNT`] entries, [`SigV4Error::InsufficientMemory`] when
/// the output does not fit.
///
/// # Examples
///
/// ```
/// use rustack_sigv4::buffer::WorkingBuffer;
/// use rustack_sigv4::canonical::{RequestPart, write_canonical_headers};
///
/// let mut storage = [0u8; 128];
/// let mut buf = WorkingBuffer::new(&mut storage);
/// let headers = RequestPart::Raw("X-Amz-Date: 20150830T123600Z\r\nHost:  iam.amazonaws.com\r\n");
/// let result = write_canonical_headers(&mut buf, headers).unwrap();
/// assert_eq!(
///     buf.written(),
///     b"host:iam.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\n"
/// );
/// assert_eq!(buf.slice(result.signed_headers), b"host;x-amz-date");
/// ```
pub fn write_canonical_headers(
    buf: &mut WorkingBuffer<'_>,
    headers: RequestPart<'_>,
) -> SigV4Result<CanonicalHeaders> {
    let start = buf.len();
    let mut entries = [KeyValue::default(); MAX_HTTP_HEADER_COUNT];

    let signed_headers = match headers {
        RequestPart::Raw(headers) => {
            let count = parse_headers(headers.as_bytes(), RAW_HEADER_SEPARATOR, &mut entries)?;
            let entries = &mut entries[..count];
            quick_sort(entries, compare_header_entries);
            write_sorted_headers(buf, entries)?
        }
        RequestPart::Canonical(headers) => {
            let count =
                parse_headers(headers.as_bytes(), CANONICAL_HEADER_SEPARATOR, &mut entries)?;
            write_verbatim_headers(buf, headers.as_bytes(), &entries[..count])?
        }
    };

    Ok(CanonicalHeaders {
        consumed: buf.len() - start,
        signed_headers,
    })
}

fn write_encoded(
    buf: &mut WorkingBuffer<'_>,
    input: &[u8],
    encode_slash: bool,
) -> SigV4Result<()> {
    let set = if encode_slash {
        URI_ENCODE_SET
    } else {
        PATH_ENCODE_SET
    };
    for chunk in percent_encode(input, set) {
        buf.extend(chunk.as_bytes())?;
    }
    Ok(())
}

fn parse_query<'a>(query: &'a [u8], pairs: &mut [KeyValue<'a>]) -> SigV4Result<usize> {
    let mut count = 0;
    for param in query
        .split(|&b| b == b'&')
        .filter(|param| !param.is_empty())
    {
        let slot = pairs.get_mut(count).ok_or_else(|| {
            warn!(max = MAX_QUERY_PAIR_COUNT, "Query parameter limit exceeded");
            SigV4Error::MaxQueryPairCountExceeded {
                max: MAX_QUERY_PAIR_COUNT,
            }
        })?;
        let (key, value) = match param.iter().position(|&b| b == b'=') {
            Some(eq) => (&param[..eq], &param[eq + 1..]),
            None => (param, &param[param.len()..]),
        };
        *slot = KeyValue {
            key,
            value,
            position: count,
        };
        count += 1;
    }
    Ok(count)
}

/// Field first, then value. Slice ordering falls back to length, so two pairs
/// only compare equal when they are byte-identical.
fn compare_query_pairs(a: &KeyValue<'_>, b: &KeyValue<'_>) -> Ordering {
    a.key.cmp(b.key).then_with(|| a.value.cmp(b.value))
}

fn parse_headers<'a>(
    headers: &'a [u8],
    separator: &[u8],
    entries: &mut [KeyValue<'a>],
) -> SigV4Result<usize> {
    let mut count = 0;
    let mut rest = headers;

    while !rest.is_empty() {
        let line = match rest.windows(separator.len()).position(|w| w == separator) {
            Some(end) => {
                let line = &rest[..end];
                rest = &rest[end + separator.len()..];
                line
            }
            None => std::mem::take(&mut rest),
        };

        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let (key, value) = match line.iter().position(|&b| b == b':') {
            Some(colon) => (&line[..colon], &line[colon + 1..]),
            None => (line, &line[line.len()..]),
        };
        let key = key.trim_ascii();
        if key.is_empty() {
            debug!("Skipping header line without a name");
            continue;
        }

        let slot = entries.get_mut(count).ok_or_else(|| {
            warn!(max = MAX_HTTP_HEADER_COUNT, "Header limit exceeded");
            SigV4Error::MaxHeaderPairCountExceeded {
                max: MAX_HTTP_HEADER_COUNT,
            }
        })?;
        *slot = KeyValue {
            key,
            value: value.trim_ascii(),
            position: count,
        };
        count += 1;
    }

    Ok(count)
}

/// Normalized key order, then request order.
fn compare_header_entries(a: &KeyValue<'_>, b: &KeyValue<'_>) -> Ordering {
    normalized(a.key, true)
        .cmp(normalized(b.key, true))
        .then_with(|| a.position.cmp(&b.position))
}

fn same_key(a: &[u8], b: &[u8]) -> bool {
    normalized(a, true).eq(normalized(b, true))
}

/// Collapse whitespace runs to a single space, lowercasing when asked. Input
/// is already trimmed.
fn normalized(bytes: &[u8], lowercase: bool) -> impl Iterator<Item = u8> + '_ {
    let mut previous_space = false;
    bytes.iter().filter_map(move |&b| {
        if b.is_ascii_whitespace() {
            let first = !previous_space;
            previous_space = true;
            first.then_some(b' ')
        } else {
            previous_space = false;
            Some(if lowercase { b.to_ascii_lowercase() } else { b })
        }
    })
}

fn write_normalized(
    buf: &mut WorkingBuffer<'_>,
    bytes: &[u8],
    lowercase: bool,
) -> SigV4Result<()> {
    for b in normalized(bytes, lowercase) {
        buf.push(b)?;
    }
    Ok(())
}

/// End (exclusive) of the run of entries sharing the key at `start`.
fn group_end(entries: &[KeyValue<'_>], start: usize) -> usize {
    let key = entries[start].key;
    entries[start..]
        .iter()
        .position(|entry| !same_key(entry.key, key))
        .map_or(entries.len(), |offset| start + offset)
}

fn write_sorted_headers(
    buf: &mut WorkingBuffer<'_>,
    entries: &[KeyValue<'_>],
) -> SigV4Result<Range<usize>> {
    let mut index = 0;
    while index < entries.len() {
        let end = group_end(entries, index);
        write_normalized(buf, entries[index].key, true)?;
        buf.push(b':')?;
        for (offset, entry) in entries[index..end].iter().enumerate() {
            if offset > 0 {
                buf.push(b',')?;
            }
            write_normalized(buf, entry.value, false)?;
        }
        buf.push(b'\n')?;
        index = end;
    }
    buf.push(b'\n')?;

    let signed_start = buf.len();
    let mut index = 0;
    while index < entries.len() {
        if index > 0 {
            buf.push(b';')?;
        }
        write_normalized(buf, entries[index].key, true)?;
        index = group_end(entries, index);
    }
    let signed_end = buf.len();
    buf.push(b'\n')?;

    debug!(count = entries.len(), "Canonicalized headers");
    Ok(signed_start..signed_end)
}

fn write_verbatim_headers(
    buf: &mut WorkingBuffer<'_>,
    headers: &[u8],
    entries: &[KeyValue<'_>],
) -> SigV4Result<Range<usize>> {
    buf.extend(headers)?;
    if !headers.is_empty() && !headers.ends_with(b"\n") {
        buf.push(b'\n')?;
    }
    buf.push(b'\n')?;

    let signed_start = buf.len();
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            buf.push(b';')?;
        }
        buf.extend(entry.key)?;
    }
    let signed_end = buf.len();
    buf.push(b'\n')?;
    Ok(signed_start..signed_end)
}
