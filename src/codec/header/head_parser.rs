//! Parses a delimited header section into a typed request head.
//!
//! The [`HeaderReader`](super::HeaderReader) guarantees the input ends with
//! CRLFCRLF, so parsing here is a single pass over a complete section:
//!
//! 1. Parse with `httparse`
//! 2. Record header name/value byte ranges
//! 3. Convert to a typed [`RequestHeader`] without copying header data
//! 4. Select the body framing from `Transfer-Encoding` / `Content-Length`
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Only HTTP/1.0 and HTTP/1.1 are accepted

use std::mem::MaybeUninit;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tracing::trace;

use crate::ensure;
use crate::protocol::{BodyMode, ParseError, RequestHeader};

/// Maximum number of headers allowed in a request.
const MAX_HEADER_NUM: usize = 64;

/// Parses a complete header section into a request head and its body mode.
///
/// # Errors
///
/// Returns `ParseError` if the request line or a header field is malformed,
/// the header count exceeds the limit, the HTTP version is unsupported, or
/// the body-framing headers are contradictory or unparsable.
pub fn parse_head(header_bytes: Bytes) -> Result<(RequestHeader, BodyMode), ParseError> {
    let mut req = httparse::Request::new(&mut []);
    let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] =
        [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

    let parsed = req.parse_with_uninit_headers(&header_bytes, &mut headers).map_err(|e| match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    let body_offset = match parsed {
        Status::Complete(body_offset) => body_offset,
        // The reader only hands over delimited sections, so a partial parse
        // means the bytes before the delimiter were not a valid head.
        Status::Partial => return Err(ParseError::invalid_header("truncated header section")),
    };
    trace!(body_offset, "parsed request head");

    let header_count = req.headers.len();
    ensure!(header_count <= MAX_HEADER_NUM, ParseError::too_many_headers(header_count));

    let mut header_index: [HeaderIndex; MAX_HEADER_NUM] = EMPTY_HEADER_INDEX_ARRAY;
    HeaderIndex::record(&header_bytes, req.headers, &mut header_index);

    let version = match req.version {
        Some(0) => http::Version::HTTP_10,
        Some(1) => http::Version::HTTP_11,
        v => return Err(ParseError::InvalidVersion(v)),
    };

    let mut builder = Request::builder()
        .method(req.method.ok_or(ParseError::InvalidMethod)?)
        .uri(req.path.ok_or(ParseError::InvalidUri)?)
        .version(version);

    let headers = builder.headers_mut().ok_or(ParseError::InvalidUri)?;
    headers.reserve(header_count);

    for index in &header_index[..header_count] {
        // httparse verified the name is valid ASCII
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;

        // SAFETY: httparse verified the value contains only visible ASCII
        let value = unsafe {
            HeaderValue::from_maybe_shared_unchecked(header_bytes.slice(index.value.0..index.value.1))
        };

        headers.append(name, value);
    }

    let request = builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?;
    let header = RequestHeader::from(request);
    let mode = body_mode(&header)?;

    Ok((header, mode))
}

/// Byte ranges of a header's name and value inside the original buffer.
///
/// Recording positions instead of copying keeps header conversion zero-copy.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Selects the body framing from the request headers.
///
/// A chunked transfer-encoding token selects chunked framing; otherwise the
/// parsed `Content-Length` (defaulting to zero) selects fixed-length
/// framing. `Content-Length: 0` and no `Content-Length` are equivalent.
///
/// # Errors
///
/// Returns `ParseError` if both `Transfer-Encoding` and `Content-Length`
/// are present (request-smuggling defense, RFC 9112 §6.3) or the
/// `Content-Length` value is not an unsigned integer.
fn body_mode(header: &RequestHeader) -> Result<BodyMode, ParseError> {
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(BodyMode::Empty),

        (te_value @ Some(_), None) => {
            if is_chunked(te_value) {
                Ok(BodyMode::Chunked)
            } else {
                Ok(BodyMode::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str =
                cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ASCII"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            if length == 0 {
                Ok(BodyMode::Empty)
            } else {
                Ok(BodyMode::Length(length))
            }
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
        }
    }
}

/// Whether the `Transfer-Encoding` header selects chunked framing.
///
/// Chunked must be the final encoding when present.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii() == CHUNKED;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Version};
    use indoc::indoc;

    fn head(text: &str) -> Bytes {
        Bytes::from(text.replace('\n', "\r\n"))
    }

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn from_curl() {
        let bytes = head(indoc! {"
            GET /index.html HTTP/1.1
            Host: 127.0.0.1:8080
            User-Agent: curl/7.79.1
            Accept: */*

        "});

        let (header, mode) = parse_head(bytes).unwrap();

        assert!(mode.is_empty());
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "127.0.0.1:8080");
        assert_eq!(header.headers().get(http::header::USER_AGENT).unwrap(), "curl/7.79.1");
    }

    #[test]
    fn content_length_selects_fixed_framing() {
        let bytes = head(indoc! {"
            POST /upload HTTP/1.1
            Host: h
            Content-Length: 42

        "});

        let (_, mode) = parse_head(bytes).unwrap();
        assert_eq!(mode, BodyMode::Length(42));
    }

    #[test]
    fn zero_and_absent_content_length_are_equivalent() {
        let explicit = head("POST /x HTTP/1.1\nHost: h\nContent-Length: 0\n\n");
        let absent = head("POST /x HTTP/1.1\nHost: h\n\n");

        assert_eq!(parse_head(explicit).unwrap().1, BodyMode::Empty);
        assert_eq!(parse_head(absent).unwrap().1, BodyMode::Empty);
    }

    #[test]
    fn chunked_token_selects_chunked_framing() {
        let bytes = head(indoc! {"
            POST /upload HTTP/1.1
            Host: h
            Transfer-Encoding: chunked

        "});

        let (_, mode) = parse_head(bytes).unwrap();
        assert!(mode.is_chunked());
    }

    #[test]
    fn unparsable_content_length_is_rejected() {
        let bytes = head("POST /x HTTP/1.1\nHost: h\nContent-Length: banana\n\n");
        let err = parse_head(bytes).unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn conflicting_framing_headers_are_rejected() {
        let bytes = head(indoc! {"
            POST /x HTTP/1.1
            Host: h
            Content-Length: 5
            Transfer-Encoding: chunked

        "});

        let err = parse_head(bytes).unwrap_err();
        assert!(matches!(err, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let bytes = head("GET / HTTP/1.2\nHost: h\n\n");
        let err = parse_head(bytes).unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. } | ParseError::InvalidVersion(_)));
    }
}
