//! Serializes an outbound response into wire bytes.
//!
//! Produces a single contiguous byte sequence: status line, headers, empty
//! line, body. The framing headers every close-delimited response needs
//! (`Date` in RFC 1123 form, `Connection: close`, `Content-Length`) are
//! injected only when the handler did not set them; explicit values are
//! never overwritten.

use std::io::{self, Write};
use std::time::SystemTime;

use bytes::{BufMut, BytesMut};
use http::{header, HeaderValue};
use httpdate::fmt_http_date;

use crate::protocol::{OutboundResponse, SendError};

/// Initial buffer headroom for the serialized head.
const INIT_HEAD_SIZE: usize = 4 * 1024;

/// Encoder turning an [`OutboundResponse`] into HTTP/1.1 wire bytes.
pub struct ResponseEncoder;

impl ResponseEncoder {
    /// Frames `response` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns `SendError` if a generated header value is not encodable,
    /// which only happens if the system clock produces an unrepresentable
    /// date string.
    pub fn encode(&mut self, response: OutboundResponse, dst: &mut BytesMut) -> Result<(), SendError> {
        let (mut head, body) = response.into_parts();

        dst.reserve(INIT_HEAD_SIZE + body.len());
        write!(
            FastWrite(dst),
            "HTTP/1.1 {} {}\r\n",
            head.status.as_str(),
            head.status.canonical_reason().unwrap_or("")
        )
        .map_err(SendError::io)?;

        if !head.headers.contains_key(header::DATE) {
            let date = fmt_http_date(SystemTime::now());
            let value = HeaderValue::from_str(&date).map_err(|e| SendError::invalid_response(e.to_string()))?;
            head.headers.insert(header::DATE, value);
        }

        if !head.headers.contains_key(header::CONNECTION) {
            head.headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        if !head.headers.contains_key(header::CONTENT_LENGTH) {
            head.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        for (name, value) in head.headers.iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&body);

        Ok(())
    }
}

/// Writer over `BytesMut` that skips the io error plumbing; space has
/// already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
