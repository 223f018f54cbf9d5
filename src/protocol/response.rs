//! Outbound response type and canned error responses.

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};

/// A response produced by the dispatch collaborator, consumed exactly once
/// by the response framer.
pub type OutboundResponse = Response<Bytes>;

/// Builds a minimal `text/plain` response for an error status.
///
/// Used for every core-generated failure (400/408/413/431/500) so clients
/// always receive a well-formed close-delimited message instead of a bare
/// socket close.
pub fn error_response(status: StatusCode) -> OutboundResponse {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = Bytes::from(format!("{} {}\r\n", status.as_u16(), reason));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
