//! Core protocol types shared by the codec, connection and server layers.
//!
//! - [`RequestHeader`]: the parsed request head (method, uri, version,
//!   headers) before a body is attached
//! - [`BodyMode`]: the framing selected from the request headers (none,
//!   fixed length, chunked)
//! - [`ReceivedBody`]: a fully materialized request body, either buffered in
//!   memory or spilled to a temp file
//! - [`ParseError`] / [`SendError`]: the error taxonomy; framing violations
//!   carry their client-error status via [`ParseError::status`]

mod request;
pub use request::RequestHeader;

mod body;
pub use body::BodyMode;
pub use body::ReceivedBody;

mod response;
pub use response::error_response;
pub use response::OutboundResponse;

mod error;
pub use error::ParseError;
pub use error::SendError;
