use http::StatusCode;
use std::io;
use thiserror::Error;

/// Errors raised while reassembling a request out of the byte stream.
///
/// Every non-IO variant corresponds to a framing violation and maps to a
/// client-error status via [`ParseError::status`]; IO errors are transport
/// failures and never get a response.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header section too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked framing: {reason}")]
    InvalidChunk { reason: String },

    #[error("trailer section too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeTrailer { current_size: usize, max_size: usize },

    #[error("request body exceeds the limit of {limit} bytes")]
    TooLargeBody { limit: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_trailer(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeTrailer { current_size, max_size }
    }

    pub fn too_large_body(limit: u64) -> Self {
        Self::TooLargeBody { limit }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Whether this error is a transport failure rather than a framing
    /// violation. Transport failures tear the connection down silently.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// The client-error status a best-effort response should carry.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLargeHeader { .. } | Self::TooLargeTrailer { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            Self::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_response<S: ToString>(str: S) -> Self {
        Self::InvalidResponse { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
