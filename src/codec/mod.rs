//! HTTP codec: byte-level decoding of requests and encoding of responses.
//!
//! The codec never touches a socket. The reactor reads raw bytes and feeds
//! them here; the components split, decode and re-frame those bytes:
//!
//! - [`HeaderReader`]: accumulates bytes until the CRLFCRLF delimiter,
//!   bounded by the header-section cap
//! - [`parse_head`]: turns the delimited header bytes into a typed request
//!   head plus the selected [`BodyMode`](crate::protocol::BodyMode)
//! - [`ChunkedDecoder`]: incremental chunked-transfer decoding
//! - [`BodyReceiver`]: body accumulation with size limits and memory→file
//!   spillover
//! - [`ResponseEncoder`]: serializes a response into wire bytes
//!
//! All decoders follow the same shape: feed a mutable buffer, consume
//! exactly the bytes that were decoded, return `Ok(None)` when more input
//! is needed. Being fed a growing buffer repeatedly always reproduces the
//! same output prefix.

pub mod body;
pub mod header;
mod response_encoder;

pub use body::{BodyLimits, BodyReceiver, ChunkEvent, ChunkedDecoder};
pub use header::{parse_head, HeaderParts, HeaderReader};
pub use response_encoder::ResponseEncoder;
