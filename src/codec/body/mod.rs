//! Request body decoding: chunked transfer decoding and bounded
//! accumulation with memory→file spillover.

mod chunked_decoder;
mod receiver;

pub use chunked_decoder::{ChunkEvent, ChunkedDecoder};
pub use receiver::{BodyLimits, BodyReceiver};
