//! Per-connection request handling.
//!
//! [`RequestReader`] reassembles one request out of arbitrarily fragmented
//! bytes; [`Connection`] wraps it around a non-blocking socket and tracks
//! the connection's lifecycle phase for the reactor.

mod connection;
mod request_reader;

pub use connection::{Connection, Phase};
pub use request_reader::RequestReader;
