//! A readiness-driven micro HTTP/1.1 server core.
//!
//! This crate implements an HTTP/1.1 server directly on top of non-blocking
//! sockets and a readiness multiplexer (mio), with no worker threads and no
//! higher-level HTTP library. A single reactor thread owns every socket and
//! every piece of connection state; the hard part of the crate is correctly
//! reassembling requests out of arbitrarily fragmented byte deliveries while
//! enforcing header, body and time budgets.
//!
//! # Features
//!
//! - Single-threaded reactor over `mio::Poll`, one `Connection` state machine
//!   per accepted socket
//! - Incremental header reading with a hard cap on the raw header section
//! - Fixed-length and chunked request bodies, decoded incrementally
//! - Automatic spillover of large bodies from memory to a temp file
//! - Strict one-request-per-connection processing with `Connection: close`
//!   framing
//! - Header-phase and body/idle timeouts mapped to best-effort 408 responses
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Response;
//! use pico_http::config::ServerConfig;
//! use pico_http::handler::{make_handler, BoxError};
//! use pico_http::protocol::ReceivedBody;
//! use pico_http::server::Reactor;
//!
//! fn main() -> std::io::Result<()> {
//!     let handler = make_handler(|request: http::Request<ReceivedBody>| {
//!         let body = Bytes::from(format!("hello from {}\r\n", request.uri().path()));
//!         Ok::<_, BoxError>(Response::builder().status(200).body(body).unwrap())
//!     });
//!
//!     let mut reactor = Reactor::bind(ServerConfig::default(), handler)?;
//!     reactor.run()
//! }
//! ```
//!
//! # Architecture
//!
//! - [`server`]: the reactor owning the listeners, the connection table
//!   and the timeout sweep
//! - [`connection`]: per-connection phase machine and request assembly
//! - [`codec`]: header reader, head parser, body decoders, response framer
//! - [`protocol`]: request/response/body types and error taxonomy
//! - [`handler`]: the dispatch collaborator consuming decoded requests
//! - [`config`]: listen endpoints and per-connection limits
//!
//! # Limitations
//!
//! - HTTP/1.1 only, one request per connection (no keep-alive reuse,
//!   no pipelining)
//! - No TLS (terminate upstream)
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
