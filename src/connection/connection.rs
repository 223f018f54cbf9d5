use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use http::{Request, StatusCode};
use mio::net::TcpStream;
use mio::Interest;
use tracing::{debug, error, warn};

use crate::codec::{BodyLimits, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::{error_response, OutboundResponse, ReceivedBody};

use super::RequestReader;

const READ_BUF_SIZE: usize = 8 * 1024;

/// Lifecycle phase of a connection. Drives both the interest the reactor
/// registers and the timeout budget the supervisor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ReadingHeaders,
    ReadingBody,
    /// Transient: the handler is running. Dispatch is synchronous, so the
    /// reactor never observes this phase between events.
    Dispatching,
    WritingResponse,
    Closed,
}

/// One client connection and everything needed to serve a single request
/// on it.
///
/// The reactor owns the connection and calls in on readiness events; all
/// socket IO here is non-blocking and drains until `WouldBlock`. A
/// connection serves exactly one request, then writes the close-delimited
/// response and reaches [`Phase::Closed`].
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    reader: RequestReader,
    phase: Phase,
    outbound: BytesMut,
    last_activity: Instant,
    /// Interest currently registered with the poll, reconciled by the
    /// reactor after every event.
    registered: Option<Interest>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, max_header_bytes: usize, limits: BodyLimits) -> Self {
        Self {
            stream,
            peer,
            reader: RequestReader::new(max_header_bytes, limits),
            phase: Phase::ReadingHeaders,
            outbound: BytesMut::new(),
            last_activity: Instant::now(),
            registered: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// The readiness interest this connection wants right now. `None`
    /// means the connection is finished and should be dropped.
    pub fn interest(&self) -> Option<Interest> {
        match self.phase {
            Phase::ReadingHeaders | Phase::ReadingBody => Some(Interest::READABLE),
            Phase::Dispatching | Phase::WritingResponse => Some(Interest::WRITABLE),
            Phase::Closed => None,
        }
    }

    pub fn registered(&self) -> Option<Interest> {
        self.registered
    }

    pub fn set_registered(&mut self, interest: Option<Interest>) {
        self.registered = interest;
    }

    /// Drains the socket and advances the request state machine. Called on
    /// a readable event; reads until `WouldBlock`, a complete request, a
    /// framing violation or peer close.
    pub fn handle_readable<H: Handler>(&mut self, handler: &H) {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    debug!(peer = %self.peer, "peer closed before the request completed");
                    self.phase = Phase::Closed;
                    return;
                }
                Ok(n) => {
                    self.last_activity = Instant::now();
                    if self.advance(&buf[..n], handler) {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "read failed, tearing the connection down");
                    self.phase = Phase::Closed;
                    return;
                }
            }
        }
    }

    /// Feeds `data` to the request reader. Returns `true` once reading is
    /// over for this connection, whether a request dispatched or an error
    /// response got queued.
    fn advance<H: Handler>(&mut self, data: &[u8], handler: &H) -> bool {
        match self.reader.feed(data) {
            Ok(Some(request)) => {
                self.dispatch(request, handler);
                true
            }
            Ok(None) => {
                self.phase = if self.reader.is_reading_headers() {
                    Phase::ReadingHeaders
                } else {
                    Phase::ReadingBody
                };
                false
            }
            Err(e) if e.is_io() => {
                debug!(peer = %self.peer, error = %e, "transport error while reading the request");
                self.phase = Phase::Closed;
                true
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "malformed request");
                self.queue_error(e.status());
                true
            }
        }
    }

    /// Invokes the handler exactly once and queues its response, or a 500
    /// if the handler failed.
    fn dispatch<H: Handler>(&mut self, request: Request<ReceivedBody>, handler: &H) {
        self.phase = Phase::Dispatching;
        debug!(peer = %self.peer, method = %request.method(), uri = %request.uri(), "dispatching request");
        let response = match handler.call(request) {
            Ok(response) => response,
            Err(e) => {
                error!(peer = %self.peer, error = %e, "handler failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        self.queue_response(response);
    }

    fn queue_error(&mut self, status: StatusCode) {
        self.queue_response(error_response(status));
    }

    fn queue_response(&mut self, response: OutboundResponse) {
        if let Err(e) = ResponseEncoder.encode(response, &mut self.outbound) {
            error!(peer = %self.peer, error = %e, "failed to frame the response");
            self.phase = Phase::Closed;
            return;
        }
        self.phase = Phase::WritingResponse;
        // Most sockets are writable right away; flushing here usually
        // finishes the connection without another poll round.
        self.handle_writable();
    }

    /// Pushes queued response bytes out until `WouldBlock` or the buffer
    /// drains. A fully drained buffer closes the connection.
    pub fn handle_writable(&mut self) {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => {
                    self.phase = Phase::Closed;
                    return;
                }
                Ok(n) => {
                    self.outbound.advance(n);
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "write failed, tearing the connection down");
                    self.phase = Phase::Closed;
                    return;
                }
            }
        }
        if self.phase == Phase::WritingResponse {
            debug!(peer = %self.peer, "response fully written, closing");
            self.phase = Phase::Closed;
        }
    }

    /// Applies the timeout budget for the current phase. A connection
    /// still reading gets a best-effort 408; a stalled write is torn down
    /// silently.
    pub fn check_timeout(&mut self, now: Instant, header_budget: Duration, idle_budget: Duration) {
        let budget = match self.phase {
            Phase::ReadingHeaders => header_budget,
            Phase::ReadingBody | Phase::Dispatching | Phase::WritingResponse => idle_budget,
            Phase::Closed => return,
        };
        if now.duration_since(self.last_activity) < budget {
            return;
        }
        match self.phase {
            Phase::ReadingHeaders | Phase::ReadingBody => {
                warn!(peer = %self.peer, phase = ?self.phase, "request timed out");
                self.queue_error(StatusCode::REQUEST_TIMEOUT);
            }
            Phase::Dispatching | Phase::WritingResponse => {
                debug!(peer = %self.peer, "write stalled past the budget, closing");
                self.phase = Phase::Closed;
            }
            Phase::Closed => {}
        }
    }
}
