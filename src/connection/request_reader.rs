use std::mem;

use bytes::BytesMut;
use http::Request;

use crate::codec::{parse_head, BodyLimits, BodyReceiver, HeaderReader};
use crate::protocol::{BodyMode, ParseError, ReceivedBody, RequestHeader};

/// Reassembles exactly one request out of a connection's byte stream.
///
/// Socket-free by construction: the caller feeds whatever slices the
/// transport produced and gets the complete request back once the final
/// body byte arrived. The reassembled request is identical no matter how
/// the stream was fragmented.
#[derive(Debug)]
pub struct RequestReader {
    state: State,
    limits: BodyLimits,
}

#[derive(Debug)]
enum State {
    /// Accumulating the header section.
    Headers(HeaderReader),
    /// Header parsed, receiving the body.
    Body {
        head: RequestHeader,
        receiver: BodyReceiver,
        buf: BytesMut,
    },
    /// Request fully reassembled. Further bytes are ignored.
    Done,
}

impl RequestReader {
    pub fn new(max_header_bytes: usize, limits: BodyLimits) -> Self {
        Self { state: State::Headers(HeaderReader::new(max_header_bytes)), limits }
    }

    /// Feeds freshly read bytes in. Returns the complete request once the
    /// body is fully received, `None` while more bytes are needed.
    ///
    /// # Errors
    ///
    /// Propagates any framing violation from header parsing or body
    /// decoding. Once an error is returned the reader must be discarded.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Request<ReceivedBody>>, ParseError> {
        match &mut self.state {
            State::Headers(reader) => {
                let Some(parts) = reader.feed(data)? else {
                    return Ok(None);
                };
                let (head, mode) = parse_head(parts.header_bytes)?;
                let receiver = match mode {
                    BodyMode::Empty => BodyReceiver::fixed_length(0, self.limits.clone())?,
                    BodyMode::Length(length) => BodyReceiver::fixed_length(length, self.limits.clone())?,
                    BodyMode::Chunked => BodyReceiver::chunked(self.limits.clone()),
                };
                self.state = State::Body { head, receiver, buf: parts.body_prefix };
                self.drive_body()
            }

            State::Body { buf, .. } => {
                buf.extend_from_slice(data);
                self.drive_body()
            }

            State::Done => Ok(None),
        }
    }

    /// Whether the header section is still being accumulated. Selects the
    /// timeout budget the supervisor applies to this connection.
    pub fn is_reading_headers(&self) -> bool {
        matches!(self.state, State::Headers(_))
    }

    fn drive_body(&mut self) -> Result<Option<Request<ReceivedBody>>, ParseError> {
        {
            let State::Body { receiver, buf, .. } = &mut self.state else {
                return Ok(None);
            };
            receiver.feed(buf)?;
            if !receiver.is_done() {
                return Ok(None);
            }
        }

        match mem::replace(&mut self.state, State::Done) {
            State::Body { head, receiver, .. } => {
                let body = receiver.finish()?;
                Ok(Some(head.body(body)))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }
}
