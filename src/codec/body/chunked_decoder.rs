//! Incremental decoder for chunked transfer encoding.
//!
//! The decoder is a per-byte state machine: it consumes exactly the bytes
//! it has decoded and leaves everything else in the source buffer, so
//! feeding it the same growing buffer repeatedly always reproduces the same
//! prefix of decoded output, no matter how the raw stream is fragmented.
//!
//! A malformed size line, a missing CR/LF terminator or an oversized
//! trailer section is a terminal error, never a retryable "need more".

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

use ChunkedState::*;

/// Defensive cap on the trailer section after the zero-size chunk.
const MAX_TRAILER_BYTES: usize = 16 * 1024;

/// One decoding step's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    /// A slice of decoded chunk payload.
    Data(Bytes),
    /// The zero-size chunk and its trailers have been fully consumed.
    End,
}

/// Streaming chunked-transfer decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// In `Size`: the accumulated chunk size. In `Data`: bytes left in the
    /// current chunk.
    remaining: u64,
    seen_size_digit: bool,
    trailer_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

/// Pops the next byte or returns `Ok(None)`; the saved state resumes the
/// machine on the next feed.
macro_rules! next_byte {
    ($src:ident) => {{
        if $src.is_empty() {
            return Ok(None);
        }
        $src.get_u8()
    }};
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining: 0, seen_size_digit: false, trailer_bytes: 0 }
    }

    /// Decodes as much as possible from `src`.
    ///
    /// Returns `Ok(Some(ChunkEvent::Data(..)))` for each run of payload
    /// bytes, `Ok(Some(ChunkEvent::End))` once the terminating chunk and
    /// trailers are consumed, and `Ok(None)` when more input is needed.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ChunkEvent>, ParseError> {
        loop {
            match self.state {
                Size => {
                    self.state = self.read_size(next_byte!(src))?;
                }
                SizeLws => {
                    self.state = match next_byte!(src) {
                        b'\t' | b' ' => SizeLws,
                        b';' => Extension,
                        b'\r' => SizeLf,
                        _ => return Err(ParseError::invalid_chunk("invalid character after chunk size")),
                    };
                }
                Extension => {
                    // Extensions are ignored; they end at CRLF. A bare LF
                    // inside one is rejected rather than silently accepted.
                    self.state = match next_byte!(src) {
                        b'\r' => SizeLf,
                        b'\n' => return Err(ParseError::invalid_chunk("chunk extension contains bare LF")),
                        _ => Extension,
                    };
                }
                SizeLf => match next_byte!(src) {
                    b'\n' if self.remaining == 0 => {
                        trace!("last chunk read, entering trailer section");
                        self.trailer_bytes = 0;
                        self.state = EndCr;
                    }
                    b'\n' => self.state = Data,
                    _ => return Err(ParseError::invalid_chunk("chunk size line missing LF")),
                },
                Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let take = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(src.len());
                    let bytes = src.split_to(take).freeze();
                    self.remaining -= take as u64;

                    if self.remaining == 0 {
                        self.state = DataCr;
                        self.seen_size_digit = false;
                    }

                    trace!(len = bytes.len(), "read chunk payload bytes");
                    return Ok(Some(ChunkEvent::Data(bytes)));
                }
                DataCr => match next_byte!(src) {
                    b'\r' => self.state = DataLf,
                    _ => return Err(ParseError::invalid_chunk("missing CR after chunk payload")),
                },
                DataLf => match next_byte!(src) {
                    b'\n' => self.state = Size,
                    _ => return Err(ParseError::invalid_chunk("missing LF after chunk payload")),
                },
                EndCr => match self.trailer_byte(src)? {
                    Some(b'\r') => self.state = EndLf,
                    Some(_) => self.state = Trailer,
                    None => return Ok(None),
                },
                Trailer => match self.trailer_byte(src)? {
                    Some(b'\r') => self.state = TrailerLf,
                    Some(_) => {}
                    None => return Ok(None),
                },
                TrailerLf => match self.trailer_byte(src)? {
                    Some(b'\n') => self.state = EndCr,
                    Some(_) => return Err(ParseError::invalid_chunk("trailer line missing LF")),
                    None => return Ok(None),
                },
                EndLf => match self.trailer_byte(src)? {
                    Some(b'\n') => {
                        self.state = End;
                        trace!("finished reading chunked body");
                        return Ok(Some(ChunkEvent::End));
                    }
                    Some(_) => return Err(ParseError::invalid_chunk("chunked body missing final LF")),
                    None => return Ok(None),
                },
                End => return Ok(Some(ChunkEvent::End)),
            }
        }
    }

    fn read_size(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        const RADIX: u64 = 16;

        macro_rules! accumulate {
            ($digit:expr) => {{
                self.remaining = self
                    .remaining
                    .checked_mul(RADIX)
                    .and_then(|size| size.checked_add($digit as u64))
                    .ok_or_else(|| ParseError::invalid_chunk("chunk size overflows u64"))?;
                self.seen_size_digit = true;
                Ok(Size)
            }};
        }

        match byte {
            b @ b'0'..=b'9' => accumulate!(b - b'0'),
            b @ b'a'..=b'f' => accumulate!(b + 10 - b'a'),
            b @ b'A'..=b'F' => accumulate!(b + 10 - b'A'),
            b'\t' | b' ' if self.seen_size_digit => Ok(SizeLws),
            b';' if self.seen_size_digit => Ok(Extension),
            b'\r' if self.seen_size_digit => Ok(SizeLf),
            _ => Err(ParseError::invalid_chunk("invalid chunk size line")),
        }
    }

    /// Pops a trailer-section byte, enforcing the trailer cap.
    fn trailer_byte(&mut self, src: &mut BytesMut) -> Result<Option<u8>, ParseError> {
        if src.is_empty() {
            return Ok(None);
        }
        self.trailer_bytes += 1;
        ensure!(
            self.trailer_bytes <= MAX_TRAILER_BYTES,
            ParseError::too_large_trailer(self.trailer_bytes, MAX_TRAILER_BYTES)
        );
        Ok(Some(src.get_u8()))
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut ChunkedDecoder, src: &mut BytesMut) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        loop {
            match decoder.decode(src).unwrap() {
                Some(ChunkEvent::Data(bytes)) => out.extend_from_slice(&bytes),
                Some(ChunkEvent::End) => return (out, true),
                None => return (out, false),
            }
        }
    }

    #[test]
    fn basic() {
        let mut src = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let (out, done) = decode_all(&mut decoder, &mut src);
        assert!(done);
        assert_eq!(&out[..], b"1234567890abcdef");
        assert!(src.is_empty());
    }

    #[test]
    fn wikipedia_vector() {
        let mut src = BytesMut::from(&b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let (out, done) = decode_all(&mut decoder, &mut src);
        assert!(done);
        assert_eq!(&out[..], b"Wikipedia");
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn fragmentation_independent() {
        let raw = b"4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";
        let expected = b"Wikipedia in\r\n\r\nchunks.";

        // split the stream at every possible byte boundary
        for split in 0..raw.len() {
            let mut decoder = ChunkedDecoder::new();
            let mut out = Vec::new();
            let mut src = BytesMut::new();

            src.extend_from_slice(&raw[..split]);
            let (decoded, done) = decode_all(&mut decoder, &mut src);
            out.extend_from_slice(&decoded);
            assert!(!done || split == raw.len());

            src.extend_from_slice(&raw[split..]);
            let (decoded, done) = decode_all(&mut decoder, &mut src);
            out.extend_from_slice(&decoded);

            assert!(done, "split={split}");
            assert_eq!(&out[..], expected, "split={split}");
        }
    }

    #[test]
    fn size_line_extension_is_ignored() {
        let mut src = BytesMut::from(&b"5;name=value\r\nhello\r\n0\r\n\r\n"[..]);
        let (out, done) = decode_all(&mut ChunkedDecoder::new(), &mut src);
        assert!(done);
        assert_eq!(&out[..], b"hello");
    }

    #[test]
    fn trailers_are_consumed() {
        let mut src = BytesMut::from(&b"3\r\nabc\r\n0\r\nExpires: never\r\nX-Sum: 1\r\n\r\n"[..]);
        let (out, done) = decode_all(&mut ChunkedDecoder::new(), &mut src);
        assert!(done);
        assert_eq!(&out[..], b"abc");
        assert!(src.is_empty());
    }

    #[test]
    fn invalid_size_line_is_terminal() {
        let mut src = BytesMut::from(&b"zz\r\nhello\r\n"[..]);
        let err = ChunkedDecoder::new().decode(&mut src).unwrap_err();
        assert!(matches!(err, ParseError::InvalidChunk { .. }));
    }

    #[test]
    fn empty_size_line_is_terminal() {
        let mut src = BytesMut::from(&b"\r\n\r\n"[..]);
        let err = ChunkedDecoder::new().decode(&mut src).unwrap_err();
        assert!(matches!(err, ParseError::InvalidChunk { .. }));
    }

    #[test]
    fn missing_payload_terminator_is_terminal() {
        let mut src = BytesMut::from(&b"3\r\nabcXX"[..]);
        let mut decoder = ChunkedDecoder::new();

        // payload itself decodes fine
        assert_eq!(decoder.decode(&mut src).unwrap(), Some(ChunkEvent::Data(Bytes::from_static(b"abc"))));
        let err = decoder.decode(&mut src).unwrap_err();
        assert!(matches!(err, ParseError::InvalidChunk { .. }));
    }

    #[test]
    fn oversized_trailer_is_terminal() {
        let mut src = BytesMut::from(&b"0\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut src).unwrap().is_none());

        let mut err = None;
        for _ in 0..MAX_TRAILER_BYTES {
            src.extend_from_slice(b"X-Junk: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
            match decoder.decode(&mut src) {
                Ok(None) => continue,
                Ok(Some(event)) => panic!("unexpected event {event:?}"),
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }

        assert!(matches!(err, Some(ParseError::TooLargeTrailer { .. })));
    }

    #[test]
    fn end_is_sticky() {
        let mut src = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(decoder.decode(&mut src).unwrap(), Some(ChunkEvent::End));
        assert_eq!(decoder.decode(&mut src).unwrap(), Some(ChunkEvent::End));
    }
}
