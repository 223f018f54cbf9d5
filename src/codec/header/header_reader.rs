//! Incremental reader for the raw request header section.
//!
//! Accumulates bytes until the 4-byte CRLFCRLF delimiter is found or the
//! header-section cap is exceeded. The reader bounds the raw section, not
//! individual lines: a slow or hostile client trickling header bytes can
//! never grow the buffer past `max_header_bytes + 4`.
//!
//! The delimiter search carries a cursor across feeds, so a byte range that
//! was already scanned is never rescanned and fragmented delivery cannot
//! degenerate into quadratic work.

use bytes::{Bytes, BytesMut};

use crate::ensure;
use crate::protocol::ParseError;

const DELIMITER: &[u8] = b"\r\n\r\n";

/// The split result of a completed header section.
#[derive(Debug)]
pub struct HeaderParts {
    /// The raw header section, including the trailing CRLFCRLF.
    pub header_bytes: Bytes,
    /// Body bytes that arrived in the same reads as the header section.
    pub body_prefix: BytesMut,
}

/// Accumulates raw bytes until the header/body delimiter is found.
///
/// Once complete, further feeds are no-ops; raw bytes from then on belong to
/// the body phase and bypass this reader entirely.
#[derive(Debug)]
pub struct HeaderReader {
    buf: BytesMut,
    /// Offsets below this are ruled out as delimiter starts.
    scan_pos: usize,
    max_header_bytes: usize,
    complete: bool,
}

impl HeaderReader {
    pub fn new(max_header_bytes: usize) -> Self {
        Self { buf: BytesMut::with_capacity(1024), scan_pos: 0, max_header_bytes, complete: false }
    }

    /// Feeds raw bytes from the socket.
    ///
    /// Returns `Ok(Some(parts))` when the delimiter has been found,
    /// `Ok(None)` when more bytes are needed, and an error once the section
    /// cap is exceeded without a delimiter.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<HeaderParts>, ParseError> {
        if self.complete {
            return Ok(None);
        }

        // The buffer never grows past the cap; bytes beyond it can only be
        // body bytes of an already-delimited request.
        let cap = self.max_header_bytes + DELIMITER.len();
        let take = data.len().min(cap - self.buf.len());
        self.buf.extend_from_slice(&data[..take]);
        let extra = &data[take..];

        match self.find_delimiter() {
            Some(end) => {
                let body_start = end + DELIMITER.len();
                let header_bytes = self.buf.split_to(body_start).freeze();

                let mut body_prefix = self.buf.split();
                body_prefix.extend_from_slice(extra);

                self.complete = true;
                Ok(Some(HeaderParts { header_bytes, body_prefix }))
            }
            None => {
                ensure!(
                    self.buf.len() < cap,
                    ParseError::too_large_header(self.buf.len(), self.max_header_bytes)
                );
                Ok(None)
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Scans forward from the carried cursor, then parks the cursor three
    /// bytes before the end so a delimiter split across feeds is still seen.
    fn find_delimiter(&mut self) -> Option<usize> {
        let found = self.buf[self.scan_pos..]
            .windows(DELIMITER.len())
            .position(|window| window == DELIMITER)
            .map(|pos| self.scan_pos + pos);

        if found.is_none() {
            self.scan_pos = self.buf.len().saturating_sub(DELIMITER.len() - 1);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nAccept: */*\r\n\r\n";

    #[test]
    fn single_feed_completes() {
        let mut reader = HeaderReader::new(16 * 1024);
        let parts = reader.feed(REQUEST).unwrap().unwrap();

        assert_eq!(&parts.header_bytes[..], REQUEST);
        assert!(parts.body_prefix.is_empty());
        assert!(reader.is_complete());
    }

    #[test]
    fn body_bytes_in_same_read_are_split_off() {
        let mut reader = HeaderReader::new(16 * 1024);
        let mut data = REQUEST.to_vec();
        data.extend_from_slice(b"body-bytes");

        let parts = reader.feed(&data).unwrap().unwrap();
        assert_eq!(&parts.header_bytes[..], REQUEST);
        assert_eq!(&parts.body_prefix[..], b"body-bytes");
    }

    #[test]
    fn fragmentation_independent() {
        // one fragment per feed, at every possible split granularity
        for fragment_len in 1..REQUEST.len() {
            let mut reader = HeaderReader::new(16 * 1024);
            let mut result = None;

            for chunk in REQUEST.chunks(fragment_len) {
                if let Some(parts) = reader.feed(chunk).unwrap() {
                    result = Some(parts);
                }
            }

            let parts = result.expect("header must complete");
            assert_eq!(&parts.header_bytes[..], REQUEST, "fragment_len={fragment_len}");
            assert!(parts.body_prefix.is_empty());
        }
    }

    #[test]
    fn delimiter_split_across_feeds() {
        let mut reader = HeaderReader::new(16 * 1024);
        assert!(reader.feed(b"GET / HTTP/1.1\r\nHost: h\r").unwrap().is_none());
        assert!(reader.feed(b"\n\r").unwrap().is_none());
        let parts = reader.feed(b"\nrest").unwrap().unwrap();

        assert_eq!(&parts.header_bytes[..], b"GET / HTTP/1.1\r\nHost: h\r\n\r\n");
        assert_eq!(&parts.body_prefix[..], b"rest");
    }

    #[test]
    fn over_cap_without_delimiter_is_too_large() {
        let mut reader = HeaderReader::new(64);
        let mut fed = 0;
        loop {
            match reader.feed(b"X-Filler: aaaaaaaaaaaaaaaa\r\n") {
                Ok(None) => fed += 1,
                Ok(Some(_)) => panic!("must not complete"),
                Err(err) => {
                    assert!(matches!(err, ParseError::TooLargeHeader { .. }));
                    break;
                }
            }
            assert!(fed < 100, "cap never enforced");
        }
    }

    #[test]
    fn header_of_exactly_max_size_is_accepted() {
        // pad the section so that header + CRLFCRLF is exactly max + 4
        let max = 64;
        let mut request = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        while request.len() < max - 4 {
            request.push(b'a');
        }
        request.extend_from_slice(b"\r\n\r\n");
        assert_eq!(request.len(), max);

        let mut reader = HeaderReader::new(max);
        assert!(reader.feed(&request).unwrap().is_some());
    }

    #[test]
    fn feeds_after_completion_are_no_ops() {
        let mut reader = HeaderReader::new(16 * 1024);
        assert!(reader.feed(REQUEST).unwrap().is_some());
        assert!(reader.feed(b"more").unwrap().is_none());
        assert!(reader.is_complete());
    }
}
