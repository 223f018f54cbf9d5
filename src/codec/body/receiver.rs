//! Bounded request-body accumulation with memory→file spillover.
//!
//! A [`BodyReceiver`] consumes raw body bytes in either fixed-length or
//! chunked mode, enforcing the configured maximum body size on every write.
//! Bytes are buffered in memory until the spill threshold is crossed; at
//! that point everything written so far migrates into a freshly created
//! temp file and all subsequent writes go there. Exactly one storage
//! backend is live at any time, and a spilled body never moves back to
//! memory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::ensure;
use crate::protocol::{ParseError, ReceivedBody};

use super::chunked_decoder::{ChunkEvent, ChunkedDecoder};

/// Size and storage limits applied to a single request body.
#[derive(Debug, Clone)]
pub struct BodyLimits {
    /// Hard cap on the decoded body size.
    pub max_body_bytes: u64,
    /// Decoded size beyond which the body spills to a temp file.
    pub memory_threshold: u64,
    /// Directory spill files are created in.
    pub spill_dir: PathBuf,
}

#[derive(Debug)]
enum Framing {
    Fixed { remaining: u64 },
    Chunked { decoder: ChunkedDecoder },
}

/// Exactly one backend is live; spillover transfers ownership, it never
/// duplicates bytes.
#[derive(Debug)]
enum Storage {
    Memory(BytesMut),
    Spilled { file: NamedTempFile, written: u64 },
}

/// Accumulates one request body, enforcing limits and spillover policy.
#[derive(Debug)]
pub struct BodyReceiver {
    framing: Framing,
    storage: Storage,
    received: u64,
    done: bool,
    limits: BodyLimits,
}

impl BodyReceiver {
    /// Starts receiving a fixed-length body of `length` bytes.
    ///
    /// A declared length over the body cap is rejected here, before a
    /// single body byte is consumed. A declared length over the memory
    /// threshold opens the spill file up front instead of growing a buffer
    /// that is known to be abandoned.
    pub fn fixed_length(length: u64, limits: BodyLimits) -> Result<Self, ParseError> {
        ensure!(length <= limits.max_body_bytes, ParseError::too_large_body(limits.max_body_bytes));

        let storage = if length > limits.memory_threshold {
            Storage::Spilled { file: create_spill_file(&limits.spill_dir)?, written: 0 }
        } else {
            Storage::Memory(BytesMut::with_capacity(length as usize))
        };

        Ok(Self {
            framing: Framing::Fixed { remaining: length },
            storage,
            received: 0,
            done: length == 0,
            limits,
        })
    }

    /// Starts receiving a chunked body; the decoded size is unknown until
    /// the terminating chunk arrives.
    pub fn chunked(limits: BodyLimits) -> Self {
        Self {
            framing: Framing::Chunked { decoder: ChunkedDecoder::new() },
            storage: Storage::Memory(BytesMut::with_capacity(16 * 1024)),
            received: 0,
            done: false,
            limits,
        }
    }

    /// Consumes body bytes from `src`.
    ///
    /// In fixed-length mode, only the declared number of bytes is consumed;
    /// anything past it stays in `src`. In chunked mode, consumption stops
    /// after the terminating chunk and trailers.
    pub fn feed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        if self.done {
            return Ok(());
        }

        match self.framing {
            Framing::Fixed { .. } => self.feed_fixed(src),
            Framing::Chunked { .. } => self.feed_chunked(src),
        }
    }

    fn feed_fixed(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        let Framing::Fixed { remaining } = self.framing else {
            unreachable!("framing mode never changes")
        };

        let take = remaining.min(src.len() as u64) as usize;
        if take > 0 {
            let bytes = src.split_to(take);
            self.write(&bytes)?;
        }

        if let Framing::Fixed { remaining } = &mut self.framing {
            *remaining -= take as u64;
            if *remaining == 0 {
                self.done = true;
            }
        }
        Ok(())
    }

    fn feed_chunked(&mut self, src: &mut BytesMut) -> Result<(), ParseError> {
        loop {
            // the decoder is polled through a scoped borrow so the write
            // path can borrow self mutably in between
            let event = match &mut self.framing {
                Framing::Chunked { decoder } => decoder.decode(src)?,
                Framing::Fixed { .. } => unreachable!("framing mode never changes"),
            };

            match event {
                Some(ChunkEvent::Data(bytes)) => self.write(&bytes)?,
                Some(ChunkEvent::End) => {
                    self.done = true;
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Whether the full body has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decoded bytes received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Finishes reception and hands the materialized body over.
    ///
    /// Must only be called once [`is_done`](Self::is_done) reports true.
    pub fn finish(self) -> Result<ReceivedBody, ParseError> {
        debug_assert!(self.done, "finish called before body completion");

        match self.storage {
            Storage::Memory(buf) => Ok(ReceivedBody::Buffered(buf.freeze())),
            Storage::Spilled { mut file, written } => {
                file.flush().map_err(ParseError::io)?;
                Ok(ReceivedBody::Spilled { file, len: written })
            }
        }
    }

    /// Writes decoded bytes to the active backend, enforcing the body cap
    /// and the spillover policy.
    fn write(&mut self, data: &[u8]) -> Result<(), ParseError> {
        // reject before accepting any byte of an oversized write
        ensure!(
            self.received + data.len() as u64 <= self.limits.max_body_bytes,
            ParseError::too_large_body(self.limits.max_body_bytes)
        );

        if let Storage::Memory(buf) = &self.storage {
            if self.received + data.len() as u64 > self.limits.memory_threshold {
                let mut file = create_spill_file(&self.limits.spill_dir)?;
                file.write_all(buf).map_err(ParseError::io)?;
                debug!(spilled = buf.len(), path = %file.path().display(), "body crossed memory threshold");
                self.storage = Storage::Spilled { file, written: self.received };
            }
        }

        match &mut self.storage {
            Storage::Memory(buf) => buf.extend_from_slice(data),
            Storage::Spilled { file, written } => {
                file.write_all(data).map_err(ParseError::io)?;
                *written += data.len() as u64;
            }
        }

        self.received += data.len() as u64;
        trace!(len = data.len(), total = self.received, "received body bytes");
        Ok(())
    }
}

fn create_spill_file(dir: &Path) -> Result<NamedTempFile, ParseError> {
    fs::create_dir_all(dir).map_err(ParseError::io)?;
    tempfile::Builder::new()
        .prefix("body-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(ParseError::io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn limits(max: u64, threshold: u64) -> BodyLimits {
        BodyLimits {
            max_body_bytes: max,
            memory_threshold: threshold,
            spill_dir: std::env::temp_dir().join("pico-http-tests"),
        }
    }

    fn body_bytes(body: ReceivedBody) -> Bytes {
        body.into_bytes().unwrap()
    }

    #[test]
    fn fixed_length_round_trip() {
        let mut receiver = BodyReceiver::fixed_length(10, limits(1024, 1024)).unwrap();
        let mut src = BytesMut::from(&b"0123456789"[..]);

        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());
        assert_eq!(receiver.received(), 10);
        assert_eq!(&body_bytes(receiver.finish().unwrap())[..], b"0123456789");
    }

    #[test]
    fn done_exactly_when_length_reached() {
        let mut receiver = BodyReceiver::fixed_length(5, limits(1024, 1024)).unwrap();

        let mut src = BytesMut::from(&b"0123"[..]);
        receiver.feed(&mut src).unwrap();
        assert!(!receiver.is_done());

        let mut src = BytesMut::from(&b"4"[..]);
        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());
    }

    #[test]
    fn zero_length_is_immediately_done() {
        let receiver = BodyReceiver::fixed_length(0, limits(1024, 1024)).unwrap();
        assert!(receiver.is_done());
        assert!(body_bytes(receiver.finish().unwrap()).is_empty());
    }

    #[test]
    fn excess_bytes_are_left_in_source() {
        let mut receiver = BodyReceiver::fixed_length(4, limits(1024, 1024)).unwrap();
        let mut src = BytesMut::from(&b"bodyEXTRA"[..]);

        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());
        assert_eq!(&src[..], b"EXTRA");
    }

    #[test]
    fn declared_length_over_cap_is_rejected_up_front() {
        let err = BodyReceiver::fixed_length(20, limits(10, 1024)).unwrap_err();
        assert!(matches!(err, ParseError::TooLargeBody { limit: 10 }));
    }

    #[test]
    fn chunked_body_over_cap_is_rejected_at_the_excess_byte() {
        let mut receiver = BodyReceiver::chunked(limits(8, 1024));
        let mut src = BytesMut::from(&b"5\r\nhello\r\n5\r\nworld\r\n0\r\n\r\n"[..]);

        let err = receiver.feed(&mut src).unwrap_err();
        assert!(matches!(err, ParseError::TooLargeBody { limit: 8 }));
    }

    #[test]
    fn chunked_round_trip() {
        let mut receiver = BodyReceiver::chunked(limits(1024, 1024));
        let mut src = BytesMut::from(&b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"[..]);

        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());
        assert_eq!(receiver.received(), 9);
        assert_eq!(&body_bytes(receiver.finish().unwrap())[..], b"Wikipedia");
    }

    #[test]
    fn spillover_is_transparent() {
        let payload: Vec<u8> = (0..256u32).cycle().take(1000).map(|b| b as u8).collect();

        // reference: threshold never crossed
        let mut in_memory = BodyReceiver::fixed_length(1000, limits(4096, 4096)).unwrap();
        in_memory.feed(&mut BytesMut::from(&payload[..])).unwrap();
        let reference = body_bytes(in_memory.finish().unwrap());

        // same payload crossing the threshold mid-stream, fed in fragments
        let mut spilling = BodyReceiver::fixed_length(1000, limits(4096, 128)).unwrap();
        for chunk in payload.chunks(97) {
            let mut src = BytesMut::from(chunk);
            spilling.feed(&mut src).unwrap();
        }
        assert!(spilling.is_done());

        let body = spilling.finish().unwrap();
        assert!(body.spill_path().is_some(), "body must have spilled");
        assert_eq!(body.len(), 1000);
        assert_eq!(body_bytes(body), reference);
    }

    #[test]
    fn chunked_spillover_crosses_threshold_mid_stream() {
        let mut receiver = BodyReceiver::chunked(limits(4096, 6));
        let mut src = BytesMut::from(&b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"[..]);

        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());

        let body = receiver.finish().unwrap();
        assert!(body.spill_path().is_some());
        assert_eq!(&body_bytes(body)[..], b"Wikipedia");
    }

    #[test]
    fn large_declared_length_spills_up_front() {
        let mut receiver = BodyReceiver::fixed_length(100, limits(4096, 50)).unwrap();
        let mut src = BytesMut::from(&vec![7u8; 100][..]);

        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());

        let body = receiver.finish().unwrap();
        assert!(body.spill_path().is_some());
        assert_eq!(body.len(), 100);
    }

    #[test]
    fn no_bytes_accepted_after_done() {
        let mut receiver = BodyReceiver::fixed_length(3, limits(1024, 1024)).unwrap();
        let mut src = BytesMut::from(&b"abc"[..]);
        receiver.feed(&mut src).unwrap();
        assert!(receiver.is_done());

        let mut extra = BytesMut::from(&b"zzz"[..]);
        receiver.feed(&mut extra).unwrap();
        assert_eq!(&extra[..], b"zzz");
        assert_eq!(receiver.received(), 3);
    }
}
