//! Request body framing selection and materialized body storage.
//!
//! [`BodyMode`] is decided once, from the request headers: a chunked
//! transfer-encoding token selects chunked framing, otherwise the parsed
//! `Content-Length` (defaulting to zero) selects fixed-length framing.
//! `Content-Length: 0` and an absent `Content-Length` are deliberately
//! indistinguishable here: both mean the request is complete as soon as the
//! header section ends.
//!
//! [`ReceivedBody`] is the body after it has been fully received and
//! size-validated. Exactly one storage backend is live: small bodies stay in
//! memory, bodies that crossed the spill threshold live in a temp file that
//! is removed when the body is dropped.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tempfile::NamedTempFile;

/// The body framing selected from the request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body follows the header section.
    Empty,
    /// A fixed number of body bytes follows.
    Length(u64),
    /// The body is chunked-encoded.
    Chunked,
}

impl BodyMode {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked)
    }
}

/// A fully received request body.
///
/// The two variants are mutually exclusive by construction: once a body has
/// spilled to disk no in-memory copy is retained. Callers must check which
/// backend is active ([`bytes`](Self::bytes) vs
/// [`spill_path`](Self::spill_path)) before reading.
#[derive(Debug)]
pub enum ReceivedBody {
    /// Body held in memory.
    Buffered(Bytes),
    /// Body spilled to a temp file; the file is deleted on drop.
    Spilled { file: NamedTempFile, len: u64 },
}

impl ReceivedBody {
    pub fn empty() -> Self {
        Self::Buffered(Bytes::new())
    }

    /// Decoded body length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Buffered(bytes) => bytes.len() as u64,
            Self::Spilled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The in-memory bytes, if the body did not spill.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Buffered(bytes) => Some(bytes),
            Self::Spilled { .. } => None,
        }
    }

    /// The spill file path, if the body crossed the memory threshold.
    pub fn spill_path(&self) -> Option<&Path> {
        match self {
            Self::Buffered(_) => None,
            Self::Spilled { file, .. } => Some(file.path()),
        }
    }

    /// Opens an independent read handle on the spilled body file.
    pub fn open_spilled(&self) -> Option<io::Result<File>> {
        match self {
            Self::Buffered(_) => None,
            Self::Spilled { file, .. } => Some(file.reopen()),
        }
    }

    /// Reads the whole body into memory, whichever backend is active.
    ///
    /// Intended for handlers that need the full payload; large spilled
    /// bodies are better consumed through [`open_spilled`](Self::open_spilled).
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Spilled { file, len } => {
                let mut reader = file.reopen()?;
                reader.seek(SeekFrom::Start(0))?;
                let mut buf = Vec::with_capacity(len as usize);
                reader.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn buffered_body_exposes_bytes_only() {
        let body = ReceivedBody::Buffered(Bytes::from_static(b"abc"));
        assert_eq!(body.len(), 3);
        assert!(body.bytes().is_some());
        assert!(body.spill_path().is_none());
        assert_eq!(&body.into_bytes().unwrap()[..], b"abc");
    }

    #[test]
    fn spilled_body_exposes_file_only() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let body = ReceivedBody::Spilled { file, len: 10 };
        assert_eq!(body.len(), 10);
        assert!(body.bytes().is_none());
        assert!(body.spill_path().is_some());

        let path = body.spill_path().unwrap().to_path_buf();
        assert_eq!(&body.into_bytes().unwrap()[..], b"0123456789");
        // dropped with the body
        assert!(!path.exists());
    }
}
