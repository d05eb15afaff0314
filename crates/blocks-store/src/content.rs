//! Content representations for blocks.
//!
//! Block content is either fully resident ([`Content::Bytes`]) or produced on
//! demand by a [`ContentReader`] ([`Content::Reader`]). Both expose the same
//! two operations: open the whole stream, or open a bounded `[start, end)`
//! range. Every opened stream belongs to the caller, who must drop it on all
//! exit paths.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;

/// A readable stream over block content.
pub type ContentStream = Box<dyn Read + Send>;

/// Opens fresh streams over content that is not held in memory.
///
/// Implementors only need [`open`](ContentReader::open). The default
/// [`open_range`](ContentReader::open_range) opens a new stream, discards
/// `start` bytes, then bounds what remains, which costs O(start) reads.
/// Readers backed by seekable media should override it.
pub trait ContentReader: Send + Sync {
    /// Open a stream over the full content.
    fn open(&self) -> io::Result<ContentStream>;

    /// Open a stream over `[start, end)`.
    fn open_range(&self, start: u64, end: u64) -> io::Result<ContentStream> {
        check_range(start, end, None)?;
        let mut stream = self.open()?;
        let skipped = io::copy(&mut stream.by_ref().take(start), &mut io::sink())?;
        if skipped < start {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended after {skipped} bytes, before range start {start}"),
            ));
        }
        Ok(Box::new(stream.take(end - start)))
    }
}

impl<F> ContentReader for F
where
    F: Fn() -> io::Result<ContentStream> + Send + Sync,
{
    fn open(&self) -> io::Result<ContentStream> {
        self()
    }
}

fn check_range(start: u64, end: u64, len: Option<u64>) -> io::Result<()> {
    let out_of_bounds = len.map(|len| end > len).unwrap_or(false);
    if start > end || out_of_bounds {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid content range [{start}, {end})"),
        ));
    }
    Ok(())
}

/// Block content: resident bytes, or an on-demand reader.
#[derive(Clone)]
pub enum Content {
    /// Fully loaded in memory.
    Bytes(Bytes),
    /// Opened lazily each time it is read.
    Reader(Arc<dyn ContentReader>),
}

impl Content {
    /// Wrap a reader as lazy content.
    pub fn reader<R: ContentReader + 'static>(reader: R) -> Self {
        Self::Reader(Arc::new(reader))
    }

    /// Open a stream over the full content.
    pub fn open(&self) -> io::Result<ContentStream> {
        match self {
            Self::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Self::Reader(reader) => reader.open(),
        }
    }

    /// Open a stream over `[start, end)`.
    ///
    /// For resident bytes this is a slice of the shared buffer.
    pub fn open_range(&self, start: u64, end: u64) -> io::Result<ContentStream> {
        match self {
            Self::Bytes(bytes) => {
                check_range(start, end, Some(bytes.len() as u64))?;
                let slice = bytes.slice(start as usize..end as usize);
                Ok(Box::new(Cursor::new(slice)))
            }
            Self::Reader(reader) => reader.open_range(start, end),
        }
    }

    /// Returns `true` if the content is resident in memory.
    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// The resident bytes, if loaded.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Reader(_) => None,
        }
    }

    /// Read the full content into memory.
    pub fn read_to_bytes(&self) -> io::Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Reader(reader) => {
                let mut buf = Vec::new();
                reader.open()?.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Content::Bytes({} bytes)", bytes.len()),
            Self::Reader(_) => f.write_str("Content::Reader"),
        }
    }
}
