//! Locations in MS source text.
//!
//! A [`FileId`] names one source loaded during a compilation; a [`Span`]
//! is a half-open byte range within it. Tokens carry spans, parse-tree
//! nodes derive theirs from their first and last token, and the gap
//! between two consecutive token spans recovers the original whitespace
//! and comments when code is re-emitted. Positions in the *emitted*
//! backend file are a different coordinate system entirely, owned by the
//! source map, never by `Span`.

use serde::{Deserialize, Serialize};

/// Names one source loaded during a compilation: an `.ms` file read from
/// disk, or a synthetic in-memory source (the top-level argument is
/// re-parsed as MS and gets its own id).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// Wraps a raw index. Ids are normally handed out by the source
    /// database; this exists for deserialization and tests.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index, used by the database to find the file's slot.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A half-open byte range in one source: `start` is inclusive, `end`
/// exclusive, so an empty range (the end-of-file token) has
/// `start == end`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Span {
    /// The source this range lies in.
    pub file: FileId,
    /// First byte of the range.
    pub start: u32,
    /// One past the last byte of the range.
    pub end: u32,
}

impl Span {
    /// Creates a span over `start..end` in `file`.
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// The number of bytes covered (zero for the end-of-file token).
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` when the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_measure_their_range() {
        let file = FileId::from_raw(0);
        let ident = Span::new(file, 7, 14); // "Counter" in "module Counter;"
        assert_eq!(ident.len(), 7);
        assert!(!ident.is_empty());
    }

    #[test]
    fn eof_span_is_empty() {
        let file = FileId::from_raw(0);
        let eof = Span::new(file, 15, 15);
        assert_eq!(eof.len(), 0);
        assert!(eof.is_empty());
    }

    #[test]
    fn file_ids_distinguish_sources() {
        let a = FileId::from_raw(0);
        let b = FileId::from_raw(1);
        assert_ne!(a, b);
        assert_ne!(Span::new(a, 0, 4), Span::new(b, 0, 4));
        assert_eq!(b.as_raw(), 1);
    }

    #[test]
    fn serde_roundtrip() {
        let span = Span::new(FileId::from_raw(2), 10, 20);
        let json = serde_json::to_string(&span).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(span, back);
    }
}
