//! Incremental patch construction over a base document.
//!
//! Every preview, every disk commit and every post-commit refresh funnels
//! through [`PatchBuilder`]: the base bytes are read strictly forward, each
//! accepted [`MatchRecord`] splices its replacement in, and the untouched
//! regions are copied verbatim.

use serde::{Deserialize, Serialize};

/// Half-open byte offsets `[start, end)` into a document's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One proposed substitution: replace `range` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub range: ByteRange,
    pub replacement: String,
}

impl MatchRecord {
    pub fn new(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            range: ByteRange::new(start, end),
            replacement: replacement.into(),
        }
    }
}

/// What the builder did with a received record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Verbatim prefix and replacement were written.
    Applied,
    /// `start` lies before the source cursor: the region is already consumed.
    Overlapping,
    /// The range is inverted or runs past the end of the base document.
    OutOfBounds,
}

/// Rebuilds a document from its base bytes and a stream of match records.
///
/// Records must arrive in non-decreasing `start` order. Anything starting
/// before the source cursor is skipped, which also drops overlapping matches.
/// The output buffer starts at the base length and doubles when a write
/// would overflow it; `len` tracks how much of it is written.
#[derive(Debug)]
pub struct PatchBuilder<'a> {
    base: &'a [u8],
    buf: Vec<u8>,
    src: usize,
    len: usize,
    applied: usize,
}

impl<'a> PatchBuilder<'a> {
    pub fn new(base: &'a [u8]) -> Self {
        Self {
            base,
            buf: vec![0; base.len()],
            src: 0,
            len: 0,
            applied: 0,
        }
    }

    /// Feed one record.
    pub fn receive(&mut self, record: &MatchRecord) -> Received {
        let ByteRange { start, end } = record.range;
        if start < self.src {
            return Received::Overlapping;
        }
        if start > end || end > self.base.len() {
            return Received::OutOfBounds;
        }

        let replacement = record.replacement.as_bytes();
        self.reserve(start - self.src + replacement.len());

        let verbatim = &self.base[self.src..start];
        self.write(verbatim);
        self.write(replacement);
        self.src = end;
        self.applied += 1;
        Received::Applied
    }

    /// Feed a batch of records in order, returning how many were applied.
    pub fn receive_all<'r>(&mut self, records: impl IntoIterator<Item = &'r MatchRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.receive(record) == Received::Applied)
            .count()
    }

    /// Copy the remaining tail and return exactly the written bytes.
    pub fn conclude(mut self) -> Vec<u8> {
        let tail = &self.base[self.src..];
        self.reserve(tail.len());
        self.write(tail);
        self.src = self.base.len();
        self.buf.truncate(self.len);
        self.buf
    }

    /// Number of records that were applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Current source cursor into the base bytes.
    pub fn source_cursor(&self) -> usize {
        self.src
    }

    /// Current capacity of the output buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        let mut capacity = self.buf.len();
        if needed <= capacity {
            return;
        }
        while capacity < needed {
            capacity = capacity.max(1) * 2;
        }
        self.buf.resize(capacity, 0);
    }

    fn write(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }
}

/// Build the rewritten document for `base` in one pass.
pub fn rewrite<'r>(base: &[u8], records: impl IntoIterator<Item = &'r MatchRecord>) -> Vec<u8> {
    let mut builder = PatchBuilder::new(base);
    builder.receive_all(records);
    builder.conclude()
}
