use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRange {
    pub start: u64,
    pub end: u64,
}

impl FileRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// The full-file range; used when no byte range was requested.
    pub fn full() -> Self {
        Self {
            start: 0,
            end: u64::MAX,
        }
    }

    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A half-open `[start, end)` range of chunk indices within a xorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub start: u32,
    pub end: u32,
}

impl ChunkRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn chunk_count(&self) -> u32 {
        self.end - self.start
    }

    /// Whether `other` lies fully within this range.
    pub fn contains_range(&self, other: &ChunkRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// An inclusive `[start, end]` byte range, as used in HTTP `Range` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpRange {
    pub start: u64,
    pub end: u64,
}

impl HttpRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// The value of an HTTP `Range` header requesting this range.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Converts an exclusive-end file range to an inclusive-end HTTP range.
/// The range must be non-empty.
impl From<FileRange> for HttpRange {
    fn from(range: FileRange) -> Self {
        debug_assert!(range.start < range.end);
        Self {
            start: range.start,
            end: range.end - 1,
        }
    }
}

impl From<HttpRange> for FileRange {
    fn from(range: HttpRange) -> Self {
        Self {
            start: range.start,
            end: range.end + 1,
        }
    }
}
