//! The download scheduler.
//!
//! Turns a reconstruction plan into a single ordered byte stream:
//! 1. Query the plan for the file (and byte range) from the CAS API.
//! 2. Resolve each term against the fetch info serving its chunk range.
//! 3. Fetch xorb ranges with bounded concurrency, prefetching ahead of the
//!    splice cursor, sharing fetches between terms that use the same range.
//! 4. Splice each term's bytes into the output in plan order, honoring the
//!    leading offset and the requested range length.

mod downloader;
pub(crate) mod term_download;

pub use downloader::FileDownloader;
