use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Provides new writers positioned at arbitrary offsets in a file.
///
/// The file is opened without truncation so multiple downloads can fill
/// different regions of the same destination; creating (and truncating) the
/// destination up front is the caller's choice.
#[derive(Debug, Clone)]
pub struct FileProvider {
    filename: PathBuf,
}

impl FileProvider {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Create the destination, truncating any existing content.
    pub fn create(filename: impl Into<PathBuf>) -> Result<Self> {
        let filename = filename.into();
        std::fs::File::create(&filename)?;
        Ok(Self { filename })
    }

    pub fn path(&self) -> &Path {
        &self.filename
    }

    fn get_writer_at(&self, start: u64) -> Result<Box<dyn Write + Send>> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(false)
            .create(true)
            .open(&self.filename)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Box::new(file))
    }
}

/// Where reconstructed bytes land. The memory/file distinction is the only
/// place the output abstraction branches: memory targets append in plan order,
/// file targets take positional writes.
pub enum OutputSink {
    Memory(Vec<u8>),
    File(FileProvider),
}

impl OutputSink {
    pub fn memory() -> Self {
        OutputSink::Memory(Vec::new())
    }

    pub fn file(provider: FileProvider) -> Self {
        OutputSink::File(provider)
    }

    /// Write `data` at the absolute output offset. Memory targets only ever
    /// see sequential offsets, so the write is an append.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        match self {
            OutputSink::Memory(buf) => {
                debug_assert_eq!(buf.len() as u64, offset);
                buf.extend_from_slice(data);
            },
            OutputSink::File(provider) => {
                let mut writer = provider.get_writer_at(offset)?;
                writer.write_all(data)?;
                writer.flush()?;
            },
        }
        Ok(())
    }

    pub fn into_memory(self) -> Option<Vec<u8>> {
        match self {
            OutputSink::Memory(buf) => Some(buf),
            OutputSink::File(_) => None,
        }
    }
}
