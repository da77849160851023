use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{CtfFormatError, Result};

/// Writes the files of one output trace: a folder, then one binary stream
/// file at a time, appended to until closed. At most one stream is open at
/// any moment.
pub struct CtfStreamWriter {
    folder: Option<PathBuf>,
    stream: Option<BufWriter<File>>,
}

impl CtfStreamWriter {
    pub fn new() -> Self {
        CtfStreamWriter {
            folder: None,
            stream: None,
        }
    }

    /// Create the output folder. A folder can be opened only once per
    /// writer; an existing directory is reused.
    pub fn open_folder(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.folder.is_some() {
            return Err(CtfFormatError::FolderAlreadyOpen);
        }
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CtfFormatError::EmptyFolderPath);
        }
        fs::create_dir_all(path)?;
        self.folder = Some(path.to_path_buf());
        Ok(())
    }

    /// Open `<folder>/<name>` for binary write, truncating any previous
    /// contents. The previous stream must have been closed.
    pub fn open_stream(&mut self, name: &str) -> Result<()> {
        let folder = self.folder.as_ref().ok_or(CtfFormatError::FolderNotOpen)?;
        if self.stream.is_some() {
            return Err(CtfFormatError::StreamAlreadyOpen);
        }
        let file = File::create(folder.join(name))?;
        self.stream = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Append raw bytes to the open stream.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(CtfFormatError::StreamNotOpen)?;
        stream.write_all(bytes)?;
        Ok(())
    }

    /// Flush and close the open stream.
    pub fn close_stream(&mut self) -> Result<()> {
        let mut stream = self.stream.take().ok_or(CtfFormatError::StreamNotOpen)?;
        stream.flush()?;
        Ok(())
    }
}

impl Default for CtfStreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
