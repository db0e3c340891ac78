use crate::error::Error;
use crate::platform::{AttributeProbe, FileAttributes};
use chrono::{DateTime, Local};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

/// A file under consideration during one scan pass.
#[derive(Debug)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size: u64,
    /// `None` when the platform cannot report a modification time.
    pub modified: Option<DateTime<Local>>,
    attributes: OnceCell<FileAttributes>,
}

impl FileCandidate {
    pub fn new(path: PathBuf, size: u64, modified: Option<DateTime<Local>>) -> Self {
        Self {
            path,
            size,
            modified,
            attributes: OnceCell::new(),
        }
    }

    /// Stat `path` without following symlinks. Returns the candidate and
    /// whether the entry is a regular file.
    pub fn stat(path: &Path) -> Result<(Self, bool), Error> {
        let metadata = fs::symlink_metadata(path).map_err(|source| Error::FileOp {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = metadata.modified().ok().map(DateTime::<Local>::from);
        let candidate = Self::new(path.to_path_buf(), metadata.len(), modified);
        Ok((candidate, metadata.is_file()))
    }

    /// OS attributes, probed on first use and cached for the candidate's lifetime.
    pub fn attributes(&self, probe: &dyn AttributeProbe) -> Result<FileAttributes, Error> {
        if let Some(attrs) = self.attributes.get() {
            return Ok(*attrs);
        }
        let attrs = probe.attributes(&self.path)?;
        Ok(*self.attributes.get_or_init(|| attrs))
    }
}
