use super::{AttributeProbe, FileAttributes};
use crate::error::Error;
use std::fs;
use std::path::Path;

/// Dot-prefixed names count as hidden, write-protected permissions as
/// readonly. Unix has no system flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProbe;

impl AttributeProbe for UnixProbe {
    fn attributes(&self, path: &Path) -> Result<FileAttributes, Error> {
        let metadata = fs::symlink_metadata(path).map_err(|source| Error::Probe {
            path: path.to_path_buf(),
            source,
        })?;

        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);

        Ok(FileAttributes {
            hidden,
            system: false,
            readonly: metadata.permissions().readonly(),
        })
    }
}
