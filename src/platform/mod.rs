#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(unix)]
pub mod unix;

use crate::error::Error;
use std::path::Path;

/// OS-level attribute flags the ignore filter cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub hidden: bool,
    pub system: bool,
    pub readonly: bool,
}

/// Queries hidden/system/readonly attributes for a path.
///
/// Implementors only provide [`AttributeProbe::attributes`]; the single-flag
/// helpers are derived from it.
pub trait AttributeProbe {
    fn attributes(&self, path: &Path) -> Result<FileAttributes, Error>;

    fn is_hidden(&self, path: &Path) -> Result<bool, Error> {
        Ok(self.attributes(path)?.hidden)
    }

    fn is_system(&self, path: &Path) -> Result<bool, Error> {
        Ok(self.attributes(path)?.system)
    }

    fn is_readonly(&self, path: &Path) -> Result<bool, Error> {
        Ok(self.attributes(path)?.readonly)
    }
}

/// Probe for platforms without file attributes: every flag is false.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttributes;

impl AttributeProbe for NoAttributes {
    fn attributes(&self, _path: &Path) -> Result<FileAttributes, Error> {
        Ok(FileAttributes::default())
    }
}

#[cfg(target_os = "windows")]
pub type NativeProbe = windows::WindowsProbe;

#[cfg(unix)]
pub type NativeProbe = unix::UnixProbe;

#[cfg(not(any(unix, target_os = "windows")))]
pub type NativeProbe = NoAttributes;

pub fn native_probe() -> NativeProbe {
    NativeProbe::default()
}
