extern crate winapi;

use super::{AttributeProbe, FileAttributes};
use crate::error::Error;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use winapi::um::fileapi::{GetFileAttributesW, INVALID_FILE_ATTRIBUTES};
use winapi::um::winnt::{FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_READONLY, FILE_ATTRIBUTE_SYSTEM};

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProbe;

impl AttributeProbe for WindowsProbe {
    fn attributes(&self, path: &Path) -> Result<FileAttributes, Error> {
        let path_wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let attrs = unsafe { GetFileAttributesW(path_wide.as_ptr()) };
        if attrs == INVALID_FILE_ATTRIBUTES {
            return Err(Error::Probe {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        Ok(FileAttributes {
            hidden: attrs & FILE_ATTRIBUTE_HIDDEN != 0,
            system: attrs & FILE_ATTRIBUTE_SYSTEM != 0,
            readonly: attrs & FILE_ATTRIBUTE_READONLY != 0,
        })
    }
}
