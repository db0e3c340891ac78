use crate::candidate::FileCandidate;
use crate::config::AppConfig;
use crate::error::Error;
use chrono::Local;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug)]
pub enum BackupOutcome {
    Copied(PathBuf),
    /// Backups are turned off; behaves like a successful copy.
    Disabled,
    /// Copying would push the store past its cap. Deletion still proceeds.
    SkippedCapReached { used: u64, needed: u64, cap: u64 },
    /// The copy failed; the original must be kept.
    Failed(Error),
}

impl BackupOutcome {
    pub fn allows_deletion(&self) -> bool {
        !matches!(self, BackupOutcome::Failed(_))
    }
}

/// Size-capped staging area for copies of files about to be deleted.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    enabled: bool,
    cap_bytes: Option<u64>,
}

impl BackupStore {
    pub fn new(dir: PathBuf, enabled: bool, cap_bytes: Option<u64>) -> Self {
        Self {
            dir,
            enabled,
            cap_bytes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.general.backup_dir.clone(),
            config.general.backup_enabled,
            config.max_backup_bytes(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes currently held by backup entries. Recomputed from disk on every
    /// call so earlier runs and earlier copies in this run are accounted for.
    /// Entries that can't be read are logged and left out of the sum.
    pub fn used_bytes(&self) -> u64 {
        if !self.dir.exists() {
            return 0;
        }
        let mut total = 0;
        for entry in WalkDir::new(&self.dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Unreadable backup entry, not counted toward cap: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => total += metadata.len(),
                Err(e) => warn!(
                    path = %entry.path().display(),
                    "Cannot stat backup entry, not counted toward cap: {}", e
                ),
            }
        }
        total
    }

    pub fn backup(&self, candidate: &FileCandidate) -> BackupOutcome {
        if !self.enabled {
            return BackupOutcome::Disabled;
        }

        if let Some(cap) = self.cap_bytes {
            let used = self.used_bytes();
            if used.saturating_add(candidate.size) > cap {
                warn!(
                    path = %candidate.path.display(),
                    "Backup size limit reached ({} + {} > {} bytes), skipping backup",
                    used, candidate.size, cap
                );
                return BackupOutcome::SkippedCapReached {
                    used,
                    needed: candidate.size,
                    cap,
                };
            }
        }

        match self.copy_entry(&candidate.path) {
            Ok(dest) => {
                info!(path = %candidate.path.display(), "Created backup: {}", dest.display());
                BackupOutcome::Copied(dest)
            }
            Err(source) => BackupOutcome::Failed(Error::Backup {
                path: candidate.path.clone(),
                source,
            }),
        }
    }

    fn copy_entry(&self, source: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let dest = self.entry_path(source);

        if let Err(e) = fs::copy(source, &dest) {
            if dest.exists() {
                let _ = fs::remove_file(&dest);
            }
            return Err(e);
        }

        if let Err(e) = copy_times(source, &dest) {
            warn!(path = %dest.display(), "Could not preserve timestamps on backup: {}", e);
        }
        Ok(dest)
    }

    /// `<name>_<YYYYmmdd_HHMMSS>`, with a numeric suffix if that entry exists.
    fn entry_path(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let stem = format!("{}_{}", name, Local::now().format("%Y%m%d_%H%M%S"));

        let mut dest = self.dir.join(&stem);
        let mut n = 1;
        while dest.exists() {
            debug!("Backup entry {} exists, trying next suffix", dest.display());
            dest = self.dir.join(format!("{}_{}", stem, n));
            n += 1;
        }
        dest
    }
}

fn copy_times(source: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);
    open_for_times(dest)?.set_times(times)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    use winapi::um::winnt::FILE_WRITE_ATTRIBUTES;
    fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(path)
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}
