use crate::backup::{BackupOutcome, BackupStore};
use crate::candidate::FileCandidate;
use crate::error::Error;
use crate::ignore::{IgnoreFilter, IgnoreReason};
use crate::policy::{DeletionPolicy, KeepReason, Verdict};
use crate::progress::RunReporter;
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, error, info, warn};

/// What happened to one globbed entry.
#[derive(Debug)]
pub enum Decision {
    /// Directory or symlink; never deleted.
    NotAFile,
    Unreadable(Error),
    Ignored(IgnoreReason),
    Kept(KeepReason),
    WouldDelete,
    /// Removed from disk. The outcome is never `Failed`.
    Deleted(BackupOutcome),
    BackupFailed(Error),
    DeleteFailed { backup: BackupOutcome, error: Error },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NotAFile => write!(f, "skipped: not a regular file"),
            Decision::Unreadable(e) => write!(f, "skipped: {}", e),
            Decision::Ignored(reason) => write!(f, "ignored: {}", reason),
            Decision::Kept(reason) => write!(f, "kept: {}", reason),
            Decision::WouldDelete => write!(f, "would delete"),
            Decision::Deleted(BackupOutcome::Copied(dest)) => {
                write!(f, "deleted (backup at {})", dest.display())
            }
            Decision::Deleted(BackupOutcome::SkippedCapReached { .. }) => {
                write!(f, "deleted (backup skipped, cap reached)")
            }
            Decision::Deleted(_) => write!(f, "deleted"),
            Decision::BackupFailed(e) => write!(f, "kept: {}", e),
            Decision::DeleteFailed { error, .. } => write!(f, "delete failed: {}", error),
        }
    }
}

/// Per-location (and, summed, per-run) counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub found: usize,
    pub not_files: usize,
    pub ignored: usize,
    pub kept: usize,
    pub would_delete: usize,
    pub deleted: usize,
    pub bytes_freed: u64,
    pub backups_copied: usize,
    pub backups_skipped: usize,
    pub backup_failures: usize,
    pub errors: usize,
}

impl ScanStats {
    fn record(&mut self, decision: &Decision, size: u64) {
        self.found += 1;
        match decision {
            Decision::NotAFile => self.not_files += 1,
            Decision::Unreadable(_) => self.errors += 1,
            Decision::Ignored(_) => self.ignored += 1,
            Decision::Kept(_) => self.kept += 1,
            Decision::WouldDelete => self.would_delete += 1,
            Decision::Deleted(backup) => {
                self.deleted += 1;
                self.bytes_freed += size;
                self.record_backup(backup);
            }
            Decision::BackupFailed(_) => self.backup_failures += 1,
            Decision::DeleteFailed { backup, .. } => {
                self.errors += 1;
                self.record_backup(backup);
            }
        }
    }

    fn record_backup(&mut self, backup: &BackupOutcome) {
        match backup {
            BackupOutcome::Copied(_) => self.backups_copied += 1,
            BackupOutcome::SkippedCapReached { .. } => self.backups_skipped += 1,
            BackupOutcome::Failed(_) => self.backup_failures += 1,
            BackupOutcome::Disabled => (),
        }
    }
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.not_files += other.not_files;
        self.ignored += other.ignored;
        self.kept += other.kept;
        self.would_delete += other.would_delete;
        self.deleted += other.deleted;
        self.bytes_freed += other.bytes_freed;
        self.backups_copied += other.backups_copied;
        self.backups_skipped += other.backups_skipped;
        self.backup_failures += other.backup_failures;
        self.errors += other.errors;
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum LocationOutcome {
    Scanned(ScanStats),
    /// The location does not exist or is not a directory.
    Missing,
}

/// Walks one directory per call, running every globbed file through the
/// ignore filter, the deletion policy and (outside dry-run) backup + delete.
pub struct DirectoryScanner<'a> {
    filter: IgnoreFilter<'a>,
    policy: DeletionPolicy,
    store: BackupStore,
    dry_run: bool,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(
        filter: IgnoreFilter<'a>,
        policy: DeletionPolicy,
        store: BackupStore,
        dry_run: bool,
    ) -> Self {
        Self {
            filter,
            policy,
            store,
            dry_run,
        }
    }

    pub fn clean(
        &self,
        directory: &Path,
        patterns: &[String],
        min_age_days: u32,
        min_size_mb: f64,
        reporter: &dyn RunReporter,
    ) -> LocationOutcome {
        info!("Attempting to clean directory: {}", directory.display());
        if !directory.is_dir() {
            warn!("{}", Error::DirectoryMissing(directory.to_path_buf()));
            return LocationOutcome::Missing;
        }

        let mut stats = ScanStats::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for pattern in patterns {
            debug!("Searching for pattern: {}", pattern);
            let entries = match expand_pattern(directory, pattern) {
                Ok(entries) => entries,
                Err(msg) => {
                    error!("Skipping pattern '{}' in {}: {}", pattern, directory.display(), msg);
                    stats.errors += 1;
                    continue;
                }
            };

            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        error!("Error reading glob entry: {}", err);
                        stats.errors += 1;
                        continue;
                    }
                };
                if !seen.insert(path.clone()) {
                    continue;
                }

                let (decision, size) = self.process(&path, min_age_days, min_size_mb);
                reporter.on_decision(&path, &decision);
                stats.record(&decision, size);
            }
        }

        info!(
            "Finished {}: {} found, {} ignored, {} kept, {} deleted, {} would delete, {} errors",
            directory.display(),
            stats.found,
            stats.ignored,
            stats.kept,
            stats.deleted,
            stats.would_delete,
            stats.errors,
        );
        LocationOutcome::Scanned(stats)
    }

    fn process(&self, path: &Path, min_age_days: u32, min_size_mb: f64) -> (Decision, u64) {
        debug!(path = %path.display(), "Found file");

        let (candidate, is_file) = match FileCandidate::stat(path) {
            Ok(stat) => stat,
            Err(e) => {
                error!(path = %path.display(), "Error processing file: {}", e);
                return (Decision::Unreadable(e), 0);
            }
        };
        let size = candidate.size;

        if !is_file {
            debug!(path = %path.display(), "Not a regular file, skipping");
            return (Decision::NotAFile, size);
        }

        if self.in_backup_area(path) {
            debug!(path = %path.display(), "Inside backup directory, skipping");
            return (Decision::Ignored(IgnoreReason::BackupArea), size);
        }

        if let Some(reason) = self.filter.check(&candidate) {
            info!(path = %path.display(), "Ignoring file: {}", reason);
            return (Decision::Ignored(reason), size);
        }

        debug!(
            path = %path.display(),
            "Modified: {:?}, size: {}",
            candidate.modified, candidate.size
        );
        match self.policy.evaluate(&candidate, min_age_days, min_size_mb) {
            Verdict::Keep(reason) => {
                info!(path = %path.display(), "Keeping file: {}", reason);
                (Decision::Kept(reason), size)
            }
            Verdict::Delete if self.dry_run => {
                info!(path = %path.display(), "[DRY RUN] Would delete");
                (Decision::WouldDelete, size)
            }
            Verdict::Delete => (self.backup_and_delete(&candidate), size),
        }
    }

    fn backup_and_delete(&self, candidate: &FileCandidate) -> Decision {
        let path = &candidate.path;
        let backup = match self.store.backup(candidate) {
            BackupOutcome::Failed(e) => {
                error!(path = %path.display(), "Backup failed, keeping file: {}", e);
                return Decision::BackupFailed(e);
            }
            outcome => outcome,
        };

        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted ({} bytes)", candidate.size);
                Decision::Deleted(backup)
            }
            Err(source) => {
                let error = Error::FileOp {
                    path: path.clone(),
                    source,
                };
                error!(path = %path.display(), "Failed to delete: {}", error);
                Decision::DeleteFailed { backup, error }
            }
        }
    }

    fn in_backup_area(&self, path: &Path) -> bool {
        let backup_dir = self.store.dir();
        let backup_dir = fs::canonicalize(backup_dir).unwrap_or_else(|_| backup_dir.to_path_buf());
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        path.starts_with(backup_dir)
    }
}

/// Expand `pattern` relative to `directory`, collecting eagerly so that
/// deletions and backups made while processing don't disturb iteration.
fn expand_pattern(
    directory: &Path,
    pattern: &str,
) -> Result<Vec<glob::GlobResult>, String> {
    let dir_str = directory
        .to_str()
        .ok_or_else(|| "directory path is not valid UTF-8".to_string())?;
    let full = format!(
        "{}{}{}",
        Pattern::escape(dir_str.trim_end_matches(['/', '\\'])),
        MAIN_SEPARATOR,
        pattern
    );
    let options = MatchOptions {
        case_sensitive: !cfg!(windows),
        ..MatchOptions::new()
    };
    glob::glob_with(&full, options)
        .map(|paths| paths.collect())
        .map_err(|e| e.to_string())
}
