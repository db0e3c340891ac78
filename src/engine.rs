use crate::backup::BackupStore;
use crate::config::AppConfig;
use crate::error::Error;
use crate::ignore::IgnoreFilter;
use crate::platform::{self, AttributeProbe};
use crate::policy::DeletionPolicy;
use crate::progress::{RunReporter, SilentReporter};
use crate::resource::{GateDecision, ResourceGate, ResourceSampler};
use crate::scanner::{DirectoryScanner, LocationOutcome, ScanStats};
use std::env;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-user directories that platform toggles can add to the target list.
#[derive(Debug, Clone, Default)]
pub struct UserDirs {
    pub temp: Option<PathBuf>,
    pub downloads: Option<PathBuf>,
}

impl UserDirs {
    /// Resolve from the environment. Anything that can't be resolved is `None`.
    pub fn detect() -> Self {
        let home = dirs::home_dir();
        if home.is_none() {
            warn!("Failed to determine home directory");
        }

        let temp = ["TEMP", "TMP", "TMPDIR"]
            .iter()
            .filter_map(|var| env::var_os(var))
            .find(|value| !value.is_empty())
            .map(PathBuf::from);
        if temp.is_none() {
            warn!("No TEMP, TMP or TMPDIR variable set");
        }

        let downloads = home.map(|h| h.join("Downloads"));

        Self {
            temp,
            downloads,
        }
    }
}

/// Fixed locations followed by the enabled user directories, without duplicates.
pub fn resolve_targets(config: &AppConfig, user_dirs: &UserDirs) -> Vec<PathBuf> {
    let mut targets: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !targets.contains(&path) {
            targets.push(path);
        }
    };

    for location in &config.cleanup_rules.temp_files.locations {
        push(location.clone());
    }

    let toggles = config.platform_dirs();
    if toggles.user_temp {
        match &user_dirs.temp {
            Some(temp) => push(temp.clone()),
            None => warn!("User temp directory enabled but could not be resolved"),
        }
    }
    if toggles.user_downloads {
        match &user_dirs.downloads {
            Some(downloads) => push(downloads.clone()),
            None => warn!("User downloads directory enabled but could not be resolved"),
        }
    }

    targets
}

#[derive(Debug)]
pub struct RunSummary {
    pub gate: GateDecision,
    pub locations_scanned: usize,
    pub locations_missing: usize,
    pub stats: ScanStats,
    /// `general.max_run_secs` ran out before every location was scanned.
    pub budget_exhausted: bool,
    pub duration: Duration,
}

impl RunSummary {
    fn gated(gate: GateDecision, duration: Duration) -> Self {
        Self {
            gate,
            locations_scanned: 0,
            locations_missing: 0,
            stats: ScanStats::default(),
            budget_exhausted: false,
            duration,
        }
    }

    /// The resource gate stopped the run before any scanning.
    pub fn skipped(&self) -> bool {
        !self.gate.should_run()
    }
}

/// Advisory lock guarding against overlapping runs.
///
/// The lock lives on the open descriptor, so the OS releases it when the
/// holder exits, however it exits. The file itself is left in place and only
/// carries the pid of the last holder.
pub struct RunLock {
    path: PathBuf,
    file: RwLock<File>,
}

impl RunLock {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
        })
    }

    /// Take the lock without blocking. `Error::Locked` if another process
    /// (or another open handle) holds it.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, Error> {
        let mut guard = match self.file.try_write() {
            Ok(guard) => guard,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(Error::Locked(self.path.clone()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let file: &mut File = &mut guard;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired run lock {}", self.path.display());
        Ok(guard)
    }
}

/// One cleanup pass over every configured location.
pub struct CollectionRun {
    config: AppConfig,
    gate: ResourceGate,
    probe: Box<dyn AttributeProbe>,
    user_dirs: Option<UserDirs>,
    reporter: Option<Box<dyn RunReporter>>,
}

impl CollectionRun {
    pub fn new(config: AppConfig) -> Self {
        let gate = ResourceGate::from_thresholds(&config.cleanup_rules.resource_thresholds);
        Self {
            config,
            gate,
            probe: Box::new(platform::native_probe()),
            user_dirs: None,
            reporter: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Box<dyn ResourceSampler>) -> Self {
        self.gate = self.gate.with_sampler(sampler);
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn AttributeProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Use fixed user directories instead of detecting them at run time.
    pub fn with_user_dirs(mut self, user_dirs: UserDirs) -> Self {
        self.user_dirs = Some(user_dirs);
        self
    }

    /// Reporter used by [`CollectionRun::run`].
    pub fn with_reporter(mut self, reporter: Box<dyn RunReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Evaluate the resource gate on its own.
    pub fn check_resources(&self) -> GateDecision {
        self.gate.check()
    }

    pub fn run(&self) -> Result<RunSummary, Error> {
        match self.reporter.as_deref() {
            Some(reporter) => self.run_with(reporter),
            None => self.run_with(&SilentReporter),
        }
    }

    /// Gate check, target resolution, then a scan of every target.
    /// Only configuration and locking failures are returned as errors.
    pub fn run_with(&self, reporter: &dyn RunReporter) -> Result<RunSummary, Error> {
        let start = Instant::now();
        info!("Starting garbage collection...");
        reporter.on_run_start();

        let mut lock = match &self.config.general.lock_file {
            Some(path) => Some(RunLock::open(path)?),
            None => None,
        };
        let _guard = match lock.as_mut() {
            Some(lock) => Some(lock.try_acquire()?),
            None => None,
        };

        let gate = self.gate.check();
        reporter.on_gate(&gate);
        if !gate.should_run() {
            info!("System resources within normal limits, skipping cleanup");
            let summary = RunSummary::gated(gate, start.elapsed());
            reporter.on_run_complete(&summary);
            return Ok(summary);
        }

        let user_dirs = self.user_dirs.clone().unwrap_or_else(UserDirs::detect);
        debug!("User directories: {:?}", user_dirs);
        let targets = resolve_targets(&self.config, &user_dirs);
        info!("Cleanup targets: {:?}", targets);

        let rules = &self.config.cleanup_rules.temp_files;
        let filter = IgnoreFilter::new(
            &self.config.safety,
            &self.config.ignore_patterns,
            self.probe.as_ref(),
        )?;
        let scanner = DirectoryScanner::new(
            filter,
            DeletionPolicy::new(self.config.safety.preserve_recent_hours),
            BackupStore::from_config(&self.config),
            self.config.general.dry_run,
        );
        if self.config.general.dry_run {
            info!("Dry run enabled, no files will be modified");
        }

        let budget = self.config.general.max_run_secs.map(Duration::from_secs);
        let mut stats = ScanStats::default();
        let mut locations_scanned = 0;
        let mut locations_missing = 0;
        let mut budget_exhausted = false;

        for location in &targets {
            if budget.map_or(false, |budget| start.elapsed() >= budget) {
                warn!(
                    "Run time budget exhausted, skipping remaining locations from {}",
                    location.display()
                );
                budget_exhausted = true;
                break;
            }

            info!("Processing location: {}", location.display());
            reporter.on_location_start(location);
            match scanner.clean(
                location,
                &rules.patterns,
                rules.min_age_days,
                rules.min_size_mb,
                reporter,
            ) {
                LocationOutcome::Scanned(location_stats) => {
                    locations_scanned += 1;
                    stats += location_stats;
                }
                LocationOutcome::Missing => locations_missing += 1,
            }
        }

        let summary = RunSummary {
            gate,
            locations_scanned,
            locations_missing,
            stats,
            budget_exhausted,
            duration: start.elapsed(),
        };
        info!(
            "Garbage collection completed in {:.2}s: {} locations, {} files found, {} deleted ({} bytes), {} would delete, {} errors",
            summary.duration.as_secs_f64(),
            summary.locations_scanned,
            summary.stats.found,
            summary.stats.deleted,
            summary.stats.bytes_freed,
            summary.stats.would_delete,
            summary.stats.errors,
        );
        reporter.on_run_complete(&summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_left_by_dead_holder_is_reacquired() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("janitor.lock");

        let mut first = RunLock::open(&path).unwrap();
        let guard = first.try_acquire().unwrap();
        // A killed holder never runs its destructors.
        std::mem::forget(guard);
        drop(first);
        assert!(path.exists());

        let mut second = RunLock::open(&path).unwrap();
        assert!(second.try_acquire().is_ok());
    }

    #[test]
    fn test_stale_lock_file_does_not_block() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("janitor.lock");
        std::fs::write(&path, "999999\n").unwrap();

        let mut lock = RunLock::open(&path).unwrap();
        let _guard = lock.try_acquire().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_held_lock_blocks_second_handle() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("janitor.lock");

        let mut holder = RunLock::open(&path).unwrap();
        let guard = holder.try_acquire().unwrap();

        let mut contender = RunLock::open(&path).unwrap();
        assert!(matches!(contender.try_acquire(), Err(Error::Locked(_))));

        drop(guard);
        assert!(contender.try_acquire().is_ok());
    }
}
