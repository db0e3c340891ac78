use config::{Config, ConfigError, Environment, File as ConfigFile, FileFormat};
use glob::Pattern;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name looked up (with any supported extension) when no config path is given.
pub const DEFAULT_CONFIG_NAME: &str = "config";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub cleanup_rules: CleanupRules,
    pub safety: SafetyConfig,
    pub ignore_patterns: IgnorePatterns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
    pub backup_dir: PathBuf,
    pub backup_enabled: bool,
    pub dry_run: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
    #[serde(default)]
    pub max_run_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupRules {
    pub resource_thresholds: ResourceThresholds,
    pub temp_files: TempFileRules,
    /// Keyed by `std::env::consts::OS` ("windows", "linux", "macos", ...).
    pub system: HashMap<String, PlatformDirs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceThresholds {
    pub cpu_usage_percent: f32,
    pub memory_usage_percent: f32,
    pub disk_usage_percent: f32,
    /// Skip sampling and always let the run through.
    #[serde(default)]
    pub always_run: bool,
    #[serde(default)]
    pub disk_path: Option<PathBuf>,
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TempFileRules {
    pub locations: Vec<PathBuf>,
    pub patterns: Vec<String>,
    pub min_age_days: u32,
    pub min_size_mb: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PlatformDirs {
    pub user_temp: bool,
    pub user_downloads: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    pub skip_system_files: bool,
    pub skip_hidden_files: bool,
    pub skip_readonly_files: bool,
    pub max_backup_size_gb: f64,
    #[serde(default)]
    pub preserve_recent_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnorePatterns {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_cpu_sample_ms() -> u64 {
    1000
}

/// Load the configuration file at `path` (extension optional), layered with
/// `JANITOR__SECTION__KEY` environment overrides.
pub fn load_configuration(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(&path.to_string_lossy()).required(true))
        .add_source(
            Environment::with_prefix("JANITOR")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from an in-memory document.
pub fn load_from_str(contents: &str, format: FileFormat) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from_str(contents, format))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Reject configurations the engine cannot evaluate safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let globs = self
            .cleanup_rules
            .temp_files
            .patterns
            .iter()
            .chain(&self.ignore_patterns.files)
            .chain(&self.ignore_patterns.directories);
        for glob in globs {
            if let Err(e) = Pattern::new(glob) {
                return Err(ConfigError::Message(format!(
                    "invalid glob pattern '{}': {}",
                    glob, e
                )));
            }
        }

        let rules = &self.cleanup_rules.temp_files;
        if !rules.min_size_mb.is_finite() || rules.min_size_mb < 0.0 {
            return Err(ConfigError::Message(format!(
                "cleanup_rules.temp_files.min_size_mb must be a non-negative number, got {}",
                rules.min_size_mb
            )));
        }
        if !self.safety.max_backup_size_gb.is_finite() {
            return Err(ConfigError::Message(
                "safety.max_backup_size_gb must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_size_bytes(&self) -> u64 {
        mb_to_bytes(self.cleanup_rules.temp_files.min_size_mb)
    }

    /// Backup cap in bytes; `None` when the cap is disabled (≤ 0).
    pub fn max_backup_bytes(&self) -> Option<u64> {
        let gb = self.safety.max_backup_size_gb;
        if gb <= 0.0 {
            None
        } else {
            Some((gb * BYTES_PER_GB) as u64)
        }
    }

    /// User-directory toggles for the platform this binary runs on.
    pub fn platform_dirs(&self) -> PlatformDirs {
        self.cleanup_rules
            .system
            .get(std::env::consts::OS)
            .copied()
            .unwrap_or_default()
    }
}

pub fn mb_to_bytes(mb: f64) -> u64 {
    (mb * BYTES_PER_MB) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
general:
  log_level: INFO
  backup_dir: ./backups
  backup_enabled: true
  dry_run: false
cleanup_rules:
  resource_thresholds:
    cpu_usage_percent: 80
    memory_usage_percent: 85
    disk_usage_percent: 90
  temp_files:
    locations: ["/tmp/janitor"]
    patterns: ["*.tmp", "**/*.log"]
    min_age_days: 7
    min_size_mb: 1
  system:
    windows:
      user_temp: true
      user_downloads: false
safety:
  skip_system_files: true
  skip_hidden_files: true
  skip_readonly_files: true
  max_backup_size_gb: 2
  preserve_recent_hours: 24
ignore_patterns:
  files: ["*.important"]
  directories: ["**/cache/**"]
"#;

    #[test]
    fn test_load_complete_config() {
        let config = load_from_str(SAMPLE, FileFormat::Yaml).unwrap();
        assert!(config.general.backup_enabled);
        assert!(!config.general.dry_run);
        assert_eq!(config.general.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.cleanup_rules.temp_files.min_age_days, 7);
        assert_eq!(config.cleanup_rules.temp_files.patterns.len(), 2);
        assert_eq!(config.cleanup_rules.resource_thresholds.cpu_sample_ms, 1000);
        assert!(!config.cleanup_rules.resource_thresholds.always_run);
        assert_eq!(config.safety.preserve_recent_hours, 24);
        assert_eq!(config.min_size_bytes(), 1024 * 1024);
        assert_eq!(config.max_backup_bytes(), Some(2 * 1024 * 1024 * 1024));
        assert!(config.cleanup_rules.system["windows"].user_temp);
    }

    #[test]
    fn test_missing_required_key_is_error() {
        let without_safety = SAMPLE.replace("  skip_hidden_files: true\n", "");
        assert!(load_from_str(&without_safety, FileFormat::Yaml).is_err());
    }

    #[test]
    fn test_preserve_recent_hours_defaults_to_zero() {
        let without_recent = SAMPLE.replace("  preserve_recent_hours: 24\n", "");
        let config = load_from_str(&without_recent, FileFormat::Yaml).unwrap();
        assert_eq!(config.safety.preserve_recent_hours, 0);
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let bad = SAMPLE.replace("\"*.important\"", "\"[unclosed\"");
        let err = load_from_str(&bad, FileFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("invalid glob pattern"));
    }

    #[test]
    fn test_zero_backup_cap_is_unlimited() {
        let unlimited = SAMPLE.replace("max_backup_size_gb: 2", "max_backup_size_gb: 0");
        let config = load_from_str(&unlimited, FileFormat::Yaml).unwrap();
        assert_eq!(config.max_backup_bytes(), None);
    }

    #[test]
    fn test_load_configuration_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("janitor.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = load_configuration(&path).unwrap();
        assert_eq!(config.general.log_level, "INFO");

        assert!(load_configuration(&dir.path().join("missing.yaml")).is_err());
    }
}
