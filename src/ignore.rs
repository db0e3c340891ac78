use crate::candidate::FileCandidate;
use crate::config::{IgnorePatterns, SafetyConfig};
use crate::error::Error;
use crate::platform::AttributeProbe;
use config::ConfigError;
use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    System,
    Hidden,
    Readonly,
    FilePattern(String),
    DirectoryPattern(String),
    /// Attributes could not be read, so the file is left alone.
    ProbeFailed(String),
    /// The path is not valid UTF-8 and cannot be matched against globs.
    Unmatchable,
    /// The path lives inside the backup directory.
    BackupArea,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::System => write!(f, "system file"),
            IgnoreReason::Hidden => write!(f, "hidden file"),
            IgnoreReason::Readonly => write!(f, "readonly file"),
            IgnoreReason::FilePattern(p) => write!(f, "matches file ignore pattern '{}'", p),
            IgnoreReason::DirectoryPattern(p) => {
                write!(f, "matches directory ignore pattern '{}'", p)
            }
            IgnoreReason::ProbeFailed(e) => write!(f, "attribute probe failed: {}", e),
            IgnoreReason::Unmatchable => write!(f, "path is not valid UTF-8"),
            IgnoreReason::BackupArea => write!(f, "inside backup directory"),
        }
    }
}

struct CompiledGlob {
    raw: String,
    pattern: Pattern,
    /// No separator in the glob: it is also tried against single path components.
    name_only: bool,
}

impl CompiledGlob {
    fn compile(raw: &str) -> Result<Self, Error> {
        let pattern = Pattern::new(raw).map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "invalid glob pattern '{}': {}",
                raw, e
            )))
        })?;
        Ok(Self {
            raw: raw.to_string(),
            pattern,
            name_only: !raw.contains('/') && !raw.contains('\\'),
        })
    }

    fn matches_str(&self, s: &str) -> bool {
        self.pattern.matches_with(s, match_options())
    }
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        ..MatchOptions::new()
    }
}

/// Excludes candidates that must never be considered for deletion.
///
/// Checks run in a fixed order and stop at the first hit: system, hidden and
/// readonly attributes (each only when its skip flag is set), then file
/// globs, then directory globs. Any failure ignores the file.
pub struct IgnoreFilter<'a> {
    skip_system: bool,
    skip_hidden: bool,
    skip_readonly: bool,
    file_globs: Vec<CompiledGlob>,
    directory_globs: Vec<CompiledGlob>,
    probe: &'a dyn AttributeProbe,
}

impl<'a> IgnoreFilter<'a> {
    pub fn new(
        safety: &SafetyConfig,
        patterns: &IgnorePatterns,
        probe: &'a dyn AttributeProbe,
    ) -> Result<Self, Error> {
        Ok(Self {
            skip_system: safety.skip_system_files,
            skip_hidden: safety.skip_hidden_files,
            skip_readonly: safety.skip_readonly_files,
            file_globs: compile_all(&patterns.files)?,
            directory_globs: compile_all(&patterns.directories)?,
            probe,
        })
    }

    pub fn should_ignore(&self, candidate: &FileCandidate) -> bool {
        self.check(candidate).is_some()
    }

    /// The first reason `candidate` must be left alone, if any.
    pub fn check(&self, candidate: &FileCandidate) -> Option<IgnoreReason> {
        if self.skip_system || self.skip_hidden || self.skip_readonly {
            let attrs = match candidate.attributes(self.probe) {
                Ok(attrs) => attrs,
                Err(e) => {
                    warn!(path = %candidate.path.display(), "Error probing attributes: {}", e);
                    return Some(IgnoreReason::ProbeFailed(e.to_string()));
                }
            };
            if self.skip_system && attrs.system {
                return Some(IgnoreReason::System);
            }
            if self.skip_hidden && attrs.hidden {
                return Some(IgnoreReason::Hidden);
            }
            if self.skip_readonly && attrs.readonly {
                return Some(IgnoreReason::Readonly);
            }
        }

        let path = &candidate.path;
        let Some(path_str) = path.to_str() else {
            warn!(path = %path.display(), "Cannot match non UTF-8 path against ignore patterns");
            return Some(IgnoreReason::Unmatchable);
        };

        if let Some(glob) = self
            .file_globs
            .iter()
            .find(|glob| matches_file(glob, path, path_str))
        {
            return Some(IgnoreReason::FilePattern(glob.raw.clone()));
        }

        if let Some(glob) = self
            .directory_globs
            .iter()
            .find(|glob| matches_directory(glob, path, path_str))
        {
            return Some(IgnoreReason::DirectoryPattern(glob.raw.clone()));
        }

        None
    }
}

fn compile_all(globs: &[String]) -> Result<Vec<CompiledGlob>, Error> {
    globs.iter().map(|g| CompiledGlob::compile(g)).collect()
}

fn matches_file(glob: &CompiledGlob, path: &Path, path_str: &str) -> bool {
    if glob.matches_str(path_str) {
        return true;
    }
    glob.name_only
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| glob.matches_str(name))
}

fn matches_directory(glob: &CompiledGlob, path: &Path, path_str: &str) -> bool {
    if glob.matches_str(path_str) {
        return true;
    }
    path.ancestors().skip(1).any(|dir| {
        let Some(dir_str) = dir.to_str() else {
            return false;
        };
        if glob.matches_str(dir_str) {
            return true;
        }
        glob.name_only
            && dir
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| glob.matches_str(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FileAttributes, NoAttributes};
    use std::io;
    use std::path::PathBuf;

    fn safety(system: bool, hidden: bool, readonly: bool) -> SafetyConfig {
        SafetyConfig {
            skip_system_files: system,
            skip_hidden_files: hidden,
            skip_readonly_files: readonly,
            max_backup_size_gb: 0.0,
            preserve_recent_hours: 0,
        }
    }

    fn patterns(files: &[&str], directories: &[&str]) -> IgnorePatterns {
        IgnorePatterns {
            files: files.iter().map(|s| s.to_string()).collect(),
            directories: directories.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn candidate(path: &str) -> FileCandidate {
        FileCandidate::new(PathBuf::from(path), 1024, None)
    }

    struct StaticProbe(FileAttributes);

    impl AttributeProbe for StaticProbe {
        fn attributes(&self, _path: &Path) -> Result<FileAttributes, Error> {
            Ok(self.0)
        }
    }

    struct BrokenProbe;

    impl AttributeProbe for BrokenProbe {
        fn attributes(&self, path: &Path) -> Result<FileAttributes, Error> {
            Err(Error::Probe {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    #[test]
    fn test_clean_file_is_not_ignored() {
        let filter = IgnoreFilter::new(
            &safety(true, true, true),
            &patterns(&["*.important"], &["**/cache/**"]),
            &NoAttributes,
        )
        .unwrap();
        assert!(!filter.should_ignore(&candidate("/tmp/work/a.tmp")));
    }

    #[test]
    fn test_attribute_flags_respected_in_order() {
        let probe = StaticProbe(FileAttributes {
            hidden: true,
            system: true,
            readonly: true,
        });
        let filter = IgnoreFilter::new(
            &safety(true, true, true),
            &patterns(&[], &[]),
            &probe,
        )
        .unwrap();
        assert_eq!(filter.check(&candidate("/tmp/a.tmp")), Some(IgnoreReason::System));

        let filter = IgnoreFilter::new(
            &safety(false, true, true),
            &patterns(&[], &[]),
            &probe,
        )
        .unwrap();
        assert_eq!(filter.check(&candidate("/tmp/a.tmp")), Some(IgnoreReason::Hidden));

        let filter = IgnoreFilter::new(
            &safety(false, false, true),
            &patterns(&[], &[]),
            &probe,
        )
        .unwrap();
        assert_eq!(filter.check(&candidate("/tmp/a.tmp")), Some(IgnoreReason::Readonly));
    }

    #[test]
    fn test_flags_disabled_ignore_attributes() {
        let probe = StaticProbe(FileAttributes {
            hidden: true,
            system: true,
            readonly: true,
        });
        let filter = IgnoreFilter::new(
            &safety(false, false, false),
            &patterns(&[], &[]),
            &probe,
        )
        .unwrap();
        assert_eq!(filter.check(&candidate("/tmp/a.tmp")), None);
    }

    #[test]
    fn test_probe_error_fails_closed() {
        let filter = IgnoreFilter::new(
            &safety(false, true, false),
            &patterns(&[], &[]),
            &BrokenProbe,
        )
        .unwrap();
        assert!(matches!(
            filter.check(&candidate("/tmp/a.tmp")),
            Some(IgnoreReason::ProbeFailed(_))
        ));
    }

    #[test]
    fn test_probe_not_consulted_when_flags_off() {
        let filter = IgnoreFilter::new(
            &safety(false, false, false),
            &patterns(&[], &[]),
            &BrokenProbe,
        )
        .unwrap();
        assert_eq!(filter.check(&candidate("/tmp/a.tmp")), None);
    }

    #[test]
    fn test_file_pattern_matches_name() {
        let filter = IgnoreFilter::new(
            &safety(false, false, false),
            &patterns(&["keep_*", "*.important"], &[]),
            &NoAttributes,
        )
        .unwrap();
        assert_eq!(
            filter.check(&candidate("/data/tmp/keep_me.tmp")),
            Some(IgnoreReason::FilePattern("keep_*".to_string()))
        );
        assert_eq!(
            filter.check(&candidate("/data/tmp/report.important")),
            Some(IgnoreReason::FilePattern("*.important".to_string()))
        );
        assert_eq!(filter.check(&candidate("/data/tmp/other.tmp")), None);
    }

    #[test]
    fn test_directory_pattern_excludes_subtree() {
        let filter = IgnoreFilter::new(
            &safety(false, false, false),
            &patterns(&[], &["**/cache/**", "node_modules"]),
            &NoAttributes,
        )
        .unwrap();
        assert_eq!(
            filter.check(&candidate("/data/tmp/cache/old.tmp")),
            Some(IgnoreReason::DirectoryPattern("**/cache/**".to_string()))
        );
        assert_eq!(
            filter.check(&candidate("/srv/app/node_modules/pkg/x.log")),
            Some(IgnoreReason::DirectoryPattern("node_modules".to_string()))
        );
        assert_eq!(filter.check(&candidate("/data/tmp/cached.tmp")), None);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = IgnoreFilter::new(
            &safety(false, false, false),
            &patterns(&["[oops"], &[]),
            &NoAttributes,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
