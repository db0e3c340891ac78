use crate::candidate::FileCandidate;
use crate::config::mb_to_bytes;
use chrono::{DateTime, Local, TimeDelta};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    /// Modified more recently than the minimum age.
    TooNew,
    /// Not larger than the minimum size.
    TooSmall,
    /// Inside the preserve-recent-hours window.
    Recent,
    /// Modification time unavailable; preserved.
    ModifiedUnknown,
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepReason::TooNew => write!(f, "younger than minimum age"),
            KeepReason::TooSmall => write!(f, "not larger than minimum size"),
            KeepReason::Recent => write!(f, "modified within preserve window"),
            KeepReason::ModifiedUnknown => write!(f, "modification time unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep(KeepReason),
    Delete,
}

impl Verdict {
    pub fn is_delete(&self) -> bool {
        matches!(self, Verdict::Delete)
    }
}

/// Age, size and recency thresholds combined into a keep/delete verdict.
#[derive(Debug, Clone, Copy)]
pub struct DeletionPolicy {
    preserve_recent_hours: i64,
}

impl DeletionPolicy {
    pub fn new(preserve_recent_hours: i64) -> Self {
        Self {
            preserve_recent_hours,
        }
    }

    pub fn evaluate(&self, candidate: &FileCandidate, min_age_days: u32, min_size_mb: f64) -> Verdict {
        self.evaluate_at(candidate, min_age_days, min_size_mb, Local::now())
    }

    /// Delete only if the file is strictly older than `min_age_days`, strictly
    /// larger than `min_size_mb` and outside the recent window.
    pub fn evaluate_at(
        &self,
        candidate: &FileCandidate,
        min_age_days: u32,
        min_size_mb: f64,
        now: DateTime<Local>,
    ) -> Verdict {
        let Some(modified) = candidate.modified else {
            return Verdict::Keep(KeepReason::ModifiedUnknown);
        };

        // An age threshold reaching past the representable range keeps everything.
        let too_new = match TimeDelta::try_days(i64::from(min_age_days))
            .and_then(|age| now.checked_sub_signed(age))
        {
            Some(min_age) => modified >= min_age,
            None => true,
        };
        if too_new {
            return Verdict::Keep(KeepReason::TooNew);
        }

        if candidate.size <= mb_to_bytes(min_size_mb) {
            return Verdict::Keep(KeepReason::TooSmall);
        }

        if self.is_recent(modified, now) {
            return Verdict::Keep(KeepReason::Recent);
        }

        Verdict::Delete
    }

    fn is_recent(&self, modified: DateTime<Local>, now: DateTime<Local>) -> bool {
        if self.preserve_recent_hours <= 0 {
            return false;
        }
        // A window too large to represent covers every timestamp.
        match TimeDelta::try_hours(self.preserve_recent_hours)
            .and_then(|window| now.checked_sub_signed(window))
        {
            Some(cutoff) => modified > cutoff,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;

    fn candidate(age: TimeDelta, size: u64, now: DateTime<Local>) -> FileCandidate {
        FileCandidate::new(PathBuf::from("/tmp/x.tmp"), size, Some(now - age))
    }

    #[test]
    fn test_old_large_file_is_deleted() {
        let now = Local::now();
        let a = candidate(TimeDelta::days(10), 5 * MB, now);
        assert_eq!(DeletionPolicy::new(0).evaluate_at(&a, 7, 1.0, now), Verdict::Delete);
    }

    #[test]
    fn test_new_file_is_kept() {
        let now = Local::now();
        let b = candidate(TimeDelta::days(1), 5 * MB, now);
        assert_eq!(
            DeletionPolicy::new(0).evaluate_at(&b, 7, 1.0, now),
            Verdict::Keep(KeepReason::TooNew)
        );
    }

    #[test]
    fn test_age_boundary_is_strict() {
        let now = Local::now();
        let exact = candidate(TimeDelta::days(7), 5 * MB, now);
        assert_eq!(
            DeletionPolicy::new(0).evaluate_at(&exact, 7, 1.0, now),
            Verdict::Keep(KeepReason::TooNew)
        );
    }

    #[test]
    fn test_size_boundary_is_strict() {
        let now = Local::now();
        let policy = DeletionPolicy::new(0);
        let exact = candidate(TimeDelta::days(30), MB, now);
        assert_eq!(
            policy.evaluate_at(&exact, 7, 1.0, now),
            Verdict::Keep(KeepReason::TooSmall)
        );
        let bigger = candidate(TimeDelta::days(30), MB + 1, now);
        assert_eq!(policy.evaluate_at(&bigger, 7, 1.0, now), Verdict::Delete);
    }

    #[test]
    fn test_recent_window_preserves() {
        let now = Local::now();
        // Zero minimum age lets the recency window be the deciding rule.
        let file = candidate(TimeDelta::hours(5), 5 * MB, now);
        assert_eq!(
            DeletionPolicy::new(24).evaluate_at(&file, 0, 1.0, now),
            Verdict::Keep(KeepReason::Recent)
        );
        assert_eq!(DeletionPolicy::new(0).evaluate_at(&file, 0, 1.0, now), Verdict::Delete);
        assert_eq!(DeletionPolicy::new(-3).evaluate_at(&file, 0, 1.0, now), Verdict::Delete);
    }

    #[test]
    fn test_huge_recent_window_preserves_everything() {
        let now = Local::now();
        let file = candidate(TimeDelta::days(3650), 5 * MB, now);
        assert_eq!(
            DeletionPolicy::new(i64::MAX).evaluate_at(&file, 7, 1.0, now),
            Verdict::Keep(KeepReason::Recent)
        );
    }

    #[test]
    fn test_huge_min_age_keeps_everything() {
        let now = Local::now();
        let file = candidate(TimeDelta::days(3650), 5 * MB, now);
        assert_eq!(
            DeletionPolicy::new(0).evaluate_at(&file, 100_000_000, 1.0, now),
            Verdict::Keep(KeepReason::TooNew)
        );
        assert_eq!(
            DeletionPolicy::new(0).evaluate_at(&file, u32::MAX, 1.0, now),
            Verdict::Keep(KeepReason::TooNew)
        );
    }

    #[test]
    fn test_unknown_mtime_is_kept() {
        let file = FileCandidate::new(PathBuf::from("/tmp/x.tmp"), 5 * MB, None);
        assert_eq!(
            DeletionPolicy::new(0).evaluate(&file, 7, 1.0),
            Verdict::Keep(KeepReason::ModifiedUnknown)
        );
    }

    #[test]
    fn test_any_failing_criterion_keeps() {
        let now = Local::now();
        let policy = DeletionPolicy::new(48);
        for (age_days, size, expected) in [
            (10, 5 * MB, Verdict::Delete),
            (3, 5 * MB, Verdict::Keep(KeepReason::TooNew)),
            (10, MB / 2, Verdict::Keep(KeepReason::TooSmall)),
            (3, MB / 2, Verdict::Keep(KeepReason::TooNew)),
        ] {
            let file = candidate(TimeDelta::days(age_days), size, now);
            assert_eq!(policy.evaluate_at(&file, 7, 1.0, now), expected);
        }
    }
}
