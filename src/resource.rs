use crate::config::ResourceThresholds;
use crate::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::{debug, info, warn};

/// CPU, memory and disk usage in percent, sampled once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cpu => write!(f, "CPU"),
            Metric::Memory => write!(f, "memory"),
            Metric::Disk => write!(f, "disk"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Sampling skipped by `always_run`.
    Forced,
    Exceeded {
        metric: Metric,
        value: f32,
        threshold: f32,
    },
    WithinLimits(ResourceSnapshot),
    /// Sampling failed; the run proceeds anyway.
    SampleFailed(String),
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, GateDecision::WithinLimits(_))
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Forced => write!(f, "forced run, resource check skipped"),
            GateDecision::Exceeded {
                metric,
                value,
                threshold,
            } => write!(
                f,
                "{} usage ({:.1}%) exceeds threshold ({:.1}%)",
                metric, value, threshold
            ),
            GateDecision::WithinLimits(s) => write!(
                f,
                "resources within limits (cpu {:.1}%, memory {:.1}%, disk {:.1}%)",
                s.cpu_percent, s.memory_percent, s.disk_percent
            ),
            GateDecision::SampleFailed(msg) => {
                write!(f, "resource sampling failed ({}), running anyway", msg)
            }
        }
    }
}

pub trait ResourceSampler {
    fn sample(&self) -> Result<ResourceSnapshot, Error>;
}

/// Samples the live system through `sysinfo`.
pub struct SysinfoSampler {
    disk_path: PathBuf,
    cpu_interval: Duration,
}

impl SysinfoSampler {
    pub fn new(disk_path: PathBuf, cpu_interval: Duration) -> Self {
        Self {
            disk_path,
            cpu_interval,
        }
    }

    pub fn from_thresholds(thresholds: &ResourceThresholds) -> Self {
        Self::new(
            thresholds
                .disk_path
                .clone()
                .unwrap_or_else(default_disk_path),
            Duration::from_millis(thresholds.cpu_sample_ms),
        )
    }

    fn cpu_percent(&self, sys: &mut System) -> Result<f32, Error> {
        sys.refresh_cpu_all();
        thread::sleep(self.cpu_interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_all();
        let usage = sys.global_cpu_usage();
        if !usage.is_finite() {
            return Err(Error::ResourceSample(format!(
                "CPU usage reported as {}",
                usage
            )));
        }
        Ok(usage)
    }

    fn memory_percent(&self, sys: &mut System) -> Result<f32, Error> {
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(Error::ResourceSample(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(sys.used_memory() as f32 / total as f32 * 100.0)
    }

    fn disk_percent(&self) -> Result<f32, Error> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| self.disk_path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                Error::ResourceSample(format!(
                    "no mounted disk contains {}",
                    self.disk_path.display()
                ))
            })?;

        let total = disk.total_space();
        if total == 0 {
            return Err(Error::ResourceSample(format!(
                "disk at {} reports zero capacity",
                disk.mount_point().display()
            )));
        }
        let used = total.saturating_sub(disk.available_space());
        Ok(used as f32 / total as f32 * 100.0)
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&self) -> Result<ResourceSnapshot, Error> {
        let mut sys = System::new();
        let snapshot = ResourceSnapshot {
            cpu_percent: self.cpu_percent(&mut sys)?,
            memory_percent: self.memory_percent(&mut sys)?,
            disk_percent: self.disk_percent()?,
        };
        debug!("Sampled resources: {:?}", snapshot);
        Ok(snapshot)
    }
}

fn default_disk_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

/// Decides once per run whether system pressure justifies cleaning up.
pub struct ResourceGate {
    thresholds: ResourceThresholds,
    sampler: Box<dyn ResourceSampler>,
}

impl ResourceGate {
    pub fn new(thresholds: ResourceThresholds, sampler: Box<dyn ResourceSampler>) -> Self {
        Self {
            thresholds,
            sampler,
        }
    }

    pub fn from_thresholds(thresholds: &ResourceThresholds) -> Self {
        Self::new(
            thresholds.clone(),
            Box::new(SysinfoSampler::from_thresholds(thresholds)),
        )
    }

    pub fn with_sampler(mut self, sampler: Box<dyn ResourceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Sample and decide. Sampling errors fail open.
    pub fn check(&self) -> GateDecision {
        if self.thresholds.always_run {
            info!("Resource check overridden by always_run");
            return GateDecision::Forced;
        }

        let decision = match self.sampler.sample() {
            Ok(snapshot) => evaluate(&self.thresholds, &snapshot),
            Err(e) => {
                warn!("Error checking resources: {}", e);
                GateDecision::SampleFailed(e.to_string())
            }
        };
        info!("Resource gate: {}", decision);
        decision
    }

    pub fn should_run(&self) -> bool {
        self.check().should_run()
    }
}

/// Pure threshold comparison: the first metric strictly above its threshold wins.
pub fn evaluate(thresholds: &ResourceThresholds, snapshot: &ResourceSnapshot) -> GateDecision {
    let checks = [
        (Metric::Cpu, snapshot.cpu_percent, thresholds.cpu_usage_percent),
        (
            Metric::Memory,
            snapshot.memory_percent,
            thresholds.memory_usage_percent,
        ),
        (
            Metric::Disk,
            snapshot.disk_percent,
            thresholds.disk_usage_percent,
        ),
    ];

    checks
        .iter()
        .find(|(_, value, threshold)| value > threshold)
        .map(|&(metric, value, threshold)| GateDecision::Exceeded {
            metric,
            value,
            threshold,
        })
        .unwrap_or(GateDecision::WithinLimits(*snapshot))
}
