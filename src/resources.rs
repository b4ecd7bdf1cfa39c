//! Resource precheck
//!
//! Samples CPU load, memory pressure and root filesystem usage before an
//! install run. Results are advisory: warnings are shown to the operator, who
//! decides whether to continue. Nothing is re-checked once the run starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use sysinfo::{Disks, System};
use tracing::debug;

/// One point-in-time utilization sample, all values in percent (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
}

/// Warning thresholds; a value strictly above its threshold warns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceThresholds {
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 80.0,
            disk: 90.0,
        }
    }
}

impl ResourceThresholds {
    /// Every threshold must be a percentage
    pub fn is_valid(&self) -> bool {
        [self.cpu, self.memory, self.disk]
            .iter()
            .all(|v| (0.0..=100.0).contains(v))
    }
}

/// Advisory condition found by the precheck
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceWarning {
    HighCpu(f32),
    LowMemory(f32),
    LowDisk(f32),
}

impl fmt::Display for ResourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighCpu(v) => write!(f, "High CPU usage detected ({:.0}%)", v),
            Self::LowMemory(v) => write!(f, "Low memory available ({:.0}% used)", v),
            Self::LowDisk(v) => write!(f, "Low disk space ({:.0}% used)", v),
        }
    }
}

/// Compare a sample against thresholds, in CPU, memory, disk order
pub fn evaluate(sample: &ResourceSample, thresholds: &ResourceThresholds) -> Vec<ResourceWarning> {
    let mut warnings = Vec::new();
    if sample.cpu_percent > thresholds.cpu {
        warnings.push(ResourceWarning::HighCpu(sample.cpu_percent));
    }
    if sample.memory_percent > thresholds.memory {
        warnings.push(ResourceWarning::LowMemory(sample.memory_percent));
    }
    if sample.disk_percent > thresholds.disk {
        warnings.push(ResourceWarning::LowDisk(sample.disk_percent));
    }
    warnings
}

/// Source of utilization samples
pub trait ResourceSampler {
    fn sample(&mut self) -> ResourceSample;
}

/// Samples the real host through `sysinfo`
pub struct SysinfoSampler {
    system: System,
    root: PathBuf,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            root: root_mount_point(),
        }
    }

    fn cpu_percent(&mut self) -> f32 {
        // Usage is a delta between two refreshes
        self.system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage()
    }

    fn memory_percent(&mut self) -> f32 {
        self.system.refresh_memory();
        percent(self.system.used_memory(), self.system.total_memory())
    }

    fn disk_percent(&self) -> f32 {
        let disks = Disks::new_with_refreshed_list();
        match disks.iter().find(|d| d.mount_point() == self.root.as_path()) {
            Some(disk) => percent(
                disk.total_space().saturating_sub(disk.available_space()),
                disk.total_space(),
            ),
            None => {
                debug!("No disk mounted at {:?}; reporting 0% usage", self.root);
                0.0
            }
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> ResourceSample {
        let sample = ResourceSample {
            cpu_percent: self.cpu_percent(),
            memory_percent: self.memory_percent(),
            disk_percent: self.disk_percent(),
        };
        debug!("Resource sample: {:?}", sample);
        sample
    }
}

/// A fixed sample, for tests and for skipping the real probe
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSampler(pub ResourceSample);

impl ResourceSampler for StaticSampler {
    fn sample(&mut self) -> ResourceSample {
        self.0
    }
}

#[cfg(unix)]
fn root_mount_point() -> PathBuf {
    PathBuf::from("/")
}

#[cfg(not(unix))]
fn root_mount_point() -> PathBuf {
    let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
    PathBuf::from(format!("{}\\", drive))
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}
