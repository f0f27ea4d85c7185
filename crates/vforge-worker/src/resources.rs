//! Host resource probing for batch sizing.
//!
//! The usable vCPU count is taken from the first source that answers:
//! an explicit override, the cgroup v2 `cpu.max` quota, the cgroup v1 CFS
//! quota, and finally the OS logical core count. Animation is CPU-bound per
//! task, so the batch size is 1.5x the vCPU count to overlap the download
//! and upload waits.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable carrying an explicit vCPU count.
pub const CPU_COUNT_ENV: &str = "VFORGE_CPU_COUNT";

/// Default cgroup mount point.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Batch size when no source can be read at all.
pub const DEFAULT_PARALLELISM: usize = 4;

pub const MIN_PARALLELISM: usize = 2;
pub const MAX_PARALLELISM: usize = 16;

/// Where vCPU information is read from.
#[derive(Debug, Clone)]
pub struct CpuSources {
    /// Raw override value, usually from [`CPU_COUNT_ENV`]
    pub cpu_override: Option<String>,
    /// Root of the cgroup filesystem
    pub cgroup_root: PathBuf,
    /// Whether to fall back to the OS-reported core count
    pub use_os_count: bool,
}

impl Default for CpuSources {
    fn default() -> Self {
        Self {
            cpu_override: None,
            cgroup_root: PathBuf::from(CGROUP_ROOT),
            use_os_count: true,
        }
    }
}

impl CpuSources {
    pub fn from_env() -> Self {
        Self {
            cpu_override: std::env::var(CPU_COUNT_ENV).ok(),
            ..Default::default()
        }
    }
}

/// Concurrency for the batch scheduler on this host.
pub fn compute_parallelism() -> usize {
    compute_parallelism_with(&CpuSources::from_env())
}

/// Concurrency for the batch scheduler from explicit sources.
pub fn compute_parallelism_with(sources: &CpuSources) -> usize {
    let Some((vcpus, method)) = detect_vcpus(sources) else {
        warn!(
            parallelism = DEFAULT_PARALLELISM,
            "Could not detect vCPU count, using default parallelism"
        );
        return DEFAULT_PARALLELISM;
    };

    let parallelism = scale_and_clamp(vcpus);
    info!(vcpus, method, parallelism, "Computed batch parallelism");
    parallelism
}

/// `floor(vcpus * 1.5)` clamped to `[MIN_PARALLELISM, MAX_PARALLELISM]`.
pub fn scale_and_clamp(vcpus: i64) -> usize {
    let scaled = vcpus.saturating_mul(3) / 2;
    scaled.clamp(MIN_PARALLELISM as i64, MAX_PARALLELISM as i64) as usize
}

fn detect_vcpus(sources: &CpuSources) -> Option<(i64, &'static str)> {
    if let Some(raw) = sources.cpu_override.as_deref() {
        match raw.trim().parse::<i64>() {
            Ok(n) => return Some((n, "override")),
            Err(_) => warn!(value = raw, "Ignoring unparsable {}", CPU_COUNT_ENV),
        }
    }

    match read_cgroup_v2(&sources.cgroup_root) {
        Some(n) => return Some((n, "cgroup v2")),
        None => debug!("No cgroup v2 CPU quota"),
    }

    match read_cgroup_v1(&sources.cgroup_root) {
        Some(n) => return Some((n, "cgroup v1")),
        None => debug!("No cgroup v1 CPU quota"),
    }

    if sources.use_os_count {
        if let Ok(n) = std::thread::available_parallelism() {
            let n = n.get() as i64;
            warn!(
                vcpus = n,
                "Using OS core count, which may not reflect container limits"
            );
            return Some((n, "os"));
        }
    }

    None
}

/// `cpu.max` holds `"<quota> <period>"`; a quota of `max` means no limit.
fn read_cgroup_v2(root: &Path) -> Option<i64> {
    let content = std::fs::read_to_string(root.join("cpu.max")).ok()?;
    let mut parts = content.split_whitespace();
    let quota = parts.next()?;
    let period = parts.next()?;
    if quota == "max" {
        return None;
    }
    let quota: i64 = quota.parse().ok()?;
    let period: i64 = period.parse().ok()?;
    (quota > 0 && period > 0).then(|| quota / period)
}

/// A quota of `-1` means no limit.
fn read_cgroup_v1(root: &Path) -> Option<i64> {
    let read = |name: &str| -> Option<i64> {
        std::fs::read_to_string(root.join("cpu").join(name))
            .ok()?
            .trim()
            .parse()
            .ok()
    };
    let quota = read("cpu.cfs_quota_us")?;
    let period = read("cpu.cfs_period_us")?;
    (quota > 0 && period > 0).then(|| quota / period)
}
