//! Worker configuration.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vforge_storage::StorageConfig;

use crate::resources::compute_parallelism;

/// RAM-backed scratch location, preferred when it has room.
pub const SHM_ROOT: &str = "/dev/shm";
pub const DISK_ROOT: &str = "/tmp";

/// Free space `/dev/shm` needs before it is used as the work root.
pub const MIN_SHM_FREE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the work and output directories
    pub work_root: PathBuf,
    /// Per-job scratch directories are created here
    pub work_dir: PathBuf,
    /// Copies of published outputs, kept only when `serve_output` is set
    pub output_dir: PathBuf,
    /// Fixed batch concurrency; probed from the host when unset
    pub batch_concurrency: Option<usize>,
    /// Port of the local output server
    pub http_port: u16,
    /// Whether to serve `output_dir` over HTTP
    pub serve_output: bool,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Never use the hardware encoder
    pub disable_gpu: bool,
    /// Object store defaults, narrowed per job
    pub storage: StorageConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::with_work_root(PathBuf::from(DISK_ROOT))
    }
}

impl WorkerConfig {
    /// Config rooted at `work_root`, with every other field at its default.
    pub fn with_work_root(work_root: impl Into<PathBuf>) -> Self {
        let work_root = work_root.into();
        Self {
            work_dir: work_root.join("work"),
            output_dir: work_root.join("output"),
            work_root,
            batch_concurrency: None,
            http_port: DEFAULT_HTTP_PORT,
            serve_output: false,
            ffmpeg_timeout_secs: None,
            disable_gpu: false,
            storage: StorageConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let work_root = std::env::var("VFORGE_WORK_ROOT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(resolve_work_root);

        Self {
            batch_concurrency: std::env::var("VFORGE_BATCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0),
            http_port: std::env::var("VFORGE_HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HTTP_PORT),
            serve_output: env_flag("VFORGE_SERVE_OUTPUT"),
            ffmpeg_timeout_secs: std::env::var("VFORGE_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0),
            disable_gpu: env_flag("VFORGE_DISABLE_GPU"),
            storage: StorageConfig::from_env(),
            ..Self::with_work_root(work_root)
        }
    }

    /// Create the work and output directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Concurrency for image batches.
    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency.unwrap_or_else(compute_parallelism)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// `/dev/shm` when it has at least 2 GiB free, otherwise `/tmp`.
fn resolve_work_root() -> PathBuf {
    match free_bytes(Path::new(SHM_ROOT)) {
        Some(free) if free >= MIN_SHM_FREE_BYTES => {
            info!(
                free_gb = free as f64 / 1024f64.powi(3),
                "Using RAM-backed work root {}", SHM_ROOT
            );
            PathBuf::from(SHM_ROOT)
        }
        Some(free) => {
            warn!(
                free_gb = free as f64 / 1024f64.powi(3),
                "{} has insufficient space, using {}", SHM_ROOT, DISK_ROOT
            );
            PathBuf::from(DISK_ROOT)
        }
        None => {
            info!("Using disk work root {}", DISK_ROOT);
            PathBuf::from(DISK_ROOT)
        }
    }
}

fn free_bytes(path: &Path) -> Option<u64> {
    if !path.is_dir() {
        return None;
    }
    let stats = nix::sys::statvfs::statvfs(path).ok()?;
    Some(stats.blocks_available() as u64 * stats.fragment_size() as u64)
}
