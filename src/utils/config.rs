//! Application configuration constants.
//! Engine defaults and checksum-tool tuning in one place.

use std::sync::OnceLock;
use std::time::Duration;

use super::fd_limit::max_workers_by_fd_limit;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    /// Per-directory settings file, e.g. `.conveyor.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Engine ----

pub struct EngineConsts;

impl EngineConsts {
    /// Capacity of every node port a pipeline allocates unless told otherwise.
    pub const DEFAULT_PORT_CAPACITY: usize = 100;
    /// How often a stopping pipeline re-checks whether its node ports are empty.
    pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(2);
}

// ---- Worker threads ----

/// Parallelism limits for the hasher node.
/// Use [`WorkerLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerLimits {
    /// Available threads (from rayon); set by [`WorkerLimits::current()`].
    pub all_threads: usize,
    /// Used when the thread count cannot be determined.
    pub default_parallelism: usize,
    pub floor: usize,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            default_parallelism: Self::DEFAULT_PARALLELISM,
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerLimits {
    pub const DEFAULT_PARALLELISM: usize = 10;
    pub const FLOOR_THREADS: usize = 1;

    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Hasher parallelism: `requested` or the available thread count, capped by the FD limit.
    pub fn hasher_parallelism(&self, requested: Option<usize>) -> usize {
        let wanted = requested.unwrap_or(match self.all_threads {
            0 => self.default_parallelism,
            n => n,
        });
        let capped = match max_workers_by_fd_limit() {
            Some(fd_cap) if fd_cap < wanted => {
                log::debug!("Capping hasher workers {} -> {} (FD limit ~80%)", wanted, fd_cap);
                fd_cap
            }
            _ => wanted,
        };
        capped.max(self.floor)
    }
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}
