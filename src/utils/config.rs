//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package names (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    stage_thread_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                stage_thread_prefix: format!("{pkg}-stage"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// CLI config file looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Thread name for streaming stage `id`.
    pub fn stage_thread_name(&self, id: usize) -> String {
        format!("{}-{id}", self.stage_thread_prefix)
    }
}

// ---- Streaming ----

/// Channel and buffer sizes for streaming stages.
pub struct StreamingConsts;

impl StreamingConsts {
    /// Chunks buffered between two streaming stages before the writer blocks.
    pub const CHANNEL_CAP: usize = 64;
    /// Read buffer for subprocess output and bulk copies (bytes). 32 KB.
    pub const READ_CHUNK_SIZE: usize = 32 * 1024;
    /// How often a stage blocked on an empty channel re-checks the chain error.
    pub const ERROR_POLL_INTERVAL: Duration = Duration::from_millis(50);
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

// ---- Templates ----

/// Placeholder replaced by the current line in `exec_for_each`.
pub const LINE_PLACEHOLDER: &str = "{{.}}";
/// Placeholder replaced by the accumulator in `exec_reduce`.
pub const FIRST_PLACEHOLDER: &str = "{{.First}}";
/// Placeholder replaced by the current line in `exec_reduce`.
pub const SECOND_PLACEHOLDER: &str = "{{.Second}}";
