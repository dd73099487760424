//! # Runtime Configuration Module
//!
//! Two sources of configuration:
//!
//! - [`RuntimeConfig`] reads the coroutine runtime settings from environment variables
//! - [`ServerOptions`] describes the transport-side request handling options and is
//!   loaded from a YAML or JSON file
//!
//! ## Environment Variables
//!
//! ### `RESTMAP_STACK_SIZE`
//!
//! Stack size for blocking worker coroutines. Accepts decimal (`65536`) or hexadecimal
//! (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `RESTMAP_BLOCKING_WORKERS`
//!
//! Coroutines serving unordered blocking invocations. Default: `4`.
//!
//! ### `RESTMAP_ORDERED_LANES`
//!
//! Single-coroutine lanes for ordered blocking invocations. Default: `4`.
//!
//! ## Example Options File
//!
//! ```yaml
//! uploadPath: /var/tmp/uploads
//! bodyLimit: 1048576
//! deleteUploadedFilesOnEnd: true
//! mergeFormAttributes: false
//! ```

use crate::worker_pool::WorkerPoolConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Parse a size given in decimal or `0x`-prefixed hexadecimal.
#[must_use]
pub fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for worker coroutines in bytes
    pub stack_size: usize,
    /// Workers on the shared blocking queue
    pub blocking_workers: usize,
    /// Ordered blocking lanes
    pub ordered_lanes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            blocking_workers: 4,
            ordered_lanes: 4,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let stack_size = env::var("RESTMAP_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .unwrap_or(defaults.stack_size);
        let blocking_workers = env::var("RESTMAP_BLOCKING_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.blocking_workers);
        let ordered_lanes = env::var("RESTMAP_ORDERED_LANES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ordered_lanes);
        Self {
            stack_size,
            blocking_workers,
            ordered_lanes,
        }
    }

    /// Worker pool settings derived from this configuration.
    #[must_use]
    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.blocking_workers, self.ordered_lanes, self.stack_size)
    }
}

/// Request handling options applied by the router before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerOptions {
    /// Directory the body layer stores uploads in; only files below it are cleaned up
    pub upload_path: String,
    /// Maximum body size in bytes; zero or negative means unlimited
    pub body_limit: i64,
    /// Remove uploaded files once the response has ended
    pub delete_uploaded_files_on_end: bool,
    /// Expose form attributes as query parameters too
    pub merge_form_attributes: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            upload_path: "file-uploads".to_string(),
            body_limit: 0,
            delete_uploaded_files_on_end: true,
            merge_form_attributes: false,
        }
    }
}

impl ServerOptions {
    /// Load options from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read server options {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let options = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML in {}", path.display()))?
        };
        Ok(options)
    }

    /// True when `len` bytes exceed the configured limit.
    #[must_use]
    pub fn exceeds_body_limit(&self, len: usize) -> bool {
        self.body_limit > 0 && len as u64 > self.body_limit as u64
    }

    /// True when `file` lies inside [`upload_path`](Self::upload_path).
    #[must_use]
    pub fn owns_upload(&self, file: &Path) -> bool {
        file.starts_with(&self.upload_path)
    }
}
