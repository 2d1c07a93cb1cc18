//! Repository configuration.
//!
//! Read from `<repo>/hvcs.toml` when present. Every field has a default, so
//! a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hvcs_compress::{level_range, EngineConfig};
use hvcs_state::StateConfig;
use hvcs_store::StoreConfig;
use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

pub const CONFIG_FILE: &str = "hvcs.toml";

/// Environment variable naming the repository directory.
pub const REPO_DIR_ENV: &str = "HYBRID_VCS";

pub const DEFAULT_REPO_DIR: &str = "./hybrid_repo";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub zstd_level: i32,
    /// Bytes.
    pub max_state_size: u64,
    /// Bytes.
    pub max_blob_size: u64,
    /// Compression workers and state connections.
    pub max_workers: usize,
    /// Blobs shorter than this are stored uncompressed.
    pub min_compress_size: usize,
    /// Blobs at or above this size compress on the worker pool.
    pub streaming_threshold: usize,
    pub bucket_prefix_len: usize,
    /// Ingestion retries after losing a commit race.
    pub max_commit_retries: u32,
    pub pool_acquire_timeout_ms: u64,
    pub busy_retries: u32,
    pub default_branch: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            zstd_level: 6,
            max_state_size: 100 * 1024 * 1024,
            max_blob_size: 100 * 1024 * 1024,
            max_workers: 4,
            min_compress_size: 64,
            streaming_threshold: 1024 * 1024,
            bucket_prefix_len: 2,
            max_commit_retries: 5,
            pool_acquire_timeout_ms: 10_000,
            busy_retries: 5,
            default_branch: "main".into(),
        }
    }
}

impl RepoConfig {
    /// Load `<repo_dir>/hvcs.toml`, or defaults if the file is absent.
    pub fn load(repo_dir: &Path) -> SdkResult<Self> {
        let path = repo_dir.join(CONFIG_FILE);
        let config = match fs::read_to_string(&path) {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// `$HYBRID_VCS`, falling back to `./hybrid_repo`.
    pub fn repo_dir_from_env() -> PathBuf {
        std::env::var_os(REPO_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPO_DIR))
    }

    pub fn validate(&self) -> SdkResult<()> {
        let levels = level_range();
        if !levels.contains(&self.zstd_level) {
            return Err(SdkError::Config(format!(
                "zstd_level {} outside {}..={}",
                self.zstd_level,
                levels.start(),
                levels.end()
            )));
        }
        if self.max_workers == 0 {
            return Err(SdkError::Config("max_workers must be at least 1".into()));
        }
        if self.bucket_prefix_len == 0 || self.bucket_prefix_len > ObjectId::HEX_LEN {
            return Err(SdkError::Config(format!(
                "bucket_prefix_len must be 1..={}",
                ObjectId::HEX_LEN
            )));
        }
        hvcs_refs::validate_branch_name(&self.default_branch)
            .map_err(|e| SdkError::Config(format!("default_branch: {e}")))?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            level: self.zstd_level,
            max_workers: self.max_workers,
            streaming_threshold: self.streaming_threshold,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            min_compress_size: self.min_compress_size,
            max_blob_size: self.max_blob_size,
            bucket_prefix_len: self.bucket_prefix_len,
            engine: self.engine_config(),
        }
    }

    pub fn state_config(&self) -> StateConfig {
        let mut config = StateConfig::default().with_pool(
            self.max_workers,
            Duration::from_millis(self.pool_acquire_timeout_ms),
            self.busy_retries,
        );
        config.max_state_size = self.max_state_size;
        config
    }
}
