//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted part size in bytes. The final part of an object may
    /// be shorter; no part may be larger.
    #[serde(default = "default_max_part_size")]
    pub max_part_size: u64,
    /// Per-request deadline for chunked uploads, in seconds. Long by design
    /// so large parts survive slow links.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    /// Per-request deadline for sync and read requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Download throughput ceiling in bytes per second. 0 disables shaping.
    /// Thumbnails are exempt.
    #[serde(default)]
    pub download_rate_limit: u64,
    /// Maximum version gap tolerated before a delta is refused and a full
    /// resync forced instead.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold: i64,
    /// Force every sync request into the reset path (operator escape hatch
    /// after a catalog restore).
    #[serde(default)]
    pub force_resync: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_part_size() -> u64 {
    crate::DEFAULT_MAX_PART_SIZE
}

fn default_upload_timeout_secs() -> u64 {
    600 // 10 minutes
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_staleness_threshold() -> i64 {
    crate::DEFAULT_STALENESS_THRESHOLD
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_part_size: default_max_part_size(),
            upload_timeout_secs: default_upload_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            download_rate_limit: 0,
            staleness_threshold: default_staleness_threshold(),
            force_resync: false,
        }
    }
}

impl ServerConfig {
    /// Upload deadline as a Duration.
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Sync/read deadline as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration invariants. Returns human-readable warnings
    /// for suspicious but workable settings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.max_part_size == 0 {
            return Err("max_part_size must be greater than zero".to_string());
        }
        if self.staleness_threshold <= 0 {
            return Err("staleness_threshold must be positive".to_string());
        }
        if self.upload_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }

        if self.download_rate_limit > 0 && self.download_rate_limit < 64 * 1024 {
            warnings.push(format!(
                "download_rate_limit of {} B/s is very low; large reads will be extremely slow",
                self.download_rate_limit
            ));
        }
        if self.force_resync {
            warnings.push(
                "force_resync is set: every client will discard its mirror on next sync"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

/// Blob storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for part blobs.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

/// Catalog store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/catalog.db"),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Test configuration with relative paths under the current directory.
    ///
    /// **For testing only.** Integration tests override the paths with a
    /// tempdir before building state.
    pub fn for_testing() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.max_part_size, crate::DEFAULT_MAX_PART_SIZE);
    }

    #[test]
    fn test_zero_part_size_rejected() {
        let config = ServerConfig {
            max_part_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_rate_limit_warns() {
        let config = ServerConfig {
            download_rate_limit: 1024,
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_toml_partial_override() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"
            download_rate_limit = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.download_rate_limit, 1048576);
        assert_eq!(config.server.staleness_threshold, 1000);
    }
}
