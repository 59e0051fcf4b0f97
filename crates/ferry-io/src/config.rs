// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Distribution configuration and resource locations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`DistributionConfig::content_root`].
pub const ENV_CONTENT_ROOT: &str = "FERRY_CONTENT_ROOT";
/// Environment variable overriding [`DistributionConfig::platform`].
pub const ENV_PLATFORM: &str = "FERRY_PLATFORM";

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The configuration is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Runtime configuration of the distribution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Base location of the content: an `http(s)://` URL, a `file://` URL or a path.
    pub content_root: String,
    /// Platform identifier. Defaults to [`platform_name`] for the current target.
    pub platform: Option<String>,
    /// Name of the manifest resource under `content_root`. Defaults to the platform identifier.
    pub manifest_name: Option<String>,
    /// Bulk download polling tick, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-request timeout for the HTTP transport, in seconds.
    pub request_timeout_secs: u64,
    /// Directory for the content-addressed payload cache. Disabled when absent.
    pub cache_dir: Option<PathBuf>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            content_root: "content".to_string(),
            platform: None,
            manifest_name: None,
            poll_interval_ms: 16,
            request_timeout_secs: 30,
            cache_dir: None,
        }
    }
}

impl DistributionConfig {
    /// Parses a configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Applies `FERRY_CONTENT_ROOT` and `FERRY_PLATFORM` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ENV_CONTENT_ROOT) {
            log::debug!("{ENV_CONTENT_ROOT} overrides content root with '{root}'");
            self.content_root = root;
        }
        if let Ok(platform) = std::env::var(ENV_PLATFORM) {
            log::debug!("{ENV_PLATFORM} overrides platform with '{platform}'");
            self.platform = Some(platform);
        }
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_root.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "content_root",
                reason: "must not be empty".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The effective platform identifier.
    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| platform_name().to_string())
    }

    /// The bulk download polling tick.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves the resource locations for this configuration.
    pub fn locator(&self) -> ContentLocator {
        let platform = self.platform();
        let manifest_name = self.manifest_name.clone().unwrap_or_else(|| platform.clone());
        ContentLocator::new(&self.content_root, platform, manifest_name)
    }
}

/// The platform folder name for the current compilation target.
pub fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "OSX",
        "ios" => "iOS",
        "android" => "Android",
        "linux" => "Linux",
        other => other,
    }
}

/// Resolves where the manifest and each bundle live.
///
/// Resolved once per coordinator: the manifest is `{root}/{manifest_name}` and
/// each bundle is `{root}/{bundle_name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLocator {
    root: String,
    platform: String,
    manifest_name: String,
}

impl ContentLocator {
    /// Creates a locator. Trailing slashes of `root` are ignored.
    pub fn new(
        root: impl AsRef<str>,
        platform: impl Into<String>,
        manifest_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.as_ref().trim_end_matches('/').to_string(),
            platform: platform.into(),
            manifest_name: manifest_name.into(),
        }
    }

    /// The content root, without trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The platform identifier.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Location of the manifest resource.
    pub fn manifest_url(&self) -> String {
        format!("{}/{}", self.root, self.manifest_name)
    }

    /// Location of a bundle.
    pub fn bundle_url(&self, bundle: &str) -> String {
        format!("{}/{}", self.root, bundle.trim_start_matches('/'))
    }
}
