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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The structure of the `Bundles.toml` file.
#[derive(Deserialize, Debug)]
pub struct BundlesConfig {
    /// Directory holding one source folder per bundle.
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Directory the archives and the manifest are written to.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Platform folder name; the manifest is written under this name.
    pub platform: Option<String>,
    /// Bundle definitions.
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleDefinition>,
}

/// One `[[bundle]]` table.
#[derive(Deserialize, Debug, Clone)]
pub struct BundleDefinition {
    /// Bundle name in the manifest, e.g. `level1/env`.
    pub name: String,
    /// Source folder relative to `source`. Defaults to the bundle name.
    pub dir: Option<PathBuf>,
    /// Direct dependencies, in load order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_source() -> PathBuf {
    PathBuf::from("content")
}

fn default_output() -> PathBuf {
    PathBuf::from(".dist/bundles")
}

impl BundlesConfig {
    /// Reads and parses a `Bundles.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read bundle config at '{}'", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| ferry_io::config::platform_name().to_string())
    }

    /// Resolves every relative path against `base`, the config file's folder.
    pub fn rebase(mut self, base: &Path) -> Self {
        self.source = base.join(&self.source);
        self.output = base.join(&self.output);
        self
    }
}

impl BundleDefinition {
    pub fn source_dir(&self, source: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) => source.join(dir),
            None => source.join(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_tables_parse_with_defaults() {
        let config = BundlesConfig::parse(
            r#"
            platform = "Linux"

            [[bundle]]
            name = "level1/shared"

            [[bundle]]
            name = "level1/env"
            dir = "env"
            dependencies = ["level1/shared"]
            "#,
        )
        .unwrap();

        assert_eq!(config.source, PathBuf::from("content"));
        assert_eq!(config.output, PathBuf::from(".dist/bundles"));
        assert_eq!(config.platform(), "Linux");
        assert_eq!(config.bundles.len(), 2);
        assert_eq!(
            config.bundles[0].source_dir(Path::new("src")),
            Path::new("src/level1/shared")
        );
        assert_eq!(config.bundles[1].source_dir(Path::new("src")), Path::new("src/env"));
        assert_eq!(config.bundles[1].dependencies, vec!["level1/shared"]);
    }
}
