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

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry_core::SizeUnit;
use ferry_io::DistributionConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(about = "Fetch, verify and load content bundles")]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the metrics snapshot as JSON when done
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where content comes from. Flags override the config file, which overrides
/// `FERRY_CONTENT_ROOT` / `FERRY_PLATFORM`.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Content root: http(s) URL, file:// URL or directory
    #[arg(long)]
    pub root: Option<String>,

    /// Platform identifier (defaults to the current OS)
    #[arg(long)]
    pub platform: Option<String>,

    /// Payload cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the manifest: every bundle with its hash and dependencies
    Manifest,
    /// Download and verify every bundle of the manifest
    DownloadAll {
        /// Unit for the size report
        #[arg(long, value_enum, default_value_t = Unit::Kb)]
        unit: Unit,
        /// Print the final progress snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load bundles and their dependencies into a group, then list their assets
    Load {
        /// Group to load into
        #[arg(long, default_value = "default")]
        group: String,
        /// Bundles to load
        #[arg(required = true)]
        bundles: Vec<String>,
    },
    /// Write one asset of a bundle to a file or stdout
    Extract {
        /// Bundle holding the asset
        bundle: String,
        /// Asset name
        asset: String,
        /// Output file (stdout when absent)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Unit {
    B,
    Kb,
    Mb,
    Gb,
}

impl From<Unit> for SizeUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::B => SizeUnit::Byte,
            Unit::Kb => SizeUnit::KiloByte,
            Unit::Mb => SizeUnit::MegaByte,
            Unit::Gb => SizeUnit::GigaByte,
        }
    }
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::B => "B",
            Unit::Kb => "KB",
            Unit::Mb => "MB",
            Unit::Gb => "GB",
        }
    }
}

impl SourceArgs {
    pub fn resolve(&self) -> anyhow::Result<DistributionConfig> {
        let mut config = match &self.config {
            Some(path) => DistributionConfig::from_file(path)?,
            None => DistributionConfig::default(),
        }
        .with_env_overrides();

        if let Some(root) = &self.root {
            config.content_root = root.clone();
        }
        if let Some(platform) = &self.platform {
            config.platform = Some(platform.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
