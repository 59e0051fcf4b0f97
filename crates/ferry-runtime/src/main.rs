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

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use ferry_agents::DistributionCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper_util", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();
    let config = cli.source.resolve()?;
    let coordinator = DistributionCoordinator::from_config(&config)?;
    coordinator.start();

    let result = match &cli.command {
        Command::Manifest => commands::manifest(&coordinator).await,
        Command::DownloadAll { unit, json } => {
            commands::download_all(&coordinator, *unit, *json).await
        }
        Command::Load { group, bundles } => commands::load(&coordinator, group, bundles).await,
        Command::Extract { bundle, asset, out } => {
            commands::extract(&coordinator, bundle, asset, out.as_deref()).await
        }
    };

    if cli.metrics {
        println!("{}", coordinator.metrics().snapshot_json()?);
    }
    coordinator.shutdown();
    result
}
