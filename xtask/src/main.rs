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

// Build automation and content packing for Ferry
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for Ferry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build all crates in the workspace
    Build,
    /// Run all tests in the workspace
    Test,
    /// Run `cargo check` on all crates
    Check,
    /// Format all code in the workspace
    Format,
    /// Run clippy on all crates with warnings as errors
    Clippy,
    /// Run every CI task (build, test, check, format, clippy)
    All,
    /// Pack source directories into bundle archives plus a manifest
    Pack {
        /// Bundle definitions
        #[arg(long, default_value = "Bundles.toml")]
        config: PathBuf,
    },
    /// Check packed bundles against their manifest
    Verify {
        /// Bundle definitions
        #[arg(long, default_value = "Bundles.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build => commands::ci::build(),
        Commands::Test => commands::ci::test(),
        Commands::Check => commands::ci::check(),
        Commands::Format => commands::ci::format(),
        Commands::Clippy => commands::ci::clippy(),
        Commands::All => commands::ci::all(),
        Commands::Pack { config } => commands::bundles::pack(&config),
        Commands::Verify { config } => commands::bundles::verify(&config),
    }
}
