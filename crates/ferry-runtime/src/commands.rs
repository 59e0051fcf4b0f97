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

use crate::cli::Unit;
use anyhow::{Context, Result};
use ferry_agents::DistributionCoordinator;
use ferry_core::SizeUnit;
use ferry_io::AssetBytes;
use std::io::Write;
use std::path::Path;

pub async fn manifest(coordinator: &DistributionCoordinator) -> Result<()> {
    let manifest = coordinator
        .wait_manifest()
        .await
        .with_context(|| {
            format!(
                "Failed to load manifest from '{}'",
                coordinator.locator().manifest_url()
            )
        })?;

    println!("manifest v{} ({} bundles)", manifest.version(), manifest.len());
    for name in manifest.bundle_names() {
        let hash = manifest.hash_of(name)?;
        let closure = manifest.all_dependencies(name)?;
        if closure.is_empty() {
            println!("  {name}  {hash}");
        } else {
            println!("  {name}  {hash}  <- {}", closure.join(", "));
        }
    }
    Ok(())
}

pub async fn download_all(
    coordinator: &DistributionCoordinator,
    unit: Unit,
    json: bool,
) -> Result<()> {
    let mut progress = coordinator.subscribe_progress();
    let size_unit = SizeUnit::from(unit);
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            log::info!(
                "{:>3}%  {:.1} / {:.1} {}  ({} active, {} failed)",
                snapshot.percent(),
                size_unit.convert(snapshot.downloaded_bytes),
                size_unit.convert(snapshot.content_bytes),
                unit.suffix(),
                snapshot.active,
                snapshot.failed
            );
        }
    });

    let result = coordinator.bulk_download().await;
    printer.abort();

    let report = result.context("Bulk download failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
        return Ok(());
    }
    println!(
        "Downloaded {} bundle(s), {:.2} {}",
        report.bundles.len(),
        coordinator.downloaded_size(size_unit),
        unit.suffix()
    );
    Ok(())
}

pub async fn load(
    coordinator: &DistributionCoordinator,
    group: &str,
    bundles: &[String],
) -> Result<()> {
    for bundle in bundles {
        coordinator
            .load(group, bundle)
            .await
            .with_context(|| format!("Failed to load '{bundle}' into group '{group}'"))?;
    }

    let manifest = coordinator.wait_manifest().await?;
    for bundle in coordinator.loaded_bundles(group)? {
        println!("{bundle}  {}", manifest.hash_of(&bundle)?);
        for asset in coordinator.asset_names(group, &bundle)? {
            println!("  {asset}");
        }
    }
    Ok(())
}

pub async fn extract(
    coordinator: &DistributionCoordinator,
    bundle: &str,
    asset: &str,
    out: Option<&Path>,
) -> Result<()> {
    const GROUP: &str = "extract";

    coordinator
        .load(GROUP, bundle)
        .await
        .with_context(|| format!("Failed to load '{bundle}'"))?;
    let handle = coordinator.get_asset(GROUP, bundle, asset, false)?;
    let bytes = handle
        .get::<AssetBytes>()
        .with_context(|| format!("Asset '{asset}' is not a byte asset"))?;

    match out {
        Some(path) => {
            std::fs::write(path, bytes.as_bytes())
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            log::info!("Wrote {} bytes to '{}'", bytes.len(), path.display());
        }
        None => std::io::stdout().write_all(bytes.as_bytes())?,
    }
    Ok(())
}
