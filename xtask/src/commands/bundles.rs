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

use crate::commands::bundles_config::{BundleDefinition, BundlesConfig};
use crate::helpers::*;
use anyhow::{Context, Result};
use ferry_core::manifest::ManifestDocument;
use ferry_core::Manifest;
use ferry_io::archive::read_archive;
use ferry_io::{content_hash_of, ArchiveBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn pack(config_path: &Path) -> Result<()> {
    print_task_start("Packing Bundles", PACKAGE, MAGENTA);

    let config = load_config(config_path)?;
    if config.bundles.is_empty() {
        print_error("No [[bundle]] tables defined. Nothing to pack.");
        return Ok(());
    }

    let manifest = pack_all(&config)?;
    print_success(&format!(
        "Packed {} bundle(s) into '{}'",
        manifest.len(),
        config.output.display()
    ));
    Ok(())
}

pub fn verify(config_path: &Path) -> Result<()> {
    print_task_start("Verifying Bundles", MAGNIFIER, CYAN);

    let config = load_config(config_path)?;
    let checked = verify_all(&config.output, &config.platform())?;
    print_success(&format!("{checked} bundle(s) match their manifest"));
    Ok(())
}

fn load_config(path: &Path) -> Result<BundlesConfig> {
    let base = path.parent().unwrap_or(Path::new("."));
    print_info(&format!("Loading '{}'", path.display()));
    Ok(BundlesConfig::load(path)?.rebase(base))
}

/// Builds every archive, then writes the manifest once all of them are on disk.
fn pack_all(config: &BundlesConfig) -> Result<Manifest> {
    fs::create_dir_all(&config.output)?;

    let mut document = ManifestDocument::default();
    for bundle in &config.bundles {
        let archive = pack_bundle(bundle, &config.source)?;
        let hash = content_hash_of(&archive);

        let dest = config.output.join(&bundle.name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &archive)
            .with_context(|| format!("Failed to write bundle '{}'", dest.display()))?;
        println!(
            "{}{} {} {}{} {} ({:.2} KB)",
            BOLD,
            GREEN,
            CHECK,
            bundle.name,
            RESET,
            hash,
            archive.len() as f64 / 1024.0
        );

        document.insert(&bundle.name, hash, &bundle.dependencies);
    }

    let manifest = Manifest::from_document(document)?;
    let manifest_path = config.output.join(config.platform());
    fs::write(&manifest_path, manifest.to_json()?)
        .with_context(|| format!("Failed to write manifest '{}'", manifest_path.display()))?;
    print_info(&format!("Manifest written to '{}'", manifest_path.display()));
    Ok(manifest)
}

/// Packs every file under the bundle's source folder. Asset names are paths
/// relative to that folder, with `/` separators.
fn pack_bundle(bundle: &BundleDefinition, source: &Path) -> Result<Vec<u8>> {
    let dir = bundle.source_dir(source);
    if !dir.is_dir() {
        anyhow::bail!(
            "Source folder '{}' for bundle '{}' does not exist",
            dir.display(),
            bundle.name
        );
    }

    let mut builder = ArchiveBuilder::new();
    for path in find_files(&dir)? {
        let name = asset_name(&dir, &path)?;
        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read '{}'", path.display()))?;
        builder.add(name, bytes)?;
    }
    if builder.is_empty() {
        print_error(&format!("Bundle '{}' has no assets", bundle.name));
    }
    Ok(builder.finish()?)
}

fn find_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn asset_name(dir: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(dir)?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str().context("Invalid path encoding"))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// Re-hashes and decodes every bundle the manifest in `output` lists.
fn verify_all(output: &Path, platform: &str) -> Result<usize> {
    let manifest_path = output.join(platform);
    let bytes = fs::read(&manifest_path)
        .with_context(|| format!("Failed to read manifest '{}'", manifest_path.display()))?;
    let manifest = Manifest::from_json(&bytes)?;

    let mut failures = Vec::new();
    for name in manifest.bundle_names() {
        let path = output.join(name);
        let payload =
            fs::read(&path).with_context(|| format!("Failed to read '{}'", path.display()))?;
        let actual = content_hash_of(&payload);
        let expected = manifest.hash_of(name)?;
        if &actual != expected {
            print_error(&format!("{name}: expected {expected}, got {actual}"));
            failures.push(name.to_string());
            continue;
        }
        match read_archive(&payload) {
            Ok(assets) => println!(
                "{}{} {} {}{} ({} assets)",
                BOLD,
                GREEN,
                CHECK,
                name,
                RESET,
                assets.len()
            ),
            Err(e) => {
                print_error(&format!("{name}: {e}"));
                failures.push(name.to_string());
            }
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("{} bundle(s) failed verification: {}", failures.len(), failures.join(", "));
    }
    Ok(manifest.len())
}
