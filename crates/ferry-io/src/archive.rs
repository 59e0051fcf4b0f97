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

//! The bundle archive format: named entries, each LZ4-compressed, serialized
//! with `bincode`.

use ferry_core::bundle::AssetObject;
use ferry_core::{BundleFormat, RawBundle, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Leading bytes of every archive.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"FRYB";
/// Current archive layout version.
pub const ARCHIVE_VERSION: u32 = 1;

/// Errors raised while building or opening an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Serialization of the archive failed.
    #[error("failed to encode archive: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// The payload is not a valid archive encoding.
    #[error("failed to decode archive: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The payload does not start with the archive magic.
    #[error("not a bundle archive")]
    BadMagic,
    /// The archive was written by an incompatible version.
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),
    /// Two entries share a name.
    #[error("duplicate entry '{0}'")]
    DuplicateEntry(String),
    /// An entry failed to decompress to its recorded length.
    #[error("entry '{name}' is corrupt: {reason}")]
    Corrupt {
        /// The entry name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveEntry {
    name: String,
    raw_len: u64,
    data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleArchive {
    magic: [u8; 4],
    version: u32,
    entries: Vec<ArchiveEntry>,
}

/// The bytes of one asset stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBytes(Vec<u8>);

impl AssetBytes {
    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The bytes as UTF-8 text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for an empty asset.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds an archive from named assets.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset. Names must be unique within an archive.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<&mut Self, ArchiveError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        self.entries.insert(name, bytes);
        Ok(self)
    }

    /// Number of assets added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no asset was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compresses every entry and serializes the archive.
    pub fn finish(&self) -> Result<Vec<u8>, ArchiveError> {
        let entries = self
            .entries
            .iter()
            .map(|(name, bytes)| ArchiveEntry {
                name: name.clone(),
                raw_len: bytes.len() as u64,
                data: lz4_flex::block::compress(bytes),
            })
            .collect();
        let archive = BundleArchive {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            entries,
        };
        Ok(bincode::serde::encode_to_vec(
            &archive,
            bincode::config::standard(),
        )?)
    }
}

/// Decodes an archive payload into its assets.
pub fn read_archive(payload: &[u8]) -> Result<HashMap<String, AssetBytes>, ArchiveError> {
    if !payload.starts_with(&ARCHIVE_MAGIC) {
        return Err(ArchiveError::BadMagic);
    }
    let (archive, _): (BundleArchive, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    if archive.version != ARCHIVE_VERSION {
        return Err(ArchiveError::UnsupportedVersion(archive.version));
    }

    let mut assets = HashMap::with_capacity(archive.entries.len());
    for entry in archive.entries {
        let raw = lz4_flex::block::decompress(&entry.data, entry.raw_len as usize).map_err(
            |e| ArchiveError::Corrupt {
                name: entry.name.clone(),
                reason: e.to_string(),
            },
        )?;
        if raw.len() as u64 != entry.raw_len {
            return Err(ArchiveError::Corrupt {
                name: entry.name,
                reason: format!("expected {} bytes, got {}", entry.raw_len, raw.len()),
            });
        }
        if assets.contains_key(&entry.name) {
            return Err(ArchiveError::DuplicateEntry(entry.name));
        }
        assets.insert(entry.name, AssetBytes(raw));
    }
    Ok(assets)
}

/// A loaded archive. Every extraction of the same asset yields the same instance.
struct ArchiveBundle {
    assets: HashMap<String, Arc<AssetBytes>>,
}

impl RawBundle for ArchiveBundle {
    fn extract_asset(&self, name: &str) -> Option<AssetObject> {
        self.assets
            .get(name)
            .map(|asset| asset.clone() as AssetObject)
    }

    fn asset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assets.keys().cloned().collect();
        names.sort();
        names
    }

    fn release(&mut self, _immediate: bool) {
        self.assets.clear();
    }
}

/// Opens payloads written by [`ArchiveBuilder`]. Assets are exposed as
/// [`AssetBytes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveFormat;

impl BundleFormat for ArchiveFormat {
    fn open(&self, name: &str, payload: &[u8]) -> Result<Box<dyn RawBundle>, TransportError> {
        let assets = read_archive(payload).map_err(|e| TransportError::Decode {
            resource: name.to_string(),
            message: e.to_string(),
        })?;
        log::trace!("Opened archive '{name}' with {} asset(s)", assets.len());
        Ok(Box::new(ArchiveBundle {
            assets: assets
                .into_iter()
                .map(|(k, v)| (k, Arc::new(v)))
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut builder = ArchiveBuilder::new();
        builder
            .add("terrain.txt", b"grass grass grass grass".to_vec())
            .unwrap()
            .add("empty", Vec::new())
            .unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn opens_built_archive() {
        let bundle = ArchiveFormat.open("level1/env", &sample()).unwrap();
        assert_eq!(bundle.asset_names(), vec!["empty", "terrain.txt"]);

        let terrain = bundle.extract_asset("terrain.txt").unwrap();
        let terrain = terrain.downcast_ref::<AssetBytes>().unwrap();
        assert_eq!(terrain.as_str(), Some("grass grass grass grass"));
        assert!(bundle.extract_asset("missing").is_none());
    }

    #[test]
    fn extraction_returns_the_same_instance() {
        let bundle = ArchiveFormat.open("b", &sample()).unwrap();
        let a = bundle.extract_asset("terrain.txt").unwrap();
        let b = bundle.extract_asset("terrain.txt").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn release_drops_assets() {
        let mut bundle = ArchiveFormat.open("b", &sample()).unwrap();
        bundle.release(true);
        assert!(bundle.asset_names().is_empty());
        assert!(bundle.extract_asset("terrain.txt").is_none());
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let mut builder = ArchiveBuilder::new();
        builder.add("a", vec![1]).unwrap();
        assert!(matches!(
            builder.add("a", vec![2]),
            Err(ArchiveError::DuplicateEntry(name)) if name == "a"
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(read_archive(b"not an archive"), Err(ArchiveError::BadMagic)));

        let mut truncated = sample();
        truncated.truncate(8);
        assert!(read_archive(&truncated).is_err());

        let err = ArchiveFormat.open("b", b"junk").err().unwrap();
        assert!(matches!(err, TransportError::Decode { resource, .. } if resource == "b"));
    }
}
