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

//! A content-addressed payload cache in front of another transport.

use crate::hash::content_hash_of;
use async_trait::async_trait;
use ferry_core::{ContentHash, FetchRequest, TransferProgress, Transport, TransportError};
use std::path::{Path, PathBuf};

/// Serves content-addressed requests from disk when it already holds a
/// payload with the requested hash, and stores payloads after a fetch
/// through the inner transport.
///
/// Only payloads whose computed hash equals the requested hash are stored or
/// served, so a hit is always a valid payload. Requests without an expected
/// hash (the manifest) always go to the inner transport. Cache I/O failures are
/// logged and never fail the fetch.
#[derive(Debug, Clone)]
pub struct DiskCache<T> {
    inner: T,
    dir: PathBuf,
}

impl<T: Transport> DiskCache<T> {
    /// Wraps `inner`, storing payloads under `dir`.
    pub fn new(inner: T, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a payload with `hash` is stored.
    ///
    /// Hashes are opaque, so anything that is not a plain file-name-safe token
    /// is stored under the BLAKE3 digest of the hash string instead.
    pub fn entry_path(&self, hash: &ContentHash) -> PathBuf {
        let raw = hash.as_str();
        let safe = !raw.is_empty()
            && raw.len() <= 128
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if safe {
            self.dir.join(raw)
        } else {
            self.dir
                .join(format!("h-{}", content_hash_of(raw.as_bytes())))
        }
    }

    async fn read_hit(&self, path: &Path, hash: &ContentHash) -> Option<Vec<u8>> {
        let bytes = tokio::fs::read(path).await.ok()?;
        if &content_hash_of(&bytes) == hash {
            return Some(bytes);
        }
        log::warn!(
            "Discarding corrupt cache entry '{}' for hash {hash}",
            path.display()
        );
        if let Err(e) = tokio::fs::remove_file(path).await {
            log::warn!("Failed to remove cache entry '{}': {e}", path.display());
        }
        None
    }

    async fn store(&self, path: &Path, payload: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, payload).await?;
        tokio::fs::rename(&partial, path).await
    }
}

#[async_trait]
impl<T: Transport> Transport for DiskCache<T> {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError> {
        let Some(hash) = &request.expected_hash else {
            return self.inner.fetch(request, progress).await;
        };

        let path = self.entry_path(hash);
        if let Some(bytes) = self.read_hit(&path, hash).await {
            log::debug!("Cache hit for '{}' ({hash})", request.url);
            progress.set_expected(bytes.len() as u64);
            progress
                .advance(bytes.len() as u64)
                .map_err(|e| TransportError::LengthExceeded {
                    url: request.url.clone(),
                    expected: e.expected,
                    received: e.received,
                })?;
            return Ok(bytes);
        }

        let bytes = self.inner.fetch(request, progress).await?;
        if &content_hash_of(&bytes) == hash {
            if let Err(e) = self.store(&path, &bytes).await {
                log::warn!("Failed to cache payload for '{}': {e}", request.url);
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    #[tokio::test]
    async fn second_fetch_is_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryTransport::new();
        memory.insert("mem://b", b"payload".to_vec());
        let cache = DiskCache::new(memory.clone(), dir.path());
        let request = FetchRequest::with_hash("mem://b", content_hash_of(b"payload"));

        let first = cache.fetch(&request, &TransferProgress::new()).await.unwrap();
        let progress = TransferProgress::new();
        let second = cache.fetch(&request, &progress).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(memory.fetch_count("mem://b"), 1);
        assert_eq!(progress.received_bytes(), 7);
    }

    #[tokio::test]
    async fn mismatching_payload_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryTransport::new();
        memory.insert("mem://b", b"tampered".to_vec());
        let cache = DiskCache::new(memory.clone(), dir.path());
        let request = FetchRequest::with_hash("mem://b", content_hash_of(b"payload"));

        cache.fetch(&request, &TransferProgress::new()).await.unwrap();
        cache.fetch(&request, &TransferProgress::new()).await.unwrap();

        assert_eq!(memory.fetch_count("mem://b"), 2);
        assert!(!cache.entry_path(&content_hash_of(b"payload")).exists());
    }

    #[tokio::test]
    async fn unhashed_requests_bypass_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryTransport::new();
        memory.insert("mem://manifest", b"{}".to_vec());
        let cache = DiskCache::new(memory.clone(), dir.path());
        let request = FetchRequest::new("mem://manifest");

        cache.fetch(&request, &TransferProgress::new()).await.unwrap();
        cache.fetch(&request, &TransferProgress::new()).await.unwrap();
        assert_eq!(memory.fetch_count("mem://manifest"), 2);
    }

    #[test]
    fn unsafe_hashes_are_rehashed_for_the_file_name() {
        let cache = DiskCache::new(MemoryTransport::new(), "/tmp/cache");
        let path = cache.entry_path(&ContentHash::new("../../etc/passwd"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/cache")));
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("h-")));
    }
}
