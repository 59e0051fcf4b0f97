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

//! Local filesystem transport, for `file://` content roots and plain paths.

use async_trait::async_trait;
use ferry_core::{FetchRequest, TransferProgress, Transport, TransportError};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads resources from the local filesystem in chunks, reporting progress.
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl FileTransport {
    /// Creates a filesystem transport.
    pub fn new() -> Self {
        Self
    }

    /// Maps a `file://` URL or a plain path to a filesystem path.
    pub fn path_of(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

fn io_error(url: &str, error: std::io::Error) -> TransportError {
    if error.kind() == ErrorKind::NotFound {
        TransportError::NotFound {
            url: url.to_string(),
        }
    } else {
        TransportError::Io {
            path: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError> {
        let url = request.url.as_str();
        let path = Self::path_of(url);

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| io_error(url, e))?;
        let len = file.metadata().await.map_err(|e| io_error(url, e))?.len();
        progress.set_expected(len);

        let mut body = Vec::with_capacity(len as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut chunk).await.map_err(|e| io_error(url, e))?;
            if read == 0 {
                break;
            }
            progress
                .advance(read as u64)
                .map_err(|e| TransportError::LengthExceeded {
                    url: url.to_string(),
                    expected: e.expected,
                    received: e.received,
                })?;
            body.extend_from_slice(&chunk[..read]);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_file_with_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level1_env");
        let payload = vec![7u8; CHUNK_SIZE * 2 + 10];
        std::fs::write(&path, &payload).unwrap();

        let progress = TransferProgress::new();
        let url = format!("file://{}", path.display());
        let bytes = FileTransport::new()
            .fetch(&FetchRequest::new(url), &progress)
            .await
            .unwrap();

        assert_eq!(bytes, payload);
        assert_eq!(progress.expected_bytes(), payload.len() as u64);
        assert_eq!(progress.received_bytes(), payload.len() as u64);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("nope").display().to_string();
        let err = FileTransport::new()
            .fetch(&FetchRequest::new(url.clone()), &TransferProgress::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotFound { url });
    }
}
