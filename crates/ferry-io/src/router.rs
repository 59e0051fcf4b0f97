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

//! Picks a transport by URL scheme, and builds the transport stack from config.

use crate::cache::DiskCache;
use crate::config::DistributionConfig;
use crate::file::FileTransport;
use crate::http::HttpTransport;
use async_trait::async_trait;
use ferry_core::{FetchRequest, TransferProgress, Transport, TransportError};
use std::sync::Arc;

/// Routes `http://` and `https://` requests to the HTTP transport and
/// everything else to the filesystem transport.
#[derive(Debug, Clone)]
pub struct SchemeRouter {
    http: HttpTransport,
    file: FileTransport,
}

impl SchemeRouter {
    /// Creates a router from its two transports.
    pub fn new(http: HttpTransport, file: FileTransport) -> Self {
        Self { http, file }
    }

    /// Builds the transport stack described by `config`: the scheme router,
    /// wrapped in a [`DiskCache`] when `cache_dir` is set.
    pub fn from_config(config: &DistributionConfig) -> Result<Arc<dyn Transport>, TransportError> {
        let router = Self::new(
            HttpTransport::new(config.request_timeout())?,
            FileTransport::new(),
        );
        Ok(match &config.cache_dir {
            Some(dir) => {
                log::info!("Payload cache enabled at '{}'", dir.display());
                Arc::new(DiskCache::new(router, dir.clone()))
            }
            None => Arc::new(router),
        })
    }

    fn is_http(url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

#[async_trait]
impl Transport for SchemeRouter {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError> {
        if Self::is_http(&request.url) {
            self.http.fetch(request, progress).await
        } else {
            self.file.fetch(request, progress).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_http_schemes() {
        assert!(SchemeRouter::is_http("https://cdn/x"));
        assert!(SchemeRouter::is_http("HTTP://cdn/x"));
        assert!(!SchemeRouter::is_http("file:///srv/x"));
        assert!(!SchemeRouter::is_http("content/x"));
    }

    #[tokio::test]
    async fn routes_paths_to_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Linux"), b"{}").unwrap();
        let config = DistributionConfig {
            content_root: dir.path().display().to_string(),
            platform: Some("Linux".into()),
            ..Default::default()
        };
        let transport = SchemeRouter::from_config(&config).unwrap();
        let bytes = transport
            .fetch(
                &FetchRequest::new(config.locator().manifest_url()),
                &TransferProgress::new(),
            )
            .await
            .unwrap();
        assert_eq!(bytes, b"{}");
    }
}
