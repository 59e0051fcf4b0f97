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

//! HTTP(S) transport backed by `reqwest`.

use async_trait::async_trait;
use ferry_core::{FetchRequest, TransferProgress, Transport, TransportError};
use std::fmt;
use std::time::Duration;

/// Upper bound on the buffer reserved up front from a `Content-Length` header.
/// Larger bodies grow the buffer as chunks arrive.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// Stands in for the URL of errors raised before any request is made.
const CLIENT_RESOURCE: &str = "<client>";

/// Fetches resources over HTTP(S), streaming the body chunk by chunk so that
/// progress is visible while the download runs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(client_error)?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn client_error(error: impl fmt::Display) -> TransportError {
    TransportError::Network {
        url: CLIENT_RESOURCE.to_string(),
        message: format!("failed to build HTTP client: {error}"),
    }
}

fn map_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError> {
        let url = request.url.as_str();
        log::debug!("GET {url}");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_error(url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = match response.content_length() {
            Some(len) => {
                progress.set_expected(len);
                Vec::with_capacity(len.min(MAX_PREALLOC) as usize)
            }
            None => Vec::new(),
        };

        while let Some(chunk) = response.chunk().await.map_err(|e| map_error(url, e))? {
            progress
                .advance(chunk.len() as u64)
                .map_err(|e| TransportError::LengthExceeded {
                    url: url.to_string(),
                    expected: e.expected,
                    received: e.received,
                })?;
            body.extend_from_slice(&chunk);
        }

        log::trace!("GET {url} finished with {} bytes", body.len());
        Ok(body)
    }
}
