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

//! The seam between the distribution engine and the outside world.
//!
//! A [`Transport`] moves bytes; a [`BundleFormat`] turns a validated payload
//! into a [`RawBundle`]. The engine never depends on how either works, only on
//! these contracts. Concrete implementations live in `ferry-io`.

use crate::bundle::{ContentHash, RawBundle};
use crate::progress::TransferProgress;
use async_trait::async_trait;
use thiserror::Error;

/// A request for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Where the resource lives (`http(s)://...`, `file://...` or a plain path).
    pub url: String,
    /// The hash the payload is expected to have, when known.
    ///
    /// Transports may use it as a cache key. Validation stays the caller's job.
    pub expected_hash: Option<ContentHash>,
}

impl FetchRequest {
    /// A request with no expected hash (e.g. the manifest itself).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected_hash: None,
        }
    }

    /// A request for a content-addressed resource.
    pub fn with_hash(url: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            url: url.into(),
            expected_hash: Some(hash),
        }
    }
}

/// Failures reported by transports and bundle formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection failed or was interrupted.
    #[error("network error fetching '{url}': {message}")]
    Network {
        /// The requested location.
        url: String,
        /// The underlying error message.
        message: String,
    },
    /// The server answered with a non-success status.
    #[error("'{url}' answered with status {status}")]
    Status {
        /// The requested location.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// The request timed out.
    #[error("request for '{url}' timed out")]
    Timeout {
        /// The requested location.
        url: String,
    },
    /// The resource does not exist.
    #[error("resource '{url}' not found")]
    NotFound {
        /// The requested location.
        url: String,
    },
    /// More bytes arrived than announced.
    #[error("'{url}' sent {received} bytes but announced {expected}")]
    LengthExceeded {
        /// The requested location.
        url: String,
        /// The announced length.
        expected: u64,
        /// The bytes received.
        received: u64,
    },
    /// A local I/O operation failed.
    #[error("I/O error on '{path}': {message}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying error message.
        message: String,
    },
    /// The payload could not be decoded.
    #[error("failed to decode '{resource}': {message}")]
    Decode {
        /// The resource being decoded.
        resource: String,
        /// Why decoding failed.
        message: String,
    },
}

/// Moves the bytes of one resource, reporting progress as they arrive.
///
/// Implementations must call [`TransferProgress::set_expected`] as soon as the
/// length is known and [`TransferProgress::advance`] for every chunk. They must
/// not touch the progress state: success and failure are decided by the caller.
/// Timeouts are the transport's responsibility.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the resource described by `request`.
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Decodes a validated payload into a loaded raw bundle.
pub trait BundleFormat: Send + Sync {
    /// Opens the bundle called `name` from its payload bytes.
    fn open(&self, name: &str, payload: &[u8]) -> Result<Box<dyn RawBundle>, TransportError>;
}
