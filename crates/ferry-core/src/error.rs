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

//! Defines the error taxonomy of the distribution engine.

use crate::bundle::ContentHash;
use crate::transport::TransportError;
use thiserror::Error;

/// A convenient alias for results produced by the distribution engine.
pub type DistributionResult<T> = Result<T, DistributionError>;

/// Every failure the distribution engine reports.
///
/// All variants are `Clone` so that the outcome of a single in-flight fetch
/// can be handed to every task waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    /// The manifest has not been loaded yet.
    #[error("the manifest has not been loaded yet")]
    ManifestNotReady,

    /// The manifest fetch failed. The store stays not-ready until a new load is begun.
    #[error("manifest load failed: {cause}")]
    ManifestFailed {
        /// What went wrong while fetching or decoding the manifest.
        cause: Box<DistributionError>,
    },

    /// The manifest document was fetched but is not internally consistent.
    #[error("invalid manifest: {reason}")]
    InvalidManifest {
        /// What check the manifest failed.
        reason: String,
    },

    /// The bundle is not listed in the manifest.
    #[error("bundle '{bundle}' is not listed in the manifest")]
    UnknownBundle {
        /// The requested bundle name.
        bundle: String,
    },

    /// The transport failed to deliver a resource.
    #[error("transport error for '{resource}': {cause}")]
    Transport {
        /// The bundle name, or the manifest location.
        resource: String,
        /// The underlying transport failure.
        cause: TransportError,
    },

    /// The payload's computed hash differs from the one the manifest declares.
    #[error("hash mismatch for bundle '{bundle}': expected {expected}, got {actual}")]
    HashMismatch {
        /// The bundle name.
        bundle: String,
        /// The hash declared by the manifest.
        expected: ContentHash,
        /// The hash computed from the received payload.
        actual: ContentHash,
    },

    /// A fetcher's handle was requested but the fetch did not succeed.
    #[error("fetch of bundle '{bundle}' failed: {reason}")]
    FetchFailed {
        /// The bundle name.
        bundle: String,
        /// A description of the terminal state or failure.
        reason: String,
    },

    /// A bundle of a dependency closure failed to load.
    #[error("failed to load bundle '{bundle}': {cause}")]
    DependencyLoadFailed {
        /// The bundle of the closure that failed.
        bundle: String,
        /// Why it failed.
        cause: Box<DistributionError>,
    },

    /// No loader exists for the group.
    #[error("unknown group '{group}'")]
    UnknownGroup {
        /// The requested group.
        group: String,
    },

    /// The bundle is not present in the group's cache.
    #[error("bundle '{bundle}' is not loaded")]
    BundleNotLoaded {
        /// The requested bundle name.
        bundle: String,
    },

    /// The bundle is loaded but holds no asset with that name.
    #[error("asset '{asset}' not found in bundle '{bundle}'")]
    AssetNotFound {
        /// The bundle name.
        bundle: String,
        /// The requested asset name.
        asset: String,
    },

    /// The group has been disposed.
    #[error("group '{group}' has been disposed")]
    GroupDisposed {
        /// The disposed group.
        group: String,
    },

    /// One or more bundles of a bulk download failed.
    #[error("bulk download finished with {} failed bundle(s): {}", failed.len(), failed.join(", "))]
    BulkDownloadFailed {
        /// Names of the failed bundles, sorted.
        failed: Vec<String>,
    },

    /// The request itself is malformed (e.g. an empty group or bundle name).
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request.
        reason: String,
    },
}

impl DistributionError {
    /// Walks `DependencyLoadFailed` and `ManifestFailed` wrappers down to the
    /// original failure.
    pub fn root_cause(&self) -> &DistributionError {
        match self {
            DistributionError::DependencyLoadFailed { cause, .. }
            | DistributionError::ManifestFailed { cause } => cause.root_cause(),
            other => other,
        }
    }
}
