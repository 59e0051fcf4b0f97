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

//! Notifications the distribution engine publishes for UI and tooling collaborators.

mod bus;

pub use bus::EventBus;

/// The receiving end handed to event consumers.
pub type EventReceiver = flume::Receiver<DistributionEvent>;

/// Something observable happened inside the distribution engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionEvent {
    /// The manifest was fetched and validated.
    ManifestReady {
        /// Number of bundles it lists.
        bundles: usize,
    },
    /// The manifest fetch or validation failed.
    ManifestFailed {
        /// The failure, rendered.
        reason: String,
    },
    /// A bundle was fetched, validated and cached for a group.
    BundleLoaded {
        /// The group it was loaded for.
        group: String,
        /// The bundle name.
        bundle: String,
    },
    /// A bundle fetch failed.
    FetchFailed {
        /// The bundle name.
        bundle: String,
        /// The failure, rendered.
        reason: String,
    },
    /// Periodic bulk download progress.
    BulkProgress {
        /// Sum of expected bytes.
        content_bytes: u64,
        /// Sum of received bytes.
        downloaded_bytes: u64,
        /// Unweighted mean of per-bundle fractions.
        progress: f32,
    },
    /// A bulk download reached its end.
    BulkFinished {
        /// Bundles fetched successfully.
        succeeded: usize,
        /// Bundles that failed.
        failed: Vec<String>,
    },
    /// A group's cache was released.
    GroupDisposed {
        /// The disposed group.
        group: String,
    },
}
