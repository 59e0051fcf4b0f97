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

//! # Ferry Agents
//!
//! The orchestration layer of the distribution engine. Each agent owns one
//! concern and drives the collaborators of `ferry-io` through the contracts
//! of `ferry-core`:
//!
//! - [`ManifestStore`] acquires the manifest and answers dependency queries.
//! - [`BundleFetcher`] downloads and validates one bundle.
//! - [`DependencyLoader`] loads dependency closures and caches them per group.
//! - [`DistributionCoordinator`] ties them together and is what clients use.

#![warn(missing_docs)]

pub mod bulk;
pub mod coordinator;
pub mod dependency_loader;
pub mod fetcher;
pub mod manifest_store;

pub use bulk::{BulkReport, DownloadSnapshot};
pub use coordinator::DistributionCoordinator;
pub use dependency_loader::DependencyLoader;
pub use fetcher::{BundleFetcher, FetchContext};
pub use manifest_store::{ManifestState, ManifestStore};
