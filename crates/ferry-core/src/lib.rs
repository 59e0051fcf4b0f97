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

//! # Ferry Core
//!
//! Foundational crate containing the contracts and primitive types of the
//! bundle distribution engine: content hashes, the manifest, bundle and asset
//! handles, transfer progress, the transport seam and the error taxonomy.
//!
//! It has no knowledge of how bytes travel over the wire or how the engine
//! schedules its work; concrete collaborators live in `ferry-io` and the
//! orchestration lives in `ferry-agents`.

#![warn(missing_docs)]

pub mod bundle;
pub mod error;
pub mod event;
pub mod graph;
pub mod manifest;
pub mod progress;
pub mod transport;

pub use bundle::{AssetHandle, BundleHandle, ContentHash, RawBundle};
pub use error::{DistributionError, DistributionResult};
pub use manifest::Manifest;
pub use progress::{FetchState, SizeUnit, TransferProgress};
pub use transport::{BundleFormat, FetchRequest, Transport, TransportError};
