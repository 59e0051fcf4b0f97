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

//! # Ferry IO
//!
//! Concrete collaborators for the distribution engine: transports over HTTP,
//! the local filesystem and memory, a content-addressed disk cache, the
//! bundle archive format, content hashing and configuration.

#![warn(missing_docs)]

pub mod archive;
pub mod cache;
pub mod config;
pub mod file;
pub mod hash;
pub mod http;
pub mod memory;
pub mod router;

pub use archive::{ArchiveBuilder, ArchiveError, ArchiveFormat, AssetBytes};
pub use cache::DiskCache;
pub use config::{ConfigError, ContentLocator, DistributionConfig};
pub use file::FileTransport;
pub use hash::content_hash_of;
pub use http::HttpTransport;
pub use memory::{Gate, MemoryTransport};
pub use router::SchemeRouter;
