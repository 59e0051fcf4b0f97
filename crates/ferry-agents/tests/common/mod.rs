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

#![allow(dead_code)]

use ferry_agents::DistributionCoordinator;
use ferry_core::manifest::ManifestDocument;
use ferry_core::event::DistributionEvent;
use ferry_core::{ContentHash, Manifest};
use ferry_io::{content_hash_of, ArchiveBuilder, ArchiveFormat, DistributionConfig, MemoryTransport};
use std::collections::HashMap;
use std::sync::Arc;

pub const ROOT: &str = "mem://content";
pub const PLATFORM: &str = "Linux";

/// In-memory content: bundle archives plus the manifest describing them.
pub struct Content {
    pub transport: MemoryTransport,
    document: ManifestDocument,
    payloads: HashMap<String, Vec<u8>>,
}

impl Content {
    pub fn new() -> Self {
        Self {
            transport: MemoryTransport::new().with_chunk_size(32),
            document: ManifestDocument::default(),
            payloads: HashMap::new(),
        }
    }

    /// Adds a bundle holding `assets` (name, text) that depends on `dependencies`.
    pub fn bundle(&mut self, name: &str, dependencies: &[&str], assets: &[(&str, &str)]) -> ContentHash {
        let mut builder = ArchiveBuilder::new();
        for (asset, text) in assets {
            builder.add(*asset, text.as_bytes().to_vec()).unwrap();
        }
        let payload = builder.finish().unwrap();
        let hash = content_hash_of(&payload);
        self.transport.insert(bundle_url(name), payload.clone());
        self.payloads.insert(name.to_string(), payload);
        self.document
            .insert(name, hash.clone(), dependencies.iter().copied());
        hash
    }

    /// Serves a payload that does not match the hash the manifest declares.
    pub fn tamper(&self, name: &str) {
        self.transport
            .insert(bundle_url(name), b"definitely not the published payload".to_vec());
    }

    /// Serves the published payload of `name` again.
    pub fn restore(&self, name: &str) {
        self.transport
            .insert(bundle_url(name), self.payloads[name].clone());
    }

    /// Writes the manifest.
    pub fn publish(&self) {
        let manifest = Manifest::from_document(self.document.clone()).unwrap();
        self.transport
            .insert(manifest_url(), manifest.to_json().unwrap().into_bytes());
    }
}

pub fn bundle_url(name: &str) -> String {
    format!("{ROOT}/{name}")
}

pub fn manifest_url() -> String {
    format!("{ROOT}/{PLATFORM}")
}

pub fn config() -> DistributionConfig {
    DistributionConfig {
        content_root: ROOT.to_string(),
        platform: Some(PLATFORM.to_string()),
        poll_interval_ms: 1,
        ..Default::default()
    }
}

/// A coordinator over `content` whose manifest load has been started.
pub fn coordinator(content: &Content) -> DistributionCoordinator {
    let coordinator = DistributionCoordinator::new(
        &config(),
        Arc::new(content.transport.clone()),
        Arc::new(ArchiveFormat),
    )
    .unwrap();
    coordinator.start();
    coordinator
}

/// The `level1` content used across scenarios.
pub fn level_content() -> Content {
    let mut content = Content::new();
    content.bundle("level1/shared", &[], &[("Palette", "red green blue")]);
    content.bundle("level1/env", &["level1/shared"], &[("Tree", "oak"), ("Rock", "granite")]);
    content.bundle("ui", &[], &[("Font", "mono")]);
    content.publish();
    content
}

pub fn drain_events(coordinator: &DistributionCoordinator) -> Vec<DistributionEvent> {
    coordinator.events().try_iter().collect()
}
