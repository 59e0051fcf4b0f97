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

//! The authoritative index of all bundles and their dependency edges.
//!
//! A [`Manifest`] is built from a [`ManifestDocument`] (its JSON wire form)
//! and validated once: it is non-empty, every dependency names a listed
//! bundle, and the dependency relation is acyclic. It is read-only afterwards.

use crate::bundle::ContentHash;
use crate::error::{DistributionError, DistributionResult};
use crate::graph::{dependency_closure, topological_sort};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The manifest schema version this crate writes and understands.
pub const MANIFEST_VERSION: u32 = 1;

fn default_version() -> u32 {
    MANIFEST_VERSION
}

/// One bundle's entry in a manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// The bundle's content hash.
    pub hash: ContentHash,
    /// Direct dependencies, in load order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// The serialized form of a manifest, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Every bundle, keyed by name.
    pub bundles: BTreeMap<String, BundleEntry>,
}

impl ManifestDocument {
    /// Adds or replaces a bundle entry.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        hash: impl Into<ContentHash>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.bundles.insert(
            name.into(),
            BundleEntry {
                hash: hash.into(),
                dependencies: dependencies.into_iter().map(Into::into).collect(),
            },
        );
        self
    }
}

/// A validated, immutable manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    version: u32,
    bundles: BTreeMap<String, BundleEntry>,
}

fn invalid(reason: impl Into<String>) -> DistributionError {
    DistributionError::InvalidManifest {
        reason: reason.into(),
    }
}

impl Manifest {
    /// Validates a document and turns it into a manifest.
    ///
    /// # Errors
    /// Returns `InvalidManifest` if the document is empty, declares a newer
    /// schema, has an empty hash, lists a dependency twice, references an
    /// unknown bundle, or contains a dependency cycle.
    pub fn from_document(document: ManifestDocument) -> DistributionResult<Self> {
        if document.version > MANIFEST_VERSION {
            return Err(invalid(format!(
                "schema version {} is newer than supported version {MANIFEST_VERSION}",
                document.version
            )));
        }
        if document.bundles.is_empty() {
            return Err(invalid("the manifest lists no bundles"));
        }

        for (name, entry) in &document.bundles {
            if name.is_empty() {
                return Err(invalid("a bundle has an empty name"));
            }
            if entry.hash.is_empty() {
                return Err(invalid(format!("bundle '{name}' has an empty hash")));
            }
            let mut seen = HashSet::new();
            for dep in &entry.dependencies {
                if dep == name {
                    return Err(invalid(format!("bundle '{name}' depends on itself")));
                }
                if !document.bundles.contains_key(dep) {
                    return Err(invalid(format!(
                        "bundle '{name}' depends on unknown bundle '{dep}'"
                    )));
                }
                if !seen.insert(dep.as_str()) {
                    return Err(invalid(format!(
                        "bundle '{name}' lists dependency '{dep}' twice"
                    )));
                }
            }
        }

        let nodes = document.bundles.keys().map(String::as_str);
        let edges = document.bundles.iter().flat_map(|(name, entry)| {
            entry
                .dependencies
                .iter()
                .map(move |dep| (dep.as_str(), name.as_str()))
        });
        if let Err(cycle) = topological_sort(nodes, edges) {
            return Err(invalid(format!(
                "dependency cycle involving: {}",
                cycle.unresolved.join(", ")
            )));
        }

        Ok(Self {
            version: document.version,
            bundles: document.bundles,
        })
    }

    /// Decodes and validates a JSON manifest document.
    pub fn from_json(bytes: &[u8]) -> DistributionResult<Self> {
        let document: ManifestDocument = serde_json::from_slice(bytes)
            .map_err(|e| invalid(format!("malformed manifest document: {e}")))?;
        Self::from_document(document)
    }

    /// Encodes the manifest back to its JSON document form.
    pub fn to_json(&self) -> DistributionResult<String> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| invalid(format!("failed to encode manifest: {e}")))
    }

    /// Returns the document this manifest was built from.
    pub fn to_document(&self) -> ManifestDocument {
        ManifestDocument {
            version: self.version,
            bundles: self.bundles.clone(),
        }
    }

    /// The schema version of the document.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Every bundle name, in lexical order.
    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    /// Number of bundles listed.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Always `false` for a validated manifest.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Returns `true` if the bundle is listed.
    pub fn contains(&self, bundle: &str) -> bool {
        self.bundles.contains_key(bundle)
    }

    fn entry(&self, bundle: &str) -> DistributionResult<&BundleEntry> {
        self.bundles
            .get(bundle)
            .ok_or_else(|| DistributionError::UnknownBundle {
                bundle: bundle.to_string(),
            })
    }

    /// The content hash declared for `bundle`.
    pub fn hash_of(&self, bundle: &str) -> DistributionResult<&ContentHash> {
        self.entry(bundle).map(|entry| &entry.hash)
    }

    /// The direct dependencies of `bundle`, in declared order.
    pub fn dependencies_of(&self, bundle: &str) -> DistributionResult<&[String]> {
        self.entry(bundle).map(|entry| entry.dependencies.as_slice())
    }

    /// The transitive dependencies of `bundle` in load order, excluding `bundle` itself.
    pub fn all_dependencies(&self, bundle: &str) -> DistributionResult<Vec<String>> {
        let mut closure = dependency_closure(bundle, |name| {
            self.dependencies_of(name).map(<[String]>::to_vec)
        })?;
        closure.pop();
        Ok(closure)
    }
}
