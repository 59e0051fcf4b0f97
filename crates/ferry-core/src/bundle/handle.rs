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

use super::{AssetObject, ContentHash, RawBundle};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap, clonable reference to an asset extracted from a bundle.
///
/// An asset is never owned on its own: it is a view into the bundle it came
/// from. Once that bundle's [`BundleHandle`] has been released the handle
/// reports itself invalid and typed access returns `None`.
#[derive(Clone)]
pub struct AssetHandle {
    bundle: Arc<str>,
    name: Arc<str>,
    value: AssetObject,
    alive: Arc<AtomicBool>,
}

impl AssetHandle {
    /// The name of the bundle the asset was extracted from.
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// The asset's name inside its bundle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `false` once the owning bundle has been released.
    pub fn is_valid(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns the asset as a `T`, or `None` if the type does not match or
    /// the owning bundle has been released.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        if !self.is_valid() {
            return None;
        }
        self.value.downcast_ref::<T>()
    }

    /// Returns `true` if both handles point at the same extracted instance.
    pub fn ptr_eq(&self, other: &AssetHandle) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("bundle", &self.bundle)
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// An owned, validated, loaded bundle.
///
/// The handle is exclusively owned: first by the fetcher that produced it,
/// then by the group cache it is handed to. Releasing it (explicitly or by
/// dropping it) invalidates every asset extracted from it.
pub struct BundleHandle {
    name: Arc<str>,
    hash: ContentHash,
    raw: Box<dyn RawBundle>,
    alive: Arc<AtomicBool>,
}

impl BundleHandle {
    /// Wraps a raw bundle that has been validated against `hash`.
    pub fn new(name: impl Into<String>, hash: ContentHash, raw: Box<dyn RawBundle>) -> Self {
        Self {
            name: Arc::from(name.into()),
            hash,
            raw,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The bundle's name in the manifest.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The content hash the bundle was validated against.
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Returns `false` once the bundle has been released.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Names of every asset stored in the bundle.
    pub fn asset_names(&self) -> Vec<String> {
        self.raw.asset_names()
    }

    /// Extracts `asset` from the bundle, or `None` if it does not exist or the
    /// bundle has already been released.
    pub fn extract_asset(&self, asset: &str) -> Option<AssetHandle> {
        if !self.is_alive() {
            return None;
        }
        let value = self.raw.extract_asset(asset)?;
        Some(AssetHandle {
            bundle: self.name.clone(),
            name: Arc::from(asset),
            value,
            alive: self.alive.clone(),
        })
    }

    /// Releases the underlying raw bundle. Idempotent.
    pub fn release(&mut self, immediate: bool) {
        if self.alive.swap(false, Ordering::AcqRel) {
            log::debug!("Releasing bundle '{}' (immediate: {immediate})", self.name);
            self.raw.release(immediate);
        }
    }
}

impl Drop for BundleHandle {
    fn drop(&mut self) {
        self.release(false);
    }
}

impl fmt::Debug for BundleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleHandle")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("alive", &self.is_alive())
            .finish()
    }
}
