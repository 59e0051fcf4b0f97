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

use std::any::Any;
use std::sync::Arc;

/// A type-erased asset value as produced by a [`RawBundle`].
pub type AssetObject = Arc<dyn Any + Send + Sync>;

/// The raw, format-specific resource behind a loaded bundle.
///
/// This is the contract the engine expects from whatever decodes bundle
/// payloads. Implementations live next to their format (see `ferry-io`'s
/// archive format) or in tests.
pub trait RawBundle: Send + Sync {
    /// Extracts the asset called `name`, or `None` if the bundle has no such asset.
    fn extract_asset(&self, name: &str) -> Option<AssetObject>;

    /// Lists the names of every asset the bundle contains.
    fn asset_names(&self) -> Vec<String>;

    /// Releases the resources held by the bundle.
    ///
    /// With `immediate` set, memory backing already extracted assets may be
    /// reclaimed as well. Calling it more than once must be harmless.
    fn release(&mut self, immediate: bool);
}
