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

//! Bundle-level primitives: content hashes, the raw bundle contract and the
//! owned handles the engine passes around once a bundle has been validated.

mod handle;
mod raw;

pub use handle::*;
pub use raw::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The content hash the manifest declares for a bundle.
///
/// Hashes are opaque, exact-match identifiers. They are compared byte for byte
/// and never parsed or normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wraps a hash string as found in the manifest.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the hash string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_compare_exactly() {
        assert_eq!(ContentHash::new("abc"), ContentHash::from("abc"));
        // No case folding, no trimming.
        assert_ne!(ContentHash::new("abc"), ContentHash::new("ABC"));
        assert_ne!(ContentHash::new("abc"), ContentHash::new("abc "));
    }

    #[test]
    fn hash_serializes_as_plain_string() {
        let json = serde_json::to_string(&ContentHash::new("00ff")).unwrap();
        assert_eq!(json, "\"00ff\"");
    }
}
