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

//! Content hashing of bundle payloads.

use ferry_core::ContentHash;

/// Computes the content hash of a payload: the lowercase hex BLAKE3 digest.
///
/// This is the hash the packer writes into manifests and the one fetchers
/// compare against the manifest's declared value.
pub fn content_hash_of(payload: &[u8]) -> ContentHash {
    ContentHash::new(blake3::hash(payload).to_hex().to_string())
}
