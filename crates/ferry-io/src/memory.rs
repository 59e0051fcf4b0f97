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

//! An in-memory transport for tests, demos and embedding pre-packed content.

use async_trait::async_trait;
use ferry_core::{FetchRequest, TransferProgress, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

/// Holds fetches of a resource half-way until opened.
///
/// A gated fetch announces its length, delivers the first half of the payload,
/// then suspends until [`open`](Gate::open) is called.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
}

impl Gate {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    /// Releases every fetch waiting on this gate, now and later.
    pub fn open(&self) {
        self.semaphore.close();
    }

    async fn pass(&self) {
        // A closed semaphore means the gate is open.
        let _ = self.semaphore.acquire().await;
    }
}

#[derive(Debug, Clone)]
enum Resource {
    Payload(Vec<u8>),
    Failure(TransportError),
}

#[derive(Debug, Default)]
struct State {
    resources: HashMap<String, Resource>,
    gates: HashMap<String, Gate>,
    fetch_counts: HashMap<String, usize>,
    started: Vec<String>,
    completed: Vec<String>,
}

/// Serves resources from memory.
///
/// Besides plain payloads it can fail specific resources, gate them to
/// observe in-flight state, and records how often and in which order each
/// resource was fetched. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
    chunk_size: usize,
    announce_length: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates an empty transport delivering payloads in 1 KiB chunks.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            chunk_size: 1024,
            announce_length: true,
        }
    }

    /// Sets the delivery chunk size (at least 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Controls whether the payload length is announced before delivery.
    pub fn with_length_announcement(mut self, announce: bool) -> Self {
        self.announce_length = announce;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serves `payload` at `url`.
    pub fn insert(&self, url: impl Into<String>, payload: Vec<u8>) {
        self.lock()
            .resources
            .insert(url.into(), Resource::Payload(payload));
    }

    /// Makes every fetch of `url` fail with `error`.
    pub fn fail(&self, url: impl Into<String>, error: TransportError) {
        self.lock()
            .resources
            .insert(url.into(), Resource::Failure(error));
    }

    /// Gates fetches of `url`. See [`Gate`].
    pub fn gate(&self, url: impl Into<String>) -> Gate {
        let gate = Gate::new();
        self.lock().gates.insert(url.into(), gate.clone());
        gate
    }

    /// Number of fetches started for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.lock().fetch_counts.get(url).copied().unwrap_or(0)
    }

    /// Total number of fetches started.
    pub fn total_fetches(&self) -> usize {
        self.lock().fetch_counts.values().sum()
    }

    /// URLs in the order their fetches started.
    pub fn started(&self) -> Vec<String> {
        self.lock().started.clone()
    }

    /// URLs in the order their fetches delivered a payload.
    pub fn completed(&self) -> Vec<String> {
        self.lock().completed.clone()
    }

    fn deliver(
        &self,
        url: &str,
        chunk: &[u8],
        progress: &TransferProgress,
    ) -> Result<(), TransportError> {
        progress
            .advance(chunk.len() as u64)
            .map_err(|e| TransportError::LengthExceeded {
                url: url.to_string(),
                expected: e.expected,
                received: e.received,
            })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, TransportError> {
        let url = request.url.as_str();
        let (resource, gate) = {
            let mut state = self.lock();
            *state.fetch_counts.entry(url.to_string()).or_default() += 1;
            state.started.push(url.to_string());
            (state.resources.get(url).cloned(), state.gates.get(url).cloned())
        };

        // Always suspend at least once, like a real transport would.
        tokio::task::yield_now().await;

        let payload = match resource {
            Some(Resource::Payload(payload)) => payload,
            Some(Resource::Failure(error)) => {
                if let Some(gate) = gate {
                    gate.pass().await;
                }
                return Err(error);
            }
            None => {
                return Err(TransportError::NotFound {
                    url: url.to_string(),
                })
            }
        };

        if self.announce_length {
            progress.set_expected(payload.len() as u64);
        }

        let half = payload.len() / 2;
        if let Some(gate) = gate {
            self.deliver(url, &payload[..half], progress)?;
            gate.pass().await;
            for chunk in payload[half..].chunks(self.chunk_size) {
                self.deliver(url, chunk, progress)?;
                tokio::task::yield_now().await;
            }
        } else {
            for chunk in payload.chunks(self.chunk_size) {
                self.deliver(url, chunk, progress)?;
                tokio::task::yield_now().await;
            }
        }

        self.lock().completed.push(url.to_string());
        Ok(payload)
    }
}
