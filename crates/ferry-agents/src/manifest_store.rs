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

//! Acquires and holds the single authoritative manifest.

use ferry_core::event::{DistributionEvent, EventBus};
use ferry_core::{
    ContentHash, DistributionError, DistributionResult, FetchRequest, Manifest, TransferProgress,
    Transport,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Where the store is in its load lifecycle.
#[derive(Debug, Clone)]
pub enum ManifestState {
    /// No load has been begun, or the store was reset.
    Idle,
    /// A fetch is outstanding.
    Loading,
    /// The manifest was fetched and validated.
    Ready(Arc<Manifest>),
    /// The last attempt failed. A new `begin_load` starts a fresh attempt.
    Failed(DistributionError),
}

struct Shared {
    transport: Arc<dyn Transport>,
    manifest_url: String,
    state: watch::Sender<ManifestState>,
    attempt: AtomicU64,
    events: Arc<EventBus<DistributionEvent>>,
}

/// Fetches the manifest once and answers dependency queries against it.
///
/// The store is cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ManifestStore {
    shared: Arc<Shared>,
}

impl ManifestStore {
    /// Creates an idle store that will fetch the manifest from `manifest_url`.
    pub fn new(
        transport: Arc<dyn Transport>,
        manifest_url: impl Into<String>,
        events: Arc<EventBus<DistributionEvent>>,
    ) -> Self {
        let (state, _) = watch::channel(ManifestState::Idle);
        Self {
            shared: Arc::new(Shared {
                transport,
                manifest_url: manifest_url.into(),
                state,
                attempt: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Where the manifest is fetched from.
    pub fn manifest_url(&self) -> &str {
        &self.shared.manifest_url
    }

    /// Starts fetching the manifest on the current tokio runtime.
    ///
    /// Does nothing while a fetch is outstanding or once the manifest is
    /// ready. After a failure it starts a new attempt.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn begin_load(&self) {
        let started = self.shared.state.send_if_modified(|state| match state {
            ManifestState::Idle | ManifestState::Failed(_) => {
                *state = ManifestState::Loading;
                true
            }
            ManifestState::Loading | ManifestState::Ready(_) => false,
        });
        if !started {
            return;
        }

        let attempt = self.shared.attempt.fetch_add(1, Ordering::AcqRel) + 1;
        log::info!("Loading manifest from '{}'", self.shared.manifest_url);
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let outcome = fetch_manifest(&shared).await.map(Arc::new);
            shared.finish(attempt, outcome);
        });
    }

    /// Returns `true` once a consistent, non-empty manifest has been loaded.
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.state.borrow(), ManifestState::Ready(_))
    }

    /// A snapshot of the current lifecycle state.
    pub fn state(&self) -> ManifestState {
        self.shared.state.borrow().clone()
    }

    /// The loaded manifest.
    pub fn manifest(&self) -> DistributionResult<Arc<Manifest>> {
        match &*self.shared.state.borrow() {
            ManifestState::Ready(manifest) => Ok(manifest.clone()),
            _ => Err(DistributionError::ManifestNotReady),
        }
    }

    /// The direct dependencies of `bundle`, in declared order.
    ///
    /// # Errors
    /// `ManifestNotReady` before the manifest is loaded, `UnknownBundle` if it
    /// does not list `bundle`.
    pub fn dependencies_of(&self, bundle: &str) -> DistributionResult<Vec<String>> {
        Ok(self.manifest()?.dependencies_of(bundle)?.to_vec())
    }

    /// The transitive dependencies of `bundle` in load order.
    pub fn all_dependencies(&self, bundle: &str) -> DistributionResult<Vec<String>> {
        self.manifest()?.all_dependencies(bundle)
    }

    /// The content hash the manifest declares for `bundle`.
    pub fn hash_of(&self, bundle: &str) -> DistributionResult<ContentHash> {
        Ok(self.manifest()?.hash_of(bundle)?.clone())
    }

    /// Suspends until the outstanding load settles.
    ///
    /// # Errors
    /// `ManifestFailed` if the attempt failed, `ManifestNotReady` if no load
    /// has been begun.
    pub async fn wait_ready(&self) -> DistributionResult<Arc<Manifest>> {
        let mut receiver = self.shared.state.subscribe();
        let state = receiver
            .wait_for(|state| !matches!(state, ManifestState::Loading))
            .await
            .map_err(|_| DistributionError::ManifestNotReady)?
            .clone();
        match state {
            ManifestState::Ready(manifest) => Ok(manifest),
            ManifestState::Failed(cause) => Err(DistributionError::ManifestFailed {
                cause: Box::new(cause),
            }),
            ManifestState::Idle | ManifestState::Loading => Err(DistributionError::ManifestNotReady),
        }
    }

    /// Drops the loaded manifest and returns to idle.
    ///
    /// An attempt still in flight is abandoned: its outcome is discarded.
    pub fn reset(&self) {
        self.shared.attempt.fetch_add(1, Ordering::AcqRel);
        self.shared.state.send_replace(ManifestState::Idle);
        log::debug!("Manifest store reset");
    }
}

impl Shared {
    fn finish(&self, attempt: u64, outcome: DistributionResult<Arc<Manifest>>) {
        let applied = self.state.send_if_modified(|state| {
            if self.attempt.load(Ordering::Acquire) != attempt
                || !matches!(state, ManifestState::Loading)
            {
                return false;
            }
            *state = match &outcome {
                Ok(manifest) => ManifestState::Ready(manifest.clone()),
                Err(e) => ManifestState::Failed(e.clone()),
            };
            true
        });
        if !applied {
            log::debug!("Discarding outcome of abandoned manifest load");
            return;
        }

        match outcome {
            Ok(manifest) => {
                log::info!("Manifest ready with {} bundle(s)", manifest.len());
                self.events.publish(DistributionEvent::ManifestReady {
                    bundles: manifest.len(),
                });
            }
            Err(e) => {
                log::error!("Manifest load from '{}' failed: {e}", self.manifest_url);
                self.events.publish(DistributionEvent::ManifestFailed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

async fn fetch_manifest(shared: &Shared) -> DistributionResult<Manifest> {
    let progress = TransferProgress::new();
    progress.begin();
    let bytes = shared
        .transport
        .fetch(&FetchRequest::new(shared.manifest_url.clone()), &progress)
        .await
        .map_err(|cause| DistributionError::Transport {
            resource: shared.manifest_url.clone(),
            cause,
        })?;
    progress.succeed();
    Manifest::from_json(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::manifest::ManifestDocument;
    use ferry_core::TransportError;
    use ferry_io::MemoryTransport;

    const URL: &str = "mem://content/Linux";

    fn manifest_json() -> Vec<u8> {
        let mut doc = ManifestDocument::default();
        doc.insert("level1/shared", "h-shared", Vec::<String>::new())
            .insert("level1/env", "h-env", ["level1/shared"]);
        Manifest::from_document(doc).unwrap().to_json().unwrap().into_bytes()
    }

    fn store(transport: &MemoryTransport) -> ManifestStore {
        ManifestStore::new(
            Arc::new(transport.clone()),
            URL,
            Arc::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn queries_fail_before_ready() {
        let transport = MemoryTransport::new();
        let store = store(&transport);
        assert!(!store.is_ready());
        assert_eq!(
            store.dependencies_of("level1/env"),
            Err(DistributionError::ManifestNotReady)
        );
        assert_eq!(
            store.wait_ready().await.unwrap_err(),
            DistributionError::ManifestNotReady
        );
    }

    #[tokio::test]
    async fn begin_load_fetches_once() {
        let transport = MemoryTransport::new();
        transport.insert(URL, manifest_json());
        let store = store(&transport);

        store.begin_load();
        store.begin_load();
        store.wait_ready().await.unwrap();
        store.begin_load();

        assert!(store.is_ready());
        assert_eq!(transport.fetch_count(URL), 1);
        assert_eq!(
            store.dependencies_of("level1/env").unwrap(),
            vec!["level1/shared"]
        );
        assert_eq!(
            store.dependencies_of("nope"),
            Err(DistributionError::UnknownBundle {
                bundle: "nope".into()
            })
        );
    }

    #[tokio::test]
    async fn failure_is_surfaced_and_retry_is_explicit() {
        let transport = MemoryTransport::new();
        transport.fail(URL, TransportError::Timeout { url: URL.into() });
        let store = store(&transport);

        store.begin_load();
        let err = store.wait_ready().await.unwrap_err();
        assert!(matches!(err, DistributionError::ManifestFailed { .. }));
        assert!(!store.is_ready());
        assert_eq!(transport.fetch_count(URL), 1);

        transport.insert(URL, manifest_json());
        store.begin_load();
        store.wait_ready().await.unwrap();
        assert_eq!(transport.fetch_count(URL), 2);
    }

    #[tokio::test]
    async fn inconsistent_manifest_never_becomes_ready() {
        let transport = MemoryTransport::new();
        transport.insert(
            URL,
            br#"{"version":1,"bundles":{"a":{"hash":"h","dependencies":["ghost"]}}}"#.to_vec(),
        );
        let store = store(&transport);
        store.begin_load();
        let err = store.wait_ready().await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DistributionError::InvalidManifest { .. }
        ));
        assert!(!store.is_ready());
    }

    #[tokio::test]
    async fn reset_abandons_the_loaded_manifest() {
        let transport = MemoryTransport::new();
        transport.insert(URL, manifest_json());
        let store = store(&transport);
        store.begin_load();
        store.wait_ready().await.unwrap();

        store.reset();
        assert!(!store.is_ready());
        assert!(matches!(store.state(), ManifestState::Idle));
    }
}
