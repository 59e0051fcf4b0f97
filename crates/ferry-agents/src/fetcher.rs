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

//! Downloads and validates a single bundle.

use ferry_core::event::{DistributionEvent, EventBus};
use ferry_core::{
    BundleFormat, BundleHandle, ContentHash, DistributionError, DistributionResult, FetchRequest,
    FetchState, TransferProgress, Transport,
};
use ferry_io::content_hash_of;
use ferry_telemetry::distribution::record;
use ferry_telemetry::{DistributionMetrics, ScopedMetricTimer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a fetcher needs from its surroundings.
#[derive(Clone)]
pub struct FetchContext {
    /// Moves the bytes.
    pub transport: Arc<dyn Transport>,
    /// Opens validated payloads.
    pub format: Arc<dyn BundleFormat>,
    /// Where fetch metrics are recorded.
    pub metrics: DistributionMetrics,
    /// Where fetch failures are announced.
    pub events: Arc<EventBus<DistributionEvent>>,
}

enum Outcome {
    Pending,
    Loaded(BundleHandle),
    Taken,
    Failed(DistributionError),
}

/// Fetches one bundle's payload, validates it against the manifest's hash and
/// opens it.
///
/// Its byte counters can be read from any task while [`start`](Self::start)
/// runs. The payload itself only lives inside `start` and is dropped as soon
/// as the bundle is opened or the fetch fails.
pub struct BundleFetcher {
    name: String,
    expected_hash: ContentHash,
    url: String,
    context: FetchContext,
    progress: Arc<TransferProgress>,
    started: AtomicBool,
    outcome: Mutex<Outcome>,
}

impl BundleFetcher {
    /// Creates a fetcher for `name`, expected to hash to `expected_hash`,
    /// located at `url`.
    pub fn new(
        name: impl Into<String>,
        expected_hash: ContentHash,
        url: impl Into<String>,
        context: FetchContext,
    ) -> Self {
        Self {
            name: name.into(),
            expected_hash,
            url: url.into(),
            context,
            progress: Arc::new(TransferProgress::new()),
            started: AtomicBool::new(false),
            outcome: Mutex::new(Outcome::Pending),
        }
    }

    /// The bundle being fetched.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes announced by the transport, 0 while unknown.
    pub fn expected_bytes(&self) -> u64 {
        self.progress.expected_bytes()
    }

    /// Bytes received so far.
    pub fn received_bytes(&self) -> u64 {
        self.progress.received_bytes()
    }

    /// Fraction completed. Exactly `1.0` only after a successful fetch.
    pub fn progress_fraction(&self) -> f32 {
        self.progress.fraction()
    }

    /// The fetch's lifecycle state.
    pub fn state(&self) -> FetchState {
        self.progress.state()
    }

    /// Shared counters, for observers that outlive a borrow of the fetcher.
    pub fn progress(&self) -> Arc<TransferProgress> {
        self.progress.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the fetch to completion.
    ///
    /// A fetcher runs once: calling `start` again returns the recorded outcome
    /// without fetching.
    pub async fn start(&self) -> DistributionResult<()> {
        let recorded = match &*self.lock() {
            Outcome::Pending => None,
            Outcome::Loaded(_) | Outcome::Taken => Some(Ok(())),
            Outcome::Failed(e) => Some(Err(e.clone())),
        };
        if let Some(recorded) = recorded {
            return recorded;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DistributionError::FetchFailed {
                bundle: self.name.clone(),
                reason: "fetch already running".into(),
            });
        }

        self.progress.begin();
        log::debug!("Fetching bundle '{}' from '{}'", self.name, self.url);

        let result = {
            let _timer = ScopedMetricTimer::new(&self.context.metrics.fetch_time_ms);
            self.fetch_and_open().await
        };
        record(
            self.context
                .metrics
                .bytes_received_total
                .increment_by(self.progress.received_bytes()),
        );

        match result {
            Ok(handle) => {
                self.progress.succeed();
                record(self.context.metrics.fetches_succeeded_total.increment());
                log::debug!(
                    "Bundle '{}' fetched ({} bytes)",
                    self.name,
                    self.progress.received_bytes()
                );
                *self.lock() = Outcome::Loaded(handle);
                Ok(())
            }
            Err(e) => {
                self.progress.fail();
                record(self.context.metrics.fetches_failed_total.increment());
                if matches!(e, DistributionError::HashMismatch { .. }) {
                    record(self.context.metrics.hash_mismatches_total.increment());
                }
                log::warn!("Fetch of bundle '{}' failed: {e}", self.name);
                self.context.events.publish(DistributionEvent::FetchFailed {
                    bundle: self.name.clone(),
                    reason: e.to_string(),
                });
                *self.lock() = Outcome::Failed(e.clone());
                Err(e)
            }
        }
    }

    async fn fetch_and_open(&self) -> DistributionResult<BundleHandle> {
        let request = FetchRequest::with_hash(self.url.clone(), self.expected_hash.clone());
        let payload = self
            .context
            .transport
            .fetch(&request, &self.progress)
            .await
            .map_err(|cause| DistributionError::Transport {
                resource: self.name.clone(),
                cause,
            })?;

        let actual = content_hash_of(&payload);
        if actual != self.expected_hash {
            return Err(DistributionError::HashMismatch {
                bundle: self.name.clone(),
                expected: self.expected_hash.clone(),
                actual,
            });
        }

        let raw = self
            .context
            .format
            .open(&self.name, &payload)
            .map_err(|cause| DistributionError::Transport {
                resource: self.name.clone(),
                cause,
            })?;
        drop(payload);
        Ok(BundleHandle::new(
            self.name.clone(),
            self.expected_hash.clone(),
            raw,
        ))
    }

    /// Hands over the loaded bundle.
    ///
    /// # Errors
    /// `FetchFailed` if the fetch has not succeeded or the handle was already
    /// taken.
    pub fn take_handle(&self) -> DistributionResult<BundleHandle> {
        let mut outcome = self.lock();
        let reason = match std::mem::replace(&mut *outcome, Outcome::Taken) {
            Outcome::Loaded(handle) => return Ok(handle),
            Outcome::Taken => "handle already taken".to_string(),
            Outcome::Pending => {
                *outcome = Outcome::Pending;
                "fetch has not completed".to_string()
            }
            Outcome::Failed(e) => {
                let reason = e.to_string();
                *outcome = Outcome::Failed(e);
                reason
            }
        };
        Err(DistributionError::FetchFailed {
            bundle: self.name.clone(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::TransportError;
    use ferry_io::{ArchiveBuilder, ArchiveFormat, AssetBytes, MemoryTransport};
    use ferry_telemetry::MetricsRegistry;

    fn archive(text: &str) -> Vec<u8> {
        let mut builder = ArchiveBuilder::new();
        builder.add("readme", text.as_bytes().to_vec()).unwrap();
        builder.finish().unwrap()
    }

    fn context(transport: &MemoryTransport, registry: &MetricsRegistry) -> FetchContext {
        FetchContext {
            transport: Arc::new(transport.clone()),
            format: Arc::new(ArchiveFormat),
            metrics: DistributionMetrics::register(registry).unwrap(),
            events: Arc::new(EventBus::new()),
        }
    }

    #[tokio::test]
    async fn successful_fetch_yields_a_validated_handle() {
        let payload = archive("hello");
        let transport = MemoryTransport::new().with_chunk_size(16);
        transport.insert("mem://b", payload.clone());
        let registry = MetricsRegistry::new();
        let fetcher = BundleFetcher::new(
            "b",
            content_hash_of(&payload),
            "mem://b",
            context(&transport, &registry),
        );

        assert_eq!(fetcher.progress_fraction(), 0.0);
        fetcher.start().await.unwrap();
        assert_eq!(fetcher.progress_fraction(), 1.0);
        assert_eq!(fetcher.received_bytes(), payload.len() as u64);

        let handle = fetcher.take_handle().unwrap();
        let asset = handle.extract_asset("readme").unwrap();
        assert_eq!(asset.get::<AssetBytes>().unwrap().as_str(), Some("hello"));
        assert!(fetcher.take_handle().is_err());

        let metrics = DistributionMetrics::register(&registry).unwrap();
        assert_eq!(metrics.fetches_succeeded_total.get().unwrap(), 1);
        assert_eq!(
            metrics.bytes_received_total.get().unwrap(),
            payload.len() as u64
        );
    }

    #[tokio::test]
    async fn hash_mismatch_yields_no_handle() {
        let transport = MemoryTransport::new();
        transport.insert("mem://b", archive("tampered"));
        let registry = MetricsRegistry::new();
        let fetcher = BundleFetcher::new(
            "b",
            content_hash_of(&archive("original")),
            "mem://b",
            context(&transport, &registry),
        );

        let err = fetcher.start().await.unwrap_err();
        assert!(matches!(err, DistributionError::HashMismatch { .. }));
        assert!(fetcher.progress_fraction() < 1.0);
        assert_eq!(fetcher.state(), FetchState::Failed);
        assert!(matches!(
            fetcher.take_handle(),
            Err(DistributionError::FetchFailed { .. })
        ));

        let metrics = DistributionMetrics::register(&registry).unwrap();
        assert_eq!(metrics.hash_mismatches_total.get().unwrap(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_and_announced() {
        let transport = MemoryTransport::new();
        transport.fail("mem://b", TransportError::NotFound { url: "mem://b".into() });
        let registry = MetricsRegistry::new();
        let ctx = context(&transport, &registry);
        let events = ctx.events.clone();
        let fetcher = BundleFetcher::new("b", ContentHash::new("h"), "mem://b", ctx);

        assert!(matches!(
            fetcher.start().await,
            Err(DistributionError::Transport { .. })
        ));
        // The failure is kept: no second fetch.
        assert!(fetcher.start().await.is_err());
        assert_eq!(transport.fetch_count("mem://b"), 1);
        assert!(events
            .drain()
            .iter()
            .any(|e| matches!(e, DistributionEvent::FetchFailed { bundle, .. } if bundle == "b")));
    }

    #[tokio::test]
    async fn take_handle_before_completion_fails() {
        let transport = MemoryTransport::new();
        let registry = MetricsRegistry::new();
        let fetcher = BundleFetcher::new(
            "b",
            ContentHash::new("h"),
            "mem://b",
            context(&transport, &registry),
        );
        assert!(matches!(
            fetcher.take_handle(),
            Err(DistributionError::FetchFailed { reason, .. }) if reason.contains("not completed")
        ));
    }

    #[tokio::test]
    async fn fraction_is_monotonic_and_below_one_in_flight() {
        let payload = archive(&"x".repeat(4096));
        let transport = MemoryTransport::new().with_chunk_size(64);
        transport.insert("mem://b", payload.clone());
        let gate = transport.gate("mem://b");
        let registry = MetricsRegistry::new();
        let fetcher = Arc::new(BundleFetcher::new(
            "b",
            content_hash_of(&payload),
            "mem://b",
            context(&transport, &registry),
        ));

        let task = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.start().await })
        };

        let mut last = 0.0;
        while fetcher.received_bytes() < (payload.len() / 2) as u64 {
            let now = fetcher.progress_fraction();
            assert!(now >= last);
            last = now;
            tokio::task::yield_now().await;
        }
        let halfway = fetcher.progress_fraction();
        assert!(halfway >= last && halfway < 1.0);

        gate.open();
        task.await.unwrap().unwrap();
        assert_eq!(fetcher.progress_fraction(), 1.0);
    }
}
