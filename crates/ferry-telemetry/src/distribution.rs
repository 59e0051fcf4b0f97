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

//! The metric handles recorded by the distribution agents.

use crate::metrics::registry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};
use crate::metrics::MetricsResult;

/// Every metric the manifest store, fetchers, loaders and coordinator record.
#[derive(Debug, Clone)]
pub struct DistributionMetrics {
    /// Bundle fetch wall time.
    pub fetch_time_ms: HistogramHandle,
    /// Bytes received by successful and failed fetches alike.
    pub bytes_received_total: CounterHandle,
    /// Fetches that produced a validated bundle.
    pub fetches_succeeded_total: CounterHandle,
    /// Fetches that failed for any reason.
    pub fetches_failed_total: CounterHandle,
    /// Fetches rejected because of a content hash mismatch.
    pub hash_mismatches_total: CounterHandle,
    /// Bundles currently held by group caches.
    pub bundles_cached: GaugeHandle,
    /// Asset requests served from a group's asset cache.
    pub asset_cache_hits_total: CounterHandle,
    /// Last aggregate bulk download progress, in `[0, 1]`.
    pub bulk_progress: GaugeHandle,
}

impl DistributionMetrics {
    /// Registers (or re-attaches to) the distribution metrics in `registry`.
    pub fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            fetch_time_ms: registry.register_histogram(
                "fetch",
                "time",
                "Resource fetch time",
                "ms",
                vec![10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 30_000.0],
            )?,
            bytes_received_total: registry.register_counter(
                "fetch",
                "bytes_received_total",
                "Total bytes received from the transport",
            )?,
            fetches_succeeded_total: registry.register_counter(
                "fetch",
                "succeeded_total",
                "Bundles fetched and validated",
            )?,
            fetches_failed_total: registry.register_counter(
                "fetch",
                "failed_total",
                "Bundle fetches that failed",
            )?,
            hash_mismatches_total: registry.register_counter(
                "fetch",
                "hash_mismatches_total",
                "Bundle payloads rejected for a content hash mismatch",
            )?,
            bundles_cached: registry.register_gauge(
                "groups",
                "bundles_cached",
                "Bundles held by group caches",
                "count",
            )?,
            asset_cache_hits_total: registry.register_counter(
                "groups",
                "asset_cache_hits_total",
                "Asset requests served from the asset cache",
            )?,
            bulk_progress: registry.register_gauge(
                "bulk",
                "progress",
                "Aggregate bulk download progress",
                "ratio",
            )?,
        })
    }

    /// Adjusts the cached-bundles gauge by `delta`.
    pub fn adjust_cached(&self, delta: f64) {
        let result = self
            .bundles_cached
            .get()
            .and_then(|current| self.bundles_cached.set((current + delta).max(0.0)));
        if let Err(e) = result {
            log::warn!("Failed to update cached bundle gauge: {e}");
        }
    }
}

/// Logs and swallows a failed metric update.
pub fn record(result: MetricsResult<impl Sized>) {
    if let Err(e) = result {
        log::warn!("Failed to record metric: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_once_per_registry() {
        let registry = MetricsRegistry::new();
        let a = DistributionMetrics::register(&registry).unwrap();
        let b = DistributionMetrics::register(&registry).unwrap();
        a.fetches_succeeded_total.increment().unwrap();
        assert_eq!(b.fetches_succeeded_total.get().unwrap(), 1);
        assert_eq!(registry.metric_count(), 8);
    }

    #[test]
    fn cached_gauge_never_goes_negative() {
        let registry = MetricsRegistry::new();
        let metrics = DistributionMetrics::register(&registry).unwrap();
        metrics.adjust_cached(2.0);
        metrics.adjust_cached(-5.0);
        assert_eq!(metrics.bundles_cached.get().unwrap(), 0.0);
    }
}
