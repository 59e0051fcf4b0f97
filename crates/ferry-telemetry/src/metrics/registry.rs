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

//! Registry for managing metrics.

use super::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Storage = Arc<RwLock<HashMap<MetricId, Metric>>>;

fn read(storage: &Storage) -> RwLockReadGuard<'_, HashMap<MetricId, Metric>> {
    storage.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(storage: &Storage) -> RwLockWriteGuard<'_, HashMap<MetricId, Metric>> {
    storage.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Central, in-memory registry of metrics.
///
/// Registration hands out handles that update the stored value in place.
/// Registering the same id twice returns a handle to the existing metric as
/// long as the type matches. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    storage: Storage,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, metric: Metric) -> MetricsResult<MetricId> {
        let mut storage = write(&self.storage);
        if let Some(existing) = storage.get(&metric.id) {
            let found = existing.value.metric_type();
            let expected = metric.value.metric_type();
            if found != expected {
                return Err(MetricsError::TypeMismatch { expected, found });
            }
            return Ok(metric.id);
        }
        let id = metric.id.clone();
        storage.insert(id.clone(), metric);
        Ok(id)
    }

    /// Registers a counter.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let id = self.register(Metric {
            id: MetricId::new(namespace, name),
            description: description.into(),
            unit: "count".to_string(),
            value: MetricValue::Counter(0),
        })?;
        Ok(CounterHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a gauge.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        let id = self.register(Metric {
            id: MetricId::new(namespace, name),
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Gauge(0.0),
        })?;
        Ok(GaugeHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a histogram with strictly increasing bucket bounds.
    pub fn register_histogram(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        buckets: Vec<f64>,
    ) -> MetricsResult<HistogramHandle> {
        if buckets.is_empty() || buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MetricsError::InvalidOperation(
                "histogram buckets must be non-empty and strictly increasing".to_string(),
            ));
        }
        let bucket_counts = vec![0; buckets.len() + 1];
        let id = self.register(Metric {
            id: MetricId::new(namespace, name),
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Histogram {
                count: 0,
                sum: 0.0,
                bucket_bounds: buckets,
                bucket_counts,
            },
        })?;
        Ok(HistogramHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Returns a snapshot of a metric.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        read(&self.storage)
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    /// Returns every metric of a namespace, sorted by id.
    pub fn get_namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = read(&self.storage)
            .values()
            .filter(|m| m.id.namespace == namespace)
            .cloned()
            .collect();
        metrics.sort_by_key(|m| m.id.to_string());
        metrics
    }

    /// Returns every metric, sorted by id.
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = read(&self.storage).values().cloned().collect();
        metrics.sort_by_key(|m| m.id.to_string());
        metrics
    }

    /// Renders [`snapshot`](Self::snapshot) as pretty JSON.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    /// Total number of registered metrics.
    pub fn metric_count(&self) -> usize {
        read(&self.storage).len()
    }
}

fn update<R>(
    storage: &Storage,
    id: &MetricId,
    op: impl FnOnce(&mut MetricValue) -> MetricsResult<R>,
) -> MetricsResult<R> {
    let mut storage = write(storage);
    let metric = storage
        .get_mut(id)
        .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
    op(&mut metric.value)
}

/// Handle for counter operations.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    storage: Storage,
}

impl CounterHandle {
    /// Increments the counter by 1.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.increment_by(1)
    }

    /// Increments the counter by `amount`, returning the new value.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Counter(v) => {
                *v = v.saturating_add(amount);
                Ok(*v)
            }
            other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: other.metric_type(),
            }),
        })
    }

    /// Current value.
    pub fn get(&self) -> MetricsResult<u64> {
        update(&self.storage, &self.id, |value| {
            value.as_counter().ok_or(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: value.metric_type(),
            })
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for gauge operations.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    storage: Storage,
}

impl GaugeHandle {
    /// Sets the gauge.
    pub fn set(&self, new_value: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Gauge(v) => {
                *v = new_value;
                Ok(())
            }
            other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: other.metric_type(),
            }),
        })
    }

    /// Current value.
    pub fn get(&self) -> MetricsResult<f64> {
        update(&self.storage, &self.id, |value| {
            value.as_gauge().ok_or(MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: value.metric_type(),
            })
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for histogram operations.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    storage: Storage,
}

impl HistogramHandle {
    /// Records a sample.
    pub fn observe(&self, sample: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Histogram {
                count,
                sum,
                bucket_bounds,
                bucket_counts,
            } => {
                let bucket = bucket_bounds
                    .iter()
                    .position(|bound| sample <= *bound)
                    .unwrap_or(bucket_bounds.len());
                bucket_counts[bucket] += 1;
                *count += 1;
                *sum += sample;
                Ok(())
            }
            other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Histogram,
                found: other.metric_type(),
            }),
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_operations() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .register_counter("fetch", "completed_total", "Fetches completed")
            .unwrap();

        assert_eq!(counter.increment().unwrap(), 1);
        assert_eq!(counter.increment_by(5).unwrap(), 6);
        assert_eq!(counter.get().unwrap(), 6);
        assert_eq!(registry.metric_count(), 1);
    }

    #[test]
    fn re_registering_shares_the_value() {
        let registry = MetricsRegistry::new();
        let a = registry.register_counter("fetch", "c", "").unwrap();
        let b = registry.register_counter("fetch", "c", "").unwrap();
        a.increment().unwrap();
        assert_eq!(b.get().unwrap(), 1);
        assert!(matches!(
            registry.register_gauge("fetch", "c", "", "unit"),
            Err(MetricsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn gauge_operations() {
        let registry = MetricsRegistry::new();
        let gauge = registry
            .register_gauge("bulk", "progress", "Bulk progress", "ratio")
            .unwrap();
        gauge.set(0.5).unwrap();
        assert_eq!(gauge.get().unwrap(), 0.5);
    }

    #[test]
    fn histogram_buckets_samples() {
        let registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram("fetch", "duration", "", "ms", vec![10.0, 100.0])
            .unwrap();
        histogram.observe(5.0).unwrap();
        histogram.observe(50.0).unwrap();
        histogram.observe(500.0).unwrap();

        match registry.get_metric(histogram.id()).unwrap().value {
            MetricValue::Histogram {
                count,
                sum,
                bucket_counts,
                ..
            } => {
                assert_eq!(count, 3);
                assert_eq!(sum, 555.0);
                assert_eq!(bucket_counts, vec![1, 1, 1]);
            }
            other => panic!("Expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn histogram_rejects_unsorted_buckets() {
        let registry = MetricsRegistry::new();
        assert!(registry
            .register_histogram("fetch", "bad", "", "ms", vec![5.0, 1.0])
            .is_err());
    }

    #[test]
    fn namespace_filtering() {
        let registry = MetricsRegistry::new();
        registry.register_counter("fetch", "a", "").unwrap();
        registry.register_counter("fetch", "b", "").unwrap();
        registry.register_gauge("bulk", "c", "", "ratio").unwrap();
        assert_eq!(registry.get_namespace_metrics("fetch").len(), 2);
        assert_eq!(registry.get_namespace_metrics("bulk").len(), 1);
        assert!(registry.snapshot_json().unwrap().contains("\"bulk\""));
    }
}
