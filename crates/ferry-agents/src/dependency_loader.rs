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

//! Loads bundles together with their dependency closure, and caches them for one group.

use crate::fetcher::{BundleFetcher, FetchContext};
use crate::manifest_store::ManifestStore;
use ferry_core::event::DistributionEvent;
use ferry_core::graph::dependency_closure;
use ferry_core::{AssetHandle, BundleHandle, DistributionError, DistributionResult};
use ferry_io::ContentLocator;
use ferry_telemetry::distribution::record;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

type LoadSignal = watch::Receiver<Option<DistributionResult<()>>>;

#[derive(Default)]
struct GroupCache {
    bundles: HashMap<String, BundleHandle>,
    assets: HashMap<(String, String), AssetHandle>,
    pending: HashMap<String, LoadSignal>,
    disposed: bool,
}

enum Step {
    Cached,
    Wait(LoadSignal),
    Lead(watch::Sender<Option<DistributionResult<()>>>),
}

/// The loader and cache of one group.
///
/// Every bundle is loaded at most once per group, even when several tasks ask
/// for overlapping closures at the same time: the first task fetches, the
/// others wait for its outcome.
pub struct DependencyLoader {
    group: String,
    store: ManifestStore,
    locator: ContentLocator,
    context: FetchContext,
    cache: Mutex<GroupCache>,
}

impl DependencyLoader {
    /// Creates an empty loader for `group`.
    pub fn new(
        group: impl Into<String>,
        store: ManifestStore,
        locator: ContentLocator,
        context: FetchContext,
    ) -> Self {
        Self {
            group: group.into(),
            store,
            locator,
            context,
            cache: Mutex::new(GroupCache::default()),
        }
    }

    /// The group this loader serves.
    pub fn group(&self) -> &str {
        &self.group
    }

    fn lock(&self) -> MutexGuard<'_, GroupCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn disposed_error(&self) -> DistributionError {
        DistributionError::GroupDisposed {
            group: self.group.clone(),
        }
    }

    /// Loads `root` and everything it transitively depends on.
    ///
    /// Bundles load one after another in dependency order, so a bundle never
    /// starts before all of its dependencies are cached. Bundles already cached
    /// are skipped. On failure the bundles loaded so far stay cached.
    ///
    /// # Errors
    /// `ManifestNotReady` or `UnknownBundle` if the closure cannot be resolved,
    /// `GroupDisposed` if the group is disposed, and `DependencyLoadFailed`
    /// naming the first bundle that failed to load.
    pub async fn load_closure(&self, root: &str) -> DistributionResult<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let order = dependency_closure(root, |name| self.store.dependencies_of(name))?;
        log::debug!(
            "Group '{}': closure of '{root}' is [{}]",
            self.group,
            order.join(", ")
        );

        for bundle in &order {
            self.load_one(bundle).await.map_err(|cause| match cause {
                DistributionError::GroupDisposed { .. } => cause,
                cause => DistributionError::DependencyLoadFailed {
                    bundle: bundle.clone(),
                    cause: Box::new(cause),
                },
            })?;
        }
        Ok(())
    }

    async fn load_one(&self, bundle: &str) -> DistributionResult<()> {
        loop {
            let step = {
                let mut cache = self.lock();
                if cache.disposed {
                    return Err(self.disposed_error());
                }
                if cache.bundles.contains_key(bundle) {
                    Step::Cached
                } else if let Some(signal) = cache.pending.get(bundle) {
                    Step::Wait(signal.clone())
                } else {
                    let (sender, receiver) = watch::channel(None);
                    cache.pending.insert(bundle.to_string(), receiver);
                    Step::Lead(sender)
                }
            };

            match step {
                Step::Cached => return Ok(()),
                Step::Wait(mut signal) => {
                    log::trace!("Group '{}': waiting on in-flight '{bundle}'", self.group);
                    let waited = signal.wait_for(Option::is_some).await.map(|o| o.clone());
                    let outcome = match waited {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            // The leading task went away without an outcome.
                            let mut cache = self.lock();
                            if cache
                                .pending
                                .get(bundle)
                                .is_some_and(|current| current.same_channel(&signal))
                            {
                                cache.pending.remove(bundle);
                            }
                            None
                        }
                    };
                    if let Some(Err(e)) = outcome {
                        return Err(e);
                    }
                }
                Step::Lead(sender) => {
                    let outcome = self.fetch(bundle).await.and_then(|handle| self.admit(handle));
                    self.lock().pending.remove(bundle);
                    sender.send_replace(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }

    async fn fetch(&self, bundle: &str) -> DistributionResult<BundleHandle> {
        let hash = self.store.hash_of(bundle)?;
        let fetcher = BundleFetcher::new(
            bundle,
            hash,
            self.locator.bundle_url(bundle),
            self.context.clone(),
        );
        fetcher.start().await?;
        fetcher.take_handle()
    }

    fn admit(&self, mut handle: BundleHandle) -> DistributionResult<()> {
        let mut cache = self.lock();
        if cache.disposed {
            log::debug!(
                "Group '{}' was disposed while '{}' loaded; releasing it",
                self.group,
                handle.name()
            );
            handle.release(true);
            return Err(self.disposed_error());
        }
        let name = handle.name().to_string();
        cache.bundles.insert(name.clone(), handle);
        drop(cache);

        self.context.metrics.adjust_cached(1.0);
        log::info!("Group '{}': loaded bundle '{name}'", self.group);
        self.context.events.publish(DistributionEvent::BundleLoaded {
            group: self.group.clone(),
            bundle: name,
        });
        Ok(())
    }

    /// Retrieves `asset` from the cached `bundle`.
    ///
    /// With `cache` set, a previously extracted instance is returned when
    /// there is one, and a newly extracted one is remembered.
    ///
    /// # Errors
    /// `GroupDisposed` after [`dispose`](Self::dispose), `BundleNotLoaded` if
    /// the bundle is not cached, `AssetNotFound` if it holds no such asset.
    pub fn get_asset(&self, bundle: &str, asset: &str, cache: bool) -> DistributionResult<AssetHandle> {
        let mut group = self.lock();
        if group.disposed {
            return Err(self.disposed_error());
        }
        let key = (bundle.to_string(), asset.to_string());
        if cache {
            if let Some(hit) = group.assets.get(&key) {
                record(self.context.metrics.asset_cache_hits_total.increment());
                return Ok(hit.clone());
            }
        }

        let handle = group
            .bundles
            .get(bundle)
            .ok_or_else(|| DistributionError::BundleNotLoaded {
                bundle: bundle.to_string(),
            })?;
        let extracted =
            handle
                .extract_asset(asset)
                .ok_or_else(|| DistributionError::AssetNotFound {
                    bundle: bundle.to_string(),
                    asset: asset.to_string(),
                })?;
        if cache {
            group.assets.insert(key, extracted.clone());
        }
        Ok(extracted)
    }

    /// Releases every cached bundle and asset and marks the group disposed.
    ///
    /// Loads still in flight release their bundle when they complete.
    pub fn dispose(&self) {
        let released = {
            let mut cache = self.lock();
            if cache.disposed {
                return;
            }
            cache.disposed = true;
            cache.assets.clear();
            let mut released = 0usize;
            for (_, mut handle) in cache.bundles.drain() {
                handle.release(true);
                released += 1;
            }
            released
        };
        self.context.metrics.adjust_cached(-(released as f64));
        log::info!(
            "Group '{}' disposed, released {released} bundle(s)",
            self.group
        );
        self.context.events.publish(DistributionEvent::GroupDisposed {
            group: self.group.clone(),
        });
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Returns `true` if `bundle` is cached.
    pub fn is_loaded(&self, bundle: &str) -> bool {
        self.lock().bundles.contains_key(bundle)
    }

    /// Names of the assets stored in the cached `bundle`, sorted.
    ///
    /// # Errors
    /// `GroupDisposed` after [`dispose`](Self::dispose), `BundleNotLoaded` if
    /// the bundle is not cached.
    pub fn asset_names(&self, bundle: &str) -> DistributionResult<Vec<String>> {
        let group = self.lock();
        if group.disposed {
            return Err(self.disposed_error());
        }
        let handle = group
            .bundles
            .get(bundle)
            .ok_or_else(|| DistributionError::BundleNotLoaded {
                bundle: bundle.to_string(),
            })?;
        let mut names = handle.asset_names();
        names.sort();
        Ok(names)
    }

    /// Names of the cached bundles, sorted.
    pub fn loaded_bundles(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().bundles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::event::EventBus;
    use ferry_io::{ArchiveFormat, MemoryTransport};
    use ferry_telemetry::{DistributionMetrics, MetricsRegistry};
    use std::sync::Arc;

    fn loader(transport: &MemoryTransport) -> DependencyLoader {
        let events = Arc::new(EventBus::new());
        let store = ManifestStore::new(
            Arc::new(transport.clone()),
            "mem://root/Linux",
            events.clone(),
        );
        let registry = MetricsRegistry::new();
        DependencyLoader::new(
            "scene",
            store,
            ContentLocator::new("mem://root", "Linux", "Linux"),
            FetchContext {
                transport: Arc::new(transport.clone()),
                format: Arc::new(ArchiveFormat),
                metrics: DistributionMetrics::register(&registry).unwrap(),
                events,
            },
        )
    }

    #[tokio::test]
    async fn closure_needs_a_ready_manifest() {
        let transport = MemoryTransport::new();
        let loader = loader(&transport);
        assert_eq!(
            loader.load_closure("a").await,
            Err(DistributionError::ManifestNotReady)
        );
        assert_eq!(transport.total_fetches(), 0);
    }

    #[tokio::test]
    async fn disposed_loader_refuses_work() {
        let transport = MemoryTransport::new();
        let loader = loader(&transport);
        loader.dispose();
        loader.dispose();

        assert!(loader.is_disposed());
        assert_eq!(
            loader.load_closure("a").await,
            Err(DistributionError::GroupDisposed {
                group: "scene".into()
            })
        );
        assert!(matches!(
            loader.get_asset("a", "x", true),
            Err(DistributionError::GroupDisposed { .. })
        ));
        assert!(loader.loaded_bundles().is_empty());
    }
}
