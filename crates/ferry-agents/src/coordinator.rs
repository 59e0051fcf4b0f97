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

//! The entry point of the distribution engine.
//!
//! The [`DistributionCoordinator`] owns the manifest store, drives bulk
//! downloads, and routes on-demand loads to one [`DependencyLoader`] per group.

use crate::bulk::{BulkReport, DownloadSnapshot};
use crate::dependency_loader::DependencyLoader;
use crate::fetcher::{BundleFetcher, FetchContext};
use crate::manifest_store::ManifestStore;
use ferry_core::event::{DistributionEvent, EventBus};
use ferry_core::{
    AssetHandle, BundleFormat, DistributionError, DistributionResult, Manifest, SizeUnit,
    Transport,
};
use ferry_io::{ArchiveFormat, ContentLocator, DistributionConfig, SchemeRouter};
use ferry_telemetry::distribution::record;
use ferry_telemetry::{DistributionMetrics, MetricsRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Coordinates manifest acquisition, bulk downloads and per-group loading.
pub struct DistributionCoordinator {
    locator: ContentLocator,
    poll_interval: Duration,
    store: ManifestStore,
    context: FetchContext,
    registry: MetricsRegistry,
    groups: Mutex<HashMap<String, Arc<DependencyLoader>>>,
    progress: watch::Sender<DownloadSnapshot>,
}

impl DistributionCoordinator {
    /// Creates a coordinator over explicit collaborators.
    pub fn new(
        config: &DistributionConfig,
        transport: Arc<dyn Transport>,
        format: Arc<dyn BundleFormat>,
    ) -> DistributionResult<Self> {
        config
            .validate()
            .map_err(|e| DistributionError::InvalidRequest {
                reason: e.to_string(),
            })?;
        let registry = MetricsRegistry::new();
        let metrics =
            DistributionMetrics::register(&registry).map_err(|e| DistributionError::InvalidRequest {
                reason: format!("failed to register metrics: {e}"),
            })?;
        let events = Arc::new(EventBus::new());
        let locator = config.locator();
        let store = ManifestStore::new(transport.clone(), locator.manifest_url(), events.clone());
        let (progress, _) = watch::channel(DownloadSnapshot::default());

        log::info!(
            "Distribution coordinator for '{}' (platform {})",
            locator.root(),
            locator.platform()
        );
        Ok(Self {
            locator,
            poll_interval: config.poll_interval(),
            store,
            context: FetchContext {
                transport,
                format,
                metrics,
                events,
            },
            registry,
            groups: Mutex::new(HashMap::new()),
            progress,
        })
    }

    /// Creates a coordinator with the transport stack described by `config`
    /// and the built-in archive format.
    pub fn from_config(config: &DistributionConfig) -> DistributionResult<Self> {
        let transport =
            SchemeRouter::from_config(config).map_err(|cause| DistributionError::Transport {
                resource: config.content_root.clone(),
                cause,
            })?;
        Self::new(config, transport, Arc::new(ArchiveFormat))
    }

    /// Begins loading the manifest. After a failed load, calling it again
    /// starts a new attempt.
    pub fn start(&self) {
        self.store.begin_load();
    }

    /// The manifest store.
    pub fn manifest_store(&self) -> &ManifestStore {
        &self.store
    }

    /// Where content is fetched from.
    pub fn locator(&self) -> &ContentLocator {
        &self.locator
    }

    /// The registry the engine records its metrics in.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// A receiver of every event the engine publishes.
    pub fn events(&self) -> ferry_core::event::EventReceiver {
        self.context.events.receiver()
    }

    /// Waits for the manifest begun by [`start`](Self::start).
    pub async fn wait_manifest(&self) -> DistributionResult<Arc<Manifest>> {
        self.store.wait_ready().await
    }

    /// Downloads every bundle of the manifest concurrently.
    ///
    /// Progress is recomputed each polling tick and published to
    /// [`subscribe_progress`](Self::subscribe_progress). A failed bundle does
    /// not stop the others. Fetched bundles are released once all are done.
    ///
    /// # Errors
    /// Manifest failures, or `BulkDownloadFailed` naming every bundle that
    /// failed once all fetchers are terminal.
    pub async fn bulk_download(&self) -> DistributionResult<BulkReport> {
        let manifest = self.wait_manifest().await?;
        let fetchers = manifest
            .bundle_names()
            .map(|name| -> DistributionResult<Arc<BundleFetcher>> {
                Ok(Arc::new(BundleFetcher::new(
                    name,
                    manifest.hash_of(name)?.clone(),
                    self.locator.bundle_url(name),
                    self.context.clone(),
                )))
            })
            .collect::<DistributionResult<Vec<_>>>()?;
        log::info!("Bulk download of {} bundle(s) started", fetchers.len());

        let mut tasks = JoinSet::new();
        for fetcher in &fetchers {
            let fetcher = fetcher.clone();
            tasks.spawn(async move { fetcher.start().await });
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => log::error!("Bulk fetch task aborted: {e}"),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.publish_snapshot(&fetchers);
                }
            }
        }
        let snapshot = self.publish_snapshot(&fetchers);

        let mut bundles = Vec::new();
        let mut failed = Vec::new();
        for fetcher in &fetchers {
            match fetcher.take_handle() {
                Ok(mut handle) => {
                    handle.release(true);
                    bundles.push(fetcher.name().to_string());
                }
                Err(_) => failed.push(fetcher.name().to_string()),
            }
        }
        drop(fetchers);
        bundles.sort();
        failed.sort();

        self.context.events.publish(DistributionEvent::BulkFinished {
            succeeded: bundles.len(),
            failed: failed.clone(),
        });
        if failed.is_empty() {
            log::info!("Bulk download finished: {} bundle(s)", bundles.len());
            Ok(BulkReport { bundles, snapshot })
        } else {
            log::error!(
                "Bulk download finished with {} failure(s): {}",
                failed.len(),
                failed.join(", ")
            );
            Err(DistributionError::BulkDownloadFailed { failed })
        }
    }

    fn publish_snapshot(&self, fetchers: &[Arc<BundleFetcher>]) -> DownloadSnapshot {
        let transfers: Vec<_> = fetchers.iter().map(|f| f.progress()).collect();
        let snapshot = DownloadSnapshot::aggregate(transfers.iter().map(|p| p.as_ref()));
        let changed = self.progress.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
        if changed {
            log::trace!(
                "Bulk progress {}% ({} / {} bytes)",
                snapshot.percent(),
                snapshot.downloaded_bytes,
                snapshot.content_bytes
            );
            record(
                self.context
                    .metrics
                    .bulk_progress
                    .set(f64::from(snapshot.progress)),
            );
            self.context.events.publish(DistributionEvent::BulkProgress {
                content_bytes: snapshot.content_bytes,
                downloaded_bytes: snapshot.downloaded_bytes,
                progress: snapshot.progress,
            });
        }
        snapshot
    }

    /// The latest bulk download aggregate.
    pub fn snapshot(&self) -> DownloadSnapshot {
        *self.progress.borrow()
    }

    /// A receiver notified at every polling tick that changed the aggregate.
    pub fn subscribe_progress(&self) -> watch::Receiver<DownloadSnapshot> {
        self.progress.subscribe()
    }

    /// Total announced size of the current bulk download.
    pub fn content_size(&self, unit: SizeUnit) -> f64 {
        unit.convert(self.snapshot().content_bytes)
    }

    /// Bytes received so far by the current bulk download.
    pub fn downloaded_size(&self, unit: SizeUnit) -> f64 {
        unit.convert(self.snapshot().downloaded_bytes)
    }

    /// Bulk download progress as a whole percentage.
    pub fn progress_percent(&self) -> u8 {
        self.snapshot().percent()
    }

    fn groups(&self) -> MutexGuard<'_, HashMap<String, Arc<DependencyLoader>>> {
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn loader(&self, group: &str) -> DistributionResult<Arc<DependencyLoader>> {
        self.groups()
            .get(group)
            .cloned()
            .ok_or_else(|| DistributionError::UnknownGroup {
                group: group.to_string(),
            })
    }

    /// Loads `bundle` and its dependency closure into `group`.
    ///
    /// The group is created on first use. A disposed group is replaced by a
    /// fresh, empty one.
    ///
    /// # Errors
    /// `InvalidRequest` for empty names, manifest failures, and the errors of
    /// [`DependencyLoader::load_closure`].
    pub async fn load(&self, group: &str, bundle: &str) -> DistributionResult<()> {
        if group.is_empty() || bundle.is_empty() {
            return Err(DistributionError::InvalidRequest {
                reason: "group and bundle names must not be empty".into(),
            });
        }
        self.wait_manifest().await?;

        let loader = {
            let mut groups = self.groups();
            match groups.get(group) {
                Some(loader) if !loader.is_disposed() => loader.clone(),
                _ => {
                    log::debug!("Creating group '{group}'");
                    let loader = Arc::new(DependencyLoader::new(
                        group,
                        self.store.clone(),
                        self.locator.clone(),
                        self.context.clone(),
                    ));
                    groups.insert(group.to_string(), loader.clone());
                    loader
                }
            }
        };
        loader.load_closure(bundle).await
    }

    /// Retrieves an asset from a bundle loaded into `group`.
    ///
    /// # Errors
    /// `UnknownGroup` if the group was never loaded into, and the errors of
    /// [`DependencyLoader::get_asset`].
    pub fn get_asset(
        &self,
        group: &str,
        bundle: &str,
        asset: &str,
        cache: bool,
    ) -> DistributionResult<AssetHandle> {
        self.loader(group)?.get_asset(bundle, asset, cache)
    }

    /// Releases everything cached for `group`.
    pub fn dispose(&self, group: &str) -> DistributionResult<()> {
        self.loader(group)?.dispose();
        Ok(())
    }

    /// Names of the groups that are currently loaded, sorted.
    pub fn groups_loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups()
            .iter()
            .filter(|(_, loader)| !loader.is_disposed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Bundles cached for `group`.
    pub fn loaded_bundles(&self, group: &str) -> DistributionResult<Vec<String>> {
        Ok(self.loader(group)?.loaded_bundles())
    }

    /// Assets stored in `bundle`, which must be loaded into `group`.
    pub fn asset_names(&self, group: &str, bundle: &str) -> DistributionResult<Vec<String>> {
        self.loader(group)?.asset_names(bundle)
    }

    /// Disposes every group and drops the manifest.
    pub fn shutdown(&self) {
        let loaders: Vec<_> = self.groups().drain().map(|(_, loader)| loader).collect();
        for loader in &loaders {
            loader.dispose();
        }
        self.store.reset();
        log::info!("Distribution coordinator shut down");
    }
}
