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

mod common;

use common::{coordinator, drain_events, level_content, manifest_url, Content};
use ferry_agents::DistributionCoordinator;
use ferry_core::event::DistributionEvent;
use ferry_core::{DistributionError, TransportError};
use ferry_io::ArchiveFormat;
use std::sync::Arc;

#[tokio::test]
async fn queries_before_and_after_the_manifest_loads() {
    let content = level_content();
    let coordinator = DistributionCoordinator::new(
        &common::config(),
        Arc::new(content.transport.clone()),
        Arc::new(ArchiveFormat),
    )
    .unwrap();
    let store = coordinator.manifest_store();

    assert_eq!(
        store.dependencies_of("nonexistent"),
        Err(DistributionError::ManifestNotReady)
    );

    coordinator.start();
    coordinator.wait_manifest().await.unwrap();

    assert_eq!(
        store.dependencies_of("nonexistent"),
        Err(DistributionError::UnknownBundle {
            bundle: "nonexistent".into()
        })
    );
    assert!(drain_events(&coordinator)
        .iter()
        .any(|e| matches!(e, DistributionEvent::ManifestReady { bundles: 3 })));
}

#[tokio::test]
async fn dependency_queries_are_stable() {
    let mut content = Content::new();
    content.bundle("a", &[], &[]);
    content.bundle("b", &[], &[]);
    content.bundle("c", &["b", "a"], &[]);
    content.publish();
    let coordinator = coordinator(&content);
    coordinator.wait_manifest().await.unwrap();
    let store = coordinator.manifest_store();

    let first = store.dependencies_of("c").unwrap();
    assert_eq!(first, vec!["b", "a"]);
    for _ in 0..10 {
        assert_eq!(store.dependencies_of("c").unwrap(), first);
    }
    assert_eq!(store.all_dependencies("c").unwrap(), vec!["b", "a"]);
    assert!(store.dependencies_of("a").unwrap().is_empty());
}

#[tokio::test]
async fn loads_fail_fast_on_a_failed_manifest() {
    let content = level_content();
    content.transport.fail(
        manifest_url(),
        TransportError::Status {
            url: manifest_url(),
            status: 500,
        },
    );
    let coordinator = coordinator(&content);

    let err = coordinator.load("level1", "level1/env").await.unwrap_err();
    assert!(matches!(err, DistributionError::ManifestFailed { .. }));
    assert!(coordinator.groups_loaded().is_empty());
    assert!(drain_events(&coordinator)
        .iter()
        .any(|e| matches!(e, DistributionEvent::ManifestFailed { .. })));

    // Starting again is the explicit retry.
    content.publish();
    coordinator.start();
    coordinator.load("level1", "level1/env").await.unwrap();
}

#[tokio::test]
async fn unknown_bundles_are_rejected_without_fetching() {
    let content = level_content();
    let coordinator = coordinator(&content);

    assert_eq!(
        coordinator.load("level1", "level2/env").await.unwrap_err(),
        DistributionError::UnknownBundle {
            bundle: "level2/env".into()
        }
    );
    assert_eq!(content.transport.total_fetches(), 1);
}
