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

use log;

/// A generic, thread-safe event channel.
///
/// The bus is generic over the event type `T` so that `ferry-core` does not
/// dictate what higher-level crates publish. Publishing never blocks and
/// never fails loudly: with no receiver alive the event is dropped.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + Sync + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Creates a new bus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Sends an event, logging if the channel is disconnected.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");

        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sender end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a clone of the receiver end of the channel.
    ///
    /// Receivers compete: each event is delivered to exactly one of them.
    pub fn receiver(&self) -> flume::Receiver<T> {
        self.receiver.clone()
    }

    /// Drains every event currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DistributionEvent;
    use std::{thread, time::Duration};

    #[test]
    fn publish_then_drain_in_order() {
        let bus = EventBus::<DistributionEvent>::new();
        bus.publish(DistributionEvent::ManifestReady { bundles: 2 });
        bus.publish(DistributionEvent::GroupDisposed {
            group: "level1".into(),
        });

        assert_eq!(
            bus.drain(),
            vec![
                DistributionEvent::ManifestReady { bundles: 2 },
                DistributionEvent::GroupDisposed {
                    group: "level1".into()
                },
            ]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn send_from_thread() {
        let bus = EventBus::<DistributionEvent>::new();
        let sender = bus.sender();
        let receiver = bus.receiver();

        let handle = thread::spawn(move || {
            sender
                .send(DistributionEvent::ManifestReady { bundles: 1 })
                .expect("Send from thread failed");
        });

        let received = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("Failed to receive event from thread");
        assert_eq!(received, DistributionEvent::ManifestReady { bundles: 1 });
        handle.join().expect("Thread join failed");
    }
}
