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

//! Live byte accounting shared between a transport and the tasks observing it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// The highest fraction an unfinished fetch can report.
///
/// Only a successful fetch reports exactly `1.0`, even if every byte has
/// already arrived and only validation remains.
pub const IN_FLIGHT_CEILING: f32 = 0.999;

/// Lifecycle state of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FetchState {
    /// Not started yet.
    Pending = 0,
    /// Bytes are being transferred.
    Running = 1,
    /// The payload arrived and has been validated.
    Succeeded = 2,
    /// The fetch failed and its progress is frozen.
    Failed = 3,
}

impl FetchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FetchState::Running,
            2 => FetchState::Succeeded,
            3 => FetchState::Failed,
            _ => FetchState::Pending,
        }
    }

    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, FetchState::Succeeded | FetchState::Failed)
    }
}

/// More bytes arrived than the transfer announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthExceeded {
    /// The announced length.
    pub expected: u64,
    /// The bytes received so far, including the offending chunk.
    pub received: u64,
}

/// Lock-free progress counters for one transfer.
///
/// The transport writes to it while bytes arrive; any task may read it at any
/// time. `received_bytes` never exceeds `expected_bytes` once the latter is known.
#[derive(Debug)]
pub struct TransferProgress {
    expected: AtomicU64,
    received: AtomicU64,
    state: AtomicU8,
    frozen: AtomicU64,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    /// Creates counters for a transfer that has not started.
    pub fn new() -> Self {
        Self {
            expected: AtomicU64::new(0),
            received: AtomicU64::new(0),
            state: AtomicU8::new(FetchState::Pending as u8),
            frozen: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Bytes the transfer announced, or 0 while unknown.
    pub fn expected_bytes(&self) -> u64 {
        self.expected.load(Ordering::Acquire)
    }

    /// Bytes received so far.
    pub fn received_bytes(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> FetchState {
        FetchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Fraction of the transfer completed, in `[0, 1]`.
    ///
    /// Exactly `1.0` only after [`succeed`](Self::succeed). Frozen at its last
    /// value after [`fail`](Self::fail).
    pub fn fraction(&self) -> f32 {
        match self.state() {
            FetchState::Succeeded => 1.0,
            FetchState::Failed => f64::from_bits(self.frozen.load(Ordering::Acquire)) as f32,
            FetchState::Pending | FetchState::Running => self.in_flight_fraction(),
        }
    }

    fn in_flight_fraction(&self) -> f32 {
        let expected = self.expected_bytes();
        if expected == 0 {
            return 0.0;
        }
        let raw = self.received_bytes() as f64 / expected as f64;
        (raw as f32).clamp(0.0, IN_FLIGHT_CEILING)
    }

    /// Marks the transfer as running.
    pub fn begin(&self) {
        self.state
            .store(FetchState::Running as u8, Ordering::Release);
    }

    /// Announces the total length. Only the first non-zero announcement counts.
    pub fn set_expected(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let _ = self
            .expected
            .compare_exchange(0, bytes, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Records `bytes` more received.
    ///
    /// Fails, without recording anything, if the announced length would be exceeded.
    pub fn advance(&self, bytes: u64) -> Result<(), LengthExceeded> {
        let expected = self.expected_bytes();
        let received = self.received_bytes().saturating_add(bytes);
        if expected != 0 && received > expected {
            return Err(LengthExceeded { expected, received });
        }
        self.received.fetch_add(bytes, Ordering::AcqRel);
        Ok(())
    }

    /// Marks the transfer as successfully completed.
    ///
    /// If the length was never announced, the received total becomes the
    /// expected total.
    pub fn succeed(&self) {
        self.set_expected(self.received_bytes());
        self.state
            .store(FetchState::Succeeded as u8, Ordering::Release);
    }

    /// Marks the transfer as failed, freezing the reported fraction.
    pub fn fail(&self) {
        if self.state().is_terminal() {
            return;
        }
        let last = self.in_flight_fraction() as f64;
        self.frozen.store(last.to_bits(), Ordering::Release);
        self.state.store(FetchState::Failed as u8, Ordering::Release);
    }
}

/// Units for the size queries of the progress surface (powers of 1024).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeUnit {
    /// Bytes.
    Byte,
    /// Kibibytes.
    #[default]
    KiloByte,
    /// Mebibytes.
    MegaByte,
    /// Gibibytes.
    GigaByte,
}

impl SizeUnit {
    /// Converts a byte count to this unit.
    pub fn convert(self, bytes: u64) -> f64 {
        let exponent = match self {
            SizeUnit::Byte => 0,
            SizeUnit::KiloByte => 1,
            SizeUnit::MegaByte => 2,
            SizeUnit::GigaByte => 3,
        };
        bytes as f64 / 1024f64.powi(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_is_zero_until_length_known() {
        let progress = TransferProgress::new();
        progress.begin();
        progress.advance(10).unwrap();
        assert_eq!(progress.fraction(), 0.0);
        progress.set_expected(40);
        assert_eq!(progress.fraction(), 0.25);
    }

    #[test]
    fn fraction_reaches_one_only_on_success() {
        let progress = TransferProgress::new();
        progress.begin();
        progress.set_expected(8);
        progress.advance(8).unwrap();
        assert!(progress.fraction() < 1.0);
        progress.succeed();
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn fraction_is_monotonic_while_running() {
        let progress = TransferProgress::new();
        progress.begin();
        progress.set_expected(100);
        let mut last = progress.fraction();
        for _ in 0..10 {
            progress.advance(10).unwrap();
            let now = progress.fraction();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn failure_freezes_fraction() {
        let progress = TransferProgress::new();
        progress.begin();
        progress.set_expected(10);
        progress.advance(5).unwrap();
        progress.fail();
        let frozen = progress.fraction();
        assert_eq!(frozen, 0.5);
        // Late bytes from a misbehaving transport do not move the needle.
        progress.advance(3).unwrap();
        assert_eq!(progress.fraction(), frozen);
        assert_eq!(progress.state(), FetchState::Failed);
    }

    #[test]
    fn received_never_exceeds_expected() {
        let progress = TransferProgress::new();
        progress.set_expected(4);
        progress.advance(3).unwrap();
        let err = progress.advance(2).unwrap_err();
        assert_eq!(
            err,
            LengthExceeded {
                expected: 4,
                received: 5
            }
        );
        assert_eq!(progress.received_bytes(), 3);
    }

    #[test]
    fn first_announced_length_wins() {
        let progress = TransferProgress::new();
        progress.set_expected(10);
        progress.set_expected(20);
        assert_eq!(progress.expected_bytes(), 10);
    }

    #[test]
    fn unknown_length_is_filled_on_success() {
        let progress = TransferProgress::new();
        progress.begin();
        progress.advance(7).unwrap();
        progress.succeed();
        assert_eq!(progress.expected_bytes(), 7);
    }

    #[test]
    fn size_units_are_binary() {
        assert_eq!(SizeUnit::Byte.convert(2048), 2048.0);
        assert_eq!(SizeUnit::KiloByte.convert(2048), 2.0);
        assert_eq!(SizeUnit::MegaByte.convert(3 * 1024 * 1024), 3.0);
        assert_eq!(SizeUnit::GigaByte.convert(1024 * 1024 * 1024), 1.0);
    }
}
