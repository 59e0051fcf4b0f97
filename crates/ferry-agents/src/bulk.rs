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

//! Aggregate progress of a bulk download.

use ferry_core::{FetchState, TransferProgress};
use serde::Serialize;

/// Aggregate progress over every fetcher of a bulk pass, recomputed each polling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DownloadSnapshot {
    /// Sum of the announced sizes.
    pub content_bytes: u64,
    /// Sum of the bytes received.
    pub downloaded_bytes: u64,
    /// Unweighted mean of the per-bundle fractions, in `[0, 1]`.
    pub progress: f32,
    /// Fetchers not yet terminal.
    pub active: usize,
    /// Fetchers that succeeded.
    pub finished: usize,
    /// Fetchers that failed.
    pub failed: usize,
}

impl DownloadSnapshot {
    /// Aggregates a set of transfers. An empty set reports no progress.
    pub fn aggregate<'a>(transfers: impl IntoIterator<Item = &'a TransferProgress>) -> Self {
        let mut snapshot = Self::default();
        let mut fraction_sum = 0.0f64;
        let mut count = 0usize;
        for transfer in transfers {
            snapshot.content_bytes += transfer.expected_bytes();
            snapshot.downloaded_bytes += transfer.received_bytes();
            fraction_sum += f64::from(transfer.fraction());
            count += 1;
            match transfer.state() {
                FetchState::Succeeded => snapshot.finished += 1,
                FetchState::Failed => snapshot.failed += 1,
                FetchState::Pending | FetchState::Running => snapshot.active += 1,
            }
        }
        if count > 0 {
            snapshot.progress = (fraction_sum / count as f64) as f32;
        }
        snapshot
    }

    /// Returns `true` once every fetcher is terminal.
    pub fn is_complete(&self) -> bool {
        self.active == 0
    }

    /// Progress as a whole percentage, rounded down. Reaches 100 only when
    /// every fetcher has succeeded.
    pub fn percent(&self) -> u8 {
        (self.progress * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// The outcome of a fully successful bulk download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkReport {
    /// Every bundle fetched, sorted.
    pub bundles: Vec<String>,
    /// The final aggregate.
    pub snapshot: DownloadSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(expected: u64, received: u64, state: FetchState) -> TransferProgress {
        let progress = TransferProgress::new();
        progress.begin();
        progress.set_expected(expected);
        progress.advance(received).unwrap();
        match state {
            FetchState::Succeeded => progress.succeed(),
            FetchState::Failed => progress.fail(),
            FetchState::Pending | FetchState::Running => {}
        }
        progress
    }

    #[test]
    fn progress_is_the_unweighted_mean() {
        let transfers = [
            transfer(1_000, 1_000, FetchState::Succeeded),
            transfer(10, 5, FetchState::Running),
            transfer(1_000_000, 0, FetchState::Running),
        ];
        let snapshot = DownloadSnapshot::aggregate(&transfers);
        assert!((snapshot.progress - 0.5).abs() < 1e-6);
        assert_eq!(snapshot.content_bytes, 1_001_010);
        assert_eq!(snapshot.downloaded_bytes, 1_005);
        assert_eq!((snapshot.active, snapshot.finished, snapshot.failed), (2, 1, 0));
        assert_eq!(snapshot.percent(), 50);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn failed_transfers_count_with_their_frozen_fraction() {
        let transfers = [
            transfer(4, 4, FetchState::Succeeded),
            transfer(4, 1, FetchState::Failed),
        ];
        let snapshot = DownloadSnapshot::aggregate(&transfers);
        assert!((snapshot.progress - 0.625).abs() < 1e-6);
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.failed, 1);
    }

    #[test]
    fn nearly_done_transfers_stay_below_one_hundred_percent() {
        let transfers = [
            transfer(10, 10, FetchState::Running),
            transfer(20, 20, FetchState::Running),
        ];
        let snapshot = DownloadSnapshot::aggregate(&transfers);
        assert_eq!(snapshot.active, 2);
        assert_eq!(snapshot.percent(), 99);

        let done = [
            transfer(10, 10, FetchState::Succeeded),
            transfer(20, 20, FetchState::Succeeded),
        ];
        assert_eq!(DownloadSnapshot::aggregate(&done).percent(), 100);
    }

    #[test]
    fn empty_set_reports_nothing() {
        let snapshot = DownloadSnapshot::aggregate(std::iter::empty());
        assert_eq!(snapshot, DownloadSnapshot::default());
        assert_eq!(snapshot.percent(), 0);
    }
}
