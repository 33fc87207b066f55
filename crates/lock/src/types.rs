// Copyright 2024 RustFS Team
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

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Identity of the execution context currently owning a lock
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderToken(String);

impl HolderToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Mint a token that is unique per call
    pub fn new_unique() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HolderToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for HolderToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl std::fmt::Display for HolderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of ownership for one acquisition epoch.
///
/// Returned by every acquire operation. Releasing with a lease only succeeds
/// while the same epoch is still active, so a lease kept around after its
/// lock expired can never release a later holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub(crate) token: HolderToken,
    pub(crate) epoch: u64,
    pub(crate) expiry: Option<Duration>,
}

impl Lease {
    /// Holder token recorded for this epoch
    pub fn token(&self) -> &HolderToken {
        &self.token
    }

    /// Acquisition counter of the lock at the time this lease was granted
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Auto-release duration, `None` when the lease must be released manually
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }
}

/// What ended an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseTrigger {
    /// Explicit release by the holder
    Manual,
    /// The auto-release timer fired
    Expired,
    /// A guard went out of scope without an explicit release
    Dropped,
}

/// Snapshot of the current holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Holder token
    pub holder: HolderToken,
    /// Acquisition epoch
    pub epoch: u64,
    /// Acquisition time
    pub acquired_at: SystemTime,
    /// Auto-release time, if any
    pub expires_at: Option<SystemTime>,
}

impl LockInfo {
    /// Check if the auto-release deadline has passed
    pub fn has_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= SystemTime::now())
    }

    /// Get remaining time until auto-release, `None` for manual-release locks
    pub fn remaining_time(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
    }
}

/// Lock statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Epochs ended by an explicit release or a dropped guard
    pub manual_releases: u64,
    /// Epochs ended by the auto-release timer
    pub expirations: u64,
    /// Release attempts rejected with `NotHolder`
    pub rejected_releases: u64,
}

impl LockStats {
    /// Epochs that have ended, by either trigger
    pub fn completed_epochs(&self) -> u64 {
        self.manual_releases + self.expirations
    }
}

#[derive(Debug, Default)]
pub(crate) struct LockCounters {
    acquisitions: AtomicU64,
    manual_releases: AtomicU64,
    expirations: AtomicU64,
    rejected_releases: AtomicU64,
}

impl LockCounters {
    pub(crate) fn record_acquire(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self, trigger: ReleaseTrigger) {
        match trigger {
            ReleaseTrigger::Manual | ReleaseTrigger::Dropped => self.manual_releases.fetch_add(1, Ordering::Relaxed),
            ReleaseTrigger::Expired => self.expirations.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            manual_releases: self.manual_releases.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            rejected_releases: self.rejected_releases.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_tokens() {
        let t1 = HolderToken::new_unique();
        let t2 = HolderToken::new_unique();
        assert_ne!(t1, t2);
        assert!(Uuid::parse_str(t1.as_str()).is_ok());
    }

    #[test]
    fn test_lock_info_expiry() {
        let now = SystemTime::now();
        let manual = LockInfo {
            holder: HolderToken::from("owner"),
            epoch: 0,
            acquired_at: now,
            expires_at: None,
        };
        assert!(!manual.has_expired());
        assert_eq!(manual.remaining_time(), None);

        let past = LockInfo {
            expires_at: Some(now - Duration::from_secs(1)),
            ..manual.clone()
        };
        assert!(past.has_expired());
        assert_eq!(past.remaining_time(), Some(Duration::ZERO));

        let future = LockInfo {
            expires_at: Some(now + Duration::from_secs(60)),
            ..manual
        };
        assert!(!future.has_expired());
        assert!(future.remaining_time().is_some_and(|d| d > Duration::from_secs(50)));
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = LockCounters::default();
        counters.record_acquire();
        counters.record_acquire();
        counters.record_release(ReleaseTrigger::Manual);
        counters.record_release(ReleaseTrigger::Expired);
        counters.record_rejected();

        let stats = counters.snapshot();
        assert_eq!(stats.acquisitions, 2);
        assert_eq!(stats.manual_releases, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.rejected_releases, 1);
        assert_eq!(stats.completed_epochs(), 2);
    }
}
