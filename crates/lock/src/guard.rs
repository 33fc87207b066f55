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

use tracing::debug;

use crate::{
    error::Result,
    expiring::ExpiringLock,
    types::{Lease, ReleaseTrigger},
};

/// RAII guard for an expiring lock
///
/// Releases its epoch when dropped. If the auto-release timer already ended
/// the epoch, dropping is a no-op.
#[derive(Debug)]
pub struct ExpiringLockGuard {
    lock: ExpiringLock,
    lease: Lease,
    released: bool,
}

impl ExpiringLockGuard {
    pub(crate) fn new(lock: ExpiringLock, lease: Lease) -> Self {
        Self {
            lock,
            lease,
            released: false,
        }
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Check if this guard's epoch is still the active one
    pub fn is_held(&self) -> bool {
        !self.released
            && self
                .lock
                .holder()
                .is_some_and(|info| info.epoch == self.lease.epoch && info.holder == self.lease.token)
    }

    /// Release now instead of at drop.
    ///
    /// Fails with `NotHolder` if the lock already expired.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release(&self.lease)
    }
}

impl Drop for ExpiringLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.lock.release_lease(&self.lease, ReleaseTrigger::Dropped).is_err() {
            debug!(
                "Guard release skipped (epoch already ended): epoch={}, holder={}",
                self.lease.epoch, self.lease.token
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ExpiringLock, LockError};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let lock = ExpiringLock::new();
        {
            let guard = lock.acquire_guard(Duration::ZERO).await;
            assert!(guard.is_held());
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked(), "Dropping the guard should release the lock");
        assert_eq!(lock.stats().manual_releases, 1);
    }

    #[tokio::test]
    async fn test_guard_explicit_release() {
        let lock = ExpiringLock::new();
        let guard = lock.acquire_guard(Duration::from_secs(5)).await;
        let lease = guard.lease().clone();

        guard.release().expect("Holder should be able to release");
        assert!(!lock.is_locked());

        // The lease is spent; a second release is rejected
        assert!(matches!(lock.release(&lease), Err(LockError::NotHolder { .. })));
        assert_eq!(lock.stats().manual_releases, 1);
    }

    #[tokio::test]
    async fn test_guard_drop_after_expiry() {
        let lock = ExpiringLock::new();
        let guard = lock.acquire_guard(Duration::from_millis(50)).await;

        sleep(Duration::from_millis(200)).await;
        assert!(!guard.is_held(), "Epoch should have expired");

        // A new holder must survive the stale guard being dropped
        let next = lock.try_acquire(Duration::ZERO).expect("Lock should be free after expiry");
        drop(guard);
        assert!(lock.is_locked());
        assert_eq!(lock.holder().map(|h| h.epoch), Some(next.epoch()));

        let stats = lock.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.rejected_releases, 0, "Dropped guards are not counted as rejections");
        lock.release(&next).unwrap();
    }
}
