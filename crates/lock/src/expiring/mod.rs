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

//! Self-expiring, identity-checked mutual exclusion
//!
//! One holder at a time. A holder may ask for an auto-release after a fixed
//! duration; the timer task and the holder's own release both funnel into
//! [`LockInner::release`], which runs its check-and-clear sequence under a
//! short synchronous guard and matches the caller's token (plus the epoch for
//! timer-driven releases) against the current holder.

mod timer;


use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::ExpiringLockConfig,
    error::{LockError, Result},
    guard::ExpiringLockGuard,
    identity::{HolderIdentity, ProcessTaskIdentity},
    types::{HolderToken, Lease, LockCounters, LockInfo, LockStats, ReleaseTrigger},
};

/// State of one acquisition epoch
struct Holder {
    token: HolderToken,
    epoch: u64,
    acquired_at: SystemTime,
    expires_at: Option<SystemTime>,
    /// Stops the auto-release timer; `None` for manual-release epochs
    cancel: Option<CancellationToken>,
    /// Ownership of the core lock, dropped when the epoch ends
    permit: OwnedMutexGuard<()>,
}

impl Holder {
    fn owned_by(&self, token: &HolderToken, epoch: Option<u64>) -> bool {
        self.token == *token && epoch.is_none_or(|e| e == self.epoch)
    }
}

pub(crate) struct LockInner {
    /// Core lock granting ownership
    core: Arc<AsyncMutex<()>>,
    /// Release guard; `None` means unlocked
    holder: Mutex<Option<Holder>>,
    next_epoch: AtomicU64,
    counters: LockCounters,
}

impl LockInner {
    fn new() -> Self {
        Self {
            core: Arc::new(AsyncMutex::new(())),
            holder: Mutex::new(None),
            next_epoch: AtomicU64::new(0),
            counters: LockCounters::default(),
        }
    }

    /// The only way an epoch ends.
    ///
    /// `epoch` is `None` for identity-based releases, which match on the token
    /// alone. On mismatch nothing is touched.
    pub(crate) fn release(&self, token: &HolderToken, epoch: Option<u64>, trigger: ReleaseTrigger) -> Result<()> {
        let mut slot = self.holder.lock();

        let Some(holder) = slot.take_if(|h| h.owned_by(token, epoch)) else {
            drop(slot);
            match trigger {
                ReleaseTrigger::Manual => {
                    self.counters.record_rejected();
                    warn!(holder = %token, "Release rejected, caller does not hold the lock");
                }
                ReleaseTrigger::Expired | ReleaseTrigger::Dropped => {
                    debug!(holder = %token, ?epoch, ?trigger, "Epoch already ended, nothing to release");
                }
            }
            return Err(LockError::not_holder(token.as_str()));
        };

        if let Some(cancel) = &holder.cancel {
            cancel.cancel();
        }
        let epoch = holder.epoch;
        // Dropping the holder releases the core lock while the guard is still held,
        // so a rejected caller always finds the lock free.
        drop(holder);
        drop(slot);

        self.counters.record_release(trigger);
        debug!(epoch, holder = %token, ?trigger, "Expiring lock released");
        Ok(())
    }
}

impl Drop for LockInner {
    fn drop(&mut self) {
        if let Some(cancel) = self.holder.get_mut().take().and_then(|h| h.cancel) {
            cancel.cancel();
        }
    }
}

/// Mutual exclusion lock with optional auto-release.
///
/// Cloning yields another handle to the same lock.
///
/// ```no_run
/// # async fn demo() -> expiring_lock::Result<()> {
/// use expiring_lock::ExpiringLock;
/// use std::time::Duration;
///
/// let lock = ExpiringLock::new();
/// let lease = lock.acquire(Duration::from_secs(5)).await;
/// // critical section; released automatically after 5s if we never get here
/// lock.release(&lease)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ExpiringLock {
    inner: Arc<LockInner>,
    identity: Arc<dyn HolderIdentity>,
    config: ExpiringLockConfig,
}

impl Default for ExpiringLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpiringLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringLock")
            .field("holder", &self.holder())
            .field("config", &self.config)
            .finish()
    }
}

impl ExpiringLock {
    /// Create an unlocked lock with default configuration
    pub fn new() -> Self {
        Self::with_config(ExpiringLockConfig::default())
    }

    pub fn with_config(config: ExpiringLockConfig) -> Self {
        Self {
            inner: Arc::new(LockInner::new()),
            identity: Arc::new(ProcessTaskIdentity),
            config,
        }
    }

    /// Replace the identity source used by [`lock`](Self::lock) and [`unlock`](Self::unlock)
    pub fn with_identity(mut self, identity: impl HolderIdentity + 'static) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn config(&self) -> &ExpiringLockConfig {
        &self.config
    }

    /// Acquire as the calling execution context.
    ///
    /// Waits without bound. A zero `expiry` disables auto-release. The lock is
    /// not reentrant: locking again from the same context waits for the current
    /// epoch to end.
    ///
    /// # Panics
    ///
    /// With a non-zero `expiry` outside a Tokio runtime. The panic happens before
    /// the lock is taken.
    pub async fn lock(&self, expiry: Duration) -> Lease {
        let runtime = timer_runtime(expiry);
        let token = self.identity.current();
        let permit = self.inner.core.clone().lock_owned().await;
        self.install(permit, token, expiry, runtime)
    }

    /// Release as the calling execution context
    pub fn unlock(&self) -> Result<()> {
        let token = self.identity.current();
        self.inner.release(&token, None, ReleaseTrigger::Manual)
    }

    /// Acquire under a freshly minted holder token and return it as a [`Lease`].
    ///
    /// Waits without bound. A zero `expiry` disables auto-release.
    ///
    /// # Panics
    ///
    /// With a non-zero `expiry` outside a Tokio runtime. The panic happens before
    /// the lock is taken.
    pub async fn acquire(&self, expiry: Duration) -> Lease {
        let runtime = timer_runtime(expiry);
        let permit = self.inner.core.clone().lock_owned().await;
        self.install(permit, HolderToken::new_unique(), expiry, runtime)
    }

    /// Acquire without waiting
    pub fn try_acquire(&self, expiry: Duration) -> Result<Lease> {
        let runtime = try_timer_runtime(expiry)?;
        let permit = self.inner.core.clone().try_lock_owned().map_err(|_| LockError::WouldBlock)?;
        Ok(self.install(permit, HolderToken::new_unique(), expiry, runtime))
    }

    /// Acquire, waiting at most `timeout`
    pub async fn acquire_timeout(&self, expiry: Duration, timeout: Duration) -> Result<Lease> {
        let runtime = try_timer_runtime(expiry)?;
        match tokio::time::timeout(timeout, self.inner.core.clone().lock_owned()).await {
            Ok(permit) => Ok(self.install(permit, HolderToken::new_unique(), expiry, runtime)),
            Err(_) => {
                debug!(?timeout, "Expiring lock acquisition timed out");
                Err(LockError::timeout(timeout))
            }
        }
    }

    /// [`acquire_timeout`](Self::acquire_timeout) with the configured expiry and timeout
    pub async fn acquire_default(&self) -> Result<Lease> {
        self.config.validate()?;
        self.acquire_timeout(self.config.default_expiry, self.config.acquire_timeout)
            .await
    }

    /// Acquire and wrap the lease in a guard that releases on drop
    pub async fn acquire_guard(&self, expiry: Duration) -> ExpiringLockGuard {
        let lease = self.acquire(expiry).await;
        ExpiringLockGuard::new(self.clone(), lease)
    }

    /// End the epoch `lease` was granted for
    pub fn release(&self, lease: &Lease) -> Result<()> {
        self.release_lease(lease, ReleaseTrigger::Manual)
    }

    pub(crate) fn release_lease(&self, lease: &Lease, trigger: ReleaseTrigger) -> Result<()> {
        self.inner.release(&lease.token, Some(lease.epoch), trigger)
    }

    /// Check if an epoch is active.
    ///
    /// An acquirer that has just been granted the core lock but has not yet
    /// recorded itself as holder is not reported; the answer turns `true`
    /// before its acquire call returns.
    pub fn is_locked(&self) -> bool {
        self.inner.holder.lock().is_some()
    }

    /// Snapshot of the current holder, `None` when unlocked.
    /// Same visibility window as [`is_locked`](Self::is_locked).
    pub fn holder(&self) -> Option<LockInfo> {
        self.inner.holder.lock().as_ref().map(|h| LockInfo {
            holder: h.token.clone(),
            epoch: h.epoch,
            acquired_at: h.acquired_at,
            expires_at: h.expires_at,
        })
    }

    pub fn stats(&self) -> LockStats {
        self.inner.counters.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn pending_timer(&self) -> Option<CancellationToken> {
        self.inner.holder.lock().as_ref().and_then(|h| h.cancel.clone())
    }

    /// Record the new holder and arm the timer. Caller owns `permit`;
    /// `runtime` is present whenever `expiry` is non-zero.
    fn install(&self, permit: OwnedMutexGuard<()>, token: HolderToken, expiry: Duration, runtime: Option<Handle>) -> Lease {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let expiry = (!expiry.is_zero()).then_some(expiry);
        let cancel = expiry.map(|_| CancellationToken::new());
        let acquired_at = SystemTime::now();

        *self.inner.holder.lock() = Some(Holder {
            token: token.clone(),
            epoch,
            acquired_at,
            expires_at: expiry.map(|d| acquired_at + d),
            cancel: cancel.clone(),
            permit,
        });

        if let (Some(expiry), Some(cancel), Some(runtime)) = (expiry, cancel, runtime) {
            timer::spawn_auto_release(&runtime, Arc::downgrade(&self.inner), token.clone(), epoch, expiry, cancel);
        }

        self.inner.counters.record_acquire();
        debug!(epoch, holder = %token, ?expiry, "Expiring lock acquired");

        Lease { token, epoch, expiry }
    }
}

/// Runtime for the auto-release timer, resolved before the core lock is taken
fn try_timer_runtime(expiry: Duration) -> Result<Option<Handle>> {
    if expiry.is_zero() {
        return Ok(None);
    }
    Handle::try_current().map(Some).map_err(|_| LockError::NoRuntime)
}

fn timer_runtime(expiry: Duration) -> Option<Handle> {
    (!expiry.is_zero()).then(Handle::current)
}
