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

use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::LockInner;
use crate::types::{HolderToken, ReleaseTrigger};

/// Spawn the auto-release task of one epoch.
///
/// Exactly one of two things happens: `cancel` fires first and the task exits,
/// or `expiry` elapses and the task releases with the token and epoch captured
/// here. A lost race against a manual release surfaces as `NotHolder`, which is
/// swallowed.
pub(super) fn spawn_auto_release(
    runtime: &Handle,
    inner: Weak<LockInner>,
    token: HolderToken,
    epoch: u64,
    expiry: Duration,
    cancel: CancellationToken,
) {
    runtime.spawn(async move {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(epoch, holder = %token, "Auto-release cancelled");
            }
            _ = tokio::time::sleep(expiry) => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                if inner.release(&token, Some(epoch), ReleaseTrigger::Expired).is_ok() {
                    debug!(epoch, holder = %token, ?expiry, "Lock expired and was released");
                }
            }
        }
    });
}
