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

use crate::types::HolderToken;

/// Source of holder identities for [`ExpiringLock::lock`] and [`ExpiringLock::unlock`].
///
/// Two concurrently running contexts must never produce the same token, and
/// one context must produce the same token for the duration of a lock/unlock
/// pair.
///
/// [`ExpiringLock::lock`]: crate::ExpiringLock::lock
/// [`ExpiringLock::unlock`]: crate::ExpiringLock::unlock
pub trait HolderIdentity: Send + Sync {
    /// Token of the calling execution context
    fn current(&self) -> HolderToken;
}

/// `"<pid>_<context>"`, where the context is the Tokio task id, or the OS
/// thread id when called outside a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTaskIdentity;

impl ProcessTaskIdentity {
    fn context_id() -> String {
        match tokio::task::try_id() {
            Some(id) => format!("task-{id}"),
            None => format!("{:?}", std::thread::current().id()),
        }
    }
}

impl HolderIdentity for ProcessTaskIdentity {
    fn current(&self) -> HolderToken {
        HolderToken::new(format!("{}_{}", std::process::id(), Self::context_id()))
    }
}

impl<F> HolderIdentity for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current(&self) -> HolderToken {
        HolderToken::new(self())
    }
}
