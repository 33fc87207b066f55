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

//! Walkthrough of a timed lock released early and a manual-release lock.
//!
//! Run with `RUST_LOG=expiring_lock=debug` to see the lock's own events.

use expiring_lock::{ExpiringLock, ExpiringLockConfig};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .init();

    let lock = ExpiringLock::with_config(ExpiringLockConfig::from_env());

    tracing::info!("Lock with a 5s expiry");
    lock.lock(Duration::from_secs(5)).await;
    tracing::info!("Lock acquired, auto-release in 5s");

    tokio::time::sleep(Duration::from_secs(2)).await;
    tracing::info!("Work done, releasing manually");
    match lock.unlock() {
        Ok(()) => tracing::info!("Lock released"),
        Err(e) => tracing::warn!("Unlock failed: {e}"),
    }

    tracing::info!("Lock without expiry");
    let manual = ExpiringLock::new();
    manual.lock(Duration::ZERO).await;
    tracing::info!("Lock acquired, must be released manually");

    tokio::time::sleep(Duration::from_secs(1)).await;
    match manual.unlock() {
        Ok(()) => tracing::info!("Lock released"),
        Err(e) => tracing::warn!("Unlock failed: {e}"),
    }

    tracing::info!(stats = ?lock.stats(), "Done");
    Ok(())
}
