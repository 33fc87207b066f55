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

// ============================================================================
// Core Module Declarations
// ============================================================================

// Lock Modules
pub mod expiring;
pub mod guard;

// Collaborators
pub mod identity;

// Core Modules
pub mod config;
pub mod error;
pub mod types;

// ============================================================================
// Public API Exports
// ============================================================================

// Re-export main types for easy access
pub use crate::{
    // Configuration
    config::ExpiringLockConfig,
    // Error types
    error::{LockError, Result},
    // Main components
    expiring::ExpiringLock,
    guard::ExpiringLockGuard,
    // Identity
    identity::{HolderIdentity, ProcessTaskIdentity},
    // Core types
    types::{HolderToken, Lease, LockInfo, LockStats, ReleaseTrigger},
};

// ============================================================================
// Version Information
// ============================================================================

/// Current version of the lock crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
