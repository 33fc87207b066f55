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

use std::time::Duration;
use thiserror::Error;

/// Lock operation related error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Release attempted by someone who does not hold the lock.
    /// Covers both "never held" and "held by someone else".
    #[error("Not the lock holder: {token}")]
    NotHolder { token: String },

    /// Bounded acquisition gave up
    #[error("Lock acquisition timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Non-blocking acquisition found the lock held
    #[error("Lock is currently held")]
    WouldBlock,

    /// An auto-release timer was requested outside a Tokio runtime
    #[error("Auto-release requires a running Tokio runtime")]
    NoRuntime,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl LockError {
    /// Create not-holder error
    pub fn not_holder(token: impl Into<String>) -> Self {
        Self::NotHolder { token: token.into() }
    }

    /// Create timeout error
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if it is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::WouldBlock)
    }

    /// Check if the error means the caller did not own the lock
    pub fn is_not_holder(&self) -> bool {
        matches!(self, Self::NotHolder { .. })
    }
}

/// Lock operation Result type
pub type Result<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let not_holder = LockError::not_holder("1234_7");
        assert!(not_holder.is_not_holder());
        assert_eq!(not_holder.to_string(), "Not the lock holder: 1234_7");

        let timeout_err = LockError::timeout(Duration::from_secs(5));
        assert!(matches!(timeout_err, LockError::Timeout { .. }));

        let config_err = LockError::configuration("acquire_timeout must be non-zero");
        assert!(matches!(config_err, LockError::Configuration { .. }));
    }

    #[test]
    fn test_error_retryable() {
        assert!(LockError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(LockError::WouldBlock.is_retryable());
        assert!(!LockError::not_holder("x").is_retryable());
        assert!(!LockError::NoRuntime.is_retryable());
    }
}
