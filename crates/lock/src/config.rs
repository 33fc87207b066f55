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
use std::time::Duration;
use tracing::warn;

use crate::error::{LockError, Result};

/// Environment variable overriding [`ExpiringLockConfig::default_expiry`], in milliseconds
pub const ENV_DEFAULT_EXPIRY_MS: &str = "EXPIRING_LOCK_DEFAULT_EXPIRY_MS";

/// Environment variable overriding [`ExpiringLockConfig::acquire_timeout`], in milliseconds
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "EXPIRING_LOCK_ACQUIRE_TIMEOUT_MS";

/// Expiring lock configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringLockConfig {
    /// Auto-release duration used by `acquire_default`; zero means manual release
    #[serde(default = "default_expiry")]
    pub default_expiry: Duration,

    /// Maximum wait used by `acquire_default`
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
}

impl Default for ExpiringLockConfig {
    fn default() -> Self {
        Self {
            default_expiry: default_expiry(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

// Default value functions
fn default_expiry() -> Duration {
    Duration::from_secs(30)
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(10)
}

impl ExpiringLockConfig {
    /// Configuration where locks never expire on their own
    pub fn manual_release() -> Self {
        Self {
            default_expiry: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Set default expiry
    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    /// Set acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Defaults overridden by `EXPIRING_LOCK_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `EXPIRING_LOCK_*` keys.
    /// Unparsable values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(expiry) = millis_from(&lookup, ENV_DEFAULT_EXPIRY_MS) {
            config.default_expiry = expiry;
        }
        if let Some(timeout) = millis_from(&lookup, ENV_ACQUIRE_TIMEOUT_MS) {
            config.acquire_timeout = timeout;
        }
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.acquire_timeout.is_zero() {
            return Err(LockError::configuration("Acquire timeout must be greater than zero"));
        }

        Ok(())
    }

    /// `default_expiry` as the optional auto-release duration
    pub fn expiry(&self) -> Option<Duration> {
        (!self.default_expiry.is_zero()).then_some(self.default_expiry)
    }
}

fn millis_from(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            warn!("Ignoring {}={:?}: {}", key, raw, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ExpiringLockConfig::default();
        assert_eq!(config.default_expiry, Duration::from_secs(30));
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.expiry(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_manual_release_config() {
        let config = ExpiringLockConfig::manual_release();
        assert!(config.default_expiry.is_zero());
        assert_eq!(config.expiry(), None);
    }

    #[test]
    fn test_config_validation() {
        let config = ExpiringLockConfig::default().with_acquire_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(LockError::Configuration { .. })));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([(ENV_DEFAULT_EXPIRY_MS, "1500"), (ENV_ACQUIRE_TIMEOUT_MS, " 250 ")]);
        let config = ExpiringLockConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.default_expiry, Duration::from_millis(1500));
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = ExpiringLockConfig::from_lookup(|key| (key == ENV_DEFAULT_EXPIRY_MS).then(|| "soon".to_string()));
        assert_eq!(config, ExpiringLockConfig::default());
    }

    #[test]
    fn test_serialization() {
        let config = ExpiringLockConfig::default().with_default_expiry(Duration::from_secs(5));
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: ExpiringLockConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);

        let partial: ExpiringLockConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(partial, ExpiringLockConfig::default());
    }
}
