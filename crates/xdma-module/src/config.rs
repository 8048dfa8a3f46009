//! Device configuration

use std::time::Duration;
use xdma_core::constants::{
    DEFAULT_ARENA_SIZE, DEFAULT_SELFTEST_LEN, DEFAULT_TRANSFER_TIMEOUT, MAX_DEVICES,
};
use xdma_core::env::{parse_bool, parse_size};
use xdma_core::error::{Result, XdmaError};

/// Configuration for an `XdmaDevice`
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Shared arena size in bytes (default: 32 MiB)
    pub arena_capacity: usize,

    /// Cap on probed channel pairs (default: 4)
    pub max_devices: usize,

    /// Bound on `start(wait = true)` (default: 3000ms)
    pub transfer_timeout: Duration,

    /// Pin the arena pages (best-effort, default: true)
    pub lock_arena: bool,

    /// Length of each builtin self-test buffer (default: 1 MiB)
    pub selftest_len: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            arena_capacity: DEFAULT_ARENA_SIZE,
            max_devices: MAX_DEVICES,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            lock_arena: true,
            selftest_len: DEFAULT_SELFTEST_LEN,
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `XDMA_ARENA_BYTES`, `XDMA_MAX_DEVICES`,
    /// `XDMA_TIMEOUT_MS`, `XDMA_LOCK_ARENA` and `XDMA_SELFTEST_BYTES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    /// Unset or unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let size = |key: &str, default: usize| lookup(key).and_then(|v| parse_size(&v)).unwrap_or(default);
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            arena_capacity: size("XDMA_ARENA_BYTES", d.arena_capacity),
            max_devices: num("XDMA_MAX_DEVICES").map_or(d.max_devices, |n| n as usize),
            transfer_timeout: num("XDMA_TIMEOUT_MS").map_or(d.transfer_timeout, Duration::from_millis),
            lock_arena: lookup("XDMA_LOCK_ARENA").map_or(d.lock_arena, |v| parse_bool(&v)),
            selftest_len: size("XDMA_SELFTEST_BYTES", d.selftest_len),
        }
    }

    pub fn arena_capacity(mut self, bytes: usize) -> Self {
        self.arena_capacity = bytes;
        self
    }

    pub fn max_devices(mut self, n: usize) -> Self {
        self.max_devices = n;
        self
    }

    pub fn transfer_timeout(mut self, d: Duration) -> Self {
        self.transfer_timeout = d;
        self
    }

    pub fn lock_arena(mut self, lock: bool) -> Self {
        self.lock_arena = lock;
        self
    }

    pub fn selftest_len(mut self, bytes: usize) -> Self {
        self.selftest_len = bytes;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.arena_capacity == 0 {
            return Err(XdmaError::InvalidConfig("arena_capacity must be non-zero"));
        }
        if self.arena_capacity > u32::MAX as usize {
            return Err(XdmaError::InvalidConfig("arena_capacity exceeds 4 GiB"));
        }
        if self.max_devices == 0 {
            return Err(XdmaError::InvalidConfig("max_devices must be at least 1"));
        }
        if self.transfer_timeout.is_zero() {
            return Err(XdmaError::InvalidConfig("transfer_timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let c = DeviceConfig::default();
        assert_eq!(c.arena_capacity, 32 * 1024 * 1024);
        assert_eq!(c.max_devices, 4);
        assert_eq!(c.transfer_timeout, Duration::from_millis(3000));
        c.validate().unwrap();
    }

    #[test]
    fn test_builder_and_validate() {
        let c = DeviceConfig::new().arena_capacity(0);
        assert!(c.validate().is_err());
        let c = DeviceConfig::new().max_devices(0);
        assert!(c.validate().is_err());
        let c = DeviceConfig::new().transfer_timeout(Duration::ZERO);
        assert!(c.validate().is_err());
        let c = DeviceConfig::new().arena_capacity(8192).lock_arena(false);
        c.validate().unwrap();
    }

    #[test]
    fn test_from_lookup() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("XDMA_ARENA_BYTES", "64k"),
            ("XDMA_TIMEOUT_MS", " 250"),
            ("XDMA_LOCK_ARENA", "off"),
            ("XDMA_MAX_DEVICES", "many"),
        ]
        .into_iter()
        .collect();
        let c = DeviceConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(c.arena_capacity, 64 * 1024);
        assert_eq!(c.transfer_timeout, Duration::from_millis(250));
        assert!(!c.lock_arena);
        assert_eq!(c.max_devices, MAX_DEVICES);
        assert_eq!(c.selftest_len, DEFAULT_SELFTEST_LEN);
    }
}
