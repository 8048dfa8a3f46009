//! Environment variable utilities
//!
//! Parsing helpers behind `DeviceConfig::from_env()` and the log setup.
//!
//! ```ignore
//! use xdma_core::env::{env_get, env_get_bool, env_get_size};
//!
//! let timeout_ms: u64 = env_get("XDMA_TIMEOUT_MS", 3000);
//! let lock = env_get_bool("XDMA_LOCK_ARENA", true);
//! let arena = env_get_size("XDMA_ARENA_BYTES", 32 << 20); // accepts "8M", "64k"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or `default` if unset or unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Boolean variable: "1", "true", "yes", "on" (any case) are true,
/// anything else set is false, unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val),
        Err(_) => default,
    }
}

/// "1", "true", "yes", "on" (any case, surrounding space ignored).
pub fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

/// Byte size with an optional binary suffix: `4096`, `64k`, `8M`, `1G`.
pub fn env_get_size(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

/// Parse `<digits>[k|m|g]` (case-insensitive, powers of 1024).
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let (digits, shift) = match s.chars().last()?.to_ascii_lowercase() {
        'k' => (&s[..s.len() - 1], 10),
        'm' => (&s[..s.len() - 1], 20),
        'g' => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let base: usize = digits.trim().parse().ok()?;
    base.checked_mul(1usize << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__XDMA_TEST_UNSET_12345__", 42);
        assert_eq!(val, 42);
        assert!(env_get_bool("__XDMA_TEST_UNSET_12345__", true));
        assert!(env_get_opt::<u64>("__XDMA_TEST_UNSET_12345__").is_none());
        assert_eq!(env_get_str("__XDMA_TEST_UNSET_12345__", "x"), "x");
        assert!(!env_is_set("__XDMA_TEST_UNSET_12345__"));
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__XDMA_TEST_NUM__", " 123 ");
        let val: usize = env_get("__XDMA_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__XDMA_TEST_NUM__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        std::env::set_var("__XDMA_TEST_BOOL__", "YES");
        assert!(env_get_bool("__XDMA_TEST_BOOL__", false));
        std::env::set_var("__XDMA_TEST_BOOL__", "off");
        assert!(!env_get_bool("__XDMA_TEST_BOOL__", true));
        std::env::remove_var("__XDMA_TEST_BOOL__");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(" On "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("64k"), Some(64 * 1024));
        assert_eq!(parse_size("8M"), Some(8 * 1024 * 1024));
        assert_eq!(parse_size("1g"), Some(1 << 30));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn test_env_get_size() {
        std::env::set_var("__XDMA_TEST_SIZE__", "16k");
        assert_eq!(env_get_size("__XDMA_TEST_SIZE__", 1), 16384);
        std::env::set_var("__XDMA_TEST_SIZE__", "garbage");
        assert_eq!(env_get_size("__XDMA_TEST_SIZE__", 1), 1);
        std::env::remove_var("__XDMA_TEST_SIZE__");
    }
}
