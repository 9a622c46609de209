//! Environment lookups for configuration overrides
//!
//! Unset and unparsable variables behave the same: the caller's current
//! value is kept. Unparsable values are logged so a typo is not silent.

use gatehttpd_core::kwarn;
use std::str::FromStr;

/// Parse `key` as `T`, or `None` when unset or invalid.
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            kwarn!("ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

/// Parse `key` as `T`, falling back to `default`.
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Non-empty string value of `key`.
pub fn env_get_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_uses_default() {
        assert_eq!(env_get("GATE_TEST_SURELY_UNSET_VAR", 42usize), 42);
        assert_eq!(env_get_opt::<u16>("GATE_TEST_SURELY_UNSET_VAR"), None);
        assert_eq!(env_get_str("GATE_TEST_SURELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_parse_and_reject() {
        std::env::set_var("GATE_TEST_ENV_PORT", " 8081 ");
        assert_eq!(env_get("GATE_TEST_ENV_PORT", 1u16), 8081);
        std::env::set_var("GATE_TEST_ENV_PORT", "eighty");
        assert_eq!(env_get("GATE_TEST_ENV_PORT", 1u16), 1);
        std::env::remove_var("GATE_TEST_ENV_PORT");
    }
}
