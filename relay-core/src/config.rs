//! Configuration types

use crate::error::{ConfigError, RelayError, RelayResult};
use crate::queue::PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Smallest accepted queue page.
pub const MIN_QUEUE_PAGE_SIZE: usize = 4096;

/// Largest accepted per-type arena pre-reservation, in elements.
pub const MAX_ARENA_INITIAL_CAPACITY: usize = 1 << 20;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bytes in the cross-type queue page
    pub queue_page_size: usize,
    /// Elements reserved in a type's arena when the type is first registered
    pub arena_initial_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_page_size: PAGE_SIZE,
            arena_initial_capacity: 0,
        }
    }
}

impl RelayConfig {
    /// Validate the configuration.
    ///
    /// Validates:
    /// - queue_page_size in [MIN_QUEUE_PAGE_SIZE, PAGE_SIZE]
    /// - arena_initial_capacity <= MAX_ARENA_INITIAL_CAPACITY
    pub fn validate(&self) -> RelayResult<()> {
        if self.queue_page_size < MIN_QUEUE_PAGE_SIZE || self.queue_page_size > PAGE_SIZE {
            return Err(RelayError::Config(ConfigError::InvalidValue {
                field: "queue_page_size".to_string(),
                value: self.queue_page_size.to_string(),
                reason: format!(
                    "queue_page_size must be between {} and {} bytes",
                    MIN_QUEUE_PAGE_SIZE, PAGE_SIZE
                ),
            }));
        }

        if self.arena_initial_capacity > MAX_ARENA_INITIAL_CAPACITY {
            return Err(RelayError::Config(ConfigError::InvalidValue {
                field: "arena_initial_capacity".to_string(),
                value: self.arena_initial_capacity.to_string(),
                reason: format!(
                    "arena_initial_capacity must not exceed {} elements",
                    MAX_ARENA_INITIAL_CAPACITY
                ),
            }));
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `RELAY_QUEUE_PAGE_SIZE`: Queue page size in bytes (default: 1048576)
    /// - `RELAY_ARENA_INITIAL_CAPACITY`: Per-type arena pre-reservation (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            queue_page_size: std::env::var("RELAY_QUEUE_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_page_size),
            arena_initial_capacity: std::env::var("RELAY_ARENA_INITIAL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.arena_initial_capacity),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert_eq!(config.queue_page_size, PAGE_SIZE);
        assert_eq!(config.arena_initial_capacity, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tiny_page() {
        let config = RelayConfig {
            queue_page_size: 512,
            ..RelayConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            RelayError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "queue_page_size"
        ));
    }

    #[test]
    fn test_validate_rejects_page_over_default() {
        let config = RelayConfig {
            queue_page_size: PAGE_SIZE * 2,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_reservation() {
        let config = RelayConfig {
            arena_initial_capacity: MAX_ARENA_INITIAL_CAPACITY + 1,
            ..RelayConfig::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("arena_initial_capacity"));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{ "arena_initial_capacity": 64 }"#).unwrap();
        assert_eq!(config.arena_initial_capacity, 64);
        assert_eq!(config.queue_page_size, PAGE_SIZE);
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        let config = RelayConfig::from_env();
        if std::env::var("RELAY_QUEUE_PAGE_SIZE").is_err() {
            assert_eq!(config.queue_page_size, PAGE_SIZE);
        }
        if std::env::var("RELAY_ARENA_INITIAL_CAPACITY").is_err() {
            assert_eq!(config.arena_initial_capacity, 0);
        }
    }
}
