//! Error types for RELAY operations
//!
//! Precondition violations (triggering an unknown type, overflowing the queue
//! page, reading past an arena) are programmer errors. The plain operations
//! abort through [`fatal`]; the `try_*` forms hand the same error back instead.

use thiserror::Error;

/// Arena access errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("Arena holds {held}, cannot access it as {requested}")]
    TypeMismatch {
        held: &'static str,
        requested: &'static str,
    },

    #[error("Offset {offset} out of bounds for {name} (stride {stride}, length {len})")]
    OutOfBounds {
        name: &'static str,
        offset: usize,
        stride: usize,
        len: usize,
    },

    #[error("Cannot copy arena holding {name}: type has drop glue")]
    NonTrivialCopy { name: &'static str },
}

/// Event queue errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Event queue full: {name} needs {needed} bytes, {remaining} of {capacity} remaining")]
    Full {
        name: &'static str,
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    #[error("Event {name} of {size} bytes exceeds the queue record limit of {limit} bytes")]
    RecordTooLarge {
        name: &'static str,
        size: usize,
        limit: usize,
    },
}

/// Dispatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Event type not registered: {name}")]
    Unregistered { name: &'static str },

    #[error("Queued record has unregistered event type: {name}")]
    UnregisteredRecord { name: &'static str },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all RELAY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Arena error: {0}")]
    Arena(#[from] ArenaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for RELAY operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Abort on a violated precondition.
///
/// Logs the error and panics with its display text, so `should_panic` tests
/// can match on the same message the `try_*` forms return.
#[cold]
#[track_caller]
pub fn fatal<E: std::error::Error>(err: E) -> ! {
    tracing::error!(error = %err, "fatal precondition violation");
    panic!("{}", err)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_error_display_type_mismatch() {
        let err = ArenaError::TypeMismatch {
            held: "KeyEvent",
            requested: "ChatMessage",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("KeyEvent"));
        assert!(msg.contains("ChatMessage"));
    }

    #[test]
    fn test_arena_error_display_out_of_bounds() {
        let err = ArenaError::OutOfBounds {
            name: "u64",
            offset: 64,
            stride: 8,
            len: 16,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("out of bounds"));
        assert!(msg.contains("64"));
        assert!(msg.contains("16"));
    }

    #[test]
    fn test_queue_error_display_full() {
        let err = QueueError::Full {
            name: "Collision",
            needed: 48,
            remaining: 16,
            capacity: 4096,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Event queue full"));
        assert!(msg.contains("Collision"));
        assert!(msg.contains("4096"));
    }

    #[test]
    fn test_dispatch_error_display_unregistered() {
        let err = DispatchError::Unregistered { name: "CloseEvent" };
        let msg = format!("{}", err);
        assert!(msg.contains("not registered"));
        assert!(msg.contains("CloseEvent"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "queue_page_size".to_string(),
            value: "12".to_string(),
            reason: "too small".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("queue_page_size"));
        assert!(msg.contains("12"));
        assert!(msg.contains("too small"));
    }

    #[test]
    fn test_relay_error_from_variants() {
        let arena = RelayError::from(ArenaError::NonTrivialCopy { name: "String" });
        assert!(matches!(arena, RelayError::Arena(_)));

        let queue = RelayError::from(QueueError::RecordTooLarge {
            name: "Blob",
            size: 1 << 20,
            limit: 1 << 18,
        });
        assert!(matches!(queue, RelayError::Queue(_)));

        let dispatch = RelayError::from(DispatchError::UnregisteredRecord { name: "Ping" });
        assert!(matches!(dispatch, RelayError::Dispatch(_)));

        let config = RelayError::from(ConfigError::InvalidValue {
            field: "f".to_string(),
            value: "v".to_string(),
            reason: "r".to_string(),
        });
        assert!(matches!(config, RelayError::Config(_)));
    }

    #[test]
    #[should_panic(expected = "Event type not registered: Ghost")]
    fn test_fatal_panics_with_display_text() {
        fatal(DispatchError::Unregistered { name: "Ghost" });
    }
}
