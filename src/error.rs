//! Unified error handling for the join-barrier library.
//!
//! Signal delivery itself never fails. Errors only come out of barrier
//! construction, name lookups, registry bookkeeping and config parsing.

use thiserror::Error;

/// Unified error type for join-barrier operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// Barrier declared without any signal slots
    #[error("Barrier must await at least one signal")]
    NoSignals,

    /// More slots than the completion bitmask can track
    #[error("Barrier declares {count} signals, maximum {max} supported")]
    TooManySignals { count: usize, max: usize },

    /// Two slots share a name
    #[error("Signal '{name}' declared more than once")]
    DuplicateSignal { name: String },

    /// More than one slot marked as primary
    #[error("Signal '{second}' cannot be primary, '{first}' already is")]
    MultiplePrimary { first: String, second: String },

    /// Primary name does not match any declared slot
    #[error("Primary signal '{name}' is not one of the declared signals")]
    UnknownPrimary { name: String },

    /// Signal name not owned by the barrier
    #[error("Barrier '{barrier}' has no signal named '{name}'")]
    UnknownSignal { barrier: String, name: String },

    /// Registry handle does not (or no longer) refer to a live barrier
    #[error("No live barrier for handle {handle}")]
    UnknownHandle { handle: u64 },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<serde_json::Error> for BarrierError {
    fn from(err: serde_json::Error) -> Self {
        BarrierError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for join-barrier operations.
pub type Result<T> = std::result::Result<T, BarrierError>;
