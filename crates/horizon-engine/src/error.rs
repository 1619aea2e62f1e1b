//! # Engine Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Compensation        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Db(DbError)    │  │  CompensationFailed     │ │
//! │  │  ConfigLoad     │  │  └─ Domain      │  │  (seats still held,     │ │
//! │  │  ConfigSave     │  │     (CoreError) │  │   sweep reclaims them)  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business rule violations raised in this crate are stored the same way the
//! database layer stores them (`Db(DbError::Domain(..))`), so callers match a
//! single shape whichever layer refused the operation.

use horizon_core::{CoreError, ValidationError};
use horizon_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Storage and Domain Errors
    // =========================================================================
    /// A storage error, or a business rule refusal.
    #[error(transparent)]
    Db(#[from] DbError),

    // =========================================================================
    // Compensation Errors
    // =========================================================================
    /// Releasing the seats of a failed checkout kept failing.
    ///
    /// The hold still carries its `expires_at`, so the sweeper reclaims it.
    #[error("Could not release reservation {reservation_id}: {reason}")]
    CompensationFailed {
        reservation_id: String,
        reason: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        EngineError::Db(DbError::Domain(err))
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Db(DbError::Domain(CoreError::Validation(err)))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// The business rule that refused the operation, if any.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            EngineError::Db(err) => err.as_domain(),
            _ => None,
        }
    }

    /// True when repeating the operation may succeed: contention and
    /// connection trouble, never a business rule.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Db(
                DbError::TransactionFailed(_)
                    | DbError::PoolExhausted
                    | DbError::ConnectionFailed(_)
                    | DbError::QueryFailed(_)
            )
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }
}
