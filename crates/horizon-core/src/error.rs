//! # Error Types
//!
//! Domain-specific error types for horizon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  horizon-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  horizon-db errors                                                     │
//! │  └── DbError          - Storage failures, wraps CoreError as Domain    │
//! │                                                                         │
//! │  horizon-engine errors                                                 │
//! │  └── EngineError      - What callers see (+ compensation, config)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Every variant is recoverable from the caller's point of view: nothing
/// here is fatal to the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A reservation asked for more seats than the event has left.
    ///
    /// ## When This Occurs
    /// - Two buyers race for the last seats and the conditional update
    ///   rejects the second one
    /// - A single order asks for more than the remaining capacity
    ///
    /// Nothing was written when this is returned.
    #[error("Insufficient inventory for event {event_id}: available {available}, requested {requested}")]
    InsufficientInventory {
        event_id: String,
        available: i64,
        requested: i64,
    },

    /// A status transition is not allowed from the current status.
    ///
    /// ## When This Occurs
    /// - A gateway callback tries to move a `failed` payment to `completed`
    /// - Releasing a reservation that was already confirmed
    /// - Redeeming a ticket twice
    #[error("{entity} {id} is {current}, cannot move to {requested}")]
    InvalidState {
        entity: String,
        id: String,
        current: String,
        requested: String,
    },

    /// A money amount is outside what the current state allows.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A value that must be unique already exists.
    #[error("{field} '{value}' already exists")]
    UniquenessViolation { field: String, value: String },

    /// Approving this booking would overlap another approved booking.
    #[error("Booking {booking_id} overlaps approved booking {conflicting_id} at venue {venue_id}")]
    BookingConflict {
        venue_id: String,
        booking_id: String,
        conflicting_id: String,
    },

    /// The caller is not allowed to perform this action.
    #[error("Forbidden: {action}")]
    Forbidden { action: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds an `InvalidState` from anything that displays as a status.
    pub fn invalid_state(
        entity: &str,
        id: &str,
        current: impl std::fmt::Display,
        requested: impl std::fmt::Display,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.to_string(),
            id: id.to_string(),
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub fn forbidden(action: impl Into<String>) -> Self {
        CoreError::Forbidden {
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad currency code, inverted time range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
