//! # Validation Module
//!
//! Input checks that run before any business logic or storage.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── quantities, ratings, time ranges, lengths, currency codes         │
//! │  └── returns ValidationError, never touches storage                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SQLite                                                       │
//! │  ├── CHECK (reserved_units <= total_seats), rating range               │
//! │  ├── UNIQUE (ticket_number), one review per (user, target)             │
//! │  └── partial UNIQUE for pending role requests                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveTime;

use crate::error::ValidationError;
use crate::{MAX_RATING, MIN_RATING};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TEXT_LEN: usize = 5000;
/// $1,000,000. Keeps every order total far inside i64 cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

// =============================================================================
// Text
// =============================================================================

/// Requires a non-blank value of at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Like [`validate_text`] but blank is allowed.
pub fn validate_text_optional(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates an ISO 4217 style currency code (three uppercase letters).
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: format!("'{code}' is not a three-letter code"),
        })
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// Validates a ticket quantity against the per-order bounds.
///
/// ```rust
/// use horizon_core::validation::validate_quantity;
///
/// assert!(validate_quantity(6, 1, 10).is_ok());
/// assert!(validate_quantity(0, 1, 10).is_err());
/// assert!(validate_quantity(11, 1, 10).is_err());
/// ```
pub fn validate_quantity(qty: i64, min: i64, max: i64) -> ValidationResult<()> {
    if qty < min || qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min,
            max,
        });
    }
    Ok(())
}

pub fn validate_rating(rating: i64) -> ValidationResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ValidationError::OutOfRange {
            field: "rating".to_string(),
            min: MIN_RATING,
            max: MAX_RATING,
        });
    }
    Ok(())
}

/// Requires a strictly positive integer (seats, capacity, attendees).
pub fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Prices may be zero (free events) but never negative.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Expected attendees must be positive and fit the venue.
pub fn validate_attendees(expected: i64, capacity: i64) -> ValidationResult<()> {
    if expected <= 0 || expected > capacity {
        return Err(ValidationError::OutOfRange {
            field: "expected_attendees".to_string(),
            min: 1,
            max: capacity,
        });
    }
    Ok(())
}

// =============================================================================
// Time
// =============================================================================

/// A booking slot must end after it starts.
pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::InvalidFormat {
            field: "end_time".to_string(),
            reason: format!("{end} is not after {start}"),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("title", "Great show", MAX_TITLE_LEN).is_ok());
        assert!(matches!(
            validate_text("title", "   ", MAX_TITLE_LEN),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_text("title", &"x".repeat(201), MAX_TITLE_LEN),
            Err(ValidationError::TooLong { max: 200, .. })
        ));
        assert!(validate_text_optional("description", "", MAX_TEXT_LEN).is_ok());
        assert!(validate_text_optional("description", &"x".repeat(11), 10).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
    }

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_validate_attendees() {
        assert!(validate_attendees(100, 100).is_ok());
        assert!(validate_attendees(101, 100).is_err());
        assert!(validate_attendees(0, 100).is_err());
    }

    #[test]
    fn test_validate_time_range() {
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert!(validate_time_range(ten, noon).is_ok());
        assert!(validate_time_range(noon, ten).is_err());
        assert!(validate_time_range(ten, ten).is_err());
    }

    #[test]
    fn test_validate_positive_and_price() {
        assert!(validate_positive("total_seats", 10).is_ok());
        assert!(validate_positive("total_seats", 0).is_err());
        assert!(validate_price_cents("price", 0).is_ok());
        assert!(validate_price_cents("price", -1).is_err());
        assert!(validate_price_cents("price", MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents("price", i64::MAX / 4).is_err());
    }
}
