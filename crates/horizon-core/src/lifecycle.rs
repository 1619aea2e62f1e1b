//! # Lifecycle Rules
//!
//! Which status moves are allowed for every stateful entity.
//!
//! ## Transition Planning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  plan_transition(entity, id, current, requested)                       │
//! │                                                                         │
//! │   current == requested  ──►  Transition::Duplicate   (no effects)      │
//! │   current.allows(req)   ──►  Transition::Apply       (write + effects) │
//! │   otherwise             ──►  CoreError::InvalidState                   │
//! │                                                                         │
//! │  The database layer applies an `Apply` with a compare-and-set on       │
//! │  `current`, so a concurrent writer turns into a re-plan, never a       │
//! │  lost update.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment
//! ```text
//!   pending ──► processing ──┬──► completed ──► refunded
//!      │                     ├──► failed
//!      └─────────────────────┴──► cancelled
//!   (pending may skip processing)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{CoreError, CoreResult};
use crate::types::{
    ApprovalStatus, BookingStatus, ModerationStatus, OrderStatus, PaymentStatus,
    RefundStatus, ReservationStatus,
};

// =============================================================================
// Transition Planning
// =============================================================================

/// A status type with a fixed set of allowed moves.
pub trait Lifecycle: Copy + Eq + Display {
    /// True when `self -> next` is an allowed move. Never called with
    /// `next == self`.
    fn allows(&self, next: Self) -> bool;

    /// Terminal statuses never move again.
    fn is_terminal(&self) -> bool;
}

/// What to do with a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the new status and run its effects.
    Apply,
    /// Already in the requested status; do nothing.
    Duplicate,
}

/// Decides whether `current -> requested` is applied, ignored or refused.
pub fn plan_transition<S: Lifecycle>(
    entity: &str,
    id: &str,
    current: S,
    requested: S,
) -> CoreResult<Transition> {
    if current == requested {
        return Ok(Transition::Duplicate);
    }

    if current.allows(requested) {
        Ok(Transition::Apply)
    } else {
        Err(CoreError::invalid_state(entity, id, current, requested))
    }
}

/// Result of an idempotent operation: either it changed something, or the
/// entity was already where the caller wanted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Applied(T),
    Duplicate(T),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Applied(value) | Outcome::Duplicate(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Applied(value) | Outcome::Duplicate(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Duplicate(value) => Outcome::Duplicate(f(value)),
        }
    }
}

// =============================================================================
// Rules per Entity
// =============================================================================

impl Lifecycle for ReservationStatus {
    /// `confirmed -> released` is deliberately absent: only the refund path
    /// revokes a confirmed reservation, through its own guarded update.
    fn allows(&self, next: Self) -> bool {
        use ReservationStatus::*;
        matches!((self, next), (Held, Confirmed) | (Held, Released))
    }

    fn is_terminal(&self) -> bool {
        *self == ReservationStatus::Released
    }
}

impl Lifecycle for PaymentStatus {
    fn allows(&self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending | Processing, Completed)
                | (Pending | Processing, Failed)
                | (Pending | Processing, Cancelled)
                | (Completed, Refunded)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }
}

impl Lifecycle for OrderStatus {
    fn allows(&self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    fn is_terminal(&self) -> bool {
        *self == OrderStatus::Cancelled
    }
}

impl Lifecycle for RefundStatus {
    fn allows(&self, next: Self) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Requested, Processing) | (Requested | Processing, Rejected) | (Processing, Completed)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, RefundStatus::Completed | RefundStatus::Rejected)
    }
}

impl Lifecycle for ModerationStatus {
    /// Moderators may change their mind in any direction.
    fn allows(&self, _next: Self) -> bool {
        true
    }

    fn is_terminal(&self) -> bool {
        false
    }
}

impl Lifecycle for ApprovalStatus {
    fn allows(&self, next: Self) -> bool {
        *self == ApprovalStatus::Pending && next != ApprovalStatus::Pending
    }

    fn is_terminal(&self) -> bool {
        *self != ApprovalStatus::Pending
    }
}

impl Lifecycle for BookingStatus {
    fn allows(&self, next: Self) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending | Approved, Cancelled)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Rejected | BookingStatus::Cancelled)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PAYMENT: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    #[test]
    fn test_same_status_is_duplicate() {
        for status in ALL_PAYMENT {
            assert_eq!(
                plan_transition("payment", "p", status, status).unwrap(),
                Transition::Duplicate
            );
        }
    }

    #[test]
    fn test_gateway_may_skip_processing() {
        assert_eq!(
            plan_transition("payment", "p", PaymentStatus::Pending, PaymentStatus::Completed)
                .unwrap(),
            Transition::Apply
        );
    }

    #[test]
    fn test_terminal_payment_never_moves() {
        for from in [PaymentStatus::Failed, PaymentStatus::Cancelled, PaymentStatus::Refunded] {
            assert!(from.is_terminal());
            for to in ALL_PAYMENT.into_iter().filter(|to| *to != from) {
                let err = plan_transition("payment", "p", from, to).unwrap_err();
                assert!(matches!(err, CoreError::InvalidState { .. }));
            }
        }
    }

    #[test]
    fn test_completed_only_moves_to_refunded() {
        for to in ALL_PAYMENT {
            let allowed = PaymentStatus::Completed.allows(to);
            assert_eq!(allowed, to == PaymentStatus::Refunded, "completed -> {to}");
        }
    }

    #[test]
    fn test_reservation_rules() {
        use ReservationStatus::*;
        assert!(Held.allows(Confirmed));
        assert!(Held.allows(Released));
        assert!(!Confirmed.allows(Released));
        assert!(!Released.allows(Held));
        assert!(plan_transition("reservation", "r", Confirmed, Released).is_err());
    }

    #[test]
    fn test_refund_rules() {
        use RefundStatus::*;
        assert!(Requested.allows(Processing));
        assert!(!Requested.allows(Completed));
        assert!(Processing.allows(Completed));
        assert!(Processing.allows(Rejected));
        assert!(!Rejected.allows(Processing));
    }

    #[test]
    fn test_moderation_round_trip_allowed() {
        use ModerationStatus::*;
        assert!(Approved.allows(Rejected));
        assert!(Rejected.allows(Approved));
    }

    #[test]
    fn test_booking_rules() {
        use BookingStatus::*;
        assert!(Approved.allows(Cancelled));
        assert!(!Rejected.allows(Approved));
        assert!(!Cancelled.allows(Pending));
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = Outcome::Applied(3).map(|n| n * 2);
        assert!(outcome.is_applied());
        assert_eq!(*outcome.value(), 6);
        assert_eq!(Outcome::Duplicate("x").into_inner(), "x");
    }
}
