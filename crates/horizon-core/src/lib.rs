//! # horizon-core: Pure Business Logic for Horizon Box Office
//!
//! This crate holds the rules of the box office as pure functions with zero
//! I/O dependencies. Every time-dependent rule takes the instant as an
//! argument; the caller owns the clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Horizon Box Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 horizon-engine (BoxOffice)                      │   │
//! │  │   purchase, confirm_payment, process_refund, moderation, ...   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ horizon-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌──────────────┐    │   │
//! │  │   │  types   │ │  money   │ │  pricing  │ │  lifecycle   │    │   │
//! │  │   │  Event   │ │  Money   │ │  tiers    │ │  transitions │    │   │
//! │  │   │  Order   │ │  Rate    │ │  quotes   │ │  outcomes    │    │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └──────────────┘    │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐                     │   │
//! │  │   │ identity │ │  rating  │ │validation │                     │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘                     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  horizon-db (Database Layer)                    │   │
//! │  │         SQLite ledger, repositories, atomic transitions         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Event, Reservation, Payment, Order, ...)
//! - [`money`] - Money and Rate types with integer arithmetic
//! - [`pricing`] - Time-windowed tier resolution and order breakdowns
//! - [`lifecycle`] - Allowed status transitions for every entity
//! - [`identity`] - Ticket numbers, order numbers, entry payloads
//! - [`rating`] - Aggregates recomputed from source rows
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use horizon_core::money::{Money, Rate};
//!
//! let subtotal = Money::from_cents(10_000); // $100.00
//! let tax = subtotal.apply_rate(Rate::from_bps(800)); // 8%
//! assert_eq!(tax.cents(), 800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod rating;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{Lifecycle, Outcome, Transition};
pub use money::{Money, Rate};
pub use pricing::{PriceBreakdown, PriceQuote};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest number of tickets a single order may carry.
pub const MIN_TICKETS_PER_ORDER: i64 = 1;

/// Largest number of tickets a single order may carry.
///
/// ## Business Reason
/// Caps bulk buying from a single checkout. Configurable per deployment
/// through the engine's `[checkout]` section.
pub const MAX_TICKETS_PER_ORDER: i64 = 10;

/// Currency used when a purchase does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Default sales tax applied to the ticket subtotal (8.00%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 800;

/// Default service fee applied to the ticket subtotal (3.00%).
pub const DEFAULT_SERVICE_FEE_BPS: u32 = 300;

/// Lowest star rating a review may carry.
pub const MIN_RATING: i64 = 1;

/// Highest star rating a review may carry.
pub const MAX_RATING: i64 = 5;
