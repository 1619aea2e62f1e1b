//! # horizon-engine: Box Office Service Layer
//!
//! Wraps the database layer with an injected clock, a notifier, checkout
//! configuration and the background reservation sweeper.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Horizon Box Office Engine                        │
//! │                                                                         │
//! │  caller ──► BoxOffice ──────────────────────────► horizon-db           │
//! │               │   purchase                         (one tx per          │
//! │               │   ├─ reserve seats (expires_at)     transition)         │
//! │               │   ├─ ReservationGuard armed                             │
//! │               │   ├─ order + payment + ticket                           │
//! │               │   └─ failure ──► release (backoff)                      │
//! │               │                                                         │
//! │               │   confirm/cancel payment, refunds, moderation,          │
//! │               │   role upgrades, venue bookings                         │
//! │               │                                                         │
//! │               └─► Notifier (spawned, failures logged, never fatal)     │
//! │                                                                         │
//! │  ReservationSweeper ──every interval──► expired holds                  │
//! │                                          ├─ order: cancel payment       │
//! │                                          └─ orphan: release seats       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Service
//! - [`box_office`] - `BoxOffice` handle, catalog, tickets and sales reporting
//! - [`fulfillment`] - Checkout with compensating seat release
//! - [`payments`] - Gateway confirmations and cancellations
//! - [`refunds`] - Refund requests and staff decisions
//! - [`moderation`] - Reviews, comments, votes and moderation
//! - [`approvals`] - Role upgrade and venue booking approvals
//! - [`sweeper`] - Background reclamation of expired holds
//!
//! ### Collaborators
//! - [`clock`] - Injected time source
//! - [`notify`] - Fire-and-forget user notifications
//! - [`entry_pass`] - Entry pass rendering
//!
//! ### Infrastructure
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use horizon_db::Database;
//! use horizon_engine::{BoxOffice, EngineConfig, ReservationSweeper, SystemClock, TracingNotifier};
//!
//! let config = EngineConfig::load_or_default(None);
//! let db = Database::new(config.database.db_config()).await?;
//! let office = BoxOffice::new(db, config, Arc::new(SystemClock), Arc::new(TracingNotifier));
//!
//! let (sweeper, handle) = ReservationSweeper::new(office.clone());
//! tokio::spawn(sweeper.run());
//!
//! let receipt = office.purchase(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Service
pub mod approvals;
pub mod box_office;
pub mod fulfillment;
pub mod moderation;
pub mod payments;
pub mod refunds;
pub mod sweeper;

// Collaborators
pub mod clock;
pub mod entry_pass;
pub mod notify;

// Infrastructure
pub mod config;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use box_office::{BoxOffice, Reviewer};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use config::{CheckoutSettings, CompensationSettings, DatabaseSettings, EngineConfig, SweeperSettings};
pub use entry_pass::{EntryPass, EntryPassRenderer, TextPassRenderer};
pub use error::{EngineError, EngineResult};
pub use fulfillment::{Customer, PurchaseReceipt, PurchaseRequest};
pub use notify::{Notification, Notifier, NotifyError, NotifyFuture, TracingNotifier};
pub use sweeper::{ReservationSweeper, SweepReport, SweeperHandle};
