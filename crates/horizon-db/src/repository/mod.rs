//! # Repositories
//!
//! One repository per aggregate. Each holds a cloned `SqlitePool`.
//!
//! Operations that must join another aggregate's transaction (the ledger
//! moves inside a payment transition, the order status inside a refund)
//! are exposed as `*_in(conn, ...)` functions taking the open connection.

pub mod booking;
pub mod catalog;
pub mod ledger;
pub mod moderation;
pub mod order;
pub mod payment;
pub mod refund;
pub mod role;

/// Attempts a compare-and-set transition makes before giving up on a row
/// that keeps changing underneath it.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 3;
