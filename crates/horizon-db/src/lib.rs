//! # horizon-db: Database Layer for Horizon Box Office
//!
//! SQLite persistence for the box office. Every state transition the
//! engine performs is one transaction in this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Horizon Box Office Data Flow                        │
//! │                                                                         │
//! │  BoxOffice::purchase / confirm_payment / process_refund / ...          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   horizon-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ ledger, order, │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ payment,refund │    │ 001_init.sql │  │   │
//! │  │   │ WAL + busy    │    │ moderation,... │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories (catalog, ledger, orders, payments, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use horizon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("horizon.db")).await?;
//! let hold = db.ledger().reserve(&event_id, 2, None, expires_at, now).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::booking::BookingRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::moderation::{ModerationChange, ModerationRepository};
pub use repository::order::{NewPurchase, OrderRepository, PurchaseRecords};
pub use repository::payment::{PaymentRepository, PaymentTransition};
pub use repository::refund::{RefundRepository, RefundTransition};
pub use repository::role::RoleRepository;
