//! # Domain Types
//!
//! Core domain types used throughout Horizon Box Office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐             │
//! │  │    Event      │   │  PricingTier  │   │  Reservation  │             │
//! │  │  total_seats  │◄──│  category     │   │  quantity     │             │
//! │  │  reserved     │   │  valid window │   │  held/...     │             │
//! │  └──────┬────────┘   └───────────────┘   └──────┬────────┘             │
//! │         │                                       │                       │
//! │  ┌──────▼────────┐   ┌───────────────┐   ┌──────▼────────┐             │
//! │  │    Order      │──►│   Payment     │◄──│    Refund     │             │
//! │  │  order_number │   │  status       │   │  amount       │             │
//! │  │  total        │   │  refunded     │   │  status       │             │
//! │  └──────┬────────┘   └───────────────┘   └───────────────┘             │
//! │         │                                                               │
//! │  ┌──────▼────────┐   ┌───────────────┐   ┌───────────────┐             │
//! │  │    Ticket     │   │ Review/Comment│   │ Role/Booking  │             │
//! │  │ ticket_number │   │  moderation   │   │  approvals    │             │
//! │  │ entry_payload │   │  aggregates   │   │               │             │
//! │  └───────────────┘   └───────────────┘   └───────────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for relations
//! - Business ID where one exists (`order_number`, `ticket_number`)
//!
//! Money columns are stored as `*_cents: i64` with `Money` accessors.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Generates `as_str` and `Display` for a status enum. The text matches the
/// serde and sqlx representation.
macro_rules! status_text {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the stored snake_case form.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// Event
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

status_text!(EventStatus {
    Draft => "draft",
    Published => "published",
    Cancelled => "cancelled",
    Completed => "completed",
});

/// An event with a fixed seat capacity.
///
/// `reserved_units` is owned by the inventory ledger: it counts seats held
/// by live reservations plus seats of confirmed reservations. Nothing else
/// writes it.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Event {
    pub id: String,
    pub venue_id: String,
    pub organizer_id: String,
    pub title: String,
    pub status: EventStatus,
    /// Price used when no pricing tier applies.
    pub base_price_cents: i64,
    /// Fixed capacity, set once at creation.
    pub total_seats: i64,
    pub reserved_units: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// Seats not yet held or sold.
    #[inline]
    pub fn available_seats(&self) -> i64 {
        self.total_seats - self.reserved_units
    }

    #[inline]
    pub fn is_on_sale(&self) -> bool {
        self.status == EventStatus::Published
    }
}

// =============================================================================
// Pricing Tier
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Regular,
    Vip,
    Student,
    Senior,
}

status_text!(TicketCategory {
    Regular => "regular",
    Vip => "vip",
    Student => "student",
    Senior => "senior",
});

impl Default for TicketCategory {
    fn default() -> Self {
        TicketCategory::Regular
    }
}

/// A time-windowed price for one ticket category of an event.
///
/// The window is half-open: `valid_from <= t < valid_until`. A missing
/// bound is unbounded on that side.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingTier {
    pub id: String,
    pub event_id: String,
    pub category: TicketCategory,
    pub name: String,
    pub price_cents: i64,
    /// Tickets left at this price. Decremented on confirmation, never below 0.
    pub available_quantity: i64,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PricingTier {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True when `at` falls inside the tier's window.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        let started = self.valid_from.map_or(true, |from| from <= at);
        let not_ended = self.valid_until.map_or(true, |until| at < until);
        started && not_ended
    }

    /// True when the tier may be offered at `at`.
    pub fn is_offered_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.available_quantity > 0 && self.covers(at)
    }
}

// =============================================================================
// Reservation
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Seats are held while payment is pending.
    Held,
    /// Payment completed; seats are sold.
    Confirmed,
    /// Seats returned to the event.
    Released,
}

status_text!(ReservationStatus {
    Held => "held",
    Confirmed => "confirmed",
    Released => "released",
});

/// A hold on `quantity` seats of one event.
///
/// Created before the payment exists. Both `held` and `confirmed`
/// reservations count against the event's `reserved_units`.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reservation {
    pub id: String,
    pub event_id: String,
    /// Tier whose price was quoted, if any.
    pub tier_id: Option<String>,
    pub quantity: i64,
    pub status: ReservationStatus,
    /// Hold deadline; the sweeper reclaims held seats past this instant.
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held && self.expires_at <= now
    }
}

// =============================================================================
// Payment
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

status_text!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

status_text!(PaymentMethod {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Paypal => "paypal",
    BankTransfer => "bank_transfer",
});

/// The single payment attached to an order.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub amount_cents: i64,
    /// Sum of completed refunds.
    pub refunded_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Empty until the gateway responds.
    pub transaction_id: String,
    /// Raw gateway response, stored as JSON text.
    pub gateway_response: String,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub failed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_cents(self.refunded_cents)
    }

    /// Amount not yet covered by completed refunds.
    #[inline]
    pub fn refundable(&self) -> Money {
        self.amount() - self.refunded()
    }
}

/// The status a payment gateway reports in a callback.
///
/// `Refunded` is absent: only the refund workflow moves a payment there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl From<GatewayStatus> for PaymentStatus {
    fn from(status: GatewayStatus) -> Self {
        match status {
            GatewayStatus::Processing => PaymentStatus::Processing,
            GatewayStatus::Completed => PaymentStatus::Completed,
            GatewayStatus::Failed => PaymentStatus::Failed,
            GatewayStatus::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

/// What the gateway sent along with a status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GatewayPayload {
    pub transaction_id: String,
    #[ts(as = "String")]
    pub response: serde_json::Value,
}

// =============================================================================
// Order
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

status_text!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

/// A ticket order. Exactly one payment, one event, one reservation.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-facing identifier, assigned once.
    pub order_number: String,
    pub payment_id: String,
    pub reservation_id: String,
    pub user_id: String,
    pub event_id: String,
    pub category: TicketCategory,
    pub ticket_quantity: i64,
    pub unit_price_cents: i64,
    pub tax_cents: i64,
    pub service_fee_cents: i64,
    /// `ticket_quantity * unit_price + tax + service_fee`.
    pub total_cents: i64,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_email: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// An issued ticket. `ticket_number` and `entry_payload` never change.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Ticket {
    pub id: String,
    pub order_id: String,
    pub event_id: String,
    pub user_id: String,
    pub ticket_number: String,
    pub category: TicketCategory,
    /// Opaque string handed to the entry-pass renderer.
    pub entry_payload: String,
    pub is_used: bool,
    #[ts(as = "Option<String>")]
    pub used_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Refund
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    EventCancelled,
    CustomerRequest,
    DuplicatePayment,
    Fraud,
    Other,
}

status_text!(RefundReason {
    EventCancelled => "event_cancelled",
    CustomerRequest => "customer_request",
    DuplicatePayment => "duplicate_payment",
    Fraud => "fraud",
    Other => "other",
});

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Requested,
    Processing,
    Completed,
    Rejected,
}

status_text!(RefundStatus {
    Requested => "requested",
    Processing => "processing",
    Completed => "completed",
    Rejected => "rejected",
});

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub amount_cents: i64,
    pub reason: RefundReason,
    pub description: String,
    pub status: RefundStatus,
    pub processed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    pub gateway_refund_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Refund {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// What a staff member decided about a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RefundDecision {
    /// requested -> processing
    Approve,
    /// processing -> completed
    Complete { gateway_refund_id: String },
    /// requested|processing -> rejected
    Reject,
}

impl RefundDecision {
    /// The refund status this decision leads to.
    pub fn target(&self) -> RefundStatus {
        match self {
            RefundDecision::Approve => RefundStatus::Processing,
            RefundDecision::Complete { .. } => RefundStatus::Completed,
            RefundDecision::Reject => RefundStatus::Rejected,
        }
    }
}

// =============================================================================
// Moderation: Reviews and Comments
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

status_text!(ModerationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Event,
    Venue,
}

status_text!(TargetKind {
    Event => "event",
    Venue => "venue",
});

/// What a review is about. Exactly one target, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReviewTarget {
    Event(String),
    Venue(String),
}

impl ReviewTarget {
    pub fn from_parts(kind: TargetKind, id: String) -> Self {
        match kind {
            TargetKind::Event => ReviewTarget::Event(id),
            TargetKind::Venue => ReviewTarget::Venue(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            ReviewTarget::Event(_) => TargetKind::Event,
            ReviewTarget::Venue(_) => TargetKind::Venue,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReviewTarget::Event(id) | ReviewTarget::Venue(id) => id,
        }
    }
}

impl std::fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub target: ReviewTarget,
    /// 1 to 5 stars.
    pub rating: i64,
    pub title: String,
    pub content: String,
    pub status: ModerationStatus,
    pub helpful_votes: i64,
    pub total_votes: i64,
    pub moderated_by: Option<String>,
    pub moderation_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A comment on an event, optionally replying to another comment.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Comment {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub status: ModerationStatus,
    /// Rebuilt from `comment_likes` on every like or unlike.
    pub likes: i64,
    pub moderated_by: Option<String>,
    pub moderation_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Either kind of moderated content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ModeratedItem {
    Review(String),
    Comment(String),
}

/// Derived counters for a review target. Only the moderation engine writes
/// these, and always by re-scanning approved rows.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TargetAggregate {
    pub target_kind: TargetKind,
    pub target_id: String,
    pub reviews_count: i64,
    pub rating_total: i64,
    pub average_rating: f64,
    pub comments_count: i64,
}

impl TargetAggregate {
    /// The aggregate of a target nobody has reviewed yet.
    pub fn empty(target: &ReviewTarget) -> Self {
        TargetAggregate {
            target_kind: target.kind(),
            target_id: target.id().to_string(),
            reviews_count: 0,
            rating_total: 0,
            average_rating: 0.0,
            comments_count: 0,
        }
    }

    pub fn target(&self) -> ReviewTarget {
        ReviewTarget::from_parts(self.target_kind, self.target_id.clone())
    }
}

// =============================================================================
// Users and Role Upgrades
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Basic,
    HorizonPlanner,
    VenueManager,
    Admin,
}

status_text!(UserRole {
    Basic => "basic",
    HorizonPlanner => "horizon_planner",
    VenueManager => "venue_manager",
    Admin => "admin",
});

impl UserRole {
    /// Roles a user may ask to be elevated to.
    pub fn is_requestable(&self) -> bool {
        matches!(self, UserRole::HorizonPlanner | UserRole::VenueManager)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Basic
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Status of a human approval (role upgrades).
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

status_text!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoleUpgradeRequest {
    pub id: String,
    pub user_id: String,
    pub requested_role: UserRole,
    pub reason: String,
    pub status: ApprovalStatus,
    pub reviewed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A reviewer's verdict on a role request or venue booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn approval_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }

    pub fn booking_status(&self) -> BookingStatus {
        match self {
            Decision::Approve => BookingStatus::Approved,
            Decision::Reject => BookingStatus::Rejected,
        }
    }
}

// =============================================================================
// Venues and Bookings
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub capacity: i64,
    pub manager_id: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

status_text!(BookingStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

/// A request to use a venue on a date for a `[start_time, end_time)` slot.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VenueBookingRequest {
    pub id: String,
    pub venue_id: String,
    pub requester_id: String,
    pub event_name: String,
    pub description: String,
    #[ts(as = "String")]
    pub booking_date: NaiveDate,
    #[ts(as = "String")]
    pub start_time: NaiveTime,
    #[ts(as = "String")]
    pub end_time: NaiveTime,
    pub expected_attendees: i64,
    pub quoted_price_cents: i64,
    pub status: BookingStatus,
    pub reviewed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl VenueBookingRequest {
    /// True when both bookings share a venue and date and their half-open
    /// time ranges intersect.
    pub fn overlaps(&self, other: &VenueBookingRequest) -> bool {
        self.venue_id == other.venue_id
            && self.booking_date == other.booking_date
            && self.start_time < other.end_time
            && self.end_time > other.start_time
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Fields needed to create an event.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewEvent {
    pub venue_id: String,
    pub organizer_id: String,
    pub title: String,
    pub base_price_cents: i64,
    pub total_seats: i64,
}

/// Fields needed to add a pricing tier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPricingTier {
    pub event_id: String,
    pub category: TicketCategory,
    pub name: String,
    pub price_cents: i64,
    pub available_quantity: i64,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVenue {
    pub name: String,
    pub capacity: i64,
    pub manager_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

/// Fields of a venue booking request as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBookingRequest {
    pub venue_id: String,
    pub requester_id: String,
    pub event_name: String,
    pub description: String,
    #[ts(as = "String")]
    pub booking_date: NaiveDate,
    #[ts(as = "String")]
    pub start_time: NaiveTime,
    #[ts(as = "String")]
    pub end_time: NaiveTime,
    pub expected_attendees: i64,
    pub quoted_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReview {
    pub user_id: String,
    pub target: ReviewTarget,
    pub rating: i64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewComment {
    pub event_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
}

// =============================================================================
// Reporting
// =============================================================================

/// Sales figures for one event, recomputed from confirmed orders and
/// completed refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EventSales {
    pub event_id: String,
    pub tickets_sold: i64,
    pub gross_revenue_cents: i64,
    pub refunded_cents: i64,
    pub net_revenue_cents: i64,
    pub available_seats: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
