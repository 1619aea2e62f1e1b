//! # Order Fulfillment
//!
//! Turns a purchase request into held seats, a pending payment, an order
//! and a ticket.
//!
//! ## Purchase Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate quantity, event published                                 │
//! │  2. resolve_price(base, tiers, category, now)                          │
//! │  3. ledger.reserve(q, expires_at = now + hold)   ── rejected ──► Err   │
//! │           │                                        (nothing written)   │
//! │           ▼                                                             │
//! │     ReservationGuard armed                                             │
//! │           │                                                             │
//! │  4-5. payment + order + ticket (one transaction)                       │
//! │           │                                                             │
//! │      ok ──┴──► disarm, return receipt (reservation stays held)         │
//! │     err ─────► release with backoff ──► still failing ──► error!,      │
//! │                                          CompensationFailed            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard also covers cancellation: if the purchase future is dropped
//! while armed, `Drop` spawns the release. A hold that escapes every path
//! still expires and the sweeper takes it back.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::box_office::BoxOffice;
use crate::clock::Clock;
use crate::config::CompensationSettings;
use crate::error::{EngineError, EngineResult};
use horizon_core::pricing::resolve_price;
use horizon_core::validation::{validate_quantity, validate_text};
use horizon_core::{
    CoreError, Order, Payment, PaymentMethod, PriceBreakdown, Reservation, Ticket, TicketCategory,
};
use horizon_db::{Database, NewPurchase};

// =============================================================================
// Request / Receipt
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub event_id: String,
    pub buyer_id: String,
    pub category: TicketCategory,
    pub quantity: i64,
    pub method: PaymentMethod,
    pub customer: Customer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub order: Order,
    pub payment: Payment,
    pub ticket: Ticket,
    pub reservation: Reservation,
}

// =============================================================================
// Purchase
// =============================================================================

impl BoxOffice {
    /// Holds seats and records a pending purchase.
    ///
    /// ## Errors
    /// - `Validation` for a quantity outside the configured bounds
    /// - `InvalidState` when the event is not published
    /// - `InvalidAmount` when the order total does not fit
    /// - `InsufficientInventory` when the seats are gone (nothing written)
    /// - `CompensationFailed` when recording failed and the seats could not
    ///   be released either
    pub async fn purchase(&self, request: PurchaseRequest) -> EngineResult<PurchaseReceipt> {
        let checkout = &self.config().checkout;
        validate_quantity(request.quantity, checkout.min_quantity, checkout.max_quantity)?;
        validate_text("customer_name", &request.customer.name, 200)?;
        validate_text("customer_email", &request.customer.email, 254)?;

        let catalog = self.db().catalog();
        let event = catalog.require_event(&request.event_id).await?;
        if !event.is_on_sale() {
            return Err(CoreError::invalid_state("event", &event.id, event.status, "on sale").into());
        }

        let now = self.now();
        let tiers = catalog.tiers_for(&event.id, request.category).await?;
        let quote = resolve_price(event.base_price(), &tiers, request.category, now);
        let breakdown = PriceBreakdown::compute(
            quote.unit_price,
            request.quantity,
            checkout.tax_rate(),
            checkout.service_fee_rate(),
        )?;
        debug!(
            event_id = %event.id,
            unit_cents = quote.unit_price.cents(),
            tier_id = ?quote.tier_id,
            "Price resolved"
        );

        let reservation = self
            .db()
            .ledger()
            .reserve(
                &event.id,
                request.quantity,
                quote.tier_id.as_deref(),
                now + checkout.hold(),
                now,
            )
            .await?;

        let guard = ReservationGuard::new(
            self.db().clone(),
            Arc::clone(self.clock()),
            reservation.id.clone(),
            self.config().compensation.clone(),
        );

        let recorded = self
            .db()
            .orders()
            .create_purchase(
                NewPurchase {
                    reservation_id: reservation.id.clone(),
                    user_id: request.buyer_id,
                    event_id: event.id.clone(),
                    category: request.category,
                    breakdown,
                    currency: checkout.currency.clone(),
                    method: request.method,
                    customer_name: request.customer.name.trim().to_string(),
                    customer_email: request.customer.email.trim().to_string(),
                },
                now,
            )
            .await;

        match recorded {
            Ok(records) => {
                guard.disarm();
                info!(
                    order_number = %records.order.order_number,
                    event_id = %event.id,
                    quantity = request.quantity,
                    "Purchase held awaiting payment"
                );
                Ok(PurchaseReceipt {
                    order: records.order,
                    payment: records.payment,
                    ticket: records.ticket,
                    reservation,
                })
            }
            Err(err) => {
                warn!(
                    reservation_id = %reservation.id,
                    error = %err,
                    "Recording purchase failed, releasing seats"
                );
                guard.release().await?;
                Err(err.into())
            }
        }
    }
}

// =============================================================================
// Reservation Guard
// =============================================================================

/// Releases a held reservation unless disarmed.
///
/// Call [`release`](Self::release) on error paths; `Drop` only covers the
/// paths nobody wrote (a cancelled future, a panic).
pub(crate) struct ReservationGuard {
    db: Database,
    clock: Arc<dyn Clock>,
    reservation_id: String,
    policy: CompensationSettings,
    armed: bool,
}

impl ReservationGuard {
    pub(crate) fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        reservation_id: String,
        policy: CompensationSettings,
    ) -> Self {
        ReservationGuard {
            db,
            clock,
            reservation_id,
            policy,
            armed: true,
        }
    }

    /// The purchase went through; keep the seats held.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }

    pub(crate) async fn release(mut self) -> EngineResult<()> {
        self.armed = false;
        release_with_backoff(&self.db, &self.clock, &self.reservation_id, &self.policy).await
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let db = self.db.clone();
        let clock = Arc::clone(&self.clock);
        let reservation_id = std::mem::take(&mut self.reservation_id);
        let policy = self.policy.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(reservation_id = %reservation_id, "Checkout abandoned, releasing seats");
                handle.spawn(async move {
                    // Failure is already logged inside; the sweeper is the backstop.
                    let _ = release_with_backoff(&db, &clock, &reservation_id, &policy).await;
                });
            }
            Err(_) => {
                error!(
                    reservation_id = %reservation_id,
                    "No runtime to release seats, leaving hold to expire"
                );
            }
        }
    }
}

/// Releases a held reservation, retrying transient failures with
/// exponential backoff.
pub(crate) async fn release_with_backoff(
    db: &Database,
    clock: &Arc<dyn Clock>,
    reservation_id: &str,
    policy: &CompensationSettings,
) -> EngineResult<()> {
    let mut backoff = create_backoff(policy);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let err = match db.ledger().release(reservation_id, clock.now()).await {
            Ok(outcome) => {
                if outcome.is_applied() {
                    info!(reservation_id = %reservation_id, attempt, "Seats released");
                } else {
                    debug!(reservation_id = %reservation_id, "Seats already released");
                }
                return Ok(());
            }
            Err(err) => EngineError::from(err),
        };

        let wait = if err.is_retryable() {
            backoff.next_backoff()
        } else {
            None
        };

        match wait {
            Some(duration) => {
                warn!(
                    reservation_id = %reservation_id,
                    attempt,
                    ?duration,
                    error = %err,
                    "Seat release failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
            None => {
                error!(
                    reservation_id = %reservation_id,
                    attempt,
                    error = %err,
                    "Seat release failed, hold left for the sweeper"
                );
                return Err(EngineError::CompensationFailed {
                    reservation_id: reservation_id.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

fn create_backoff(policy: &CompensationSettings) -> ExponentialBackoff {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(policy.initial_backoff_ms),
        max_interval: Duration::from_millis(policy.max_elapsed_ms.max(policy.initial_backoff_ms)),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_millis(policy.max_elapsed_ms)),
        ..Default::default()
    };
    backoff.reset();
    backoff
}
