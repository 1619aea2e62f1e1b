//! # Payment Repository
//!
//! Applies gateway callbacks to payments and carries the order and the
//! seat hold along in the same transaction.
//!
//! ## Transition effects
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────────────────┐
//! │ gateway says │ reservation                  │ order                │
//! ├──────────────┼──────────────────────────────┼──────────────────────┤
//! │ processing   │ (unchanged)                  │ (unchanged)          │
//! │ completed    │ held -> confirmed            │ pending -> confirmed │
//! │ failed       │ held -> released             │ -> cancelled         │
//! │ cancelled    │ held -> released             │ -> cancelled         │
//! └──────────────┴──────────────────────────────┴──────────────────────┘
//! ```
//!
//! A repeated callback with the status the payment already has is a
//! `Duplicate`: nothing is written and nothing downstream runs again.
//! Callbacks are retried against a fresh read when a concurrent writer
//! moved the payment first.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{ledger, order, MAX_CAS_ATTEMPTS};
use crate::error::{DbError, DbResult};
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::{
    GatewayPayload, GatewayStatus, Order, OrderStatus, Payment, PaymentStatus, Reservation,
};

/// A payment together with the rows its transition touched.
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub payment: Payment,
    pub order: Order,
    pub reservation: Reservation,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    pub async fn require(&self, id: &str) -> DbResult<Payment> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    /// Applies a gateway status to a payment.
    ///
    /// ## Errors
    /// - `InvalidState` when the payment cannot move to `status` (for
    ///   example a late `completed` after `failed`)
    /// - `NotFound` for an unknown payment
    /// - `TransactionFailed` when concurrent writers keep winning
    pub async fn apply_gateway_status(
        &self,
        payment_id: &str,
        status: GatewayStatus,
        payload: Option<&GatewayPayload>,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<PaymentTransition>> {
        let target = PaymentStatus::from(status);

        let gateway_response = payload
            .map(|p| serde_json::to_string(&p.response))
            .transpose()
            .map_err(|e| DbError::Internal(format!("gateway response: {e}")))?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.require(payment_id).await?;

            if plan_transition("payment", payment_id, current.status, target)?
                == Transition::Duplicate
            {
                debug!(payment_id = %payment_id, status = %target, "Duplicate gateway callback");
                return Ok(Outcome::Duplicate(self.with_related(current).await?));
            }

            let mut payment = Payment {
                status: target,
                updated_at: now,
                ..current.clone()
            };
            match target {
                PaymentStatus::Completed => payment.processed_at = Some(now),
                PaymentStatus::Failed => payment.failed_at = Some(now),
                _ => {}
            }
            if let Some(payload) = payload {
                if !payload.transaction_id.is_empty() {
                    payment.transaction_id = payload.transaction_id.clone();
                }
            }
            if let Some(response) = &gateway_response {
                payment.gateway_response = response.clone();
            }

            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE payments
                   SET status = ?, transaction_id = ?, gateway_response = ?,
                       processed_at = ?, failed_at = ?, updated_at = ?
                 WHERE id = ? AND status = ?
                "#,
            )
            .bind(payment.status)
            .bind(&payment.transaction_id)
            .bind(&payment.gateway_response)
            .bind(payment.processed_at)
            .bind(payment.failed_at)
            .bind(payment.updated_at)
            .bind(payment_id)
            .bind(current.status)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(payment_id = %payment_id, attempt, "Payment moved concurrently, retrying");
                continue;
            }

            let order = order::get_by_payment_in(&mut *tx, payment_id).await?;

            let (order, reservation) = match target {
                PaymentStatus::Completed => {
                    let reservation =
                        ledger::confirm_in(&mut *tx, &order.reservation_id, now).await?;
                    let order =
                        order::set_status_in(&mut *tx, &order, OrderStatus::Confirmed, now).await?;
                    (order.into_inner(), reservation.into_inner())
                }
                PaymentStatus::Failed | PaymentStatus::Cancelled => {
                    let reservation =
                        ledger::release_in(&mut *tx, &order.reservation_id, now).await?;
                    let order =
                        order::set_status_in(&mut *tx, &order, OrderStatus::Cancelled, now).await?;
                    (order.into_inner(), reservation.into_inner())
                }
                _ => {
                    let reservation = ledger::get_in(&mut *tx, &order.reservation_id).await?;
                    (order, reservation)
                }
            };

            tx.commit().await?;

            info!(
                payment_id = %payment_id,
                from = %current.status,
                to = %target,
                order_number = %order.order_number,
                "Payment transitioned"
            );

            return Ok(Outcome::Applied(PaymentTransition {
                payment,
                order,
                reservation,
            }));
        }

        warn!(payment_id = %payment_id, "Payment transition gave up after repeated conflicts");
        Err(DbError::TransactionFailed(format!(
            "payment {payment_id} kept changing during transition"
        )))
    }

    async fn with_related(&self, payment: Payment) -> DbResult<PaymentTransition> {
        let mut conn = self.pool.acquire().await?;
        let order = order::get_by_payment_in(&mut *conn, &payment.id).await?;
        let reservation = ledger::get_in(&mut *conn, &order.reservation_id).await?;
        Ok(PaymentTransition {
            payment,
            order,
            reservation,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
