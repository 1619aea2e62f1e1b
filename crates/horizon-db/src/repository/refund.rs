//! # Refund Repository
//!
//! Refund requests against completed payments and their processing.
//!
//! ## Amount guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refundable = amount - refunded - outstanding                          │
//! │                                                                         │
//! │  outstanding = SUM(refunds still requested | processing)              │
//! │                                                                         │
//! │  request:   INSERT ... SELECT ... WHERE refundable >= :amount          │
//! │  complete:  UPDATE payments SET refunded = refunded + :amount          │
//! │               WHERE refunded + :amount <= amount                       │
//! │                                                                         │
//! │  Both checks are part of the writing statement, so concurrent          │
//! │  requests cannot jointly exceed the payment.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//!   requested ──approve──► processing ──complete──► completed
//!       │                      │
//!       └───────reject─────────┴──────────────────► rejected
//! ```
//!
//! Completing the refund that brings `refunded` to the full amount also
//! moves the payment to `refunded`, cancels the order and revokes the seats.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::{ledger, order, MAX_CAS_ATTEMPTS};
use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::validation::{validate_text_optional, MAX_TEXT_LEN};
use horizon_core::{
    CoreError, Money, OrderStatus, Payment, PaymentStatus, Refund, RefundDecision, RefundReason,
    RefundStatus,
};

/// A refund together with its payment after processing.
#[derive(Debug, Clone)]
pub struct RefundTransition {
    pub refund: Refund,
    pub payment: Payment,
}

#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

impl RefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Opens a refund request.
    ///
    /// ## Errors
    /// - `InvalidAmount` if the amount is not positive, the payment is not
    ///   `completed`, or the amount exceeds what is still refundable
    /// - `NotFound` for an unknown payment
    pub async fn request(
        &self,
        payment_id: &str,
        amount_cents: i64,
        reason: RefundReason,
        description: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Refund> {
        if amount_cents <= 0 {
            return Err(CoreError::invalid_amount("refund amount must be positive").into());
        }
        validate_text_optional("description", description, MAX_TEXT_LEN)?;

        let refund = Refund {
            id: new_id(),
            payment_id: payment_id.to_string(),
            amount_cents,
            reason,
            description: description.trim().to_string(),
            status: RefundStatus::Requested,
            processed_by: None,
            processed_at: None,
            gateway_refund_id: None,
            created_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO refunds (id, payment_id, amount_cents, reason, description, status, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
             WHERE EXISTS (
                SELECT 1 FROM payments p
                 WHERE p.id = ? AND p.status = ?
                   AND p.amount_cents - p.refunded_cents
                       - COALESCE((SELECT SUM(r.amount_cents) FROM refunds r
                                    WHERE r.payment_id = p.id AND r.status IN (?, ?)), 0) >= ?
             )
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.payment_id)
        .bind(refund.amount_cents)
        .bind(refund.reason)
        .bind(&refund.description)
        .bind(refund.status)
        .bind(refund.created_at)
        .bind(payment_id)
        .bind(PaymentStatus::Completed)
        .bind(RefundStatus::Requested)
        .bind(RefundStatus::Processing)
        .bind(amount_cents)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(self.explain_rejected_request(payment_id, amount_cents).await);
        }

        info!(
            refund_id = %refund.id,
            payment_id = %payment_id,
            amount = %refund.amount(),
            "Refund requested"
        );
        Ok(refund)
    }

    async fn explain_rejected_request(&self, payment_id: &str, amount_cents: i64) -> DbError {
        let payment = match payment_in(&self.pool, payment_id).await {
            Ok(payment) => payment,
            Err(err) => return err,
        };

        if payment.status != PaymentStatus::Completed {
            return CoreError::invalid_amount(format!(
                "payment {payment_id} is {}, only completed payments can be refunded",
                payment.status
            ))
            .into();
        }

        let outstanding: Result<i64, sqlx::Error> = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM refunds WHERE payment_id = ? AND status IN (?, ?)",
        )
        .bind(payment_id)
        .bind(RefundStatus::Requested)
        .bind(RefundStatus::Processing)
        .fetch_one(&self.pool)
        .await;

        match outstanding {
            Ok(outstanding) => {
                let refundable = payment.refundable() - Money::from_cents(outstanding);
                debug!(
                    payment_id = %payment_id,
                    requested = amount_cents,
                    refundable = refundable.cents(),
                    "Refund request exceeds refundable amount"
                );
                CoreError::invalid_amount(format!(
                    "requested {} exceeds refundable {}",
                    Money::from_cents(amount_cents),
                    refundable
                ))
                .into()
            }
            Err(err) => err.into(),
        }
    }

    /// Applies a staff decision to a refund.
    ///
    /// Repeating the decision a refund already reflects is a `Duplicate`.
    pub async fn process(
        &self,
        refund_id: &str,
        decision: RefundDecision,
        processed_by: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<RefundTransition>> {
        let target = decision.target();
        let gateway_refund_id = match &decision {
            RefundDecision::Complete { gateway_refund_id } => Some(gateway_refund_id.clone()),
            _ => None,
        };

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.require(refund_id).await?;

            if plan_transition("refund", refund_id, current.status, target)?
                == Transition::Duplicate
            {
                debug!(refund_id = %refund_id, status = %target, "Refund already in status");
                let payment = payment_in(&self.pool, &current.payment_id).await?;
                return Ok(Outcome::Duplicate(RefundTransition {
                    refund: current,
                    payment,
                }));
            }

            let refund = Refund {
                status: target,
                processed_by: Some(processed_by.to_string()),
                processed_at: Some(now),
                gateway_refund_id: gateway_refund_id.clone().or(current.gateway_refund_id.clone()),
                ..current.clone()
            };

            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE refunds
                   SET status = ?, processed_by = ?, processed_at = ?, gateway_refund_id = ?
                 WHERE id = ? AND status = ?
                "#,
            )
            .bind(refund.status)
            .bind(&refund.processed_by)
            .bind(refund.processed_at)
            .bind(&refund.gateway_refund_id)
            .bind(refund_id)
            .bind(current.status)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(refund_id = %refund_id, attempt, "Refund moved concurrently, retrying");
                continue;
            }

            if target == RefundStatus::Completed {
                settle_in(&mut *tx, &refund, now).await?;
            }

            let payment = payment_in(&mut *tx, &refund.payment_id).await?;
            tx.commit().await?;

            info!(
                refund_id = %refund_id,
                from = %current.status,
                to = %target,
                payment_status = %payment.status,
                "Refund processed"
            );
            return Ok(Outcome::Applied(RefundTransition { refund, payment }));
        }

        warn!(refund_id = %refund_id, "Refund processing gave up after repeated conflicts");
        Err(DbError::TransactionFailed(format!(
            "refund {refund_id} kept changing during processing"
        )))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(refund)
    }

    pub async fn require(&self, id: &str) -> DbResult<Refund> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Refund", id))
    }

    pub async fn list_for_payment(&self, payment_id: &str) -> DbResult<Vec<Refund>> {
        let refunds = sqlx::query_as::<_, Refund>(
            "SELECT * FROM refunds WHERE payment_id = ? ORDER BY created_at, id",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refunds)
    }
}

// =============================================================================
// In-transaction helpers
// =============================================================================

async fn payment_in<'e, E>(executor: E, id: &str) -> DbResult<Payment>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DbError::not_found("Payment", id))
}

/// Adds a completed refund to its payment. A full refund moves the payment
/// to `refunded`, cancels the order and returns the seats.
async fn settle_in(conn: &mut SqliteConnection, refund: &Refund, now: DateTime<Utc>) -> DbResult<()> {
    let credited = sqlx::query(
        r#"
        UPDATE payments
           SET refunded_cents = refunded_cents + ?, updated_at = ?
         WHERE id = ? AND status = ? AND refunded_cents + ? <= amount_cents
        "#,
    )
    .bind(refund.amount_cents)
    .bind(now)
    .bind(&refund.payment_id)
    .bind(PaymentStatus::Completed)
    .bind(refund.amount_cents)
    .execute(&mut *conn)
    .await?;

    if credited.rows_affected() == 0 {
        let payment = payment_in(&mut *conn, &refund.payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(CoreError::invalid_state(
                "payment",
                &payment.id,
                payment.status,
                PaymentStatus::Refunded,
            )
            .into());
        }
        return Err(CoreError::invalid_amount(format!(
            "refund {} exceeds refundable {}",
            refund.amount(),
            payment.refundable()
        ))
        .into());
    }

    let payment = payment_in(&mut *conn, &refund.payment_id).await?;
    if payment.refunded_cents < payment.amount_cents {
        debug!(
            payment_id = %payment.id,
            refunded = %payment.refunded(),
            "Partial refund credited"
        );
        return Ok(());
    }

    plan_transition("payment", &payment.id, payment.status, PaymentStatus::Refunded)?;
    sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(PaymentStatus::Refunded)
        .bind(now)
        .bind(&payment.id)
        .bind(PaymentStatus::Completed)
        .execute(&mut *conn)
        .await?;

    let order = order::get_by_payment_in(&mut *conn, &payment.id).await?;
    order::set_status_in(&mut *conn, &order, OrderStatus::Cancelled, now).await?;
    ledger::revoke_in(&mut *conn, &order.reservation_id, now).await?;

    info!(
        payment_id = %payment.id,
        order_number = %order.order_number,
        "Payment fully refunded, seats returned"
    );
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paid, purchase, setup, ts};
    use horizon_core::ReservationStatus;

    fn complete(id: &str) -> RefundDecision {
        RefundDecision::Complete {
            gateway_refund_id: format!("re_{id}"),
        }
    }

    async fn refund_fully(
        refunds: &RefundRepository,
        payment_id: &str,
        amount: i64,
        at: i64,
    ) -> RefundTransition {
        let refund = refunds
            .request(payment_id, amount, RefundReason::CustomerRequest, "", ts(at))
            .await
            .unwrap();
        refunds
            .process(&refund.id, RefundDecision::Approve, "staff", ts(at + 1))
            .await
            .unwrap();
        refunds
            .process(&refund.id, complete(&refund.id), "staff", ts(at + 2))
            .await
            .unwrap()
            .into_inner()
    }

    #[tokio::test]
    async fn test_partial_then_full_refund() {
        let fx = setup(10).await;
        let records = paid(&fx, 2, 5000).await;
        assert_eq!(records.payment.amount_cents, 10_000);
        let refunds = fx.db.refunds();

        let first = refund_fully(&refunds, &records.payment.id, 4000, 10).await;
        assert_eq!(first.payment.status, PaymentStatus::Completed);
        assert_eq!(first.payment.refunded_cents, 4000);
        assert_eq!(fx.db.ledger().available_seats(&fx.event.id).await.unwrap(), 8);

        let second = refund_fully(&refunds, &records.payment.id, 6000, 20).await;
        assert_eq!(second.payment.status, PaymentStatus::Refunded);
        assert_eq!(second.payment.refunded_cents, 10_000);

        let order = fx.db.orders().get(&records.order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let hold = fx.db.ledger().get(&order.reservation_id).await.unwrap().unwrap();
        assert_eq!(hold.status, ReservationStatus::Released);
        assert_eq!(fx.db.ledger().available_seats(&fx.event.id).await.unwrap(), 10);

        let err = refunds
            .request(&records.payment.id, 100, RefundReason::Other, "", ts(30))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_outstanding_requests_count_against_refundable() {
        let fx = setup(10).await;
        let records = paid(&fx, 2, 5000).await;
        let refunds = fx.db.refunds();

        refunds
            .request(&records.payment.id, 7000, RefundReason::CustomerRequest, "", ts(10))
            .await
            .unwrap();
        let err = refunds
            .request(&records.payment.id, 3001, RefundReason::CustomerRequest, "", ts(11))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));

        refunds
            .request(&records.payment.id, 3000, RefundReason::CustomerRequest, "", ts(12))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_refund_frees_amount_and_leaves_payment() {
        let fx = setup(10).await;
        let records = paid(&fx, 1, 5000).await;
        let refunds = fx.db.refunds();

        let refund = refunds
            .request(&records.payment.id, 5000, RefundReason::Other, "changed mind", ts(10))
            .await
            .unwrap();
        let t = refunds
            .process(&refund.id, RefundDecision::Reject, "staff", ts(11))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(t.refund.status, RefundStatus::Rejected);
        assert_eq!(t.payment.refunded_cents, 0);
        assert_eq!(t.payment.status, PaymentStatus::Completed);

        // The rejected amount is refundable again
        refunds
            .request(&records.payment.id, 5000, RefundReason::Other, "", ts(12))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reprocessing_is_duplicate() {
        let fx = setup(10).await;
        let records = paid(&fx, 1, 5000).await;
        let refunds = fx.db.refunds();

        let t = refund_fully(&refunds, &records.payment.id, 1000, 10).await;
        let again = refunds
            .process(&t.refund.id, complete(&t.refund.id), "staff", ts(50))
            .await
            .unwrap();
        assert!(!again.is_applied());
        assert_eq!(again.value().payment.refunded_cents, 1000);
    }

    #[tokio::test]
    async fn test_complete_requires_approval_first() {
        let fx = setup(10).await;
        let records = paid(&fx, 1, 5000).await;
        let refunds = fx.db.refunds();

        let refund = refunds
            .request(&records.payment.id, 1000, RefundReason::Other, "", ts(10))
            .await
            .unwrap();
        let err = refunds
            .process(&refund.id, complete(&refund.id), "staff", ts(11))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_refund_on_pending_payment_rejected() {
        let fx = setup(10).await;
        let records = purchase(&fx, 1, 5000).await;

        let err = fx
            .db
            .refunds()
            .request(&records.payment.id, 1000, RefundReason::Other, "", ts(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let fx = setup(10).await;
        let records = paid(&fx, 1, 5000).await;
        let err = fx
            .db
            .refunds()
            .request(&records.payment.id, 0, RefundReason::Other, "", ts(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let fx = setup(10).await;
        let err = fx
            .db
            .refunds()
            .request("missing", 100, RefundReason::Other, "", ts(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
