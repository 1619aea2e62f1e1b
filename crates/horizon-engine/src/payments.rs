//! # Payment State Machine (effects)
//!
//! The database layer applies gateway statuses atomically (payment, order
//! and reservation in one transaction). This module adds the clock and the
//! buyer notification, which is sent after commit and only for transitions
//! that were actually applied.
//!
//! ```text
//! gateway callback ──► apply_gateway_status ──┬── Applied   ──► notify buyer
//!                                             ├── Duplicate ──► debug!, silent
//!                                             └── Err(InvalidState) (e.g. late
//!                                                 success after failure)
//! ```

use tracing::{debug, warn};

use crate::box_office::BoxOffice;
use crate::error::EngineResult;
use crate::notify::Notification;
use horizon_core::{GatewayPayload, GatewayStatus, Outcome, PaymentStatus};
use horizon_db::PaymentTransition;

impl BoxOffice {
    /// Applies a gateway callback.
    ///
    /// Redelivering the status a payment already has is a `Duplicate`; any
    /// move out of a terminal status is an `InvalidState` error.
    pub async fn confirm_payment(
        &self,
        payment_id: &str,
        status: GatewayStatus,
        payload: GatewayPayload,
    ) -> EngineResult<Outcome<PaymentTransition>> {
        let outcome = self
            .db()
            .payments()
            .apply_gateway_status(payment_id, status, Some(&payload), self.now())
            .await?;

        self.after_payment(&outcome).await;
        Ok(outcome)
    }

    /// Cancels a pending or processing payment and releases its seats.
    pub async fn cancel_payment(&self, payment_id: &str) -> EngineResult<Outcome<PaymentTransition>> {
        let outcome = self
            .db()
            .payments()
            .apply_gateway_status(payment_id, GatewayStatus::Cancelled, None, self.now())
            .await?;

        self.after_payment(&outcome).await;
        Ok(outcome)
    }

    async fn after_payment(&self, outcome: &Outcome<PaymentTransition>) {
        let transition = match outcome {
            Outcome::Applied(transition) => transition,
            Outcome::Duplicate(transition) => {
                debug!(payment_id = %transition.payment.id, "No notification for duplicate callback");
                return;
            }
        };

        let payment = &transition.payment;
        let order = &transition.order;

        let title = match self.db().catalog().get_event(&payment.event_id).await {
            Ok(Some(event)) => event.title,
            Ok(None) => payment.event_id.clone(),
            Err(e) => {
                warn!(event_id = %payment.event_id, error = %e, "Event lookup for notification failed");
                payment.event_id.clone()
            }
        };

        let (subject, message) = match payment.status {
            PaymentStatus::Completed => (
                format!("Payment Confirmed - {title}"),
                format!(
                    "Your payment of {} for {} ticket(s) to {title} is confirmed. Order {}.",
                    payment.amount(),
                    order.ticket_quantity,
                    order.order_number
                ),
            ),
            PaymentStatus::Failed => (
                format!("Payment Failed - {title}"),
                format!(
                    "Your payment for order {} did not go through and the seats were released.",
                    order.order_number
                ),
            ),
            PaymentStatus::Cancelled => (
                format!("Payment Cancelled - {title}"),
                format!(
                    "Order {} was cancelled and the seats were released.",
                    order.order_number
                ),
            ),
            _ => return,
        };

        self.notify(Notification::new(&payment.user_id, subject, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{buy, setup};
    use horizon_core::{CoreError, OrderStatus, ReservationStatus};
    use serde_json::json;

    fn payload(transaction_id: &str) -> GatewayPayload {
        GatewayPayload {
            transaction_id: transaction_id.to_string(),
            response: json!({ "gateway": "test", "code": "00" }),
        }
    }

    #[tokio::test]
    async fn test_completed_confirms_and_notifies_once() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 2).await;

        let first = fx
            .office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, payload("tx-1"))
            .await
            .unwrap();
        assert!(first.is_applied());
        let transition = first.value();
        assert_eq!(transition.payment.status, PaymentStatus::Completed);
        assert_eq!(transition.payment.transaction_id, "tx-1");
        assert_eq!(transition.order.status, OrderStatus::Confirmed);
        assert_eq!(transition.reservation.status, ReservationStatus::Confirmed);

        let note = fx.inbox.next().await;
        assert_eq!(note.user_id, fx.buyer.id);
        assert_eq!(note.subject, "Payment Confirmed - Summer Concert");

        // Redelivered callback: no second mutation, no second notification
        let again = fx
            .office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, payload("tx-1"))
            .await
            .unwrap();
        assert!(!again.is_applied());
        fx.inbox.assert_empty().await;
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_failed_releases_seats_and_late_success_is_refused() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 4).await;
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 6);

        fx.office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Failed, payload("tx-9"))
            .await
            .unwrap();
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);
        assert_eq!(fx.inbox.next().await.subject, "Payment Failed - Summer Concert");

        let err = fx
            .office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, payload("tx-9"))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));
        fx.inbox.assert_empty().await;
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_processing_is_silent_then_completes() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 1).await;

        let processing = fx
            .office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Processing, payload(""))
            .await
            .unwrap();
        assert!(processing.is_applied());
        fx.inbox.assert_empty().await;

        fx.office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, payload("tx-2"))
            .await
            .unwrap();
        assert_eq!(
            fx.inbox.next().await.subject,
            "Payment Confirmed - Summer Concert"
        );
    }

    #[tokio::test]
    async fn test_cancel_payment() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 3).await;

        let cancelled = fx.office.cancel_payment(&receipt.payment.id).await.unwrap();
        assert!(cancelled.is_applied());
        assert_eq!(cancelled.value().order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.value().reservation.status, ReservationStatus::Released);
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);
        assert_eq!(
            fx.inbox.next().await.subject,
            "Payment Cancelled - Summer Concert"
        );

        let again = fx.office.cancel_payment(&receipt.payment.id).await.unwrap();
        assert!(!again.is_applied());
        fx.inbox.assert_empty().await;
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_the_payment() {
        use crate::notify::testing::BrokenNotifier;
        use std::sync::Arc;

        let fx = setup(10).await;
        let receipt = buy(&fx, 1).await;
        let office = crate::BoxOffice::new(
            fx.office.db().clone(),
            fx.office.config().clone(),
            fx.clock.clone(),
            Arc::new(BrokenNotifier),
        );

        let outcome = office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, payload("tx-3"))
            .await
            .unwrap();
        assert!(outcome.is_applied());
    }
}
