//! # Refund Workflow
//!
//! ```text
//!   requested ──approve──► processing ──complete──► completed
//!       │                      │
//!       └──────reject──────────┴──────────────────► rejected
//! ```
//!
//! A request is accepted only while `amount <= paid - refunded - outstanding`
//! (outstanding = refunds still requested or processing). Completion credits
//! `refunded_cents` under the same bound; reaching the full amount moves the
//! payment to `refunded`, cancels the order and returns the seats.

use tracing::debug;

use crate::box_office::{BoxOffice, Reviewer};
use crate::error::EngineResult;
use crate::notify::Notification;
use horizon_core::{Money, Outcome, PaymentStatus, Refund, RefundDecision, RefundReason, RefundStatus};
use horizon_db::RefundTransition;

impl BoxOffice {
    pub async fn request_refund(
        &self,
        payment_id: &str,
        amount: Money,
        reason: RefundReason,
        description: &str,
    ) -> EngineResult<Refund> {
        Ok(self
            .db()
            .refunds()
            .request(payment_id, amount.cents(), reason, description, self.now())
            .await?)
    }

    /// Applies a staff decision. The buyer hears about completions and
    /// rejections.
    pub async fn process_refund(
        &self,
        refund_id: &str,
        decision: RefundDecision,
        staff: &Reviewer,
    ) -> EngineResult<Outcome<RefundTransition>> {
        let processed_by = staff.require("process refunds")?;

        let outcome = self
            .db()
            .refunds()
            .process(refund_id, decision, processed_by, self.now())
            .await?;

        if let Outcome::Applied(transition) = &outcome {
            let refund = &transition.refund;
            let payment = &transition.payment;

            let notification = match refund.status {
                RefundStatus::Completed => {
                    let mut message = format!("Your refund of {} has been completed.", refund.amount());
                    if payment.status == PaymentStatus::Refunded {
                        message.push_str(" The order is now fully refunded and cancelled.");
                    }
                    Some(Notification::new(&payment.user_id, "Refund Completed", message))
                }
                RefundStatus::Rejected => Some(Notification::new(
                    &payment.user_id,
                    "Refund Rejected",
                    format!("Your refund request of {} was not approved.", refund.amount()),
                )),
                _ => None,
            };

            if let Some(notification) = notification {
                self.notify(notification);
            }
        } else {
            debug!(refund_id = %refund_id, "Refund decision already applied");
        }

        Ok(outcome)
    }

    pub async fn refunds_for_payment(&self, payment_id: &str) -> EngineResult<Vec<Refund>> {
        Ok(self.db().refunds().list_for_payment(payment_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::testing::{buy, setup_with, Fixture};
    use horizon_core::{CoreError, GatewayPayload, GatewayStatus, OrderStatus};

    /// $50 × 2 with no tax or fee: a $100 completed payment.
    async fn hundred_dollar_payment() -> (Fixture, String) {
        let mut config = EngineConfig::default();
        config.checkout.tax_rate_bps = 0;
        config.checkout.service_fee_bps = 0;
        let mut fx = setup_with(10, config).await;

        let receipt = buy(&fx, 2).await;
        assert_eq!(receipt.payment.amount_cents, 10_000);
        fx.office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, GatewayPayload::default())
            .await
            .unwrap();
        fx.inbox.next().await;
        (fx, receipt.payment.id)
    }

    async fn refund_fully(fx: &Fixture, payment_id: &str, dollars: i64) -> RefundTransition {
        let staff = Reviewer::new(&fx.admin.id, true);
        let refund = fx
            .office
            .request_refund(payment_id, Money::from_dollars(dollars), RefundReason::CustomerRequest, "")
            .await
            .unwrap();
        fx.office
            .process_refund(&refund.id, RefundDecision::Approve, &staff)
            .await
            .unwrap();
        fx.office
            .process_refund(
                &refund.id,
                RefundDecision::Complete {
                    gateway_refund_id: format!("re-{dollars}"),
                },
                &staff,
            )
            .await
            .unwrap()
            .into_inner()
    }

    #[tokio::test]
    async fn test_partial_then_full_refund() {
        let (mut fx, payment_id) = hundred_dollar_payment().await;

        let first = refund_fully(&fx, &payment_id, 40).await;
        assert_eq!(first.payment.status, PaymentStatus::Completed);
        assert_eq!(first.payment.refunded_cents, 4000);
        assert_eq!(fx.inbox.next().await.subject, "Refund Completed");

        let second = refund_fully(&fx, &payment_id, 60).await;
        assert_eq!(second.payment.status, PaymentStatus::Refunded);
        assert_eq!(second.payment.refunded_cents, 10_000);
        assert!(fx.inbox.next().await.message.contains("fully refunded"));

        let order = fx
            .office
            .db()
            .orders()
            .get_by_payment(&payment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);

        let err = fx
            .office
            .request_refund(&payment_id, Money::from_dollars(1), RefundReason::Other, "one more")
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidAmount { .. })));

        let sales = fx.office.event_sales(&fx.event.id).await.unwrap();
        assert_eq!(sales.refunded_cents, 10_000);
        assert_eq!(sales.net_revenue_cents, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_cannot_overcommit() {
        let (fx, payment_id) = hundred_dollar_payment().await;

        let (a, b) = tokio::join!(
            fx.office.request_refund(&payment_id, Money::from_dollars(60), RefundReason::Other, ""),
            fx.office.request_refund(&payment_id, Money::from_dollars(60), RefundReason::Other, ""),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let refunds = fx.office.refunds_for_payment(&payment_id).await.unwrap();
        let committed: i64 = refunds.iter().map(|r| r.amount_cents).sum();
        assert!(committed <= 10_000);
    }

    #[tokio::test]
    async fn test_rejection_notifies_and_leaves_payment() {
        let (mut fx, payment_id) = hundred_dollar_payment().await;
        let staff = Reviewer::new(&fx.admin.id, true);

        let refund = fx
            .office
            .request_refund(&payment_id, Money::from_dollars(30), RefundReason::Fraud, "suspicious")
            .await
            .unwrap();
        let rejected = fx
            .office
            .process_refund(&refund.id, RefundDecision::Reject, &staff)
            .await
            .unwrap();
        assert_eq!(rejected.value().payment.refunded_cents, 0);
        assert_eq!(fx.inbox.next().await.subject, "Refund Rejected");

        // Same decision again: nothing new
        let again = fx
            .office
            .process_refund(&refund.id, RefundDecision::Reject, &staff)
            .await
            .unwrap();
        assert!(!again.is_applied());
        fx.inbox.assert_empty().await;
    }

    #[tokio::test]
    async fn test_unpermitted_staff_is_forbidden() {
        let (fx, payment_id) = hundred_dollar_payment().await;
        let refund = fx
            .office
            .request_refund(&payment_id, Money::from_dollars(10), RefundReason::Other, "")
            .await
            .unwrap();

        let err = fx
            .office
            .process_refund(&refund.id, RefundDecision::Approve, &Reviewer::new(&fx.buyer.id, false))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_pending_payment_cannot_be_refunded() {
        let mut config = EngineConfig::default();
        config.checkout.hold_secs = 60;
        let fx = setup_with(10, config).await;
        let receipt = buy(&fx, 1).await;

        let err = fx
            .office
            .request_refund(&receipt.payment.id, Money::from_dollars(5), RefundReason::Other, "")
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidAmount { .. })));
    }
}
