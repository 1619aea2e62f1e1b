//! # Order Repository
//!
//! Payment + Order + Ticket creation for a purchase, ticket redemption and
//! sales reporting.
//!
//! ## Purchase write set (one transaction)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE reservations WHERE status = 'held'   (0 rows ──► InvalidState) │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  INSERT payments  (pending, amount = order total)                      │
//! │  INSERT orders    (pending, fresh order_number)                        │
//! │  INSERT tickets   (fresh ticket_number, entry_payload)                 │
//! │        │  UNIQUE(ticket_number) hit? regenerate once, then give up     │
//! │        ▼                                                                │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::ledger;
use crate::error::{DbError, DbResult};
use horizon_core::identity::{entry_payload, generate_order_number, generate_ticket_number, new_id};
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::{
    CoreError, EventSales, Order, OrderStatus, Payment, PaymentMethod, PaymentStatus,
    PriceBreakdown, Ticket, TicketCategory,
};

/// Everything needed to record a purchase whose seats are already held.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub reservation_id: String,
    pub user_id: String,
    pub event_id: String,
    pub category: TicketCategory,
    pub breakdown: PriceBreakdown,
    pub currency: String,
    pub method: PaymentMethod,
    pub customer_name: String,
    pub customer_email: String,
}

/// Rows written for one purchase.
#[derive(Debug, Clone)]
pub struct PurchaseRecords {
    pub payment: Payment,
    pub order: Order,
    pub ticket: Ticket,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Records payment, order and ticket for a held reservation.
    pub async fn create_purchase(
        &self,
        new: NewPurchase,
        now: DateTime<Utc>,
    ) -> DbResult<PurchaseRecords> {
        self.create_purchase_with(new, now, generate_ticket_number).await
    }

    /// Same as [`create_purchase`](Self::create_purchase) with a caller
    /// supplied ticket number source.
    pub async fn create_purchase_with(
        &self,
        new: NewPurchase,
        now: DateTime<Utc>,
        mut next_ticket_number: impl FnMut() -> String,
    ) -> DbResult<PurchaseRecords> {
        let payment = Payment {
            id: new_id(),
            user_id: new.user_id.clone(),
            event_id: new.event_id.clone(),
            amount_cents: new.breakdown.total.cents(),
            refunded_cents: 0,
            currency: new.currency,
            method: new.method,
            status: PaymentStatus::Pending,
            transaction_id: String::new(),
            gateway_response: "{}".to_string(),
            processed_at: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        };

        let order = Order {
            id: new_id(),
            order_number: generate_order_number(),
            payment_id: payment.id.clone(),
            reservation_id: new.reservation_id,
            user_id: new.user_id.clone(),
            event_id: new.event_id.clone(),
            category: new.category,
            ticket_quantity: new.breakdown.quantity,
            unit_price_cents: new.breakdown.unit_price.cents(),
            tax_cents: new.breakdown.tax.cents(),
            service_fee_cents: new.breakdown.service_fee.cents(),
            total_cents: new.breakdown.total.cents(),
            status: OrderStatus::Pending,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        // Released or confirmed holds never get a second purchase
        ledger::claim_held_in(&mut *tx, &order.reservation_id, now).await?;

        insert_payment(&mut *tx, &payment).await?;
        insert_order(&mut *tx, &order).await?;

        let mut ticket = new_ticket(&order, next_ticket_number(), now);
        if let Err(err) = insert_ticket(&mut *tx, &ticket).await {
            if !err.is_unique_violation_on("ticket_number") {
                return Err(err);
            }
            warn!(ticket_number = %ticket.ticket_number, "Ticket number collision, regenerating");

            ticket = new_ticket(&order, next_ticket_number(), now);
            if let Err(err) = insert_ticket(&mut *tx, &ticket).await {
                if err.is_unique_violation_on("ticket_number") {
                    return Err(CoreError::UniquenessViolation {
                        field: "ticket_number".to_string(),
                        value: ticket.ticket_number,
                    }
                    .into());
                }
                return Err(err);
            }
        }

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            payment_id = %payment.id,
            total_cents = order.total_cents,
            "Purchase recorded"
        );

        Ok(PurchaseRecords {
            payment,
            order,
            ticket,
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn get_by_payment(&self, payment_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_id = ?")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn get_by_reservation(&self, reservation_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE reservation_id = ?")
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn get_ticket(&self, id: &str) -> DbResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    pub async fn ticket_by_number(&self, ticket_number: &str) -> DbResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_number = ?")
            .bind(ticket_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// Marks a ticket used. Only tickets of confirmed orders can be
    /// redeemed, and only once.
    pub async fn redeem_ticket(&self, ticket_number: &str, now: DateTime<Utc>) -> DbResult<Ticket> {
        let result = sqlx::query(
            r#"
            UPDATE tickets SET is_used = 1, used_at = ?
             WHERE ticket_number = ? AND is_used = 0
               AND order_id IN (SELECT id FROM orders WHERE status = ?)
            "#,
        )
        .bind(now)
        .bind(ticket_number)
        .bind(OrderStatus::Confirmed)
        .execute(&self.pool)
        .await?;

        let ticket = self
            .ticket_by_number(ticket_number)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", ticket_number))?;

        if result.rows_affected() == 1 {
            info!(ticket_number = %ticket_number, "Ticket redeemed");
            return Ok(ticket);
        }

        if ticket.is_used {
            return Err(CoreError::invalid_state("ticket", ticket_number, "used", "redeemed").into());
        }

        let status = self
            .get(&ticket.order_id)
            .await?
            .map(|order| order.status)
            .ok_or_else(|| DbError::not_found("Order", &ticket.order_id))?;
        Err(CoreError::invalid_state("order", &ticket.order_id, status, "redeemed").into())
    }

    /// Sales figures recomputed from source rows.
    pub async fn event_sales(&self, event_id: &str) -> DbResult<EventSales> {
        let (tickets_sold, gross, refunded, available): (i64, i64, i64, Option<i64>) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE((SELECT SUM(ticket_quantity) FROM orders
                               WHERE event_id = ? AND status = ?), 0),
                    COALESCE((SELECT SUM(amount_cents) FROM payments
                               WHERE event_id = ? AND status IN (?, ?)), 0),
                    COALESCE((SELECT SUM(refunded_cents) FROM payments
                               WHERE event_id = ? AND status IN (?, ?)), 0),
                    (SELECT total_seats - reserved_units FROM events WHERE id = ?)
                "#,
            )
            .bind(event_id)
            .bind(OrderStatus::Confirmed)
            .bind(event_id)
            .bind(PaymentStatus::Completed)
            .bind(PaymentStatus::Refunded)
            .bind(event_id)
            .bind(PaymentStatus::Completed)
            .bind(PaymentStatus::Refunded)
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        let available_seats = available.ok_or_else(|| DbError::not_found("Event", event_id))?;

        Ok(EventSales {
            event_id: event_id.to_string(),
            tickets_sold,
            gross_revenue_cents: gross,
            refunded_cents: refunded,
            net_revenue_cents: gross - refunded,
            available_seats,
        })
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn new_ticket(order: &Order, ticket_number: String, now: DateTime<Utc>) -> Ticket {
    Ticket {
        id: new_id(),
        order_id: order.id.clone(),
        event_id: order.event_id.clone(),
        user_id: order.user_id.clone(),
        entry_payload: entry_payload(&ticket_number, &order.event_id, &order.user_id),
        ticket_number,
        category: order.category,
        is_used: false,
        used_at: None,
        created_at: now,
    }
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, user_id, event_id, amount_cents, refunded_cents, currency, method, status,
            transaction_id, gateway_response, processed_at, failed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.user_id)
    .bind(&payment.event_id)
    .bind(payment.amount_cents)
    .bind(payment.refunded_cents)
    .bind(&payment.currency)
    .bind(payment.method)
    .bind(payment.status)
    .bind(&payment.transaction_id)
    .bind(&payment.gateway_response)
    .bind(payment.processed_at)
    .bind(payment.failed_at)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, payment_id, reservation_id, user_id, event_id, category,
            ticket_quantity, unit_price_cents, tax_cents, service_fee_cents, total_cents,
            status, customer_name, customer_email, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.payment_id)
    .bind(&order.reservation_id)
    .bind(&order.user_id)
    .bind(&order.event_id)
    .bind(order.category)
    .bind(order.ticket_quantity)
    .bind(order.unit_price_cents)
    .bind(order.tax_cents)
    .bind(order.service_fee_cents)
    .bind(order.total_cents)
    .bind(order.status)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_ticket(conn: &mut SqliteConnection, ticket: &Ticket) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tickets (
            id, order_id, event_id, user_id, ticket_number, category,
            entry_payload, is_used, used_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&ticket.id)
    .bind(&ticket.order_id)
    .bind(&ticket.event_id)
    .bind(&ticket.user_id)
    .bind(&ticket.ticket_number)
    .bind(ticket.category)
    .bind(&ticket.entry_payload)
    .bind(ticket.is_used)
    .bind(ticket.used_at)
    .bind(ticket.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// In-transaction operations
// =============================================================================

pub(crate) async fn get_by_payment_in(
    conn: &mut SqliteConnection,
    payment_id: &str,
) -> DbResult<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_id = ?")
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order for payment", payment_id))
}

/// Moves an order to `to` inside an open transaction.
pub(crate) async fn set_status_in(
    conn: &mut SqliteConnection,
    order: &Order,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<Outcome<Order>> {
    match plan_transition("order", &order.id, order.status, to)? {
        Transition::Duplicate => {
            debug!(order_id = %order.id, status = %to, "Order already in status");
            Ok(Outcome::Duplicate(order.clone()))
        }
        Transition::Apply => {
            let result = sqlx::query(
                "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(to)
            .bind(now)
            .bind(&order.id)
            .bind(order.status)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::TransactionFailed(format!(
                    "order {} changed during transition",
                    order.id
                )));
            }

            Ok(Outcome::Applied(Order {
                status: to,
                updated_at: now,
                ..order.clone()
            }))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
