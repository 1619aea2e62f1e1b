//! # Inventory Ledger
//!
//! Owns `events.reserved_units` and the reservation rows. No other code
//! writes either.
//!
//! ## Reserve is one conditional update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE events                                                          │
//! │     SET reserved_units = reserved_units + :q                           │
//! │   WHERE id = :event AND reserved_units + :q <= total_seats             │
//! │                                                                         │
//! │  1 row  ──► INSERT reservation (held) ──► COMMIT                       │
//! │  0 rows ──► ROLLBACK ──► InsufficientInventory / NotFound              │
//! │                                                                         │
//! │  The check and the increment are the same statement, so two buyers    │
//! │  racing for the last seats can never both pass. The table's CHECK      │
//! │  constraint backs the same bound.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reservation lifecycle
//! ```text
//!   held ──confirm──► confirmed ──revoke (full refund)──► released
//!     │
//!     └──release (payment failed/cancelled, hold expired)──► released
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::validation::validate_positive;
use horizon_core::{CoreError, Reservation, ReservationStatus};

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Holds `quantity` seats of an event until `expires_at`.
    ///
    /// ## Errors
    /// - `InsufficientInventory` when fewer seats remain (nothing written)
    /// - `NotFound` for an unknown event
    pub async fn reserve(
        &self,
        event_id: &str,
        quantity: i64,
        tier_id: Option<&str>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Reservation> {
        validate_positive("quantity", quantity)?;

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE events
               SET reserved_units = reserved_units + ?, updated_at = ?
             WHERE id = ? AND reserved_units + ? <= total_seats
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(event_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let seats: Option<(i64, i64)> =
                sqlx::query_as("SELECT total_seats, reserved_units FROM events WHERE id = ?")
                    .bind(event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return match seats {
                None => Err(DbError::not_found("Event", event_id)),
                Some((total, reserved)) => {
                    debug!(
                        event_id = %event_id,
                        requested = quantity,
                        available = total - reserved,
                        "Reservation rejected"
                    );
                    Err(CoreError::InsufficientInventory {
                        event_id: event_id.to_string(),
                        available: total - reserved,
                        requested: quantity,
                    }
                    .into())
                }
            };
        }

        let reservation = Reservation {
            id: new_id(),
            event_id: event_id.to_string(),
            tier_id: tier_id.map(str::to_string),
            quantity,
            status: ReservationStatus::Held,
            expires_at,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, event_id, tier_id, quantity, status, expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.event_id)
        .bind(&reservation.tier_id)
        .bind(reservation.quantity)
        .bind(reservation.status)
        .bind(reservation.expires_at)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            reservation_id = %reservation.id,
            event_id = %event_id,
            quantity,
            "Seats reserved"
        );
        Ok(reservation)
    }

    /// held -> confirmed. Idempotent on confirmed.
    pub async fn confirm(&self, id: &str, now: DateTime<Utc>) -> DbResult<Outcome<Reservation>> {
        let mut tx = self.pool.begin().await?;
        let outcome = confirm_in(&mut *tx, id, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// held -> released. Idempotent on released.
    pub async fn release(&self, id: &str, now: DateTime<Utc>) -> DbResult<Outcome<Reservation>> {
        let mut tx = self.pool.begin().await?;
        let outcome = release_in(&mut *tx, id, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// confirmed -> released, for fully refunded orders.
    pub async fn revoke(&self, id: &str, now: DateTime<Utc>) -> DbResult<Outcome<Reservation>> {
        let mut tx = self.pool.begin().await?;
        let outcome = revoke_in(&mut *tx, id, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn available_seats(&self, event_id: &str) -> DbResult<i64> {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT total_seats - reserved_units FROM events WHERE id = ?")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;
        available.ok_or_else(|| DbError::not_found("Event", event_id))
    }

    /// Held reservations whose deadline is at or before `now`, oldest first.
    pub async fn expired_holds(&self, now: DateTime<Utc>, limit: i64) -> DbResult<Vec<Reservation>> {
        let holds = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
             WHERE status = ? AND expires_at <= ?
             ORDER BY expires_at, id
             LIMIT ?
            "#,
        )
        .bind(ReservationStatus::Held)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(holds)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }
}

// =============================================================================
// In-transaction operations
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Reservation> {
    sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Reservation", id))
}

/// Moves a reservation `from -> to` if it is still in `from`.
async fn compare_and_set(
    conn: &mut SqliteConnection,
    id: &str,
    from: ReservationStatus,
    to: ReservationStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE reservations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Explains why a compare-and-set missed: already there, or not allowed.
async fn missed(
    conn: &mut SqliteConnection,
    id: &str,
    requested: ReservationStatus,
) -> DbResult<Outcome<Reservation>> {
    let current = get_in(conn, id).await?;
    match plan_transition("reservation", id, current.status, requested)? {
        Transition::Duplicate => {
            debug!(reservation_id = %id, status = %current.status, "Reservation already in status");
            Ok(Outcome::Duplicate(current))
        }
        Transition::Apply => Err(DbError::TransactionFailed(format!(
            "reservation {id} changed during transition"
        ))),
    }
}

/// Takes the writer lock on a hold that must still be `held`, so that a
/// concurrent release cannot slip in before the caller commits.
pub(crate) async fn claim_held_in(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<Reservation> {
    let result = sqlx::query("UPDATE reservations SET updated_at = ? WHERE id = ? AND status = ?")
        .bind(now)
        .bind(id)
        .bind(ReservationStatus::Held)
        .execute(&mut *conn)
        .await?;

    let reservation = get_in(conn, id).await?;
    if result.rows_affected() == 0 {
        return Err(
            CoreError::invalid_state("reservation", id, reservation.status, "purchased").into(),
        );
    }
    Ok(reservation)
}

/// held -> confirmed inside an open transaction. Consumes tier stock,
/// clamped at zero: seat capacity is the hard limit, not tier stock.
pub(crate) async fn confirm_in(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<Outcome<Reservation>> {
    use ReservationStatus::*;

    if !compare_and_set(conn, id, Held, Confirmed, now).await? {
        return missed(conn, id, Confirmed).await;
    }

    let reservation = get_in(conn, id).await?;
    if let Some(tier_id) = &reservation.tier_id {
        sqlx::query(
            "UPDATE pricing_tiers SET available_quantity = MAX(available_quantity - ?, 0) WHERE id = ?",
        )
        .bind(reservation.quantity)
        .bind(tier_id)
        .execute(&mut *conn)
        .await?;
    }

    info!(reservation_id = %id, "Reservation confirmed");
    Ok(Outcome::Applied(reservation))
}

/// held -> released inside an open transaction; returns the seats.
pub(crate) async fn release_in(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<Outcome<Reservation>> {
    use ReservationStatus::*;

    if !compare_and_set(conn, id, Held, Released, now).await? {
        return missed(conn, id, Released).await;
    }

    let reservation = get_in(conn, id).await?;
    return_seats(conn, &reservation, now).await?;

    info!(reservation_id = %id, quantity = reservation.quantity, "Reservation released");
    Ok(Outcome::Applied(reservation))
}

/// confirmed -> released inside an open transaction; returns the seats
/// and the tier stock consumed at confirmation.
pub(crate) async fn revoke_in(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<Outcome<Reservation>> {
    use ReservationStatus::*;

    if !compare_and_set(conn, id, Confirmed, Released, now).await? {
        let current = get_in(conn, id).await?;
        return match current.status {
            Released => Ok(Outcome::Duplicate(current)),
            status => Err(CoreError::invalid_state("reservation", id, status, "revoked").into()),
        };
    }

    let reservation = get_in(conn, id).await?;
    return_seats(conn, &reservation, now).await?;

    if let Some(tier_id) = &reservation.tier_id {
        sqlx::query(
            "UPDATE pricing_tiers SET available_quantity = available_quantity + ? WHERE id = ?",
        )
        .bind(reservation.quantity)
        .bind(tier_id)
        .execute(&mut *conn)
        .await?;
    }

    info!(reservation_id = %id, quantity = reservation.quantity, "Reservation revoked");
    Ok(Outcome::Applied(reservation))
}

async fn return_seats(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE events SET reserved_units = reserved_units - ?, updated_at = ? WHERE id = ?")
        .bind(reservation.quantity)
        .bind(now)
        .bind(&reservation.event_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cleanup, setup, setup_file, ts};
    use horizon_core::{NewPricingTier, TicketCategory};

    #[tokio::test]
    async fn test_reserve_and_release_restore_availability() {
        let fx = setup(10).await;
        let ledger = fx.db.ledger();

        let hold = ledger.reserve(&fx.event.id, 4, None, ts(600), ts(0)).await.unwrap();
        assert_eq!(hold.status, ReservationStatus::Held);
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 6);

        let released = ledger.release(&hold.id, ts(1)).await.unwrap();
        assert!(released.is_applied());
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 10);

        // Second release is a no-op
        let again = ledger.release(&hold.id, ts(2)).await.unwrap();
        assert!(!again.is_applied());
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_reserve_beyond_capacity_has_no_side_effect() {
        let fx = setup(5).await;
        let ledger = fx.db.ledger();

        ledger.reserve(&fx.event.id, 3, None, ts(600), ts(0)).await.unwrap();
        let err = ledger
            .reserve(&fx.event.id, 3, None, ts(600), ts(0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientInventory {
                available: 2,
                requested: 3,
                ..
            })
        ));
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 2);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_reserve_unknown_event() {
        let fx = setup(5).await;
        let err = fx
            .db
            .ledger()
            .reserve("no-such-event", 1, None, ts(600), ts(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_release_after_confirm_is_invalid_and_keeps_count() {
        let fx = setup(10).await;
        let ledger = fx.db.ledger();

        let hold = ledger.reserve(&fx.event.id, 2, None, ts(600), ts(0)).await.unwrap();
        assert!(ledger.confirm(&hold.id, ts(1)).await.unwrap().is_applied());
        assert!(!ledger.confirm(&hold.id, ts(2)).await.unwrap().is_applied());

        let err = ledger.release(&hold.id, ts(3)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidState { .. })));
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_confirm_after_release_is_invalid() {
        let fx = setup(10).await;
        let ledger = fx.db.ledger();

        let hold = ledger.reserve(&fx.event.id, 2, None, ts(600), ts(0)).await.unwrap();
        ledger.release(&hold.id, ts(1)).await.unwrap();
        let err = ledger.confirm(&hold.id, ts(2)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_confirm_consumes_tier_stock_clamped_at_zero() {
        let fx = setup(10).await;
        let tier = fx
            .db
            .catalog()
            .add_pricing_tier(
                NewPricingTier {
                    event_id: fx.event.id.clone(),
                    category: TicketCategory::Regular,
                    name: "Early Bird".to_string(),
                    price_cents: 3000,
                    available_quantity: 3,
                    valid_from: None,
                    valid_until: None,
                },
                ts(0),
            )
            .await
            .unwrap();

        let ledger = fx.db.ledger();
        let a = ledger.reserve(&fx.event.id, 2, Some(&tier.id), ts(600), ts(0)).await.unwrap();
        let b = ledger.reserve(&fx.event.id, 2, Some(&tier.id), ts(600), ts(0)).await.unwrap();
        ledger.confirm(&a.id, ts(1)).await.unwrap();
        ledger.confirm(&b.id, ts(1)).await.unwrap();

        let tier = fx.db.catalog().get_tier(&tier.id).await.unwrap().unwrap();
        assert_eq!(tier.available_quantity, 0);
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_revoke_returns_confirmed_seats() {
        let fx = setup(10).await;
        let ledger = fx.db.ledger();

        let hold = ledger.reserve(&fx.event.id, 3, None, ts(600), ts(0)).await.unwrap();
        // Held reservations are released, not revoked
        assert!(ledger.revoke(&hold.id, ts(1)).await.is_err());

        ledger.confirm(&hold.id, ts(1)).await.unwrap();
        assert!(ledger.revoke(&hold.id, ts(2)).await.unwrap().is_applied());
        assert!(!ledger.revoke(&hold.id, ts(3)).await.unwrap().is_applied());
        assert_eq!(ledger.available_seats(&fx.event.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_expired_holds() {
        let fx = setup(10).await;
        let ledger = fx.db.ledger();

        let early = ledger.reserve(&fx.event.id, 1, None, ts(60), ts(0)).await.unwrap();
        let late = ledger.reserve(&fx.event.id, 1, None, ts(600), ts(0)).await.unwrap();
        let confirmed = ledger.reserve(&fx.event.id, 1, None, ts(30), ts(0)).await.unwrap();
        ledger.confirm(&confirmed.id, ts(1)).await.unwrap();

        let expired = ledger.expired_holds(ts(60), 10).await.unwrap();
        let ids: Vec<_> = expired.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![early.id.as_str()]);

        let expired = ledger.expired_holds(ts(601), 10).await.unwrap();
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().any(|r| r.id == late.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_oversell() {
        let (fx, path) = setup_file(10, 8).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = fx.db.ledger();
            let event_id = fx.event.id.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(&event_id, 2, None, ts(600), ts(0)).await
            }));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Domain(CoreError::InsufficientInventory { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(rejected, 20);
        assert_eq!(fx.db.ledger().available_seats(&fx.event.id).await.unwrap(), 0);

        fx.db.close().await;
        cleanup(path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_buyers_race_for_six_of_ten() {
        let (fx, path) = setup_file(10, 4).await;

        let a = {
            let ledger = fx.db.ledger();
            let id = fx.event.id.clone();
            tokio::spawn(async move { ledger.reserve(&id, 6, None, ts(600), ts(0)).await })
        };
        let b = {
            let ledger = fx.db.ledger();
            let id = fx.event.id.clone();
            tokio::spawn(async move { ledger.reserve(&id, 6, None, ts(600), ts(0)).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DbError::Domain(CoreError::InsufficientInventory { .. }))
        )));
        assert_eq!(fx.db.ledger().available_seats(&fx.event.id).await.unwrap(), 4);

        fx.db.close().await;
        cleanup(path).await;
    }
}
