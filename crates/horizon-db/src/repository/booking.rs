//! # Venue Booking Repository
//!
//! Requests to use a venue for a time slot, reviewed by the venue manager.
//!
//! ## Approval and overlap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE booking SET status = approved WHERE id = ? AND status = ?    │
//! │    SELECT approved bookings, same venue + date, other ids              │
//! │    any [start, end) intersecting?  ──yes──► ROLLBACK, BookingConflict  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The status write comes first, so a second approval for the same slot
//! waits for the first to commit and then sees it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::MAX_CAS_ATTEMPTS;
use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::validation::{
    validate_attendees, validate_price_cents, validate_text, validate_text_optional,
    validate_time_range, MAX_TEXT_LEN, MAX_TITLE_LEN,
};
use horizon_core::{
    BookingStatus, CoreError, Decision, NewBookingRequest, Venue, VenueBookingRequest,
};

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Stores a pending booking request after checking the slot and the
    /// venue's capacity.
    pub async fn create(
        &self,
        new: NewBookingRequest,
        now: DateTime<Utc>,
    ) -> DbResult<VenueBookingRequest> {
        validate_text("event_name", &new.event_name, MAX_TITLE_LEN)?;
        validate_text_optional("description", &new.description, MAX_TEXT_LEN)?;
        validate_time_range(new.start_time, new.end_time)?;
        validate_price_cents("quoted_price", new.quoted_price_cents)?;

        let venue = sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = ?")
            .bind(&new.venue_id)
            .fetch_optional(&self.pool)
            .await?
            .filter(|venue| venue.is_active)
            .ok_or_else(|| DbError::not_found("Venue", &new.venue_id))?;
        validate_attendees(new.expected_attendees, venue.capacity)?;

        let booking = VenueBookingRequest {
            id: new_id(),
            venue_id: new.venue_id,
            requester_id: new.requester_id,
            event_name: new.event_name.trim().to_string(),
            description: new.description.trim().to_string(),
            booking_date: new.booking_date,
            start_time: new.start_time,
            end_time: new.end_time,
            expected_attendees: new.expected_attendees,
            quoted_price_cents: new.quoted_price_cents,
            status: BookingStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO venue_booking_requests (
                id, venue_id, requester_id, event_name, description, booking_date,
                start_time, end_time, expected_attendees, quoted_price_cents, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&booking.id)
        .bind(&booking.venue_id)
        .bind(&booking.requester_id)
        .bind(&booking.event_name)
        .bind(&booking.description)
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.expected_attendees)
        .bind(booking.quoted_price_cents)
        .bind(booking.status)
        .bind(booking.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            booking_id = %booking.id,
            venue_id = %booking.venue_id,
            date = %booking.booking_date,
            "Venue booking requested"
        );
        Ok(booking)
    }

    /// Approves or rejects a pending booking.
    ///
    /// ## Errors
    /// - `BookingConflict` when approval would overlap an approved booking
    /// - `InvalidState` when the booking is no longer pending
    pub async fn decide(
        &self,
        booking_id: &str,
        decision: Decision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<VenueBookingRequest>> {
        let target = decision.booking_status();

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.require(booking_id).await?;

            if plan_transition("venue_booking", booking_id, current.status, target)?
                == Transition::Duplicate
            {
                debug!(booking_id = %booking_id, status = %target, "Booking already decided");
                return Ok(Outcome::Duplicate(current));
            }

            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE venue_booking_requests
                   SET status = ?, reviewed_by = ?, reviewed_at = ?
                 WHERE id = ? AND status = ?
                "#,
            )
            .bind(target)
            .bind(reviewer_id)
            .bind(now)
            .bind(booking_id)
            .bind(current.status)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(booking_id = %booking_id, attempt, "Booking changed concurrently, retrying");
                continue;
            }

            if target == BookingStatus::Approved {
                let approved = sqlx::query_as::<_, VenueBookingRequest>(
                    r#"
                    SELECT * FROM venue_booking_requests
                     WHERE venue_id = ? AND booking_date = ? AND status = ? AND id != ?
                    "#,
                )
                .bind(&current.venue_id)
                .bind(current.booking_date)
                .bind(BookingStatus::Approved)
                .bind(booking_id)
                .fetch_all(&mut *tx)
                .await?;

                if let Some(conflict) = approved.iter().find(|other| current.overlaps(other)) {
                    tx.rollback().await?;
                    warn!(
                        booking_id = %booking_id,
                        conflicting_id = %conflict.id,
                        "Booking approval refused, slot taken"
                    );
                    return Err(CoreError::BookingConflict {
                        venue_id: current.venue_id.clone(),
                        booking_id: booking_id.to_string(),
                        conflicting_id: conflict.id.clone(),
                    }
                    .into());
                }
            }

            tx.commit().await?;

            info!(
                booking_id = %booking_id,
                decision = %target,
                reviewer = %reviewer_id,
                "Venue booking decided"
            );

            return Ok(Outcome::Applied(VenueBookingRequest {
                status: target,
                reviewed_by: Some(reviewer_id.to_string()),
                reviewed_at: Some(now),
                ..current
            }));
        }

        Err(DbError::TransactionFailed(format!(
            "booking {booking_id} kept changing during review"
        )))
    }

    /// Withdraws a pending or approved booking. Only its requester may.
    pub async fn cancel(
        &self,
        booking_id: &str,
        requester_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<VenueBookingRequest>> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.require(booking_id).await?;
            if current.requester_id != requester_id {
                return Err(CoreError::forbidden("cancel another user's booking").into());
            }

            if plan_transition("venue_booking", booking_id, current.status, BookingStatus::Cancelled)?
                == Transition::Duplicate
            {
                return Ok(Outcome::Duplicate(current));
            }

            let updated = sqlx::query(
                "UPDATE venue_booking_requests SET status = ? WHERE id = ? AND status = ?",
            )
            .bind(BookingStatus::Cancelled)
            .bind(booking_id)
            .bind(current.status)
            .execute(&self.pool)
            .await?;

            if updated.rows_affected() == 0 {
                debug!(booking_id = %booking_id, attempt, "Booking changed concurrently, retrying");
                continue;
            }

            info!(booking_id = %booking_id, from = %current.status, "Venue booking cancelled");
            return Ok(Outcome::Applied(VenueBookingRequest {
                status: BookingStatus::Cancelled,
                ..current
            }));
        }

        Err(DbError::TransactionFailed(format!(
            "booking {booking_id} kept changing during cancellation"
        )))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<VenueBookingRequest>> {
        let booking = sqlx::query_as::<_, VenueBookingRequest>(
            "SELECT * FROM venue_booking_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    pub async fn require(&self, id: &str) -> DbResult<VenueBookingRequest> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Venue booking", id))
    }
}
