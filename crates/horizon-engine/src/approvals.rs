//! # Human Approvals
//!
//! Role upgrades and venue bookings both wait on a person. Nothing here
//! blocks on that person: a request is stored, the deciders are notified,
//! and the decision arrives later as its own call.
//!
//! ```text
//! request_role_upgrade ──► pending ──► notify every admin
//! decide_role_request  ──► approved (user role changed, same tx) | rejected
//!                          └──► notify requester
//!
//! request_venue_booking ──► pending ──► notify venue manager
//! decide_venue_booking  ──► approved (no overlap allowed) | rejected
//! cancel_venue_booking  ──► cancelled (requester only)
//! ```

use tracing::{debug, warn};

use crate::box_office::{BoxOffice, Reviewer};
use crate::error::EngineResult;
use crate::notify::Notification;
use horizon_core::{
    Decision, NewBookingRequest, Outcome, RoleUpgradeRequest, UserRole, VenueBookingRequest,
};

impl BoxOffice {
    // =========================================================================
    // Role Upgrades
    // =========================================================================

    pub async fn request_role_upgrade(
        &self,
        user_id: &str,
        role: UserRole,
        reason: &str,
    ) -> EngineResult<RoleUpgradeRequest> {
        let request = self
            .db()
            .roles()
            .create_request(user_id, role, reason, self.now())
            .await?;

        match self.db().catalog().list_by_role(UserRole::Admin).await {
            Ok(admins) => {
                for admin in admins {
                    self.notify(Notification::new(
                        admin.id,
                        format!("Role Upgrade Request - {role}"),
                        format!("User {user_id} asked to become {role}: {}", request.reason),
                    ));
                }
            }
            Err(e) => warn!(request_id = %request.id, error = %e, "Could not look up admins to notify"),
        }

        Ok(request)
    }

    /// Approves or rejects a pending role request.
    pub async fn decide_role_request(
        &self,
        request_id: &str,
        decision: Decision,
        reviewer: &Reviewer,
    ) -> EngineResult<Outcome<RoleUpgradeRequest>> {
        let reviewer_id = reviewer.require("decide role requests")?;
        let outcome = self
            .db()
            .roles()
            .decide(request_id, decision, reviewer_id, self.now())
            .await?;

        if let Outcome::Applied(request) = &outcome {
            self.notify(Notification::new(
                &request.user_id,
                format!("Role Upgrade {}", request.status),
                format!(
                    "Your request to become {} was {}.",
                    request.requested_role, request.status
                ),
            ));
        }

        Ok(outcome)
    }

    pub async fn pending_role_requests(&self) -> EngineResult<Vec<RoleUpgradeRequest>> {
        Ok(self.db().roles().list_pending().await?)
    }

    // =========================================================================
    // Venue Bookings
    // =========================================================================

    pub async fn request_venue_booking(
        &self,
        new: NewBookingRequest,
    ) -> EngineResult<VenueBookingRequest> {
        let booking = self.db().bookings().create(new, self.now()).await?;

        match self.db().catalog().get_venue(&booking.venue_id).await {
            Ok(Some(venue)) => self.notify(Notification::new(
                venue.manager_id,
                format!("Booking Request - {}", venue.name),
                format!(
                    "{} on {} from {} to {} for {} attendees.",
                    booking.event_name,
                    booking.booking_date,
                    booking.start_time,
                    booking.end_time,
                    booking.expected_attendees
                ),
            )),
            Ok(None) => debug!(venue_id = %booking.venue_id, "Venue vanished before notification"),
            Err(e) => warn!(booking_id = %booking.id, error = %e, "Could not look up venue manager"),
        }

        Ok(booking)
    }

    /// Approves or rejects a pending booking.
    ///
    /// ## Errors
    /// - `BookingConflict` when another approved booking overlaps
    /// - `Forbidden` when the reviewer is not permitted
    pub async fn decide_venue_booking(
        &self,
        booking_id: &str,
        decision: Decision,
        reviewer: &Reviewer,
    ) -> EngineResult<Outcome<VenueBookingRequest>> {
        let reviewer_id = reviewer.require("decide venue bookings")?;
        let outcome = self
            .db()
            .bookings()
            .decide(booking_id, decision, reviewer_id, self.now())
            .await?;

        if let Outcome::Applied(booking) = &outcome {
            self.notify(Notification::new(
                &booking.requester_id,
                format!("Booking {}", booking.status),
                format!(
                    "Your booking for {} on {} was {}.",
                    booking.event_name, booking.booking_date, booking.status
                ),
            ));
        }

        Ok(outcome)
    }

    /// Withdraws a pending or approved booking. Only the requester may.
    pub async fn cancel_venue_booking(
        &self,
        booking_id: &str,
        requester_id: &str,
    ) -> EngineResult<Outcome<VenueBookingRequest>> {
        Ok(self
            .db()
            .bookings()
            .cancel(booking_id, requester_id, self.now())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{setup, user, Fixture};
    use chrono::{NaiveDate, NaiveTime};
    use horizon_core::{ApprovalStatus, BookingStatus, CoreError};

    fn booking(fx: &Fixture, start: u32, end: u32) -> NewBookingRequest {
        NewBookingRequest {
            venue_id: fx.venue.id.clone(),
            requester_id: fx.buyer.id.clone(),
            event_name: "Jazz Night".to_string(),
            description: String::new(),
            booking_date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            expected_attendees: 200,
            quoted_price_cents: 150_000,
        }
    }

    #[tokio::test]
    async fn test_role_upgrade_notifies_admins_then_requester() {
        let mut fx = setup(10).await;
        let second_admin = user(&fx.office, "admin2", UserRole::Admin).await;

        let request = fx
            .office
            .request_role_upgrade(&fx.buyer.id, UserRole::HorizonPlanner, "I run a festival")
            .await
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);

        let mut notified = vec![fx.inbox.next().await.user_id, fx.inbox.next().await.user_id];
        notified.sort();
        let mut admins = vec![fx.admin.id.clone(), second_admin.id.clone()];
        admins.sort();
        assert_eq!(notified, admins);

        let decided = fx
            .office
            .decide_role_request(&request.id, Decision::Approve, &Reviewer::new(&fx.admin.id, true))
            .await
            .unwrap();
        assert!(decided.is_applied());

        let note = fx.inbox.next().await;
        assert_eq!(note.user_id, fx.buyer.id);
        assert_eq!(note.subject, "Role Upgrade approved");

        let buyer = fx.office.db().catalog().require_user(&fx.buyer.id).await.unwrap();
        assert_eq!(buyer.role, UserRole::HorizonPlanner);
        assert!(fx.office.pending_role_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpermitted_reviewer_cannot_decide() {
        let fx = setup(10).await;
        let request = fx
            .office
            .request_role_upgrade(&fx.buyer.id, UserRole::VenueManager, "I own a hall")
            .await
            .unwrap();

        let err = fx
            .office
            .decide_role_request(&request.id, Decision::Approve, &Reviewer::new(&fx.manager.id, false))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden { .. })));

        let user = fx.office.db().catalog().require_user(&fx.buyer.id).await.unwrap();
        assert_eq!(user.role, UserRole::Basic);
    }

    #[tokio::test]
    async fn test_booking_flow_and_overlap() {
        let mut fx = setup(10).await;
        let manager = Reviewer::new(&fx.manager.id, true);

        let first = fx.office.request_venue_booking(booking(&fx, 18, 21)).await.unwrap();
        let note = fx.inbox.next().await;
        assert_eq!(note.user_id, fx.manager.id);
        assert_eq!(note.subject, "Booking Request - Riverside Arena");

        let overlapping = fx.office.request_venue_booking(booking(&fx, 20, 23)).await.unwrap();
        fx.inbox.next().await;

        fx.office
            .decide_venue_booking(&first.id, Decision::Approve, &manager)
            .await
            .unwrap();
        assert_eq!(fx.inbox.next().await.subject, "Booking approved");

        let err = fx
            .office
            .decide_venue_booking(&overlapping.id, Decision::Approve, &manager)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BookingConflict { .. })));
        fx.inbox.assert_empty().await;

        // Requester withdraws the first; the slot frees up
        let cancelled = fx
            .office
            .cancel_venue_booking(&first.id, &fx.buyer.id)
            .await
            .unwrap();
        assert_eq!(cancelled.value().status, BookingStatus::Cancelled);

        fx.office
            .decide_venue_booking(&overlapping.id, Decision::Approve, &manager)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_booking_over_capacity_rejected() {
        let fx = setup(10).await;
        let mut new = booking(&fx, 10, 12);
        new.expected_attendees = 501;

        let err = fx.office.request_venue_booking(new).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_only_requester_cancels() {
        let fx = setup(10).await;
        let pending = fx.office.request_venue_booking(booking(&fx, 9, 11)).await.unwrap();

        let err = fx
            .office
            .cancel_venue_booking(&pending.id, &fx.admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Forbidden { .. })));
    }
}
