//! Shared fixtures for engine tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use crate::box_office::BoxOffice;
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::fulfillment::{Customer, PurchaseReceipt, PurchaseRequest};
use crate::notify::testing::{Inbox, RecordingNotifier};
use horizon_core::{
    Event, EventStatus, NewEvent, NewUser, NewVenue, PaymentMethod, TicketCategory, User,
    UserRole, Venue,
};
use horizon_db::{Database, DbConfig};

pub(crate) struct Fixture {
    pub office: BoxOffice,
    pub clock: Arc<ManualClock>,
    pub inbox: Inbox,
    pub admin: User,
    pub manager: User,
    pub buyer: User,
    pub venue: Venue,
    pub event: Event,
}

/// Fixed test instant plus `secs` seconds.
pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Box office on an in-memory database with one published $50 event of
/// `total_seats` seats. Default checkout settings (8% tax, 3% fee, 15 min
/// hold); the clock starts at `ts(0)`.
pub(crate) async fn setup(total_seats: i64) -> Fixture {
    setup_with(total_seats, EngineConfig::default()).await
}

pub(crate) async fn setup_with(total_seats: i64, config: EngineConfig) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let clock = Arc::new(ManualClock::new(ts(0)));
    let (notifier, inbox) = RecordingNotifier::new();
    let office = BoxOffice::new(db, config, clock.clone(), Arc::new(notifier));

    let admin = user(&office, "admin", UserRole::Admin).await;
    let manager = user(&office, "manager", UserRole::VenueManager).await;
    let buyer = user(&office, "buyer", UserRole::Basic).await;

    let venue = office
        .create_venue(NewVenue {
            name: "Riverside Arena".to_string(),
            capacity: 500,
            manager_id: manager.id.clone(),
        })
        .await
        .unwrap();

    let event = office
        .create_event(NewEvent {
            venue_id: venue.id.clone(),
            organizer_id: admin.id.clone(),
            title: "Summer Concert".to_string(),
            base_price_cents: 5000,
            total_seats,
        })
        .await
        .unwrap();
    assert_eq!(event.status, EventStatus::Draft);
    let event = office.publish_event(&event.id).await.unwrap();

    Fixture {
        office,
        clock,
        inbox,
        admin,
        manager,
        buyer,
        venue,
        event,
    }
}

pub(crate) async fn user(office: &BoxOffice, name: &str, role: UserRole) -> User {
    office
        .create_user(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            role,
        })
        .await
        .unwrap()
}

/// A regular-price purchase request from the fixture buyer.
pub(crate) fn request(fx: &Fixture, quantity: i64) -> PurchaseRequest {
    PurchaseRequest {
        event_id: fx.event.id.clone(),
        buyer_id: fx.buyer.id.clone(),
        category: TicketCategory::Regular,
        quantity,
        method: PaymentMethod::CreditCard,
        customer: Customer {
            name: "Ada Buyer".to_string(),
            email: "ada@example.com".to_string(),
        },
    }
}

pub(crate) async fn buy(fx: &Fixture, quantity: i64) -> PurchaseReceipt {
    fx.office.purchase(request(fx, quantity)).await.unwrap()
}
