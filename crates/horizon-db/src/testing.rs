//! Shared fixtures for repository tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::PathBuf;

use crate::repository::order::{NewPurchase, PurchaseRecords};
use crate::{Database, DbConfig};
use horizon_core::{
    Event, EventStatus, GatewayStatus, Money, NewEvent, NewUser, NewVenue, PaymentMethod,
    PriceBreakdown, Rate, TicketCategory, User, UserRole, Venue,
};

pub(crate) struct Fixture {
    pub db: Database,
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

/// In-memory database with one published event of `total_seats` seats.
pub(crate) async fn setup(total_seats: i64) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(db, total_seats).await
}

/// File-backed database with several connections, for tests that need real
/// concurrent writers. The file lives in the temp dir under a fresh name.
pub(crate) async fn setup_file(total_seats: i64, connections: u32) -> (Fixture, PathBuf) {
    let path = std::env::temp_dir().join(format!("horizon-db-{}.sqlite", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path.clone()).max_connections(connections))
        .await
        .unwrap();
    (seed(db, total_seats).await, path)
}

pub(crate) async fn cleanup(path: PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

async fn seed(db: Database, total_seats: i64) -> Fixture {
    let catalog = db.catalog();
    let admin = user(&db, "admin", UserRole::Admin).await;
    let manager = user(&db, "manager", UserRole::VenueManager).await;
    let buyer = user(&db, "buyer", UserRole::Basic).await;

    let venue = catalog
        .create_venue(
            NewVenue {
                name: "Main Hall".to_string(),
                capacity: 500,
                manager_id: manager.id.clone(),
            },
            ts(0),
        )
        .await
        .unwrap();

    let event = catalog
        .create_event(
            NewEvent {
                venue_id: venue.id.clone(),
                organizer_id: admin.id.clone(),
                title: "Summer Concert".to_string(),
                base_price_cents: 5000,
                total_seats,
            },
            ts(0),
        )
        .await
        .unwrap();
    let event = catalog
        .set_event_status(&event.id, EventStatus::Published, ts(0))
        .await
        .unwrap();

    Fixture {
        db,
        admin,
        manager,
        buyer,
        venue,
        event,
    }
}

pub(crate) async fn user(db: &Database, name: &str, role: UserRole) -> User {
    db.catalog()
        .create_user(
            NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                role,
            },
            ts(0),
        )
        .await
        .unwrap()
}

/// Holds `quantity` seats for the fixture buyer and records a pending
/// purchase at `unit_cents` each, tax and fees zero.
pub(crate) async fn purchase(fx: &Fixture, quantity: i64, unit_cents: i64) -> PurchaseRecords {
    let hold = fx
        .db
        .ledger()
        .reserve(&fx.event.id, quantity, None, ts(600), ts(0))
        .await
        .unwrap();
    fx.db
        .orders()
        .create_purchase(
            NewPurchase {
                reservation_id: hold.id,
                user_id: fx.buyer.id.clone(),
                event_id: fx.event.id.clone(),
                category: TicketCategory::Regular,
                breakdown: PriceBreakdown::compute(
                    Money::from_cents(unit_cents),
                    quantity,
                    Rate::zero(),
                    Rate::zero(),
                )
                .unwrap(),
                currency: "USD".to_string(),
                method: PaymentMethod::CreditCard,
                customer_name: "Ada Buyer".to_string(),
                customer_email: "ada@example.com".to_string(),
            },
            ts(1),
        )
        .await
        .unwrap()
}

/// A purchase whose payment the gateway has completed.
pub(crate) async fn paid(fx: &Fixture, quantity: i64, unit_cents: i64) -> PurchaseRecords {
    let mut records = purchase(fx, quantity, unit_cents).await;
    let transition = fx
        .db
        .payments()
        .apply_gateway_status(&records.payment.id, GatewayStatus::Completed, None, ts(2))
        .await
        .unwrap()
        .into_inner();
    records.payment = transition.payment;
    records.order = transition.order;
    records
}
