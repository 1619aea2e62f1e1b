//! # Catalog Repository
//!
//! The minimal writers the box office needs around it: users, venues,
//! events and pricing tiers. Browsing and full catalog editing live
//! elsewhere.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::validation::{
    validate_positive, validate_price_cents, validate_text, MAX_TITLE_LEN,
};
use horizon_core::{
    Event, EventStatus, NewEvent, NewPricingTier, NewUser, NewVenue, PricingTier,
    TicketCategory, User, UserRole, ValidationError, Venue,
};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    pub async fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> DbResult<User> {
        validate_text("username", &new.username, 150)?;
        validate_text("email", &new.email, 254)?;

        let user = User {
            id: new_id(),
            username: new.username.trim().to_string(),
            email: new.email.trim().to_string(),
            role: new.role,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn require_user(&self, id: &str) -> DbResult<User> {
        self.get_user(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Users currently holding `role`, oldest first.
    pub async fn list_by_role(&self, role: UserRole) -> DbResult<Vec<User>> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = ? ORDER BY created_at, id")
                .bind(role)
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }

    // -------------------------------------------------------------------------
    // Venues
    // -------------------------------------------------------------------------

    pub async fn create_venue(&self, new: NewVenue, now: DateTime<Utc>) -> DbResult<Venue> {
        validate_text("name", &new.name, MAX_TITLE_LEN)?;
        validate_positive("capacity", new.capacity)?;
        self.require_user(&new.manager_id).await?;

        let venue = Venue {
            id: new_id(),
            name: new.name.trim().to_string(),
            capacity: new.capacity,
            manager_id: new.manager_id,
            is_active: true,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO venues (id, name, capacity, manager_id, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&venue.id)
        .bind(&venue.name)
        .bind(venue.capacity)
        .bind(&venue.manager_id)
        .bind(venue.is_active)
        .bind(venue.created_at)
        .execute(&self.pool)
        .await?;

        info!(venue_id = %venue.id, capacity = venue.capacity, "Venue created");
        Ok(venue)
    }

    pub async fn get_venue(&self, id: &str) -> DbResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(venue)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Creates an event in `draft` with no seats reserved.
    pub async fn create_event(&self, new: NewEvent, now: DateTime<Utc>) -> DbResult<Event> {
        validate_text("title", &new.title, MAX_TITLE_LEN)?;
        validate_positive("total_seats", new.total_seats)?;
        validate_price_cents("base_price", new.base_price_cents)?;

        let event = Event {
            id: new_id(),
            venue_id: new.venue_id,
            organizer_id: new.organizer_id,
            title: new.title.trim().to_string(),
            status: EventStatus::Draft,
            base_price_cents: new.base_price_cents,
            total_seats: new.total_seats,
            reserved_units: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO events (
                id, venue_id, organizer_id, title, status,
                base_price_cents, total_seats, reserved_units, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.venue_id)
        .bind(&event.organizer_id)
        .bind(&event.title)
        .bind(event.status)
        .bind(event.base_price_cents)
        .bind(event.total_seats)
        .bind(event.reserved_units)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;

        info!(event_id = %event.id, total_seats = event.total_seats, "Event created");
        Ok(event)
    }

    pub async fn get_event(&self, id: &str) -> DbResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn require_event(&self, id: &str) -> DbResult<Event> {
        self.get_event(id)
            .await?
            .ok_or_else(|| DbError::not_found("Event", id))
    }

    pub async fn set_event_status(
        &self,
        id: &str,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> DbResult<Event> {
        let result = sqlx::query("UPDATE events SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Event", id));
        }

        info!(event_id = %id, status = %status, "Event status changed");
        self.require_event(id).await
    }

    // -------------------------------------------------------------------------
    // Pricing tiers
    // -------------------------------------------------------------------------

    pub async fn add_pricing_tier(
        &self,
        new: NewPricingTier,
        now: DateTime<Utc>,
    ) -> DbResult<PricingTier> {
        validate_text("name", &new.name, 100)?;
        validate_price_cents("price", new.price_cents)?;
        if new.available_quantity < 0 {
            return Err(ValidationError::MustBePositive {
                field: "available_quantity".to_string(),
            }
            .into());
        }
        if let (Some(from), Some(until)) = (new.valid_from, new.valid_until) {
            if until <= from {
                return Err(ValidationError::InvalidFormat {
                    field: "valid_until".to_string(),
                    reason: "window ends before it starts".to_string(),
                }
                .into());
            }
        }
        self.require_event(&new.event_id).await?;

        let tier = PricingTier {
            id: new_id(),
            event_id: new.event_id,
            category: new.category,
            name: new.name.trim().to_string(),
            price_cents: new.price_cents,
            available_quantity: new.available_quantity,
            valid_from: new.valid_from,
            valid_until: new.valid_until,
            is_active: true,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO pricing_tiers (
                id, event_id, category, name, price_cents, available_quantity,
                valid_from, valid_until, is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tier.id)
        .bind(&tier.event_id)
        .bind(tier.category)
        .bind(&tier.name)
        .bind(tier.price_cents)
        .bind(tier.available_quantity)
        .bind(tier.valid_from)
        .bind(tier.valid_until)
        .bind(tier.is_active)
        .bind(tier.created_at)
        .execute(&self.pool)
        .await?;

        debug!(tier_id = %tier.id, event_id = %tier.event_id, "Pricing tier added");
        Ok(tier)
    }

    /// All tiers of one category for an event, active or not. Filtering by
    /// window and stock is the pricing resolver's job.
    pub async fn tiers_for(
        &self,
        event_id: &str,
        category: TicketCategory,
    ) -> DbResult<Vec<PricingTier>> {
        let tiers = sqlx::query_as::<_, PricingTier>(
            "SELECT * FROM pricing_tiers WHERE event_id = ? AND category = ? ORDER BY id",
        )
        .bind(event_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(tiers)
    }

    pub async fn get_tier(&self, id: &str) -> DbResult<Option<PricingTier>> {
        let tier = sqlx::query_as::<_, PricingTier>("SELECT * FROM pricing_tiers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tier)
    }
}
