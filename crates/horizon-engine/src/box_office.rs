//! # Box Office
//!
//! The service every inbound call goes through. It owns no state of its
//! own: the database holds everything, the clock supplies `now`, and the
//! notifier carries messages out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           BoxOffice                                     │
//! │                                                                         │
//! │   fulfillment.rs   purchase ─► price ─► reserve ─► order + ticket      │
//! │   payments.rs      confirm_payment / cancel_payment                    │
//! │   refunds.rs       request_refund / process_refund                     │
//! │   moderation.rs    reviews, comments, votes, moderation status         │
//! │   approvals.rs     role upgrades, venue bookings                       │
//! │   box_office.rs    catalog setup, redemption, entry passes, sales      │
//! │                                                                         │
//! │   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐        │
//! │   │ Database │   │  Clock   │   │ Notifier │   │ EngineConfig │        │
//! │   └──────────┘   └──────────┘   └──────────┘   └──────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::entry_pass::{EntryPass, EntryPassRenderer};
use crate::error::{EngineError, EngineResult};
use crate::notify::{dispatch, Notification, Notifier};
use horizon_core::pricing::resolve_price;
use horizon_core::{
    Event, EventSales, EventStatus, NewEvent, NewPricingTier, NewUser, NewVenue, PriceQuote,
    PricingTier, Ticket, TicketCategory, User, Venue,
};
use horizon_db::{Database, DbError};

/// A staff member acting on a request, with the caller's verdict on whether
/// they may.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub id: String,
    pub permitted: bool,
}

impl Reviewer {
    pub fn new(id: impl Into<String>, permitted: bool) -> Self {
        Reviewer {
            id: id.into(),
            permitted,
        }
    }

    pub(crate) fn require(&self, action: &str) -> EngineResult<&str> {
        if self.permitted {
            Ok(&self.id)
        } else {
            Err(horizon_core::CoreError::forbidden(action).into())
        }
    }
}

#[derive(Clone)]
pub struct BoxOffice {
    db: Database,
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl BoxOffice {
    pub fn new(
        db: Database,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        BoxOffice {
            db,
            config: Arc::new(config),
            clock,
            notifier,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn notify(&self, notification: Notification) {
        dispatch(&self.notifier, notification);
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn create_user(&self, new: NewUser) -> EngineResult<User> {
        Ok(self.db.catalog().create_user(new, self.now()).await?)
    }

    pub async fn create_venue(&self, new: NewVenue) -> EngineResult<Venue> {
        Ok(self.db.catalog().create_venue(new, self.now()).await?)
    }

    /// Creates a draft event.
    pub async fn create_event(&self, new: NewEvent) -> EngineResult<Event> {
        Ok(self.db.catalog().create_event(new, self.now()).await?)
    }

    pub async fn publish_event(&self, event_id: &str) -> EngineResult<Event> {
        self.set_event_status(event_id, EventStatus::Published).await
    }

    pub async fn set_event_status(&self, event_id: &str, status: EventStatus) -> EngineResult<Event> {
        Ok(self
            .db
            .catalog()
            .set_event_status(event_id, status, self.now())
            .await?)
    }

    pub async fn add_pricing_tier(&self, new: NewPricingTier) -> EngineResult<PricingTier> {
        Ok(self.db.catalog().add_pricing_tier(new, self.now()).await?)
    }

    pub async fn available_seats(&self, event_id: &str) -> EngineResult<i64> {
        Ok(self.db.ledger().available_seats(event_id).await?)
    }

    /// The unit price a purchase of `category` would pay right now.
    pub async fn quote(&self, event_id: &str, category: TicketCategory) -> EngineResult<PriceQuote> {
        let event = self.db.catalog().require_event(event_id).await?;
        let tiers = self.db.catalog().tiers_for(event_id, category).await?;
        Ok(resolve_price(event.base_price(), &tiers, category, self.now()))
    }

    // =========================================================================
    // Tickets and Reporting
    // =========================================================================

    pub async fn redeem_ticket(&self, ticket_number: &str) -> EngineResult<Ticket> {
        Ok(self.db.orders().redeem_ticket(ticket_number, self.now()).await?)
    }

    /// Renders the stored entry payload of a ticket.
    pub async fn entry_pass(
        &self,
        ticket_id: &str,
        renderer: &dyn EntryPassRenderer,
    ) -> EngineResult<EntryPass> {
        let ticket = self
            .db
            .orders()
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| EngineError::from(DbError::not_found("Ticket", ticket_id)))?;

        Ok(EntryPass {
            bytes: renderer.render(&ticket.entry_payload),
            content_type: renderer.content_type(),
            ticket_number: ticket.ticket_number,
        })
    }

    pub async fn event_sales(&self, event_id: &str) -> EngineResult<EventSales> {
        Ok(self.db.orders().event_sales(event_id).await?)
    }
}
