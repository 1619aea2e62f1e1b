//! # Pricing Resolver
//!
//! Picks the unit price for a purchase among time-windowed pricing tiers,
//! and turns a unit price into an order breakdown.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tiers for event ──► filter:                                           │
//! │                       • category matches                               │
//! │                       • is_active                                      │
//! │                       • available_quantity > 0                         │
//! │                       • valid_from <= t < valid_until                  │
//! │                 │                                                       │
//! │        empty ───┴─── non-empty                                         │
//! │          │               │                                              │
//! │          ▼               ▼                                              │
//! │     base price      min by (price, valid_from [None first], id)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution never mutates a tier. Tier quantity is consumed by the ledger
//! when the reservation is confirmed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::types::{PricingTier, TicketCategory};

/// The price resolved for one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceQuote {
    pub unit_price: Money,
    /// The tier that produced the price, `None` for the event's base price.
    pub tier_id: Option<String>,
}

/// Resolves the unit price for `category` at instant `at`.
///
/// Overlapping tiers are ordered by lowest price, then earliest
/// `valid_from` (an open start sorts first), then tier id, so the result
/// is the same for the same inputs regardless of input order.
///
/// ```rust
/// use horizon_core::money::Money;
/// use horizon_core::pricing::resolve_price;
/// use horizon_core::types::TicketCategory;
///
/// let quote = resolve_price(Money::from_cents(4500), &[], TicketCategory::Regular, chrono::Utc::now());
/// assert_eq!(quote.unit_price.cents(), 4500);
/// assert!(quote.tier_id.is_none());
/// ```
pub fn resolve_price(
    base_price: Money,
    tiers: &[PricingTier],
    category: TicketCategory,
    at: DateTime<Utc>,
) -> PriceQuote {
    let best = tiers
        .iter()
        .filter(|tier| tier.category == category && tier.is_offered_at(at))
        .min_by(|a, b| {
            a.price_cents
                .cmp(&b.price_cents)
                .then_with(|| a.valid_from.cmp(&b.valid_from))
                .then_with(|| a.id.cmp(&b.id))
        });

    match best {
        Some(tier) => PriceQuote {
            unit_price: tier.price(),
            tier_id: Some(tier.id.clone()),
        },
        None => PriceQuote {
            unit_price: base_price,
            tier_id: None,
        },
    }
}

// =============================================================================
// Order Breakdown
// =============================================================================

/// Money lines of an order.
///
/// ```text
/// subtotal    = unit_price × quantity
/// tax         = round(subtotal × tax_rate)
/// service_fee = round(subtotal × service_fee_rate)
/// total       = subtotal + tax + service_fee
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdown {
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub service_fee: Money,
    pub total: Money,
}

impl PriceBreakdown {
    /// ## Errors
    /// `InvalidAmount` when any line does not fit in i64 cents.
    pub fn compute(
        unit_price: Money,
        quantity: i64,
        tax_rate: Rate,
        service_fee_rate: Rate,
    ) -> CoreResult<Self> {
        let overflow = || {
            CoreError::invalid_amount(format!("{quantity} × {unit_price} exceeds the largest order total"))
        };

        let subtotal = unit_price.multiply_quantity(quantity).ok_or_else(overflow)?;
        let tax = subtotal.apply_rate(tax_rate);
        let service_fee = subtotal.apply_rate(service_fee_rate);
        let total = subtotal
            .checked_add(tax)
            .and_then(|sum| sum.checked_add(service_fee))
            .ok_or_else(overflow)?;

        Ok(PriceBreakdown {
            unit_price,
            quantity,
            subtotal,
            tax,
            service_fee,
            total,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
