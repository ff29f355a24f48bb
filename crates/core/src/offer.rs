//! Offers — external entities consumed from the tool layer, never owned.
//!
//! The orchestrator trusts the tools to honor hard filters but spot-checks
//! inventory status and expiry on the client side before anything is shown
//! as selectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constraints::Constraints;

/// Tool-reported availability of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    Available,
    SoldOut,
    Stale,
}

/// A priced, bookable room offer as returned by the search/re-check tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: String,
    pub hotel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_rating: Option<f64>,

    pub total_price: f64,
    pub currency: String,
    pub refundable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_deadline: Option<DateTime<Utc>>,
    pub inventory_status: InventoryStatus,
    pub last_priced_ts: DateTime<Utc>,
    pub expires_ts: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_plan: Option<String>,
}

impl Offer {
    /// Whether this offer may be presented as selectable at `now`.
    ///
    /// An expired offer, or one not marked available, must never be shown as
    /// selectable without re-verification.
    pub fn is_selectable(&self, now: DateTime<Utc>) -> bool {
        self.inventory_status == InventoryStatus::Available && self.expires_ts > now
    }

    /// Client-side spot-check that the offer honors every stated hard filter.
    pub fn violates_hard_filters(&self, constraints: &Constraints) -> bool {
        if let Some(cap) = constraints.max_price
            && self.total_price > cap
        {
            return true;
        }
        if let Some(floor) = constraints.min_star
            && self.star_rating.is_none_or(|s| s < floor)
        {
            return true;
        }
        if constraints.refundable_only == Some(true) && !self.refundable {
            return true;
        }
        false
    }

    /// Whether a re-checked copy of this offer still matches what was shown.
    ///
    /// A price drift beyond half a cent counts as changed.
    pub fn price_unchanged(&self, rechecked: &Offer) -> bool {
        (self.total_price - rechecked.total_price).abs() < 0.005
    }
}
