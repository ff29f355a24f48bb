//! Accumulated booking constraints and their merge policy.
//!
//! Constraints are monotonically refined across turns: newly stated fields
//! overwrite prior ones, unspecified fields persist, and only an explicit
//! reset clears them. Free-form user text is never parsed here — the external
//! reasoning capability emits structured deltas and this module applies them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A required search field that is still missing (or invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    City,
    Dates,
    Adults,
    Rooms,
}

impl RequiredField {
    pub fn label(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Dates => "dates",
            Self::Adults => "adults",
            Self::Rooms => "rooms",
        }
    }
}

/// Occupancy block of the tool request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    pub rooms: u32,
}

/// The structured booking requirements accumulated over a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,

    // Hard filters — exact-match constraints an offer must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_star: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refundable_only: Option<bool>,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".into()
}

/// An incremental constraint update emitted by the reasoner for one message.
///
/// `reset` clears everything before the remaining fields are applied (the
/// "start over" phrase). `clear` removes individual optional filters by name
/// ("drop the price cap") without touching the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConstraintDelta {
    #[serde(default)]
    pub reset: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_star: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refundable_only: Option<bool>,
}

impl ConstraintDelta {
    /// A delta carrying no information at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Constraints {
    /// Apply a delta: reset first if requested, then named clears, then
    /// field-by-field overwrite. Unspecified fields persist.
    pub fn apply(&mut self, delta: &ConstraintDelta) {
        if delta.reset {
            *self = Self::default();
        }
        for name in &delta.clear {
            match name.as_str() {
                "max_price" => self.max_price = None,
                "min_star" => self.min_star = None,
                "amenities" => self.amenities = None,
                "refundable_only" => self.refundable_only = None,
                _ => {}
            }
        }
        if let Some(v) = &delta.city {
            self.city = Some(v.clone());
        }
        if let Some(v) = delta.check_in {
            self.check_in = Some(v);
        }
        if let Some(v) = delta.check_out {
            self.check_out = Some(v);
        }
        if let Some(v) = delta.adults {
            self.adults = Some(v);
        }
        if let Some(v) = delta.children {
            self.children = Some(v);
        }
        if let Some(v) = delta.rooms {
            self.rooms = Some(v);
        }
        if let Some(v) = delta.max_price {
            self.max_price = Some(v);
        }
        if let Some(v) = delta.min_star {
            self.min_star = Some(v);
        }
        if let Some(v) = &delta.amenities {
            self.amenities = Some(v.clone());
        }
        if let Some(v) = delta.refundable_only {
            self.refundable_only = Some(v);
        }
    }

    /// Required fields that are missing or invalid.
    ///
    /// Dates count as missing when either bound is absent or the range is
    /// empty/inverted (check_in must be strictly before check_out).
    pub fn missing_required_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if self.city.as_deref().is_none_or(|c| c.trim().is_empty()) {
            missing.push(RequiredField::City);
        }
        match (self.check_in, self.check_out) {
            (Some(ci), Some(co)) if ci < co => {}
            _ => missing.push(RequiredField::Dates),
        }
        if self.adults.is_none_or(|a| a == 0) {
            missing.push(RequiredField::Adults);
        }
        if self.rooms.is_none_or(|r| r == 0) {
            missing.push(RequiredField::Rooms);
        }
        missing
    }

    /// Whether a search can be issued.
    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            adults: self.adults.unwrap_or(0),
            children: self.children.unwrap_or(0),
            rooms: self.rooms.unwrap_or(0),
        }
    }

    /// The `hard_filters` payload block, or None when no hard filter is set.
    ///
    /// Centralizing this keeps search and re-check requests from drifting.
    pub fn hard_filters(&self) -> Option<Value> {
        let mut filters = serde_json::Map::new();
        if let Some(p) = self.max_price {
            filters.insert("max_price".into(), json!(p));
        }
        if let Some(s) = self.min_star {
            filters.insert("min_star".into(), json!(s));
        }
        if let Some(a) = &self.amenities {
            let mut sorted = a.clone();
            sorted.sort();
            filters.insert("amenities".into(), json!(sorted));
        }
        if self.refundable_only == Some(true) {
            filters.insert("refundable_only".into(), json!(true));
        }
        if filters.is_empty() {
            None
        } else {
            Some(Value::Object(filters))
        }
    }

    /// Build the search tool request. Callers must check `is_complete` first.
    pub fn search_payload(&self, tenant_id: &str) -> Value {
        json!({
            "tenant_id": tenant_id,
            "location": { "city": self.city },
            "check_in": self.check_in,
            "check_out": self.check_out,
            "occupancy": self.occupancy(),
            "hard_filters": self.hard_filters(),
        })
    }

    /// Stable fingerprint of the constraint subset that affects tool results.
    ///
    /// Used to invalidate cached offers when constraints change mid-session
    /// (e.g. the user adds a star-rating floor after offers were shown).
    /// serde_json maps are ordered, so the serialization is deterministic.
    pub fn fingerprint(&self) -> String {
        let subset = json!({
            "city": self.city,
            "check_in": self.check_in,
            "check_out": self.check_out,
            "adults": self.adults,
            "children": self.children,
            "rooms": self.rooms,
            "max_price": self.max_price,
            "min_star": self.min_star,
            "amenities": self.amenities.as_ref().map(|a| {
                let mut sorted = a.clone();
                sorted.sort();
                sorted
            }),
            "refundable_only": self.refundable_only,
            "currency": self.currency,
        });
        subset.to_string()
    }
}
