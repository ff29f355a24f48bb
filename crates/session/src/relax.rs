//! Relaxation suggestions for zero-result searches.
//!
//! Which constraint to suggest loosening first is a product decision, so it
//! is a policy hook rather than a hard-coded rule in the engine.

use innkeeper_core::Constraints;

pub trait RelaxationPolicy: Send + Sync {
    /// A human-readable suggestion for the assistant message, or None when
    /// there is nothing sensible to relax.
    fn suggest(&self, constraints: &Constraints) -> Option<String>;
}

/// Default policy: price cap first, then star floor, then amenities, then
/// dates. Price caps are the most common reason a search comes back empty.
pub struct PriceFirstRelaxation;

impl RelaxationPolicy for PriceFirstRelaxation {
    fn suggest(&self, constraints: &Constraints) -> Option<String> {
        if let Some(cap) = constraints.max_price {
            return Some(format!(
                "raising your {cap:.0} {} price cap",
                constraints.currency
            ));
        }
        if let Some(floor) = constraints.min_star {
            return Some(format!("lowering the {floor}-star minimum"));
        }
        if constraints.amenities.as_ref().is_some_and(|a| !a.is_empty()) {
            return Some("dropping some amenity requirements".into());
        }
        Some("trying different dates".into())
    }
}
