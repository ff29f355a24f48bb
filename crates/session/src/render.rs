//! Deterministic assistant-message renderers.
//!
//! Natural-language generation is out of scope; keeping the user-visible
//! text deterministic makes every turn replayable and keeps the message an
//! honest reflection of what actually happened. The offer listing is
//! intentionally rigid so the display is identical regardless of phrasing
//! elsewhere.

use innkeeper_core::{AgentState, Constraints, Offer, RequiredField};

/// How many offers are shown per listing.
const TOP_OFFERS: usize = 3;

/// Minimal, non-assumptive clarification. Keeps to 1-2 short questions.
pub fn clarify(missing: &[RequiredField], constraints: &Constraints) -> String {
    use RequiredField::*;
    let city = constraints.city.as_deref();
    let ci = constraints.check_in;
    let co = constraints.check_out;

    let has = |f: RequiredField| missing.contains(&f);

    if matches!(missing, [Adults, Rooms])
        && let (Some(city), Some(ci), Some(co)) = (city, ci, co)
    {
        return format!("I can search {city} for {ci} to {co}. How many adults and rooms?");
    }
    if has(Dates)
        && !has(City)
        && let Some(city) = city
    {
        return format!("What dates should I use for {city}? (YYYY-MM-DD to YYYY-MM-DD)");
    }
    if has(City) && has(Dates) {
        return "Which city and dates? (Example: Austin, 2026-03-10 to 2026-03-12)".into();
    }
    if has(City) {
        return "Which city should I search in?".into();
    }
    if has(Dates) {
        return "What are your check-in and check-out dates? (YYYY-MM-DD to YYYY-MM-DD)".into();
    }
    if has(Adults) && has(Rooms) {
        return "How many adults and rooms?".into();
    }
    if has(Adults) {
        return "How many adults?".into();
    }
    if has(Rooms) {
        return "How many rooms?".into();
    }
    "What details should I use to continue?".into()
}

fn offer_lines(offer: &Offer) -> String {
    let mut lines = vec![
        format!("- offer_id: {}", offer.offer_id),
        format!("  hotel_id: {}", offer.hotel_id),
        format!(
            "  hotel: {}",
            offer.hotel_name.as_deref().unwrap_or("Unknown hotel")
        ),
    ];
    if let Some(star) = offer.star_rating {
        lines.push(format!("  star_rating: {star}"));
    }
    lines.push(format!(
        "  total_price: {:.2} {}",
        offer.total_price, offer.currency
    ));
    lines.push(format!("  refundable: {}", offer.refundable));
    if let Some(deadline) = offer.cancellation_deadline {
        lines.push(format!("  cancellation_deadline: {deadline}"));
    }
    if let Some(room) = &offer.room_type {
        lines.push(format!("  room_type: {room}"));
    }
    lines.push(format!("  expires_ts: {}", offer.expires_ts));
    lines.join("\n")
}

fn trip_header(constraints: &Constraints) -> String {
    let city = constraints.city.as_deref().unwrap_or("(city unknown)");
    let ci = constraints
        .check_in
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(check_in unknown)".into());
    let co = constraints
        .check_out
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(check_out unknown)".into());
    format!("{city} • {ci} to {co}")
}

/// The rigid top-offers listing.
pub fn offers(constraints: &Constraints, offers: &[Offer]) -> String {
    let shown = offers.len().min(TOP_OFFERS);
    let header = format!("Top {shown} offers for {}:", trip_header(constraints));
    let blocks: Vec<String> = offers
        .iter()
        .take(TOP_OFFERS)
        .enumerate()
        .map(|(i, o)| format!("{})\n{}", i + 1, offer_lines(o)))
        .collect();
    format!(
        "{header}\n\n{}\n\nSelect by replying with the offer_id.",
        blocks.join("\n\n")
    )
}

pub fn no_results(constraints: &Constraints, suggestion: Option<String>) -> String {
    let base = format!("No hotels matched for {}.", trip_header(constraints));
    match suggestion {
        Some(s) => format!("{base} You could try {s}."),
        None => base,
    }
}

pub fn confirmed(offer: &Offer, constraints: &Constraints) -> String {
    format!(
        "Confirmed at the verified price for {}:\n\n{}",
        trip_header(constraints),
        offer_lines(offer)
    )
}

pub fn selection_gone(selected: &Offer, remaining: &[Offer]) -> String {
    let name = selected.hotel_name.as_deref().unwrap_or("that hotel");
    let mut msg = format!(
        "Offer {} ({name}) is no longer available, so I removed it from the list.",
        selected.offer_id
    );
    if remaining.is_empty() {
        msg.push_str(" No other offers remain — I can search again if you like.");
    } else {
        msg.push_str("\n\nStill available — select by replying with the offer_id:\n\n");
        msg.push_str(
            &remaining
                .iter()
                .take(TOP_OFFERS)
                .map(offer_lines)
                .collect::<Vec<_>>()
                .join("\n\n"),
        );
    }
    msg
}

pub fn price_changed(shown: &Offer, rechecked: &Offer) -> String {
    format!(
        "The price of offer {} changed since I listed it: {:.2} {} is now {:.2} {}. \
         Reply with the offer_id again to confirm at the new price, or pick another offer.",
        shown.offer_id, shown.total_price, shown.currency, rechecked.total_price, rechecked.currency
    )
}

pub fn offer_not_found(offer_id: &str) -> String {
    format!(
        "I couldn't find offer_id {offer_id} in this session. \
         Please reply with one of the offer_id values I listed, or ask me to search again."
    )
}

pub fn ask_for_offer_id() -> String {
    "I couldn't tell which offer you meant. Please reply with its offer_id.".into()
}

pub fn disambiguate(matches: &[Offer]) -> String {
    let names: Vec<String> = matches
        .iter()
        .map(|o| {
            format!(
                "{} ({})",
                o.hotel_name.as_deref().unwrap_or("Unknown hotel"),
                o.offer_id
            )
        })
        .collect();
    format!(
        "That matches more than one offer: {}. Please reply with the exact offer_id.",
        names.join(", ")
    )
}

pub fn nothing_to_select() -> String {
    "There are no offers to select yet — tell me the city, dates, adults, and rooms first.".into()
}

pub fn step_failed(step: &str, how: &str) -> String {
    format!(
        "The {step} step {how}, so I couldn't complete that. \
         Nothing was changed — you can retry your last message."
    )
}

pub fn budget_exhausted(step: &str) -> String {
    format!(
        "I hit this turn's tool budget before finishing the {step} step, \
         so these results are partial. Send another message to continue."
    )
}

pub fn recheck_failed() -> String {
    "I couldn't re-verify that offer after several attempts, and I won't confirm \
     a booking on unverified data. This session can't continue — please start a new one."
        .into()
}

pub fn cancelled() -> String {
    "Understood — I've cancelled this booking session. Start a new one any time.".into()
}

pub fn session_closed(state: AgentState) -> String {
    format!(
        "This session is closed (state {state}). Start a new session to book another stay."
    )
}
