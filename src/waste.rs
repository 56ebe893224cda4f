//! Waste classifier (C6, §4.6): expiry/usage-based state transitions.
//!
//! `is_waste` is a one-way latch within a simulation run (§3): once set,
//! only an explicit undocking sweep clears it (`undock::undock`).

use chrono::NaiveDate;

use crate::event::EventSink;
use crate::item::Item;

/// True iff `item` meets either waste condition as of `today` (§4.6): an
/// expiry date that has arrived, or a usage limit that has been reached.
pub fn should_be_waste(item: &Item, today: NaiveDate) -> bool {
    let expired = item
        .expiry_date
        .map(|expiry| expiry <= today)
        .unwrap_or(false);
    let used_up = item
        .usage_limit
        .map(|limit| limit > 0 && item.usage_count >= limit)
        .unwrap_or(false);
    expired || used_up
}

/// Idempotent transition (§4.6): marks `item` as waste if it meets either
/// condition and isn't already latched. Returns `true` iff this call is the
/// one that flipped the latch.
pub fn classify(item: &mut Item, today: NaiveDate, sink: &mut dyn EventSink) -> bool {
    if item.is_waste {
        return false;
    }
    if should_be_waste(item, today) {
        item.is_waste = true;
        log::info!("item {} transitioned to waste", item.id);
        sink.log("waste_transition", Some(&item.id), None, "system", "expired or usage exhausted");
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiry_in_the_past_is_waste() {
        let mut item = Item::new("i1", "food", 1.0, 1.0, 1.0, 1.0);
        item.expiry_date = Some(date(2026, 1, 1));
        assert!(classify(&mut item, date(2026, 1, 2), &mut NullSink));
        assert!(item.is_waste);
    }

    #[test]
    fn expiry_today_counts_as_not_future() {
        let mut item = Item::new("i1", "food", 1.0, 1.0, 1.0, 1.0);
        item.expiry_date = Some(date(2026, 1, 1));
        assert!(should_be_waste(&item, date(2026, 1, 1)));
    }

    #[test]
    fn usage_exhausted_is_waste() {
        let mut item = Item::new("i1", "tool", 1.0, 1.0, 1.0, 1.0);
        item.usage_limit = Some(3);
        item.usage_count = 3;
        assert!(classify(&mut item, date(2026, 1, 1), &mut NullSink));
    }

    #[test]
    fn latch_is_idempotent_and_does_not_reclassify() {
        let mut item = Item::new("i1", "tool", 1.0, 1.0, 1.0, 1.0);
        item.is_waste = true;
        item.expiry_date = None;
        assert!(!classify(&mut item, date(2026, 1, 1), &mut NullSink));
        assert!(item.is_waste);
    }

    #[test]
    fn zero_usage_limit_never_classifies_as_waste() {
        let mut item = Item::new("i1", "tool", 1.0, 1.0, 1.0, 1.0);
        item.usage_limit = Some(0);
        item.usage_count = 0;
        assert!(!should_be_waste(&item, date(2026, 1, 1)));
    }
}
