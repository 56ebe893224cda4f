//! Time simulator (C7, §4.7): advances a virtual calendar, applies a usage
//! plan, and hands expiry/usage transitions to the waste classifier (C6).
//!
//! Per the Open Questions in §9 (resolved in `SPEC_FULL.md` §F): the clock
//! compounds across calls rather than resetting, so it lives as session
//! state (`session::Session::clock`) rather than being derived fresh from
//! each `days` argument.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::event::EventSink;
use crate::item::Item;
use crate::Id;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub new_date: NaiveDate,
    pub items_used: Vec<Id>,
    pub items_newly_expired: Vec<Id>,
    pub items_newly_waste_from_usage: Vec<Id>,
}

/// C7 step 1-3: advance `clock` by `days`, apply `usage_plan`, then latch
/// waste on every item that has expired or exhausted its usage as of the
/// new date. `items` is mutated in place; callers own persisting the diff.
pub fn simulate_time(
    items: &mut [Item],
    clock: NaiveDate,
    days: i64,
    usage_plan: &HashMap<Id, i64>,
    sink: &mut dyn EventSink,
) -> SimulationResult {
    let new_date = clock + chrono::Duration::days(days);

    let mut items_used = Vec::new();
    let mut items_newly_waste_from_usage = Vec::new();

    for item in items.iter_mut() {
        let Some(&increment) = usage_plan.get(&item.id) else {
            continue;
        };
        if item.is_waste {
            continue;
        }
        if item.usage_limit.is_some() {
            item.usage_count = (item.usage_count as i64 + increment).max(0) as u32;
            items_used.push(item.id.clone());
            log::debug!("item {} usage incremented by {}", item.id, increment);
            if crate::waste::classify(item, new_date, sink) {
                items_newly_waste_from_usage.push(item.id.clone());
            }
        }
    }

    let mut items_newly_expired = Vec::new();
    for item in items.iter_mut() {
        if item.is_waste {
            continue;
        }
        let was_waste = item.is_waste;
        if crate::waste::classify(item, new_date, sink) && !was_waste {
            items_newly_expired.push(item.id.clone());
        }
    }

    log::info!(
        "simulated {} days: {} used, {} newly expired, {} newly waste from usage",
        days,
        items_used.len(),
        items_newly_expired.len(),
        items_newly_waste_from_usage.len()
    );
    sink.log(
        "simulate_time",
        None,
        None,
        "system",
        &format!("advanced {days} days to {new_date}"),
    );

    SimulationResult {
        new_date,
        items_used,
        items_newly_expired,
        items_newly_waste_from_usage,
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
    fn expiry_in_two_days_becomes_waste_after_three_day_simulation() {
        let mut item = Item::new("i1", "food", 1.0, 1.0, 1.0, 1.0);
        item.expiry_date = Some(date(2026, 1, 3));
        let mut items = vec![item];
        let result = simulate_time(&mut items, date(2026, 1, 1), 3, &HashMap::new(), &mut NullSink);
        assert!(items[0].is_waste);
        assert_eq!(result.items_newly_expired, vec!["i1".to_string()]);
    }

    #[test]
    fn usage_plan_increments_usage_count_and_can_exhaust_it() {
        let mut item = Item::new("i1", "tool", 1.0, 1.0, 1.0, 1.0);
        item.usage_limit = Some(2);
        let mut items = vec![item];
        let mut plan = HashMap::new();
        plan.insert("i1".to_string(), 2i64);
        let result = simulate_time(&mut items, date(2026, 1, 1), 1, &plan, &mut NullSink);
        assert_eq!(items[0].usage_count, 2);
        assert!(items[0].is_waste);
        assert_eq!(result.items_used, vec!["i1".to_string()]);
        assert_eq!(result.items_newly_waste_from_usage, vec!["i1".to_string()]);
    }

    #[test]
    fn clock_compounds_across_calls() {
        let mut items: Vec<Item> = Vec::new();
        let after_first = simulate_time(&mut items, date(2026, 1, 1), 5, &HashMap::new(), &mut NullSink);
        assert_eq!(after_first.new_date, date(2026, 1, 6));
        let after_second = simulate_time(&mut items, after_first.new_date, 2, &HashMap::new(), &mut NullSink);
        assert_eq!(after_second.new_date, date(2026, 1, 8));
    }
}
