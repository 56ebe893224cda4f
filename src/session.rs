//! Session orchestration (§5, §9): the arena that owns a [`Store`] and the
//! virtual clock, and exposes the six public operations named in §5 —
//! `place_all`, `retrieve`, `simulate_time`, `rearrange`, `undocking_plan`,
//! and `waste_identify` — as single logical transactions (read snapshot,
//! compute, write-all-or-rollback).
//!
//! This replaces the "source-object persistence with bidirectional
//! parent/child links" pattern the Design Notes flag: containers and items
//! are not linked by reference, only by id, and everything is owned by this
//! one session scope (§9 "model as an arena").

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::config::PlannerConfig;
use crate::container::ContainerOccupancy;
use crate::error::CoreResult;
use crate::event::EventSink;
use crate::item::Item;
use crate::placement::{self, PlaceAllResult};
use crate::rearrange::{self, RearrangeResult};
use crate::retrieval::{self, RetrievalResult};
use crate::store::{ItemFilter, Store};
use crate::time_sim::{self, SimulationResult};
use crate::undock::{self, UndockPlan};
use crate::waste;
use crate::Id;

/// Adapts a `&mut dyn Store` into an `&mut dyn EventSink` so the algorithm
/// modules (which only know about `EventSink`) can write through the same
/// store the session reads its snapshot from, without depending on the
/// store's full interface.
struct StoreSink<'a>(&'a mut dyn Store);

impl<'a> EventSink for StoreSink<'a> {
    fn log(&mut self, action: &str, item_id: Option<&Id>, container_id: Option<&Id>, actor: &str, details: &str) {
        self.0.log(action, item_id, container_id, actor, details);
    }
}

/// Owns the store and the virtual calendar for one planning session. Per
/// `SPEC_FULL.md` §F, the clock compounds across calls to `simulate_time`
/// rather than resetting, so it lives here as session state rather than
/// being derived fresh from each call's `days` argument.
pub struct Session {
    store: Box<dyn Store>,
    config: PlannerConfig,
    clock: NaiveDate,
}

impl Session {
    pub fn new(store: Box<dyn Store>, config: PlannerConfig, initial_date: NaiveDate) -> Self {
        Self { store, config, clock: initial_date }
    }

    pub fn with_default_config(store: Box<dyn Store>, initial_date: NaiveDate) -> Self {
        Self::new(store, PlannerConfig::default(), initial_date)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// C4: places `item_ids` (or, if `None`, every currently-unplaced
    /// non-waste item) into the best available containers (§4.4). Clears any
    /// previous placement for the targeted items before attempting, per the
    /// contract's "clears any previous placements for the input set".
    pub fn place_all(&mut self, item_ids: Option<&[Id]>, actor: &str) -> CoreResult<PlaceAllResult> {
        let containers = self.store.list_containers();
        let all_items = self.store.list_items(ItemFilter::all());

        let (mut target, external): (Vec<Item>, Vec<Item>) = match item_ids {
            Some(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                all_items.into_iter().partition(|i| wanted.contains(i.id.as_str()))
            }
            None => all_items.into_iter().partition(|i| !i.is_placed() && !i.is_waste),
        };
        for item in &mut target {
            item.placement = None;
        }
        let by_id: HashMap<Id, Item> = target.iter().cloned().map(|i| (i.id.clone(), i)).collect();

        let result = {
            let mut sink = StoreSink(&mut *self.store);
            placement::place_all(target, &external, &containers, &self.config, &mut sink)
        };

        let mut updates = Vec::with_capacity(result.placed.len() + result.unplaced.len());
        for p in &result.placed {
            if let Some(mut item) = by_id.get(&p.item_id).cloned() {
                item.placement = Some(p.placement());
                updates.push(item);
            }
        }
        for u in &result.unplaced {
            if let Some(item) = by_id.get(&u.item_id).cloned() {
                updates.push(item);
            }
        }
        log::info!("place_all by {actor}: {} placed, {} unplaced", result.placed.len(), result.unplaced.len());
        self.store.bulk_update_items(updates)?;
        Ok(result)
    }

    /// C5: retrieval path for `item_id` (§4.5). Read-mostly: updates
    /// `last_retrieved`/`last_retrieved_by` but leaves usage and placement
    /// untouched.
    pub fn retrieve(&mut self, item_id: &str, actor: &str) -> CoreResult<RetrievalResult> {
        let mut item = self.store.get_item(item_id)?;
        let container_id = match &item.placement {
            Some(p) => p.container_id.clone(),
            None => {
                return Ok(RetrievalResult {
                    found: false,
                    item_id: item.id.clone(),
                    path: Vec::new(),
                    disturbed_items: Vec::new(),
                    location: None,
                })
            }
        };
        let container_items = self.store.list_items(ItemFilter {
            container_id: Some(container_id.as_str()),
            ..ItemFilter::all()
        });

        let result = {
            let mut sink = StoreSink(&mut *self.store);
            retrieval::retrieve(&mut item, &container_items, self.clock, actor, &mut sink)?
        };
        self.store.update_item(item)?;
        Ok(result)
    }

    /// C7: advances the session clock by `days` and applies `usage_plan`
    /// (§4.7). The new clock value becomes the session's clock for every
    /// subsequent call.
    pub fn simulate_time(&mut self, days: i64, usage_plan: HashMap<Id, i64>) -> CoreResult<SimulationResult> {
        let mut items = self.store.list_items(ItemFilter::all());
        let result = {
            let mut sink = StoreSink(&mut *self.store);
            time_sim::simulate_time(&mut items, self.clock, days, &usage_plan, &mut sink)
        };
        self.clock = result.new_date;
        self.store.bulk_update_items(items)?;
        Ok(result)
    }

    /// C6: sweeps every non-waste item against the current clock without
    /// advancing it, latching waste on anything expired or usage-exhausted.
    /// Exposed separately from `simulate_time` for callers that only want a
    /// waste re-check (e.g. after an out-of-band expiry edit).
    pub fn waste_identify(&mut self) -> CoreResult<Vec<Id>> {
        let mut items = self.store.list_items(ItemFilter {
            is_waste: Some(false),
            ..ItemFilter::all()
        });
        let mut newly_waste = Vec::new();
        let mut updates = Vec::new();
        {
            let mut sink = StoreSink(&mut *self.store);
            for mut item in items.drain(..) {
                if waste::classify(&mut item, self.clock, &mut sink) {
                    newly_waste.push(item.id.clone());
                    updates.push(item);
                }
            }
        }
        self.store.bulk_update_items(updates)?;
        Ok(newly_waste)
    }

    /// C8: proposes a bounded rearrangement and commits it. Per the Design
    /// Notes, `rearrange` only checks capacity and volumetric fit when
    /// choosing destinations, so each move is re-verified with a full C3
    /// position search (`placement::apply_move`) at commit time; a move that
    /// turns out geometrically infeasible is skipped rather than applied.
    pub fn rearrange(&mut self, priority_threshold: u8, max_movements: usize) -> CoreResult<RearrangeResult> {
        let containers = self.store.list_containers();
        let mut items = self.store.list_items(ItemFilter::all());

        let result = {
            let mut sink = StoreSink(&mut *self.store);
            rearrange::rearrange(&items, &containers, priority_threshold, max_movements, &self.config, &mut sink)
        };

        let mut occupancy = ContainerOccupancy::from_items(&items);
        let mut updates = Vec::new();
        for mv in &result.moves {
            let Some(item) = items.iter_mut().find(|i| i.id == mv.item_id) else {
                continue;
            };
            let Some(dest) = containers.iter().find(|c| c.id == mv.to_container_id) else {
                continue;
            };
            if let Some(old) = &item.placement {
                occupancy.remove(&old.container_id, &item.id);
            }
            match placement::apply_move(item, dest, &occupancy) {
                Some(placed) => {
                    item.placement = Some(placed.placement());
                    occupancy.insert(&dest.id, item.id.clone(), placed.aabb());
                    updates.push(item.clone());
                }
                None => {
                    log::warn!(
                        "rearrange move {} -> {} infeasible at commit time (C3 re-check failed), skipped",
                        mv.item_id,
                        mv.to_container_id
                    );
                    if let Some(old) = &item.placement {
                        occupancy.insert(&old.container_id, item.id.clone(), old.aabb());
                    }
                }
            }
        }
        self.store.bulk_update_items(updates)?;
        Ok(result)
    }

    /// C9: selects waste items within `max_weight` (§4.9). Read-only; call
    /// [`Session::apply_undocking`] to actually detach the selection.
    pub fn undocking_plan(&mut self, max_weight: f64) -> CoreResult<UndockPlan> {
        let containers = self.store.list_containers();
        let items = self.store.list_items(ItemFilter::all());
        let mut sink = StoreSink(&mut *self.store);
        Ok(undock::undocking_plan(&items, &containers, max_weight, &mut sink))
    }

    /// Detaches every item in `plan` from its container and clears the waste
    /// latch (§3: the one sweep allowed to clear it).
    pub fn apply_undocking(&mut self, plan: &UndockPlan) -> CoreResult<Vec<Id>> {
        let mut items = self.store.list_items(ItemFilter::all());
        let cleared = {
            let mut sink = StoreSink(&mut *self.store);
            undock::apply_undocking(&mut items, plan, &mut sink)
        };
        let updates: Vec<Item> = items.into_iter().filter(|i| cleared.contains(&i.id)).collect();
        self.store.bulk_update_items(updates)?;
        Ok(cleared)
    }

    /// `SPEC_FULL.md` §E.1: dry-run placement of waste items into waste-kind
    /// containers, previewing destinations ahead of an undocking sweep
    /// without mutating anything (the result is never committed here).
    pub fn plan_waste_placement(&mut self, item_ids: &[Id]) -> CoreResult<PlaceAllResult> {
        let containers = self.store.list_containers();
        let all_items = self.store.list_items(ItemFilter::all());
        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        let (waste_items, already_in_waste): (Vec<Item>, Vec<Item>) =
            all_items.into_iter().partition(|i| wanted.contains(i.id.as_str()));
        let mut sink = StoreSink(&mut *self.store);
        Ok(placement::plan_waste_placement(
            waste_items,
            &already_in_waste,
            &containers,
            &self.config,
            &mut sink,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, ContainerKind};
    use crate::store::InMemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn container(id: &str, w: f64, h: f64, d: f64, capacity: usize, kind: ContainerKind) -> Container {
        Container {
            id: id.to_string(),
            width: w,
            height: h,
            depth: d,
            capacity,
            zone: "Z".to_string(),
            kind,
        }
    }

    fn session_with(containers: Vec<Container>, items: Vec<Item>) -> Session {
        let mut store = InMemoryStore::new();
        for c in containers {
            store.put_container(c);
        }
        for i in items {
            store.put_item(i);
        }
        Session::with_default_config(Box::new(store), date(2026, 1, 1))
    }

    #[test]
    fn place_all_commits_placement_back_to_the_store() {
        let mut session = session_with(
            vec![container("C1", 2.0, 2.0, 2.0, 5, ContainerKind::Storage)],
            vec![Item::new("i1", "widget", 1.0, 1.0, 1.0, 1.0)],
        );
        let result = session.place_all(None, "system").unwrap();
        assert_eq!(result.placed.len(), 1);
        let stored = session.store().get_item("i1").unwrap();
        assert!(stored.is_placed());
    }

    #[test]
    fn retrieve_reflects_committed_placement() {
        let mut session = session_with(
            vec![container("C1", 2.0, 2.0, 2.0, 5, ContainerKind::Storage)],
            vec![Item::new("i1", "widget", 1.0, 1.0, 1.0, 1.0)],
        );
        session.place_all(None, "system").unwrap();
        let result = session.retrieve("i1", "astronaut").unwrap();
        assert!(result.found);
        let stored = session.store().get_item("i1").unwrap();
        assert_eq!(stored.last_retrieved_by, Some("astronaut".to_string()));
    }

    #[test]
    fn simulate_time_compounds_clock_and_persists_waste_transition() {
        let mut item = Item::new("i1", "food", 1.0, 1.0, 1.0, 1.0);
        item.expiry_date = Some(date(2026, 1, 3));
        let mut session = session_with(vec![], vec![item]);

        let first = session.simulate_time(2, HashMap::new()).unwrap();
        assert_eq!(first.new_date, date(2026, 1, 3));
        assert!(session.store().get_item("i1").unwrap().is_waste);
        assert_eq!(session.today(), date(2026, 1, 3));

        let second = session.simulate_time(1, HashMap::new()).unwrap();
        assert_eq!(second.new_date, date(2026, 1, 4));
    }

    #[test]
    fn undocking_round_trip_clears_latch_in_store() {
        let waste_container = container("W1", 5.0, 5.0, 5.0, 10, ContainerKind::Waste);
        let mut waste_item = Item::new("w1", "trash", 0.5, 0.5, 0.5, 3.0);
        waste_item.is_waste = true;
        let mut session = session_with(vec![waste_container], vec![waste_item]);
        session.place_all(Some(&["w1".to_string()]), "system").unwrap();

        let plan = session.undocking_plan(10.0).unwrap();
        assert_eq!(plan.selection.len(), 1);
        let cleared = session.apply_undocking(&plan).unwrap();
        assert_eq!(cleared, vec!["w1".to_string()]);
        let stored = session.store().get_item("w1").unwrap();
        assert!(!stored.is_waste);
        assert!(stored.placement.is_none());
    }

    #[test]
    fn rearrange_commits_moves_with_a_fresh_c3_check() {
        let containers = vec![
            container("C1", 2.0, 2.0, 2.0, 10, ContainerKind::Storage),
            container("C2", 2.0, 2.0, 2.0, 10, ContainerKind::Storage),
        ];
        let mut items = Vec::new();
        for i in 0..8 {
            let mut it = Item::new(&format!("i{i}"), "box", 1.0, 1.0, 1.0, 1.0);
            it.priority = 10;
            items.push(it);
        }
        let mut session = session_with(containers, items.clone());
        let ids: Vec<Id> = items.iter().map(|i| i.id.clone()).collect();
        session.place_all(Some(&ids), "system").unwrap();

        let result = session.rearrange(30, 5).unwrap();
        if !result.moves.is_empty() {
            let moved_id = &result.moves[0].item_id;
            let stored = session.store().get_item(moved_id).unwrap();
            assert!(stored.is_placed());
        }
    }
}
