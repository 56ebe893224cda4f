//! Undocking planner (C9, §4.9): greedy selection of waste items within a
//! mass budget. Explicitly a first-fit approximation, not optimal knapsack
//! (§4.9, §8 Non-goals).

use crate::container::{Container, ContainerKind};
use crate::event::EventSink;
use crate::item::Item;
use crate::Id;

#[derive(Debug, Clone, PartialEq)]
pub struct UndockSelectionEntry {
    pub item_id: Id,
    pub item_name: String,
    pub mass: f64,
    pub source_container_id: Id,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndockPlan {
    pub selection: Vec<UndockSelectionEntry>,
    pub total_mass: f64,
    pub max_weight: f64,
}

/// C9: greedily accumulate waste items (ordered `(-priority, -mass)`) from
/// waste-kind containers until the next item would exceed `max_weight`.
pub fn undocking_plan(items: &[Item], containers: &[Container], max_weight: f64, sink: &mut dyn EventSink) -> UndockPlan {
    let waste_container_ids: std::collections::HashSet<&str> = containers
        .iter()
        .filter(|c| c.kind == ContainerKind::Waste)
        .map(|c| c.id.as_str())
        .collect();

    let mut candidates: Vec<&Item> = items
        .iter()
        .filter(|i| {
            i.placement
                .as_ref()
                .map(|p| waste_container_ids.contains(p.container_id.as_str()))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.mass.partial_cmp(&a.mass).unwrap()));

    let mut selection = Vec::new();
    let mut total_mass = 0.0;
    for item in candidates {
        if total_mass + item.mass > max_weight {
            continue;
        }
        total_mass += item.mass;
        let container_id = item.placement.as_ref().unwrap().container_id.clone();
        selection.push(UndockSelectionEntry {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            mass: item.mass,
            source_container_id: container_id,
        });
    }

    log::info!("undocking plan: {} items, {:.2} of {:.2} max weight", selection.len(), total_mass, max_weight);
    sink.log(
        "undocking_plan",
        None,
        None,
        "system",
        &format!("{} items, {:.2}kg of {:.2}kg budget", selection.len(), total_mass, max_weight),
    );

    UndockPlan {
        selection,
        total_mass,
        max_weight,
    }
}

/// Detaches every item in `plan` from its container, clearing `is_waste`
/// (the one sweep the latch allows, §3) and its placement. Returns the ids
/// actually cleared, skipping any item not found in `items`.
pub fn apply_undocking(items: &mut [Item], plan: &UndockPlan, sink: &mut dyn EventSink) -> Vec<Id> {
    let mut cleared = Vec::new();
    for entry in &plan.selection {
        if let Some(item) = items.iter_mut().find(|i| i.id == entry.item_id) {
            item.placement = None;
            item.is_waste = false;
            cleared.push(item.id.clone());
            sink.log("undock", Some(&item.id), Some(&entry.source_container_id), "system", "undocked");
        }
    }
    cleared
}
