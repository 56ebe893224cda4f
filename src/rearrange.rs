//! Rearrangement planner (C8, §4.8): a bounded sequence of low-priority
//! item moves that rebalances container utilization toward ~75%, plus the
//! disorganized-container report (`SPEC_FULL.md` §E.2) that surfaces the
//! same efficiency score the planner uses internally to pick candidates.

use std::collections::HashMap;

use crate::config::PlannerConfig;
use crate::container::{Container, ContainerKind};
use crate::event::EventSink;
use crate::item::Item;
use crate::Id;

const REARRANGE_EMPTY_PENALTY_THRESHOLD: f64 = 20.0;
const REARRANGE_FULL_PENALTY_THRESHOLD: f64 = 90.0;

fn container_utilization(container: &Container, used_volume: f64) -> f64 {
    let interior = container.interior_volume();
    if interior > 0.0 {
        (used_volume / interior) * 100.0
    } else {
        0.0
    }
}

/// `efficiency_score = 100 - |75 - utilization%|`, penalized 0.7x below 20%
/// utilization and 0.8x above 90% (§4.8).
pub fn efficiency_score(utilization_pct: f64, optimal_pct: f64) -> f64 {
    let score = 100.0 - (optimal_pct - utilization_pct).abs();
    if utilization_pct < REARRANGE_EMPTY_PENALTY_THRESHOLD {
        score * 0.7
    } else if utilization_pct > REARRANGE_FULL_PENALTY_THRESHOLD {
        score * 0.8
    } else {
        score
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisorganizedContainer {
    pub container_id: Id,
    pub zone: String,
    pub utilization_pct: f64,
    pub efficiency_score: f64,
    pub inefficiency_score: f64,
    pub total_items: usize,
    pub low_priority_items: usize,
}

/// Ranked (most inefficient first) report over every non-waste container,
/// independent of whether a rearrangement is actually proposed
/// (`SPEC_FULL.md` §E.2).
pub fn disorganized_containers(
    containers: &[Container],
    items_by_container: &HashMap<Id, Vec<&Item>>,
    config: &PlannerConfig,
) -> Vec<DisorganizedContainer> {
    let mut report: Vec<DisorganizedContainer> = containers
        .iter()
        .filter(|c| c.kind != ContainerKind::Waste)
        .map(|c| {
            let items = items_by_container.get(&c.id).cloned().unwrap_or_default();
            let used_volume: f64 = items.iter().map(|i| i.volume()).sum();
            let utilization = container_utilization(c, used_volume);
            let score = efficiency_score(utilization, config.rearrange_optimal_pct);
            DisorganizedContainer {
                container_id: c.id.clone(),
                zone: c.zone.clone(),
                utilization_pct: utilization,
                efficiency_score: score,
                inefficiency_score: 100.0 - score,
                total_items: items.len(),
                low_priority_items: items.iter().filter(|i| i.priority <= 30).count(),
            }
        })
        .collect();
    report.sort_by(|a, b| b.inefficiency_score.partial_cmp(&a.inefficiency_score).unwrap());
    report
}

/// `0.5*mass + (10 if cross-zone else 3) + 0.2*item_volume + (5 if priority
/// > 70 else 0)` minutes (§4.8).
pub fn estimate_movement_time(item: &Item, from: &Container, to: &Container) -> f64 {
    let zone_time = if from.zone != to.zone { 10.0 } else { 3.0 };
    let priority_time = if item.priority > 70 { 5.0 } else { 0.0 };
    0.5 * item.mass + zone_time + 0.2 * item.volume() + priority_time
}

#[derive(Debug, Clone, PartialEq)]
pub struct RearrangeMove {
    pub item_id: Id,
    pub item_name: String,
    pub from_container_id: Id,
    pub to_container_id: Id,
    pub estimated_minutes: f64,
    pub priority: u8,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RearrangeResult {
    pub message: String,
    pub moves: Vec<RearrangeMove>,
    pub total_estimated_minutes: f64,
    pub space_optimization_pct: f64,
    pub low_priority_items_moved: Vec<Id>,
    pub high_priority_items_untouched: Vec<Id>,
    pub disorganized_containers: Vec<DisorganizedContainer>,
}

struct VirtualUsage {
    volume: f64,
    count: usize,
}

fn best_destination<'a>(
    item: &Item,
    source_id: &str,
    containers: &'a [Container],
    usage: &HashMap<Id, VirtualUsage>,
) -> Option<&'a Container> {
    let item_volume = item.volume();
    let mut best: Option<(f64, &Container)> = None;

    for container in containers {
        if container.id == source_id || container.kind == ContainerKind::Waste {
            continue;
        }
        let u = usage.get(&container.id)?;
        if u.count >= container.capacity {
            continue;
        }
        let interior = container.interior_volume();
        if interior <= 0.0 {
            continue;
        }
        let remaining = interior - u.volume;
        if item_volume > remaining {
            continue;
        }

        let zone_score = match &item.preferred_zone {
            Some(zone) if zone == &container.zone => 0.5,
            _ => 1.0,
        };
        let space_score = (remaining - item_volume) / interior;
        let utilization = u.volume / interior;
        let utilization_score = (0.75 - utilization).abs();
        let score = zone_score * 0.5 + space_score * 0.3 + utilization_score * 0.2;

        if best.map(|(s, _)| score < s).unwrap_or(true) {
            best = Some((score, container));
        }
    }

    best.map(|(_, c)| c)
}

/// C8: `rearrange(space_target, priority_threshold, max_movements)` (§4.8).
/// `space_target` is accepted per the contract but only reported via
/// `space_optimization_pct`; candidate selection is driven by
/// `priority_threshold` and the underutilized/overutilized bands in
/// `config`.
pub fn rearrange(
    items: &[Item],
    containers: &[Container],
    priority_threshold: u8,
    max_movements: usize,
    config: &PlannerConfig,
    sink: &mut dyn EventSink,
) -> RearrangeResult {
    let mut items_by_container: HashMap<Id, Vec<&Item>> = HashMap::new();
    let mut usage: HashMap<Id, VirtualUsage> = HashMap::new();
    for c in containers {
        usage.insert(c.id.clone(), VirtualUsage { volume: 0.0, count: 0 });
    }
    for item in items {
        if let Some(p) = &item.placement {
            items_by_container.entry(p.container_id.clone()).or_default().push(item);
            if let Some(u) = usage.get_mut(&p.container_id) {
                u.volume += item.volume();
                u.count += 1;
            }
        }
    }

    let report = disorganized_containers(containers, &items_by_container, config);

    let container_utilization_of = |c: &Container| -> f64 {
        let used = usage.get(&c.id).map(|u| u.volume).unwrap_or(0.0);
        container_utilization(c, used)
    };

    let overutilized: Vec<&Container> = containers
        .iter()
        .filter(|c| c.kind != ContainerKind::Waste && container_utilization_of(c) > config.rearrange_overutilized_pct)
        .collect();
    let underutilized_exists = containers
        .iter()
        .any(|c| c.kind != ContainerKind::Waste && container_utilization_of(c) < config.rearrange_underutilized_pct);

    if overutilized.is_empty() || !underutilized_exists {
        return RearrangeResult {
            message: "no rearrangement needed - container utilization is balanced".to_string(),
            disorganized_containers: report,
            ..Default::default()
        };
    }

    let mut threshold = priority_threshold;
    let mut movable: Vec<(&Item, Id)> = Vec::new();
    loop {
        movable = overutilized
            .iter()
            .flat_map(|c| {
                items_by_container
                    .get(&c.id)
                    .into_iter()
                    .flatten()
                    .filter(|i| i.priority <= threshold)
                    .map(move |i| (*i, c.id.clone()))
            })
            .collect();
        if !movable.is_empty() || threshold >= config.rearrange_threshold_cap {
            break;
        }
        threshold = (threshold + config.rearrange_threshold_step).min(config.rearrange_threshold_cap);
    }
    movable.sort_by_key(|(item, _)| item.priority);

    let total_before: f64 = containers
        .iter()
        .filter(|c| c.kind != ContainerKind::Waste)
        .map(container_utilization_of)
        .sum();
    let non_waste_count = containers.iter().filter(|c| c.kind != ContainerKind::Waste).count().max(1);
    let initial_avg = total_before / non_waste_count as f64;

    let mut moves = Vec::new();
    let mut moved_ids = Vec::new();
    let high_priority_untouched: Vec<Id> = items
        .iter()
        .filter(|i| i.priority > threshold)
        .map(|i| i.id.clone())
        .collect();

    for (item, from_id) in movable {
        if moves.len() >= max_movements {
            break;
        }
        let Some(from_container) = containers.iter().find(|c| c.id == from_id) else {
            continue;
        };
        let Some(to_container) = best_destination(item, &from_id, containers, &usage) else {
            continue;
        };
        if to_container.id == from_id {
            continue;
        }

        let minutes = estimate_movement_time(item, from_container, to_container);
        let description = format!(
            "move {} from {} ({}) to {} ({})",
            item.name, from_container.id, from_container.zone, to_container.id, to_container.zone
        );
        log::info!("{description}");
        sink.log("rearrange_move", Some(&item.id), Some(&to_container.id), "system", &description);

        let item_volume = item.volume();
        if let Some(u) = usage.get_mut(&from_id) {
            u.volume = (u.volume - item_volume).max(0.0);
            u.count = u.count.saturating_sub(1);
        }
        if let Some(u) = usage.get_mut(&to_container.id) {
            u.volume += item_volume;
            u.count += 1;
        }

        moved_ids.push(item.id.clone());
        moves.push(RearrangeMove {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            from_container_id: from_id,
            to_container_id: to_container.id.clone(),
            estimated_minutes: minutes,
            priority: item.priority,
            description,
        });
    }

    let total_after: f64 = containers
        .iter()
        .filter(|c| c.kind != ContainerKind::Waste)
        .map(|c| container_utilization(c, usage.get(&c.id).map(|u| u.volume).unwrap_or(0.0)))
        .sum();
    let final_avg = total_after / non_waste_count as f64;

    RearrangeResult {
        message: format!("generated rearrangement plan with {} movements", moves.len()),
        total_estimated_minutes: moves.iter().map(|m| m.estimated_minutes).sum(),
        space_optimization_pct: final_avg - initial_avg,
        low_priority_items_moved: moved_ids,
        high_priority_items_untouched: high_priority_untouched,
        moves,
        disorganized_containers: report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::item::Placement;

    fn container(id: &str, w: f64, h: f64, d: f64, capacity: usize, zone: &str) -> Container {
        Container {
            id: id.to_string(),
            width: w,
            height: h,
            depth: d,
            capacity,
            zone: zone.to_string(),
            kind: ContainerKind::Storage,
        }
    }

    fn placed(id: &str, container_id: &str, vol_side: f64, priority: u8) -> Item {
        let mut item = Item::new(id, id, vol_side, vol_side, vol_side, 1.0);
        item.priority = priority;
        item.placement = Some(Placement {
            container_id: container_id.to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: vol_side,
            h: vol_side,
            d: vol_side,
        });
        item
    }

    #[test]
    fn efficiency_score_peaks_near_75_percent_utilization() {
        let config = PlannerConfig::default();
        assert!(efficiency_score(75.0, config.rearrange_optimal_pct) > efficiency_score(10.0, config.rearrange_optimal_pct));
        assert!(efficiency_score(75.0, config.rearrange_optimal_pct) > efficiency_score(99.0, config.rearrange_optimal_pct));
    }

    #[test]
    fn no_rearrangement_when_already_balanced() {
        let containers = vec![container("C1", 2.0, 2.0, 2.0, 10, "Z")];
        let items = vec![placed("i1", "C1", 1.5, 10)];
        let config = PlannerConfig::default();
        let mut sink = NullSink;
        let result = rearrange(&items, &containers, 30, 5, &config, &mut sink);
        assert!(result.moves.is_empty());
    }

    #[test]
    fn moves_low_priority_items_out_of_overutilized_container() {
        let containers = vec![
            container("C1", 2.0, 2.0, 2.0, 10, "Z"),
            container("C2", 2.0, 2.0, 2.0, 10, "Z"),
        ];
        let mut items = Vec::new();
        for i in 0..8 {
            items.push(placed(&format!("i{i}"), "C1", 1.0, 10));
        }
        let config = PlannerConfig::default();
        let mut sink = NullSink;
        let result = rearrange(&items, &containers, 30, 5, &config, &mut sink);
        assert!(!result.moves.is_empty());
        for m in &result.moves {
            assert_eq!(m.from_container_id, "C1");
            assert_ne!(m.to_container_id, "C1");
        }
    }
}
