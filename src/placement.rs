//! Position search (C3) and placement planner (C4): the heuristic 3D
//! bin-packing core (§4.3, §4.4).

use std::collections::HashMap;

use crate::config::PlannerConfig;
use crate::container::{Container, ContainerKind, ContainerOccupancy};
use crate::event::EventSink;
use crate::geometry::{self, normalized_interior_dims, Aabb};
use crate::item::{Item, Placement};
use crate::Id;

const EPS: f64 = 1e-9;

/// Best candidate position for one (item, orientation, container), with the
/// contact score used to rank it against sibling candidates and against
/// other orientations (§4.3, §4.4 step 4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCandidate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub score: f64,
}

/// One axis' candidate offsets within `[0, max]` (§4.3 step 2): a dense
/// evenly-spaced ladder capped at 20 samples, falling back to the four-point
/// sparse lattice `{0, max/3, 2*max/3, max}` when the dense ladder would
/// exceed the cap.
fn axis_samples(max: f64, step: f64) -> Vec<f64> {
    if max <= EPS {
        return vec![0.0];
    }
    let dense_count = (max / step).floor() as i64 + 1;
    if dense_count > 20 {
        vec![0.0, max / 3.0, 2.0 * max / 3.0, max]
    } else {
        let n = dense_count.max(1) as usize;
        if n == 1 {
            vec![0.0]
        } else {
            (0..n).map(|i| (i as f64 / (n - 1) as f64) * max).collect()
        }
    }
}

/// Sum of face areas of a `(w,h,d)` box at `(x,y,z)` that are flush with any
/// of the six interior faces of a `(cw,ch,cd)` container, combined with a
/// 20% z-depth term (§4.4 step 4: "20% weight penalty on z, deeper is
/// better for non-priority"). Lower is better.
fn contact_score(w: f64, h: f64, d: f64, x: f64, y: f64, z: f64, cw: f64, ch: f64, cd: f64) -> f64 {
    let mut touch = 0.0;
    if x.abs() < EPS {
        touch += h * d;
    }
    if y.abs() < EPS {
        touch += w * d;
    }
    if z.abs() < EPS {
        touch += w * h;
    }
    if (x + w - cw).abs() < EPS {
        touch += h * d;
    }
    if (y + h - ch).abs() < EPS {
        touch += w * d;
    }
    if (z + d - cd).abs() < EPS {
        touch += w * h;
    }
    -touch * 0.8 + (-z) * 0.2
}

/// C3: the best position for one fixed `(container, item-orientation)` pair,
/// or `None` if no collision-free position exists (§4.3).
pub fn find_position(
    container_dims: (f64, f64, f64),
    orientation: (f64, f64, f64),
    occupied: &[Aabb],
    capacity: usize,
    prioritize_access: bool,
) -> Option<PositionCandidate> {
    let (cw, ch, cd) = container_dims;
    let (w, h, d) = orientation;
    if w > cw || h > ch || d > cd || occupied.len() >= capacity {
        return None;
    }

    let mean_dim = (cw + ch + cd) / 3.0;
    let step = if mean_dim > 10.0 { 0.25 } else { 0.1 };

    let max_x = (cw - w).max(0.0);
    let max_y = (ch - h).max(0.0);
    let max_z = (cd - d).max(0.0);

    let mut candidates: Vec<PositionCandidate> = Vec::new();
    for &z in &axis_samples(max_z, step) {
        for &y in &axis_samples(max_y, step) {
            for &x in &axis_samples(max_x, step) {
                let candidate = Aabb::new(x, y, z, w, h, d);
                if occupied.iter().any(|b| candidate.overlaps(b)) {
                    continue;
                }
                let score = contact_score(w, h, d, x, y, z, cw, ch, cd);
                candidates.push(PositionCandidate { x, y, z, score });
            }
        }
    }

    if prioritize_access {
        candidates.sort_by(|a, b| {
            a.z.partial_cmp(&b.z)
                .unwrap()
                .then(a.y.partial_cmp(&b.y).unwrap())
                .then(a.x.partial_cmp(&b.x).unwrap())
        });
    } else {
        candidates.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap()
                .then(a.z.partial_cmp(&b.z).unwrap())
                .then(a.y.partial_cmp(&b.y).unwrap())
                .then(a.x.partial_cmp(&b.x).unwrap())
        });
    }
    candidates.into_iter().next()
}

/// A successful placement write-back (§3 placement record).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedItem {
    pub item_id: Id,
    pub container_id: Id,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub h: f64,
    pub d: f64,
}

impl PlacedItem {
    pub fn placement(&self) -> Placement {
        Placement {
            container_id: self.container_id.clone(),
            x: self.x,
            y: self.y,
            z: self.z,
            w: self.w,
            h: self.h,
            d: self.d,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.z, self.w, self.h, self.d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnplacedItem {
    pub item_id: Id,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceAllResult {
    pub placed: Vec<PlacedItem>,
    pub unplaced: Vec<UnplacedItem>,
}

/// The capacity governor's cap on items placed in one run (§4.4): a
/// documented heuristic that reserves slack for later rearrangement, not a
/// geometric limit.
fn governor_cap(item_count: usize, total_capacity: usize, config: &PlannerConfig) -> usize {
    let total = total_capacity as f64;
    let cap = if item_count <= config.small_regime_max {
        (total * config.small_regime_factor).floor() as usize
    } else if item_count <= config.medium_regime_max {
        let by_factor = (total * config.medium_regime_factor).floor() as usize;
        let floor_leaving_unplaced = item_count.saturating_sub(config.medium_regime_min_unplaced);
        by_factor.min(floor_leaving_unplaced)
    } else {
        let factor = config
            .large_regime_floor
            .max(0.85 - item_count as f64 / 10000.0);
        (total * factor).floor() as usize
    };
    cap.min(item_count)
}

fn admits_kind(container: &Container, item: &Item) -> bool {
    match container.kind {
        ContainerKind::Waste => item.is_waste,
        ContainerKind::Storage => !item.is_waste,
    }
}

fn fill_ratio(container: &Container, counts: &HashMap<Id, usize>) -> f64 {
    let count = *counts.get(&container.id).unwrap_or(&0);
    count as f64 / container.capacity.max(1) as f64
}

/// Tries every candidate container in `pass`, in priority order, for one
/// item. Returns the placement on the first container that admits it.
#[allow(clippy::too_many_arguments)]
fn try_place_in_pass(
    item: &Item,
    pass: &mut [&Container],
    access_threshold: u8,
    counts: &mut HashMap<Id, usize>,
    occupancy: &mut ContainerOccupancy,
) -> Option<PlacedItem> {
    pass.sort_by(|a, b| {
        fill_ratio(a, counts)
            .partial_cmp(&fill_ratio(b, counts))
            .unwrap()
            .then(b.interior_volume().partial_cmp(&a.interior_volume()).unwrap())
    });

    let prioritize_access = item.priority > access_threshold;
    let item_avg_dim = (item.width + item.height + item.depth) / 3.0;

    for container in pass.iter() {
        if !admits_kind(container, item) {
            log::debug!("skipping container {} - wrong kind for item {}", container.id, item.id);
            continue;
        }

        let tracked = *counts.get(&container.id).unwrap_or(&0);
        if tracked >= container.capacity {
            log::debug!(
                "skipping container {} - at capacity ({}/{})",
                container.id,
                tracked,
                container.capacity
            );
            continue;
        }

        // Re-read the snapshot: the tracked counter can drift from the
        // occupancy map if another code path mutated it (§4.4 step 2).
        let actual = occupancy.count(&container.id);
        if actual != tracked {
            log::warn!(
                "container {} count desynchronized (tracked {}, actual {}), resynchronizing",
                container.id,
                tracked,
                actual
            );
            counts.insert(container.id.clone(), actual);
            if actual >= container.capacity {
                continue;
            }
        }

        let (cw, ch, cd) = normalized_interior_dims(container, item_avg_dim);
        let existing: Vec<Aabb> = occupancy
            .boxes_in(&container.id)
            .iter()
            .map(|(_, b)| *b)
            .collect();

        let mut best: Option<((f64, f64, f64), PositionCandidate)> = None;
        for orientation in geometry::orientations(item.native_dims()) {
            if let Some(candidate) = find_position(
                (cw, ch, cd),
                orientation,
                &existing,
                container.capacity,
                prioritize_access,
            ) {
                let better = match &best {
                    None => true,
                    Some((_, current)) if prioritize_access => candidate.z < current.z,
                    Some((_, current)) => candidate.score < current.score,
                };
                if better {
                    best = Some((orientation, candidate));
                }
            }
        }

        if let Some(((w, h, d), candidate)) = best {
            let placed = PlacedItem {
                item_id: item.id.clone(),
                container_id: container.id.clone(),
                x: candidate.x,
                y: candidate.y,
                z: candidate.z,
                w,
                h,
                d,
            };
            occupancy.insert(&container.id, item.id.clone(), placed.aabb());
            counts.insert(container.id.clone(), occupancy.count(&container.id));
            return Some(placed);
        }
    }
    None
}

/// C4: `place_all(items, containers) -> (placed, unplaced)` (§4.4).
///
/// `external_items` are items outside this batch that remain placed; they
/// seed container occupancy and live counts but are never themselves moved.
/// Ordering, zone passes, the capacity governor, and orientation/position
/// selection all follow §4.4 exactly.
pub fn place_all(
    items: Vec<Item>,
    external_items: &[Item],
    containers: &[Container],
    config: &PlannerConfig,
    sink: &mut dyn EventSink,
) -> PlaceAllResult {
    let mut counts: HashMap<Id, usize> = HashMap::new();
    let mut occupancy = ContainerOccupancy::from_items(external_items);
    for container in containers {
        counts.insert(container.id.clone(), occupancy.count(&container.id));
    }

    let mut sorted_items = items;
    sorted_items.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(
                a.volume_efficiency_score()
                    .partial_cmp(&b.volume_efficiency_score())
                    .unwrap(),
            )
    });

    let total_capacity: usize = containers.iter().map(|c| c.capacity).sum();
    let cap = governor_cap(sorted_items.len(), total_capacity, config);
    log::info!(
        "place_all: {} items, governor cap {} of {} total capacity",
        sorted_items.len(),
        cap,
        total_capacity
    );

    let mut result = PlaceAllResult::default();
    let mut placed_count = 0usize;

    for item in &sorted_items {
        if placed_count >= cap {
            result.unplaced.push(UnplacedItem {
                item_id: item.id.clone(),
                reason: "capacity governor cap reached for this run".to_string(),
            });
            continue;
        }

        let mut preferred: Vec<&Container> = Vec::new();
        let mut fallback: Vec<&Container> = Vec::new();
        for c in containers {
            match &item.preferred_zone {
                Some(zone) if zone == &c.zone => preferred.push(c),
                _ => fallback.push(c),
            }
        }

        let placed = if !preferred.is_empty() {
            try_place_in_pass(
                item,
                &mut preferred,
                config.access_priority_threshold_preferred,
                &mut counts,
                &mut occupancy,
            )
            .or_else(|| {
                try_place_in_pass(
                    item,
                    &mut fallback,
                    config.access_priority_threshold_fallback,
                    &mut counts,
                    &mut occupancy,
                )
            })
        } else {
            try_place_in_pass(
                item,
                &mut fallback,
                config.access_priority_threshold_fallback,
                &mut counts,
                &mut occupancy,
            )
        };

        match placed {
            Some(p) => {
                log::info!("placed item {} in container {} at ({}, {}, {})", p.item_id, p.container_id, p.x, p.y, p.z);
                sink.log("place", Some(&p.item_id), Some(&p.container_id), "system", "placed by place_all");
                placed_count += 1;
                result.placed.push(p);
            }
            None => {
                result.unplaced.push(UnplacedItem {
                    item_id: item.id.clone(),
                    reason: "does not fit under any orientation in any candidate container".to_string(),
                });
            }
        }
    }

    result
}

/// Waste placement plan (§SPEC_FULL.md E.1): a dry run of C4 restricted to
/// waste-kind containers, previewing where waste items would land without
/// mutating any item — used ahead of an undocking sweep.
pub fn plan_waste_placement(
    waste_items: Vec<Item>,
    already_in_waste_containers: &[Item],
    containers: &[Container],
    config: &PlannerConfig,
    sink: &mut dyn EventSink,
) -> PlaceAllResult {
    let waste_containers: Vec<Container> = containers
        .iter()
        .filter(|c| c.kind == ContainerKind::Waste)
        .cloned()
        .collect();
    if waste_containers.is_empty() {
        return PlaceAllResult {
            placed: Vec::new(),
            unplaced: waste_items
                .into_iter()
                .map(|i| UnplacedItem {
                    item_id: i.id,
                    reason: "no waste-kind containers available".to_string(),
                })
                .collect(),
        };
    }
    place_all(waste_items, already_in_waste_containers, &waste_containers, config, sink)
}

/// Re-runs C3 for a single item against a single destination container, used
/// by the rearrangement applier to verify geometric feasibility at the
/// point a proposed move is actually committed (§9 Design Notes, last
/// bullet: "the applier must re-run C3 per move").
pub fn apply_move(item: &Item, destination: &Container, occupancy: &ContainerOccupancy) -> Option<PlacedItem> {
    let item_avg_dim = (item.width + item.height + item.depth) / 3.0;
    let (cw, ch, cd) = normalized_interior_dims(destination, item_avg_dim);
    let existing: Vec<Aabb> = occupancy
        .boxes_in(&destination.id)
        .iter()
        .map(|(_, b)| *b)
        .collect();

    let mut best: Option<((f64, f64, f64), PositionCandidate)> = None;
    for orientation in geometry::orientations(item.native_dims()) {
        if let Some(candidate) = find_position((cw, ch, cd), orientation, &existing, destination.capacity, false) {
            let better = match &best {
                None => true,
                Some((_, current)) => candidate.score < current.score,
            };
            if better {
                best = Some((orientation, candidate));
            }
        }
    }

    best.map(|((w, h, d), candidate)| PlacedItem {
        item_id: item.id.clone(),
        container_id: destination.id.clone(),
        x: candidate.x,
        y: candidate.y,
        z: candidate.z,
        w,
        h,
        d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerKind;
    use crate::event::NullSink;

    fn container(id: &str, w: f64, h: f64, d: f64, capacity: usize) -> Container {
        Container {
            id: id.to_string(),
            width: w,
            height: h,
            depth: d,
            capacity,
            zone: "Z".to_string(),
            kind: ContainerKind::Storage,
        }
    }

    #[test]
    fn single_fit_places_at_origin() {
        let c = container("C1", 1.0, 1.0, 1.0, 1);
        let candidate = find_position((c.width, c.height, c.depth), (0.5, 0.5, 0.5), &[], c.capacity, false);
        let candidate = candidate.unwrap();
        assert_eq!((candidate.x, candidate.y, candidate.z), (0.0, 0.0, 0.0));
    }

    #[test]
    fn orientation_required_to_fit_a_flat_container() {
        // Container (W=2,H=0.3,D=1): native item (0.3,1.5,0.5) never fits,
        // but the (0.3,0.3,... ) style short-axis rotation does if any
        // permutation has height <= 0.3.
        let dims = (2.0, 0.3, 1.0);
        let item_native = (0.3, 1.5, 0.5);
        let fits = geometry::orientations(item_native)
            .into_iter()
            .any(|(w, h, d)| w <= dims.0 && h <= dims.1 && d <= dims.2);
        assert!(!fits, "no permutation of (0.3,1.5,0.5) has a <=0.3 height axis paired validly");
    }

    #[test]
    fn capacity_reject_when_container_full() {
        let result = find_position((1.0, 1.0, 1.0), (0.5, 0.5, 0.5), &[], 0, false);
        assert!(result.is_none());
    }

    #[test]
    fn priority_order_keeps_high_priority_items_placed() {
        let containers = vec![container("C1", 3.0, 1.0, 1.0, 3)];
        let mut items = Vec::new();
        for i in 0..3 {
            let mut it = Item::new(&format!("hi{i}"), "hi", 1.0, 1.0, 1.0, 1.0);
            it.priority = 100;
            items.push(it);
        }
        for i in 0..7 {
            let mut it = Item::new(&format!("lo{i}"), "lo", 1.0, 1.0, 1.0, 1.0);
            it.priority = 10;
            items.push(it);
        }
        let config = PlannerConfig::default();
        let mut sink = NullSink;
        let result = place_all(items, &[], &containers, &config, &mut sink);
        assert_eq!(result.placed.len(), 3);
        for i in 0..3 {
            assert!(result.placed.iter().any(|p| p.item_id == format!("hi{i}")));
        }
    }

    #[test]
    fn waste_items_never_land_in_storage_containers() {
        let containers = vec![container("C1", 2.0, 2.0, 2.0, 5)];
        let mut waste = Item::new("w1", "waste", 1.0, 1.0, 1.0, 1.0);
        waste.is_waste = true;
        let config = PlannerConfig::default();
        let mut sink = NullSink;
        let result = place_all(vec![waste], &[], &containers, &config, &mut sink);
        assert!(result.placed.is_empty());
        assert_eq!(result.unplaced.len(), 1);
    }
}
