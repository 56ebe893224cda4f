//! Retrieval solver (C5, §4.5): the minimal set of occluding items that
//! must be removed to reach a target item through the container's single
//! open face at `z = 0`.

use chrono::NaiveDate;

use crate::container::ContainerOccupancy;
use crate::error::{CoreError, CoreResult};
use crate::event::EventSink;
use crate::item::Item;
use crate::Id;

/// A single human-readable step in the retrieval path (§4.5 step 2).
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalStep {
    pub description: String,
    pub item_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalLocation {
    pub container_id: Id,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub found: bool,
    pub item_id: Id,
    pub path: Vec<RetrievalStep>,
    pub disturbed_items: Vec<Id>,
    pub location: Option<RetrievalLocation>,
}

/// The obstruction set for `target`: every other item in the same container
/// with a smaller z (closer to the open face) whose XY projection overlaps
/// the target's (§4.5, spec §9 fixes `J.z < I.z` as the blocking direction
/// since z=0 is the open face).
pub fn obstruction_set<'a>(target: &Item, same_container: impl IntoIterator<Item = &'a Item>) -> Vec<Id> {
    let Some(target_placement) = &target.placement else {
        return Vec::new();
    };
    let target_aabb = target_placement.aabb();

    let mut obstructions: Vec<Id> = same_container
        .into_iter()
        .filter(|other| other.id != target.id)
        .filter_map(|other| other.placement.as_ref().map(|p| (other, p)))
        .filter(|(_, p)| p.z < target_placement.z && p.aabb().overlaps_xy(&target_aabb))
        .map(|(other, _)| other.id.clone())
        .collect();
    obstructions.sort();
    obstructions
}

/// C5: compute the retrieval path for `item_id`, marking it retrieved
/// (`last_retrieved`/`last_retrieved_by`) but not consuming usage or
/// detaching it from its container — a separate "use" operation in
/// `time_sim` covers that (§4.5).
pub fn retrieve(
    item: &mut Item,
    container_items: &[Item],
    today: NaiveDate,
    actor: &str,
    sink: &mut dyn EventSink,
) -> CoreResult<RetrievalResult> {
    let placement = item.placement.clone().ok_or_else(|| {
        CoreError::InvalidInput(format!("item {} is not placed in any container", item.id))
    })?;

    let disturbed = obstruction_set(item, container_items);

    let mut path = vec![RetrievalStep {
        description: format!("open container {}", placement.container_id),
        item_id: None,
    }];
    for id in &disturbed {
        path.push(RetrievalStep {
            description: format!("remove item {id}"),
            item_id: Some(id.clone()),
        });
    }
    path.push(RetrievalStep {
        description: format!("extract item {}", item.id),
        item_id: Some(item.id.clone()),
    });
    if !disturbed.is_empty() {
        path.push(RetrievalStep {
            description: "replace removed items".to_string(),
            item_id: None,
        });
    }
    path.push(RetrievalStep {
        description: format!("close container {}", placement.container_id),
        item_id: None,
    });

    item.last_retrieved = Some(today);
    item.last_retrieved_by = Some(actor.to_string());

    log::info!("retrieved item {} from {}, {} items disturbed", item.id, placement.container_id, disturbed.len());
    sink.log(
        "retrieve",
        Some(&item.id),
        Some(&placement.container_id),
        actor,
        &format!("{} items disturbed", disturbed.len()),
    );

    Ok(RetrievalResult {
        found: true,
        item_id: item.id.clone(),
        path,
        disturbed_items: disturbed,
        location: Some(RetrievalLocation {
            container_id: placement.container_id,
            x: placement.x,
            y: placement.y,
            z: placement.z,
        }),
    })
}

/// Rebuilds the occluding-item check from a full occupancy snapshot,
/// without requiring the caller to have pre-filtered to a single container.
/// Exposed for callers (`session`) that already hold a [`ContainerOccupancy`].
pub fn obstruction_ids(item: &Item, occupancy: &ContainerOccupancy) -> Vec<Id> {
    let Some(placement) = &item.placement else {
        return Vec::new();
    };
    let target_aabb = placement.aabb();
    let mut obstructions: Vec<Id> = occupancy
        .boxes_in(&placement.container_id)
        .iter()
        .filter(|(id, _)| id != &item.id)
        .filter(|(_, b)| b.z < placement.z && b.overlaps_xy(&target_aabb))
        .map(|(id, _)| id.clone())
        .collect();
    obstructions.sort();
    obstructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::item::Placement;

    fn placed_item(id: &str, z: f64) -> Item {
        Item {
            placement: Some(Placement {
                container_id: "C1".to_string(),
                x: 0.0,
                y: 0.0,
                z,
                w: 1.0,
                h: 1.0,
                d: 1.0,
            }),
            ..Item::new(id, id, 1.0, 1.0, 1.0, 1.0)
        }
    }

    #[test]
    fn obstruction_requires_smaller_z_and_xy_overlap() {
        let a = placed_item("A", 1.0);
        let b = placed_item("B", 0.0);
        let obstructions = obstruction_set(&a, &[a.clone(), b.clone()]);
        assert_eq!(obstructions, vec!["B".to_string()]);
        // Symmetric case: B is never obstructed by A since A is farther from the face.
        assert!(obstruction_set(&b, &[a, b.clone()]).is_empty());
    }

    #[test]
    fn retrieval_path_has_five_steps_when_one_item_blocks() {
        let mut a = placed_item("A", 1.0);
        let b = placed_item("B", 0.0);
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut sink = NullSink;
        let result = retrieve(&mut a, &[a.clone(), b], today, "system", &mut sink).unwrap();
        assert_eq!(result.disturbed_items, vec!["B".to_string()]);
        assert_eq!(result.path.len(), 5);
        assert_eq!(a.last_retrieved, Some(today));
    }

    #[test]
    fn retrieval_does_not_touch_usage_or_placement() {
        let mut a = placed_item("A", 0.0);
        a.usage_count = 2;
        let before = a.placement.clone();
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut sink = NullSink;
        retrieve(&mut a, &[a.clone()], today, "system", &mut sink).unwrap();
        assert_eq!(a.usage_count, 2);
        assert_eq!(a.placement, before);
    }
}
