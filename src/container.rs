//! Container index (C2): the stable container record plus a per-container
//! occupancy view used by the placement and retrieval algorithms.
//!
//! The index itself is snapshot-scoped (§4.2): a planning run reads a
//! consistent view built from [`ContainerOccupancy::from_items`], mutates an
//! in-memory copy, and the caller (`session`) commits the diff back through
//! the [`crate::store::Store`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;
use crate::item::Item;
use crate::Id;

/// `kind ∈ {storage, waste}` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Storage,
    Waste,
}

/// A rectangular stowage volume with a single open face at `z = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: Id,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub capacity: usize,
    pub zone: String,
    pub kind: ContainerKind,
}

impl Container {
    pub fn interior_volume(&self) -> f64 {
        self.width * self.height * self.depth
    }

    pub fn mean_interior_dim(&self) -> f64 {
        (self.width + self.height + self.depth) / 3.0
    }
}

/// Snapshot of which items currently occupy which containers, and the
/// AABBs the geometry kernel needs to test new candidates against.
///
/// Built once per operation from a store read, then threaded through the
/// algorithm as an in-memory working copy; nothing here talks to the store.
#[derive(Debug, Clone, Default)]
pub struct ContainerOccupancy {
    boxes: HashMap<Id, Vec<(Id, Aabb)>>,
}

impl ContainerOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an occupancy view from every placed item in `items`.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut boxes: HashMap<Id, Vec<(Id, Aabb)>> = HashMap::new();
        for item in items {
            if let Some(p) = &item.placement {
                boxes
                    .entry(p.container_id.clone())
                    .or_default()
                    .push((item.id.clone(), p.aabb()));
            }
        }
        Self { boxes }
    }

    pub fn count(&self, container_id: &str) -> usize {
        self.boxes.get(container_id).map_or(0, Vec::len)
    }

    pub fn boxes_in(&self, container_id: &str) -> &[(Id, Aabb)] {
        self.boxes
            .get(container_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert(&mut self, container_id: &str, item_id: Id, aabb: Aabb) {
        self.boxes
            .entry(container_id.to_string())
            .or_default()
            .push((item_id, aabb));
    }

    pub fn remove(&mut self, container_id: &str, item_id: &str) {
        if let Some(v) = self.boxes.get_mut(container_id) {
            v.retain(|(id, _)| id != item_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Placement};

    fn item(id: &str, container_id: &str, x: f64) -> Item {
        Item {
            placement: Some(Placement {
                container_id: container_id.to_string(),
                x,
                y: 0.0,
                z: 0.0,
                w: 1.0,
                h: 1.0,
                d: 1.0,
            }),
            ..Item::new(id, "n", 1.0, 1.0, 1.0, 1.0)
        }
    }

    #[test]
    fn occupancy_groups_by_container() {
        let items = vec![item("i1", "C1", 0.0), item("i2", "C1", 1.0), item("i3", "C2", 0.0)];
        let occ = ContainerOccupancy::from_items(&items);
        assert_eq!(occ.count("C1"), 2);
        assert_eq!(occ.count("C2"), 1);
        assert_eq!(occ.count("C3"), 0);
    }

    #[test]
    fn insert_and_remove_update_count() {
        let mut occ = ContainerOccupancy::new();
        occ.insert("C1", "i1".into(), Aabb::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0));
        assert_eq!(occ.count("C1"), 1);
        occ.remove("C1", "i1");
        assert_eq!(occ.count("C1"), 0);
    }
}
