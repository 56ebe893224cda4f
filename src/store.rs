//! Object store capability (§6, §9): the core's only dependency on
//! persistence. Replaces the "ad-hoc mock store used as a fallback" pattern
//! flagged in §9 with a small trait plus two implementations — a real
//! transactional store (left to the host binary) and [`InMemoryStore`], the
//! test double every algorithm's unit tests exercise against.

use std::collections::HashMap;

use crate::container::Container;
use crate::error::{CoreError, CoreResult};
use crate::event::{EventSink, LogEvent, VecSink};
use crate::item::Item;
use crate::Id;

/// Filter applied by `list_items`. `None` fields are unconstrained.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemFilter<'a> {
    pub is_placed: Option<bool>,
    pub is_waste: Option<bool>,
    pub container_id: Option<&'a str>,
}

impl<'a> ItemFilter<'a> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(placed) = self.is_placed {
            if item.is_placed() != placed {
                return false;
            }
        }
        if let Some(waste) = self.is_waste {
            if item.is_waste != waste {
                return false;
            }
        }
        if let Some(cid) = self.container_id {
            if item.placement.as_ref().map(|p| p.container_id.as_str()) != Some(cid) {
                return false;
            }
        }
        true
    }
}

/// The relational interface the core depends on (§6). A single logical
/// transaction per public operation: `list`/`get` to build a snapshot,
/// `update_item`/`bulk_update_items` to commit it, `log` for the durable
/// audit trail. The core never performs optimistic concurrency control
/// itself — it is the store's job to serialize concurrent callers (§5).
pub trait Store {
    fn list_containers(&self) -> Vec<Container>;
    fn list_items(&self, filter: ItemFilter) -> Vec<Item>;
    fn get_item(&self, id: &str) -> CoreResult<Item>;
    fn get_container(&self, id: &str) -> CoreResult<Container>;
    fn update_item(&mut self, item: Item) -> CoreResult<()>;
    fn bulk_update_items(&mut self, items: Vec<Item>) -> CoreResult<()>;
    fn log(&mut self, action: &str, item_id: Option<&Id>, container_id: Option<&Id>, actor: &str, details: &str);
}

/// Test double and reference implementation: every container/item lives in
/// a `HashMap`, keyed by id. Iteration order is never relied upon — every
/// caller that needs determinism sorts keys first (§5).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    containers: HashMap<Id, Container>,
    items: HashMap<Id, Item>,
    events: VecSink,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(containers: impl IntoIterator<Item = Container>) -> Self {
        let mut store = Self::new();
        for c in containers {
            store.containers.insert(c.id.clone(), c);
        }
        store
    }

    pub fn put_container(&mut self, container: Container) {
        self.containers.insert(container.id.clone(), container);
    }

    pub fn put_item(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events.events
    }
}

impl Store for InMemoryStore {
    fn list_containers(&self) -> Vec<Container> {
        let mut containers: Vec<Container> = self.containers.values().cloned().collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        containers
    }

    fn list_items(&self, filter: ItemFilter) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    fn get_item(&self, id: &str) -> CoreResult<Item> {
        self.items.get(id).cloned().ok_or_else(|| CoreError::NotFound {
            kind: "item",
            id: id.to_string(),
        })
    }

    fn get_container(&self, id: &str) -> CoreResult<Container> {
        self.containers
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    fn update_item(&mut self, item: Item) -> CoreResult<()> {
        if !self.items.contains_key(&item.id) {
            return Err(CoreError::NotFound {
                kind: "item",
                id: item.id.clone(),
            });
        }
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    fn bulk_update_items(&mut self, items: Vec<Item>) -> CoreResult<()> {
        for item in &items {
            if !self.items.contains_key(&item.id) {
                return Err(CoreError::ConsistencyViolation(format!(
                    "item {} absent from store at commit time",
                    item.id
                )));
            }
        }
        for item in items {
            self.items.insert(item.id.clone(), item);
        }
        Ok(())
    }

    fn log(&mut self, action: &str, item_id: Option<&Id>, container_id: Option<&Id>, actor: &str, details: &str) {
        self.events.log(action, item_id, container_id, actor, details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerKind;

    fn container(id: &str) -> Container {
        Container {
            id: id.to_string(),
            width: 1.0,
            height: 1.0,
            depth: 1.0,
            capacity: 1,
            zone: "Z".to_string(),
            kind: ContainerKind::Storage,
        }
    }

    #[test]
    fn get_item_not_found_is_recoverable() {
        let store = InMemoryStore::new();
        let err = store.get_item("missing").unwrap_err();
        assert_eq!(
            err,
            CoreError::NotFound {
                kind: "item",
                id: "missing".to_string()
            }
        );
    }

    #[test]
    fn bulk_update_rejects_unknown_item_as_consistency_violation() {
        let mut store = InMemoryStore::new();
        let rogue = Item::new("ghost", "ghost", 1.0, 1.0, 1.0, 1.0);
        let err = store.bulk_update_items(vec![rogue]).unwrap_err();
        assert!(matches!(err, CoreError::ConsistencyViolation(_)));
    }

    #[test]
    fn list_containers_is_sorted_for_determinism() {
        let mut store = InMemoryStore::new();
        store.put_container(container("C2"));
        store.put_container(container("C1"));
        let ids: Vec<_> = store.list_containers().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["C1".to_string(), "C2".to_string()]);
    }
}
