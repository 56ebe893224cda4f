//! Item record (§3): native dimensions, mass, priority, optional zone
//! preference/expiry/usage limit, and the placement record when stowed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;
use crate::Id;

/// `(container_id, x, y, z, w', h', d')` — `(w', h', d')` is always one of
/// the six permutations of the item's native `(w, h, d)` (§3 invariant 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub container_id: Id,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub h: f64,
    pub d: f64,
}

impl Placement {
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.z, self.w, self.h, self.d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub mass: f64,
    pub priority: u8,
    pub preferred_zone: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub is_waste: bool,
    pub placement: Option<Placement>,
    pub last_retrieved: Option<NaiveDate>,
    pub last_retrieved_by: Option<String>,
}

impl Item {
    /// Convenience constructor for tests and samples: native dimensions and
    /// mass, default priority 50, everything else unset.
    pub fn new(id: &str, name: &str, width: f64, height: f64, depth: f64, mass: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            width,
            height,
            depth,
            mass,
            priority: 50,
            preferred_zone: None,
            expiry_date: None,
            usage_limit: None,
            usage_count: 0,
            is_waste: false,
            placement: None,
            last_retrieved: None,
            last_retrieved_by: None,
        }
    }

    pub fn native_dims(&self) -> (f64, f64, f64) {
        (self.width, self.height, self.depth)
    }

    pub fn volume(&self) -> f64 {
        self.width * self.height * self.depth
    }

    pub fn aspect_ratio(&self) -> f64 {
        let dims = [self.width, self.height, self.depth];
        let max_dim = dims.iter().cloned().fold(f64::MIN, f64::max);
        let min_dim = dims.iter().cloned().fold(f64::MAX, f64::min);
        if min_dim > 0.0 {
            max_dim / min_dim
        } else {
            100.0
        }
    }

    /// `volume * (0.5 + aspect_ratio * 0.5)` (§4.4) — lower is packed
    /// earlier, so cubic items precede long/thin ones at equal priority.
    pub fn volume_efficiency_score(&self) -> f64 {
        self.volume() * (0.5 + self.aspect_ratio() * 0.5)
    }

    pub fn is_placed(&self) -> bool {
        self.placement.is_some()
    }
}
