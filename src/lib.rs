//! cargox-stow - a 3D bin-packing and retrieval/rearrangement engine for
//! stowing discrete rectangular items inside rectangular containers
//! distributed across named zones.
//!
//! The crate is the stowage *planner*: it decides where and in which
//! orientation each item goes, how to retrieve an item with minimal
//! disturbance, which items have become waste, how to rebalance stowage, and
//! which waste to eject within a mass budget. Persistence, CSV transport,
//! and any network surface are external collaborators; this crate only
//! depends on the [`store::Store`] capability and an [`event::EventSink`].

pub mod config;
pub mod container;
pub mod csv_io;
pub mod error;
pub mod event;
pub mod geometry;
pub mod item;
pub mod placement;
pub mod rearrange;
pub mod retrieval;
pub mod session;
pub mod store;
pub mod time_sim;
pub mod undock;
pub mod waste;

/// Identifier type used for containers, items, and log events.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
