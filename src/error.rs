//! Core error kinds (§7) and their propagation policy.
//!
//! `NotFound`, `InvalidInput`, `CapacityExceeded`, and `GeometricallyInfeasible`
//! are recovered locally by the enclosing operation: they downgrade a
//! per-item attempt to "unplaced"/"not found" rather than aborting the whole
//! operation, so they rarely surface as `Err` from a public entry point.
//! `ConsistencyViolation` aborts the current operation and rolls back the
//! snapshot; `StoreUnavailable` is reported verbatim to the caller. Both of
//! those do surface as `Err`.

use thiserror::Error;

use crate::Id;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Id },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("container {container_id} is at capacity ({capacity})")]
    CapacityExceeded { container_id: Id, capacity: usize },

    #[error("item {item_id} does not fit under any orientation in any candidate container")]
    GeometricallyInfeasible { item_id: Id },

    #[error("snapshot diverged from store state: {0}")]
    ConsistencyViolation(String),

    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
