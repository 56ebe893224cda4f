//! Append-only event log (§3/§6): the durable record every successful core
//! mutation emits, passed in explicitly as `&mut dyn EventSink` rather than
//! read/written through module-level state (§9 "scattered module-level
//! state for logging"). This is distinct from the ephemeral `log::*`
//! tracing the algorithms also emit at decision points (see `SPEC_FULL.md`
//! §A) — the sink is the durable record a host persists; `log::*` output is
//! operational and disposable.

use chrono::{DateTime, Utc};

use crate::Id;

/// One append-only log row. `id` is assigned by the sink, monotonically.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub item_id: Option<Id>,
    pub container_id: Option<Id>,
    pub actor: String,
    pub details: String,
}

/// The event log capability (§6): `log(action, item_id, container_id,
/// actor, details)`. Implementations must be append-only — no method here
/// allows editing or deleting a prior event.
pub trait EventSink {
    fn log(&mut self, action: &str, item_id: Option<&Id>, container_id: Option<&Id>, actor: &str, details: &str);
}

/// Discards every event. Useful for call sites (tests, examples) that don't
/// care about the audit trail.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn log(&mut self, _action: &str, _item_id: Option<&Id>, _container_id: Option<&Id>, _actor: &str, _details: &str) {}
}

/// Collects events in memory, in emission order. Used by tests and by the
/// in-memory store's own event history.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<LogEvent>,
    next_id: u64,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for VecSink {
    fn log(&mut self, action: &str, item_id: Option<&Id>, container_id: Option<&Id>, actor: &str, details: &str) {
        self.next_id += 1;
        self.events.push(LogEvent {
            id: self.next_id,
            timestamp: Utc::now(),
            action: action.to_string(),
            item_id: item_id.cloned(),
            container_id: container_id.cloned(),
            actor: actor.to_string(),
            details: details.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_assigns_monotonic_ids() {
        let mut sink = VecSink::new();
        sink.log("placed", Some(&"I1".to_string()), Some(&"C1".to_string()), "system", "");
        sink.log("placed", Some(&"I2".to_string()), Some(&"C1".to_string()), "system", "");
        assert_eq!(sink.events[0].id, 1);
        assert_eq!(sink.events[1].id, 2);
    }

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullSink;
        sink.log("noop", None, None, "system", "");
    }
}
