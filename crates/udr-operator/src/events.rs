//! # Events
//!
//! Lifecycle and relation events delivered by the host, and the queue of
//! events deferred for redelivery.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TriggerEvent {
    Install,
    Upgrade,
    PebbleReady,
    NrfRelationCreated { relation_id: u32 },
    NrfAvailable { url: String },
    DatabaseRelationJoined { relation_id: u32 },
    DatabaseCreated { relation_id: u32 },
    /// Raw relation-data change, translated by the relation interfaces
    RelationChanged { relation_id: u32 },
}

impl TriggerEvent {
    /// Whether this event runs the reconciliation cascade
    pub fn reconciles(&self) -> bool {
        matches!(
            self,
            TriggerEvent::PebbleReady
                | TriggerEvent::NrfRelationCreated { .. }
                | TriggerEvent::NrfAvailable { .. }
                | TriggerEvent::DatabaseRelationJoined { .. }
                | TriggerEvent::DatabaseCreated { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TriggerEvent::Install => "install",
            TriggerEvent::Upgrade => "upgrade-charm",
            TriggerEvent::PebbleReady => "udr-pebble-ready",
            TriggerEvent::NrfRelationCreated { .. } => "nrf-relation-created",
            TriggerEvent::NrfAvailable { .. } => "nrf-available",
            TriggerEvent::DatabaseRelationJoined { .. } => "database-relation-joined",
            TriggerEvent::DatabaseCreated { .. } => "database-created",
            TriggerEvent::RelationChanged { .. } => "relation-changed",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events waiting to be redelivered, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredQueue {
    events: VecDeque<TriggerEvent>,
}

impl DeferredQueue {
    pub fn defer(&mut self, event: TriggerEvent) {
        self.events.push_back(event);
    }

    /// Take every deferred event for redelivery
    pub fn take_all(&mut self) -> Vec<TriggerEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_events_do_not_reconcile() {
        assert!(!TriggerEvent::Install.reconciles());
        assert!(!TriggerEvent::RelationChanged { relation_id: 0 }.reconciles());
        assert!(TriggerEvent::PebbleReady.reconciles());
        assert!(TriggerEvent::NrfAvailable { url: "http://1.1.1.1".into() }.reconciles());
    }

    #[test]
    fn test_deferred_queue_preserves_order() {
        let mut queue = DeferredQueue::default();
        queue.defer(TriggerEvent::PebbleReady);
        queue.defer(TriggerEvent::DatabaseCreated { relation_id: 1 });

        let events = queue.take_all();
        assert_eq!(events[0], TriggerEvent::PebbleReady);
        assert_eq!(events[1], TriggerEvent::DatabaseCreated { relation_id: 1 });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(TriggerEvent::NrfRelationCreated { relation_id: 3 }).unwrap();
        assert_eq!(json["kind"], "nrf-relation-created");
        assert_eq!(json["relation_id"], 3);
    }
}
