//! Domain events for the graph store
//!
//! Every store mutation publishes an event on the [`EventBus`]. External
//! subscribers (cache invalidation, hosting platform hooks) receive them
//! through a broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::node::NodeType;
use super::relationship::RelationshipType;

/// Default capacity of the broadcast channel
const DEFAULT_CAPACITY: usize = 256;

/// Events that can occur in the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeCreated {
        node_id: String,
        node_type: NodeType,
        title: String,
        timestamp: DateTime<Utc>,
    },
    NodeUpdated {
        node_id: String,
        changes: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    NodeDeleted {
        node_id: String,
        soft: bool,
        timestamp: DateTime<Utc>,
    },
    RelationshipCreated {
        relationship_id: String,
        source_id: String,
        target_id: String,
        relationship_type: RelationshipType,
        timestamp: DateTime<Utc>,
    },
    RelationshipUpdated {
        relationship_id: String,
        source_id: String,
        target_id: String,
        timestamp: DateTime<Utc>,
    },
    RelationshipDeleted {
        relationship_id: String,
        source_id: String,
        target_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl GraphEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::NodeCreated { timestamp, .. }
            | Self::NodeUpdated { timestamp, .. }
            | Self::NodeDeleted { timestamp, .. }
            | Self::RelationshipCreated { timestamp, .. }
            | Self::RelationshipUpdated { timestamp, .. }
            | Self::RelationshipDeleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::NodeCreated { .. } => "node_created",
            Self::NodeUpdated { .. } => "node_updated",
            Self::NodeDeleted { .. } => "node_deleted",
            Self::RelationshipCreated { .. } => "relationship_created",
            Self::RelationshipUpdated { .. } => "relationship_updated",
            Self::RelationshipDeleted { .. } => "relationship_deleted",
        }
    }

    /// Node ids whose neighborhood changed because of this event
    pub fn affected_nodes(&self) -> Vec<&str> {
        match self {
            Self::NodeCreated { node_id, .. }
            | Self::NodeUpdated { node_id, .. }
            | Self::NodeDeleted { node_id, .. } => vec![node_id],
            Self::RelationshipCreated {
                source_id,
                target_id,
                ..
            }
            | Self::RelationshipUpdated {
                source_id,
                target_id,
                ..
            }
            | Self::RelationshipDeleted {
                source_id,
                target_id,
                ..
            } => vec![source_id, target_id],
        }
    }

    pub fn node_created(node_id: impl Into<String>, node_type: NodeType, title: impl Into<String>) -> Self {
        Self::NodeCreated {
            node_id: node_id.into(),
            node_type,
            title: title.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn node_updated(node_id: impl Into<String>, changes: Vec<String>) -> Self {
        Self::NodeUpdated {
            node_id: node_id.into(),
            changes,
            timestamp: Utc::now(),
        }
    }

    pub fn node_deleted(node_id: impl Into<String>, soft: bool) -> Self {
        Self::NodeDeleted {
            node_id: node_id.into(),
            soft,
            timestamp: Utc::now(),
        }
    }

    pub fn relationship_created(
        relationship_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self::RelationshipCreated {
            relationship_id: relationship_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            timestamp: Utc::now(),
        }
    }

    pub fn relationship_updated(
        relationship_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self::RelationshipUpdated {
            relationship_id: relationship_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn relationship_deleted(
        relationship_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self::RelationshipDeleted {
            relationship_id: relationship_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast channel for graph events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: GraphEvent) {
        let name = event.event_type_name();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "Graph event published"),
            Err(_) => debug!(event = name, "Graph event dropped, no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = GraphEvent::node_created("n1", NodeType::Note, "Inbox");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "node_created");
        assert_eq!(json["node_id"], "n1");
        assert_eq!(event.event_type_name(), "node_created");
    }

    #[test]
    fn test_affected_nodes() {
        let event = GraphEvent::relationship_created("r1", "a", "b", RelationshipType::Uses);
        assert_eq!(event.affected_nodes(), vec!["a", "b"]);

        let event = GraphEvent::node_deleted("n1", true);
        assert_eq!(event.affected_nodes(), vec!["n1"]);
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(GraphEvent::node_updated("n1", vec!["title".into()]));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.affected_nodes(), vec!["n1"]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(GraphEvent::node_deleted("n1", false));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
