// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the knowledge-graph bounded context
//! Published to the EventBus after each mutation commits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Knowledge-graph domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnowledgeEvent {
    /// Get-or-create minted and inserted a new individual
    IndividualCreated {
        uri: String,
        class_uri: String,
        label: String,
        timestamp: DateTime<Utc>,
    },

    /// Get-or-create resolved the label to an existing individual
    IndividualMatched {
        uri: String,
        class_uri: String,
        label: String,
        score: u8,
        timestamp: DateTime<Utc>,
    },

    /// Two individuals were folded into one
    IndividualsMerged {
        keep: String,
        drop: String,
        inserted: usize,
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Individuals were detached from the graph
    IndividualsRemoved {
        uris: Vec<String>,
        triples_removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A schema was translated into a hierarchical model
    SchemaTranslated {
        root: String,
        classes: usize,
        issues: usize,
        timestamp: DateTime<Utc>,
    },
}

impl KnowledgeEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            KnowledgeEvent::IndividualCreated { timestamp, .. } => *timestamp,
            KnowledgeEvent::IndividualMatched { timestamp, .. } => *timestamp,
            KnowledgeEvent::IndividualsMerged { timestamp, .. } => *timestamp,
            KnowledgeEvent::IndividualsRemoved { timestamp, .. } => *timestamp,
            KnowledgeEvent::SchemaTranslated { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            KnowledgeEvent::IndividualCreated { .. } => "individual_created",
            KnowledgeEvent::IndividualMatched { .. } => "individual_matched",
            KnowledgeEvent::IndividualsMerged { .. } => "individuals_merged",
            KnowledgeEvent::IndividualsRemoved { .. } => "individuals_removed",
            KnowledgeEvent::SchemaTranslated { .. } => "schema_translated",
        }
    }

    /// Whether the event mentions the given individual
    pub fn touches(&self, individual: &str) -> bool {
        match self {
            KnowledgeEvent::IndividualCreated { uri, .. } | KnowledgeEvent::IndividualMatched { uri, .. } => {
                uri == individual
            }
            KnowledgeEvent::IndividualsMerged { keep, drop, .. } => keep == individual || drop == individual,
            KnowledgeEvent::IndividualsRemoved { uris, .. } => uris.iter().any(|u| u == individual),
            KnowledgeEvent::SchemaTranslated { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = KnowledgeEvent::IndividualCreated {
            uri: "http://ontology.naas.ai/abi/1".to_string(),
            class_uri: "http://x/Organization".to_string(),
            label: "Acme Corp".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"individual_created\""));

        let deserialized: KnowledgeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.timestamp(), deserialized.timestamp());
    }

    #[test]
    fn test_merge_event_type() {
        let event = KnowledgeEvent::IndividualsMerged {
            keep: "http://x/a".to_string(),
            drop: "http://x/b".to_string(),
            inserted: 2,
            removed: 3,
            timestamp: Utc::now(),
        };

        assert_eq!(event.event_type(), "individuals_merged");
        assert!(event.touches("http://x/b"));
        assert!(!event.touches("http://x/c"));
    }
}
