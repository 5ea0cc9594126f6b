// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # EntityPipeline: Get-or-Create Individuals
//!
//! Resolves a `(label, class)` mention against the store and only mints a new
//! individual when no candidate reaches the threshold.
//!
//! ## Idempotency
//!
//! Repeated calls with the same mention against unchanged store state converge
//! on one URI: the first call inserts, later calls resolve to it with score 100.
//! A URI is only returned after its insert committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::entity_resolver::EntityResolver;
use super::{guarded, publish_quietly, EventBus, DEFAULT_STORE_TIMEOUT};
use crate::domain::vocab::abi;
use crate::domain::{
    is_valid_uri, CortexError, CortexResult, Graph, Individual, IndividualId, KnowledgeEvent, TripleStore,
};

/// Default fuzzy match threshold (0-100)
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

/// Result of a get-or-create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOrCreateOutcome {
    pub uri: String,
    /// Current subject graph of the returned individual
    pub graph: Graph,
    pub created: bool,
}

pub struct EntityPipeline {
    store: Arc<dyn TripleStore>,
    resolver: EntityResolver,
    event_bus: Option<Arc<dyn EventBus>>,
    namespace: String,
    search_limit: usize,
    store_timeout: Duration,
}

impl EntityPipeline {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            store,
            event_bus: None,
            namespace: abi::NAMESPACE.to_string(),
            search_limit: 10,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Namespace new individual URIs are minted under
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self.resolver = EntityResolver::new(self.store.clone()).with_store_timeout(timeout);
        self
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Return the best existing match for `(label, class_uri)` scoring at
    /// least `threshold`, or create a new individual.
    pub async fn get_or_create(
        &self,
        label: &str,
        class_uri: &str,
        threshold: u8,
    ) -> CortexResult<GetOrCreateOutcome> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CortexError::validation("label must not be blank"));
        }
        if !is_valid_uri(class_uri) {
            return Err(CortexError::validation(format!("invalid class URI: {}", class_uri)));
        }
        if threshold > 100 {
            return Err(CortexError::validation(format!(
                "threshold must be within 0..=100, got {}",
                threshold
            )));
        }

        let candidates = self
            .resolver
            .resolve(label, Some(class_uri), self.search_limit)
            .await?;

        if let Some(best) = candidates.first().filter(|c| c.score >= threshold) {
            debug!(uri = %best.uri, score = best.score, label, "Matched existing individual");
            let graph = guarded(
                self.store_timeout,
                "get_subject_graph",
                self.store.get_subject_graph(&best.uri, 1),
            )
            .await?;

            publish_quietly(
                self.event_bus.as_deref(),
                KnowledgeEvent::IndividualMatched {
                    uri: best.uri.clone(),
                    class_uri: class_uri.to_string(),
                    label: label.to_string(),
                    score: best.score,
                    timestamp: Utc::now(),
                },
            )
            .await;

            return Ok(GetOrCreateOutcome {
                uri: best.uri.clone(),
                graph,
                created: false,
            });
        }

        let uri = IndividualId::new().to_uri(&self.namespace);
        let graph = Individual::new(uri.clone(), class_uri, label).to_graph();

        // Nothing is returned unless the insert committed.
        guarded(self.store_timeout, "insert", self.store.insert(&graph)).await?;

        info!(uri = %uri, class_uri, label, "Created individual");

        publish_quietly(
            self.event_bus.as_deref(),
            KnowledgeEvent::IndividualCreated {
                uri: uri.clone(),
                class_uri: class_uri.to_string(),
                label: label.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;

        Ok(GetOrCreateOutcome {
            uri,
            graph,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::MockEventBus;
    use crate::domain::vocab::{owl, rdf, rdfs};
    use crate::domain::{Term, Triple};
    use crate::infrastructure::InMemoryTripleStore;

    const ORG: &str = "http://x/Organization";

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = Arc::new(InMemoryTripleStore::new());
        let bus = Arc::new(MockEventBus::new());
        let pipeline = EntityPipeline::new(store.clone()).with_event_bus(bus.clone());

        let first = pipeline.get_or_create("Acme Corp", ORG, 80).await.unwrap();
        let second = pipeline.get_or_create("Acme Corp", ORG, 80).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.uri, second.uri);
        assert_eq!(store.len().await, 3);

        let events = bus.get_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "individual_created");
        assert_eq!(events[1].event_type(), "individual_matched");
    }

    #[tokio::test]
    async fn test_symbol_only_label_is_idempotent() {
        let store = Arc::new(InMemoryTripleStore::new());
        let pipeline = EntityPipeline::new(store.clone());

        let first = pipeline.get_or_create("???", ORG, 80).await.unwrap();
        let second = pipeline.get_or_create("???", ORG, 80).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.uri, second.uri);
        assert_eq!(store.len().await, 3);

        let other = pipeline.get_or_create("!!!", ORG, 80).await.unwrap();
        assert!(other.created);
    }

    #[tokio::test]
    async fn test_created_graph_is_minimal() {
        let store = Arc::new(InMemoryTripleStore::new());
        let pipeline = EntityPipeline::new(store).with_namespace("http://example.org/kg");

        let outcome = pipeline.get_or_create("  Acme Corp ", ORG, 80).await.unwrap();
        assert!(outcome.uri.starts_with("http://example.org/kg/"));

        let subject = Term::iri(outcome.uri.as_str());
        assert!(outcome.graph.contains(&Triple::new(
            subject.clone(),
            rdf::TYPE,
            Term::iri(owl::NAMED_INDIVIDUAL)
        )));
        assert!(outcome.graph.contains(&Triple::new(subject.clone(), rdf::TYPE, Term::iri(ORG))));
        assert_eq!(outcome.graph.value(&subject, rdfs::LABEL), Some(&Term::literal("Acme Corp")));
        assert_eq!(outcome.graph.len(), 3);
    }

    #[tokio::test]
    async fn test_below_threshold_creates() {
        let store = Arc::new(InMemoryTripleStore::new());
        let pipeline = EntityPipeline::new(store.clone());

        let acme = pipeline.get_or_create("Acme Inc", ORG, 80).await.unwrap();
        let other = pipeline.get_or_create("Acme Incorporated", ORG, 95).await.unwrap();

        assert_ne!(acme.uri, other.uri);
        assert!(other.created);

        // Threshold 0 accepts any overlapping candidate.
        let loose = pipeline.get_or_create("Acme Incorporated Group", ORG, 0).await.unwrap();
        assert!(!loose.created);
    }

    #[tokio::test]
    async fn test_insert_failure_returns_no_uri() {
        let store = Arc::new(InMemoryTripleStore::new());
        store.set_fail_mutations(true);
        let bus = Arc::new(MockEventBus::new());
        let pipeline = EntityPipeline::new(store.clone()).with_event_bus(bus.clone());

        let err = pipeline.get_or_create("Acme Corp", ORG, 80).await.unwrap_err();
        assert!(err.is_store_unavailable());
        assert!(store.is_empty().await);
        assert!(bus.get_events().is_empty());
    }

    #[tokio::test]
    async fn test_event_bus_failure_does_not_fail_create() {
        let store = Arc::new(InMemoryTripleStore::new());
        let pipeline = EntityPipeline::new(store).with_event_bus(Arc::new(MockEventBus::failing()));

        let outcome = pipeline.get_or_create("Acme Corp", ORG, 80).await.unwrap();
        assert!(outcome.created);
    }

    #[tokio::test]
    async fn test_validation_precedes_store_calls() {
        let store = Arc::new(InMemoryTripleStore::new());
        let pipeline = EntityPipeline::new(store.clone());

        assert!(pipeline.get_or_create("", ORG, 80).await.unwrap_err().is_validation());
        assert!(pipeline.get_or_create("Acme", "Organization", 80).await.unwrap_err().is_validation());
        assert!(pipeline.get_or_create("Acme", ORG, 101).await.unwrap_err().is_validation());
        assert!(store.is_empty().await);
    }
}
