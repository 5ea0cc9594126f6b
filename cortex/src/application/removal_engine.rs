// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # RemovalEngine: Detach Individuals From the Graph
//!
//! Each URI is handled independently: every triple where it is subject or
//! object is fetched, snapshotted and removed as one batch. An absent or
//! malformed URI is reported in its own outcome and never fails the batch.
//! Store and audit errors still propagate; URIs removed before the failure
//! stay removed and are announced before the error is returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{fetch_touching, guarded, publish_quietly, EventBus, DEFAULT_STORE_TIMEOUT};
use crate::domain::vocab::local_name;
use crate::domain::{is_valid_uri, AuditSink, CortexResult, Graph, KnowledgeEvent, TripleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStatus {
    Removed,
    NotFound,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalOutcome {
    pub uri: String,
    pub triples_removed: usize,
    pub status: RemovalStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    /// Union of every removed triple
    pub removed: Graph,
    pub per_uri: Vec<RemovalOutcome>,
}

impl RemovalReport {
    pub fn removed_uris(&self) -> impl Iterator<Item = &str> {
        self.per_uri
            .iter()
            .filter(|o| o.status == RemovalStatus::Removed)
            .map(|o| o.uri.as_str())
    }
}

pub struct RemovalEngine {
    store: Arc<dyn TripleStore>,
    audit: Arc<dyn AuditSink>,
    event_bus: Option<Arc<dyn EventBus>>,
    store_timeout: Duration,
}

impl RemovalEngine {
    /// Each URI's triples are snapshotted to `audit` before they are removed.
    pub fn new(store: Arc<dyn TripleStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            event_bus: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub async fn remove(&self, uris: &[&str]) -> CortexResult<RemovalReport> {
        let mut report = RemovalReport::default();
        let result = self.remove_each(uris, &mut report).await;

        if let Err(err) = &result {
            warn!(
                removed = report.removed_uris().count(),
                error = %err,
                "Removal batch aborted"
            );
        }
        self.announce(&report).await;

        result.map(|()| report)
    }

    async fn remove_each(&self, uris: &[&str], report: &mut RemovalReport) -> CortexResult<()> {
        for &uri in uris {
            if !is_valid_uri(uri) {
                warn!(uri, "Skipping malformed URI");
                report.per_uri.push(RemovalOutcome {
                    uri: uri.to_string(),
                    triples_removed: 0,
                    status: RemovalStatus::Invalid,
                });
                continue;
            }

            let triples = fetch_touching(self.store.as_ref(), self.store_timeout, uri).await?;

            if triples.is_empty() {
                debug!(uri, "Nothing to remove");
                report.per_uri.push(RemovalOutcome {
                    uri: uri.to_string(),
                    triples_removed: 0,
                    status: RemovalStatus::NotFound,
                });
                continue;
            }

            self.audit
                .save(&format!("{}_removed", local_name(uri)), &triples)
                .await?;

            guarded(self.store_timeout, "remove", self.store.remove(&triples)).await?;

            info!(uri, triples = triples.len(), "Removed individual");
            report.per_uri.push(RemovalOutcome {
                uri: uri.to_string(),
                triples_removed: triples.len(),
                status: RemovalStatus::Removed,
            });
            report.removed.extend(triples);
        }
        Ok(())
    }

    /// Publish one event for every URI that was actually removed.
    async fn announce(&self, report: &RemovalReport) {
        let removed_uris: Vec<String> = report.removed_uris().map(str::to_string).collect();
        if removed_uris.is_empty() {
            return;
        }
        publish_quietly(
            self.event_bus.as_deref(),
            KnowledgeEvent::IndividualsRemoved {
                uris: removed_uris,
                triples_removed: report.removed.len(),
                timestamp: Utc::now(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::application::test_support::MockEventBus;
    use crate::domain::vocab::rdfs;
    use crate::domain::{CortexError, Individual, Term, Triple};
    use crate::infrastructure::{InMemoryAuditSink, InMemoryTripleStore};

    const ORG: &str = "http://x/Organization";

    fn graph() -> Graph {
        let mut graph = Graph::new();
        graph.extend(Individual::new("http://x/a", ORG, "Acme").to_graph());
        graph.extend(Individual::new("http://x/b", ORG, "Globex").to_graph());
        graph.add(Triple::iri("http://x/b", "http://x/partner", Term::iri("http://x/a")));
        graph.add(Triple::iri("http://x/c", rdfs::LABEL, Term::literal("Initech")));
        graph
    }

    fn engine(store: Arc<InMemoryTripleStore>) -> RemovalEngine {
        RemovalEngine::new(store, Arc::new(InMemoryAuditSink::new()))
    }

    /// Accepts the first `limit` snapshots, then fails
    struct FailsAfter {
        limit: usize,
        saved: AtomicUsize,
    }

    #[async_trait]
    impl AuditSink for FailsAfter {
        async fn save(&self, name: &str, _graph: &Graph) -> CortexResult<String> {
            if self.saved.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(CortexError::Audit(format!("disk full writing {}", name)));
            }
            Ok(format!("memory://{}", name))
        }
    }

    #[tokio::test]
    async fn test_remove_detaches_subject_and_references() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));
        let bus = Arc::new(MockEventBus::new());
        let engine = engine(store.clone()).with_event_bus(bus.clone());

        let report = engine.remove(&["http://x/a"]).await.unwrap();

        assert_eq!(report.removed.len(), 4);
        assert_eq!(report.per_uri[0].status, RemovalStatus::Removed);
        assert!(store.get_subject_graph("http://x/a", 1).await.unwrap().is_empty());
        assert_eq!(store.get_subject_graph("http://x/b", 1).await.unwrap().len(), 3);

        let events = bus.get_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "individuals_removed");
    }

    #[tokio::test]
    async fn test_partial_success() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));

        let report = engine(store.clone())
            .remove(&["http://x/a", "http://x/missing", "not a uri", "http://x/b"])
            .await
            .unwrap();

        let statuses: Vec<_> = report.per_uri.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                RemovalStatus::Removed,
                RemovalStatus::NotFound,
                RemovalStatus::Invalid,
                RemovalStatus::Removed,
            ]
        );
        // The shared partner link is counted once, under the first URI.
        assert_eq!(report.per_uri[0].triples_removed, 4);
        assert_eq!(report.per_uri[3].triples_removed, 3);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_written_per_uri() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));
        let audit = Arc::new(InMemoryAuditSink::new());
        let engine = RemovalEngine::new(store, audit.clone());

        engine.remove(&["http://x/a", "http://x/c"]).await.unwrap();

        let names: Vec<_> = audit.snapshots().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a_removed", "c_removed"]);
    }

    #[tokio::test]
    async fn test_audit_failure_aborts() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));
        let engine = RemovalEngine::new(store.clone(), Arc::new(InMemoryAuditSink::failing()));

        let err = engine.remove(&["http://x/a"]).await.unwrap_err();
        assert!(matches!(err, CortexError::Audit(_)));
        assert_eq!(store.len().await, graph().len());
    }

    #[tokio::test]
    async fn test_mid_batch_failure_still_announces_committed_removals() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));
        let bus = Arc::new(MockEventBus::new());
        let audit = Arc::new(FailsAfter {
            limit: 1,
            saved: AtomicUsize::new(0),
        });
        let engine = RemovalEngine::new(store.clone(), audit).with_event_bus(bus.clone());

        let err = engine.remove(&["http://x/a", "http://x/b"]).await.unwrap_err();

        assert!(matches!(err, CortexError::Audit(_)));
        assert!(store.get_subject_graph("http://x/a", 1).await.unwrap().is_empty());
        assert_eq!(store.get_subject_graph("http://x/b", 1).await.unwrap().len(), 3);

        let events = bus.get_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            KnowledgeEvent::IndividualsRemoved { uris, triples_removed, .. } => {
                assert_eq!(uris, &vec!["http://x/a".to_string()]);
                assert_eq!(*triples_removed, 4);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(InMemoryTripleStore::with_graph(graph()));
        store.set_fail_mutations(true);

        let err = engine(store).remove(&["http://x/a"]).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
