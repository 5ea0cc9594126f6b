// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MergeEngine: Fold One Individual Into Another
//!
//! `merge(keep, drop)` moves every statement about `drop` onto `keep` and
//! retires `drop`. URIs are never rewritten in place: references are rebased
//! and the old triples deleted.
//!
//! ## Staging rules
//!
//! For each triple touching `drop`:
//!
//! - `(drop, p, o)` with a canonical-label `p`: becomes `(keep, skos:altLabel, o)`,
//!   literal datatype and language preserved. The keeper's own label is never
//!   overwritten, and a placeholder label `"unknown"` is not carried over.
//! - `(drop, p, o)` otherwise: rebased to `(keep, p, o)` unless the keeper
//!   already has it.
//! - `(s, p, drop)`: rebased to `(s, p, keep)` unless already present.
//! - Links between `keep` and `drop`, in either direction, are deleted.
//! - Triples with a blank node are deleted without a rebased copy: a blank
//!   node cannot be addressed again once the store has labelled it.
//!
//! Every original triple is staged for removal. The whole [`MergeRecord`] is
//! computed before the first store mutation and snapshotted to the audit sink;
//! commit is insert then remove, with the insert rolled back if the remove
//! fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::label_matching::slugify;
use super::{fetch_touching, guarded, publish_quietly, EventBus, DEFAULT_STORE_TIMEOUT};
use crate::domain::vocab::{is_canonical_label, local_name, rdfs, skos};
use crate::domain::{
    is_valid_uri, AuditSink, CortexError, CortexResult, Graph, KnowledgeEvent, MergeRecord, Term, Triple,
    TripleStore,
};

/// Outcome of a committed merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub keep: String,
    pub drop: String,
    pub inserted: Graph,
    pub removed: Graph,
    /// Audit snapshot locations, insert set first
    pub snapshots: Vec<String>,
    /// Keeper's subject graph after commit
    pub keeper_graph: Graph,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Drop labels that are never promoted to alt-labels
const PLACEHOLDER_LABEL: &str = "unknown";

pub struct MergeEngine {
    store: Arc<dyn TripleStore>,
    audit: Arc<dyn AuditSink>,
    event_bus: Option<Arc<dyn EventBus>>,
    store_timeout: Duration,
}

impl MergeEngine {
    /// Every merge snapshots to `audit` before the store is mutated.
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

    /// Stage a merge without touching any store.
    ///
    /// `keep_triples` and `drop_triples` must hold every triple where the
    /// respective URI is subject or object.
    pub fn plan(keep: &str, drop: &str, keep_triples: &Graph, drop_triples: &Graph) -> MergeRecord {
        let keep_term = Term::iri(keep);
        let mut record = MergeRecord {
            keep: keep.to_string(),
            drop: drop.to_string(),
            ..Default::default()
        };

        let keeper_has = |triple: &Triple| keep_triples.contains(triple);
        let rebase = |term: &Term| {
            if term.as_iri() == Some(drop) {
                keep_term.clone()
            } else {
                term.clone()
            }
        };

        for triple in drop_triples {
            let from_drop = triple.subject_is(drop);
            if !from_drop && !triple.object_is(drop) {
                continue;
            }
            record.remove.add(triple.clone());

            if triple.subject.is_blank() || triple.object.is_blank() {
                warn!(keep, drop, triple = %triple, "Blank node cannot be rebased, deleting link only");
                continue;
            }

            let staged = if from_drop && is_canonical_label(&triple.predicate) {
                let as_label = Triple::new(keep_term.clone(), rdfs::LABEL, triple.object.clone());
                let placeholder = triple.object.lexical().trim().eq_ignore_ascii_case(PLACEHOLDER_LABEL);
                (!placeholder && !keeper_has(&as_label))
                    .then(|| Triple::new(keep_term.clone(), skos::ALT_LABEL, triple.object.clone()))
            } else if from_drop {
                // A drop-to-keeper link has no meaning once drop is gone.
                (!triple.object_is(keep))
                    .then(|| Triple::new(keep_term.clone(), triple.predicate.as_str(), rebase(&triple.object)))
            } else {
                // Same for keeper-to-drop.
                (triple.subject != keep_term)
                    .then(|| Triple::new(triple.subject.clone(), triple.predicate.as_str(), keep_term.clone()))
            };

            if let Some(staged) = staged.filter(|t| !keeper_has(t)) {
                record.insert.add(staged);
            }
        }

        record
    }

    /// Merge `drop` into `keep` and retire `drop`.
    pub async fn merge(&self, keep: &str, drop: &str) -> CortexResult<MergeReport> {
        for uri in [keep, drop] {
            if !is_valid_uri(uri) {
                return Err(CortexError::validation(format!("invalid URI: {}", uri)));
            }
        }
        if keep == drop {
            return Err(CortexError::validation(format!("cannot merge {} into itself", keep)));
        }

        let drop_triples = fetch_touching(self.store.as_ref(), self.store_timeout, drop).await?;
        if drop_triples.is_empty() {
            info!(keep, drop, "Nothing to merge: drop has no triples");
            return Ok(MergeReport {
                keep: keep.to_string(),
                drop: drop.to_string(),
                ..Default::default()
            });
        }
        let keep_triples = fetch_touching(self.store.as_ref(), self.store_timeout, keep).await?;

        let record = Self::plan(keep, drop, &keep_triples, &drop_triples);
        let snapshots = self.snapshot(&record, &keep_triples, &drop_triples).await?;

        self.commit(&record).await?;

        let keeper_graph = guarded(
            self.store_timeout,
            "get_subject_graph",
            self.store.get_subject_graph(keep, 1),
        )
        .await?;

        info!(
            keep,
            drop,
            inserted = record.insert.len(),
            removed = record.remove.len(),
            "Merged individuals"
        );

        publish_quietly(
            self.event_bus.as_deref(),
            KnowledgeEvent::IndividualsMerged {
                keep: keep.to_string(),
                drop: drop.to_string(),
                inserted: record.insert.len(),
                removed: record.remove.len(),
                timestamp: Utc::now(),
            },
        )
        .await;

        Ok(MergeReport {
            keep: record.keep,
            drop: record.drop,
            inserted: record.insert,
            removed: record.remove,
            snapshots,
            keeper_graph,
        })
    }

    /// Merge each `(keep, drop)` pair in order. Stops at the first failure;
    /// pairs merged before it stay committed.
    pub async fn merge_all(&self, pairs: &[(&str, &str)]) -> CortexResult<Vec<MergeReport>> {
        let mut reports = Vec::with_capacity(pairs.len());
        for (index, (keep, drop)) in pairs.iter().enumerate() {
            info!(keep, drop, "Processing merge {}/{}", index + 1, pairs.len());
            reports.push(self.merge(keep, drop).await?);
        }
        Ok(reports)
    }

    /// Persist both staged sets before anything is mutated. The insert set is
    /// named after the keeper, the removed set after the individual it retires.
    async fn snapshot(
        &self,
        record: &MergeRecord,
        keep_triples: &Graph,
        drop_triples: &Graph,
    ) -> CortexResult<Vec<String>> {
        let stem = |uri: &str, triples: &Graph| {
            let label = triples
                .value(&Term::iri(uri), rdfs::LABEL)
                .map(|t| t.lexical().to_string())
                .unwrap_or_default();
            format!("{}_{}", slugify(&label), local_name(uri))
        };

        let merged = self
            .audit
            .save(&format!("{}_merged", stem(&record.keep, keep_triples)), &record.insert)
            .await?;
        let removed = self
            .audit
            .save(&format!("{}_removed", stem(&record.drop, drop_triples)), &record.remove)
            .await?;
        Ok(vec![merged, removed])
    }

    async fn commit(&self, record: &MergeRecord) -> CortexResult<()> {
        if !record.insert.is_empty() {
            guarded(self.store_timeout, "insert", self.store.insert(&record.insert)).await?;
        }

        if let Err(err) = guarded(self.store_timeout, "remove", self.store.remove(&record.remove)).await {
            warn!(keep = %record.keep, drop = %record.drop, "Remove failed, rolling back staged insert");
            if !record.insert.is_empty() {
                if let Err(rollback) =
                    guarded(self.store_timeout, "remove", self.store.remove(&record.insert)).await
                {
                    error!(
                        keep = %record.keep,
                        drop = %record.drop,
                        error = %rollback,
                        "Rollback failed; recover from the audit snapshot"
                    );
                }
            }
            return Err(err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::MockEventBus;
    use crate::domain::vocab::{abi, owl, rdf};
    use crate::domain::{Literal, Query};
    use crate::infrastructure::{InMemoryAuditSink, InMemoryTripleStore};

    const ORG: &str = "http://x/Organization";
    const A: &str = "http://x/a";
    const B: &str = "http://x/b";
    const WEBSITE: &str = "http://x/website";

    fn acme_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add(Triple::iri(A, rdf::TYPE, Term::iri(owl::NAMED_INDIVIDUAL)));
        graph.add(Triple::iri(A, rdf::TYPE, Term::iri(ORG)));
        graph.add(Triple::iri(A, rdfs::LABEL, Term::literal("Acme Inc")));

        graph.add(Triple::iri(B, rdf::TYPE, Term::iri(ORG)));
        graph.add(Triple::iri(B, WEBSITE, Term::literal("acme.com")));
        graph.add(Triple::iri(B, rdfs::LABEL, Term::Literal(Literal::lang("Acme Incorporated", "en"))));
        graph
    }

    fn engine(store: Arc<InMemoryTripleStore>) -> (MergeEngine, Arc<InMemoryAuditSink>) {
        let audit = Arc::new(InMemoryAuditSink::new());
        (MergeEngine::new(store, audit.clone()), audit)
    }

    #[test]
    fn test_plan_is_pure() {
        let mut keep_triples = Graph::new();
        keep_triples.add(Triple::iri(A, rdf::TYPE, Term::iri(ORG)));
        keep_triples.add(Triple::iri(A, rdfs::LABEL, Term::literal("Acme")));

        let mut drop_triples = Graph::new();
        drop_triples.add(Triple::iri(B, rdf::TYPE, Term::iri(ORG)));
        drop_triples.add(Triple::iri(B, abi::UNIVERSAL_NAME, Term::literal("ACME")));
        drop_triples.add(Triple::iri(B, rdfs::LABEL, Term::literal("Acme")));
        drop_triples.add(Triple::iri("http://x/p", "http://x/worksFor", Term::iri(B)));
        drop_triples.add(Triple::iri(B, "http://x/sameAs", Term::iri(B)));
        drop_triples.add(Triple::iri(B, "http://x/partOf", Term::iri(A)));

        let record = MergeEngine::plan(A, B, &keep_triples, &drop_triples);

        // Every drop triple is removed.
        assert_eq!(record.remove.len(), drop_triples.len());
        // Type is a duplicate, label equals the keeper's label.
        assert!(!record.insert.contains(&Triple::iri(A, rdf::TYPE, Term::iri(ORG))));
        assert!(!record.insert.contains(&Triple::iri(A, skos::ALT_LABEL, Term::literal("Acme"))));
        // universal_name turns into an alt-label.
        assert!(record.insert.contains(&Triple::iri(A, skos::ALT_LABEL, Term::literal("ACME"))));
        assert!(record.insert.contains(&Triple::iri("http://x/p", "http://x/worksFor", Term::iri(A))));
        assert!(record.insert.contains(&Triple::iri(A, "http://x/sameAs", Term::iri(A))));
        // Drop-to-keeper link is not turned into a keeper self-loop.
        assert!(!record.insert.contains(&Triple::iri(A, "http://x/partOf", Term::iri(A))));
        assert_eq!(record.insert.len(), 3);
        assert!(record.insert.iter().all(|t| t.predicate != rdfs::LABEL));
    }

    #[test]
    fn test_placeholder_label_is_not_promoted() {
        let mut drop_triples = Graph::new();
        drop_triples.add(Triple::iri(B, rdfs::LABEL, Term::literal("Unknown")));
        drop_triples.add(Triple::iri(B, abi::UNIVERSAL_NAME, Term::literal(" UNKNOWN ")));
        drop_triples.add(Triple::iri(B, skos::ALT_LABEL, Term::literal("Unknown Corp")));

        let record = MergeEngine::plan(A, B, &Graph::new(), &drop_triples);

        assert_eq!(record.remove.len(), 3);
        let inserted: Vec<_> = record.insert.iter().cloned().collect();
        assert_eq!(
            inserted,
            vec![Triple::iri(A, skos::ALT_LABEL, Term::literal("Unknown Corp"))]
        );
    }

    #[test]
    fn test_blank_node_links_are_removed_not_rebased() {
        let mut drop_triples = Graph::new();
        drop_triples.add(Triple::iri(B, "http://x/address", Term::blank("b0")));
        drop_triples.add(Triple::new(Term::blank("b1"), "http://x/mentions", Term::iri(B)));
        drop_triples.add(Triple::iri(B, WEBSITE, Term::literal("acme.com")));

        let record = MergeEngine::plan(A, B, &Graph::new(), &drop_triples);

        assert_eq!(record.remove.len(), 3);
        assert_eq!(record.insert.len(), 1);
        assert!(record.insert.iter().all(|t| !t.subject.is_blank() && !t.object.is_blank()));
    }

    #[tokio::test]
    async fn test_merge_rebases_and_retires() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let bus = Arc::new(MockEventBus::new());
        let (engine, audit) = engine(store.clone());
        let engine = engine.with_event_bus(bus.clone());

        let report = engine.merge(A, B).await.unwrap();

        assert_eq!(report.removed.len(), 3);
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.keeper_graph.len(), 5);
        assert!(report.keeper_graph.contains(&Triple::iri(
            A,
            skos::ALT_LABEL,
            Term::Literal(Literal::lang("Acme Incorporated", "en"))
        )));
        assert_eq!(
            report.keeper_graph.value(&Term::iri(A), rdfs::LABEL),
            Some(&Term::literal("Acme Inc"))
        );

        assert!(store.get_subject_graph(B, 1).await.unwrap().is_empty());
        assert!(store.query(&Query::object_triples(B)).await.unwrap().is_empty());

        let snapshots = audit.snapshots().await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].0, "acme_inc_a_merged");
        assert_eq!(snapshots[1].0, "acme_incorporated_b_removed");
        assert_eq!(snapshots[1].1, report.removed);
        assert_eq!(report.snapshots.len(), 2);

        assert_eq!(bus.get_events()[0].event_type(), "individuals_merged");
    }

    #[tokio::test]
    async fn test_every_merge_writes_snapshots() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let audit = Arc::new(InMemoryAuditSink::new());

        let report = MergeEngine::new(store, audit.clone()).merge(A, B).await.unwrap();

        assert_eq!(report.snapshots.len(), 2);
        assert_eq!(audit.snapshots().await.len(), 2);
    }

    #[tokio::test]
    async fn test_object_references_are_redirected() {
        let mut graph = acme_graph();
        graph.add(Triple::iri("http://x/alice", "http://x/worksFor", Term::iri(B)));
        graph.add(Triple::iri("http://x/bob", "http://x/worksFor", Term::iri(A)));
        graph.add(Triple::iri("http://x/bob", "http://x/worksFor", Term::iri(B)));
        graph.add(Triple::iri(A, "http://x/sameAs", Term::iri(B)));
        graph.add(Triple::iri(B, "http://x/sameAs", Term::iri(A)));
        let store = Arc::new(InMemoryTripleStore::with_graph(graph));

        engine(store.clone()).0.merge(A, B).await.unwrap();

        let refs = store.query(&Query::object_triples(A)).await.unwrap();
        assert_eq!(refs.len(), 2);
        let snapshot = store.snapshot().await;
        assert!(snapshot.iter().all(|t| !t.subject_is(B) && !t.object_is(B)));
        assert!(!snapshot.contains(&Triple::iri(A, "http://x/sameAs", Term::iri(A))));
    }

    #[tokio::test]
    async fn test_merge_all_processes_pairs_in_order() {
        const C: &str = "http://x/c";
        let mut graph = acme_graph();
        graph.add(Triple::iri(C, rdfs::LABEL, Term::literal("ACME Europe")));
        graph.add(Triple::iri(C, "http://x/worksWith", Term::iri(B)));
        let store = Arc::new(InMemoryTripleStore::with_graph(graph));
        let (engine, audit) = engine(store.clone());

        let reports = engine.merge_all(&[(A, B), (A, C)]).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].drop, C);
        let keeper = store.get_subject_graph(A, 1).await.unwrap();
        assert!(keeper.contains(&Triple::iri(A, skos::ALT_LABEL, Term::literal("ACME Europe"))));
        // C's link to B was redirected onto A by the first merge and dropped by the second.
        assert!(!keeper.contains(&Triple::iri(A, "http://x/worksWith", Term::iri(A))));
        assert!(store.snapshot().await.iter().all(|t| !t.subject_is(C) && !t.object_is(C)));
        assert_eq!(audit.snapshots().await.len(), 4);
    }

    #[tokio::test]
    async fn test_merge_all_stops_at_first_failure() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let (engine, _) = engine(store.clone());

        let err = engine.merge_all(&[(A, B), (A, A)]).await.unwrap_err();

        assert!(err.is_validation());
        assert!(store.get_subject_graph(B, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_merge_is_rejected() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let before = store.snapshot().await;

        let err = engine(store.clone()).0.merge(A, A).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_empty_drop_is_noop() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let (engine, audit) = engine(store.clone());

        let report = engine.merge(A, "http://x/nobody").await.unwrap();
        assert!(report.is_noop());
        assert!(audit.snapshots().await.is_empty());
        assert_eq!(store.len().await, 6);
    }

    #[tokio::test]
    async fn test_audit_failure_aborts_before_mutation() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        let before = store.snapshot().await;
        let engine = MergeEngine::new(store.clone(), Arc::new(InMemoryAuditSink::failing()));

        let err = engine.merge(A, B).await.unwrap_err();
        assert!(matches!(err, CortexError::Audit(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_graph_untouched() {
        let store = Arc::new(InMemoryTripleStore::with_graph(acme_graph()));
        store.set_fail_mutations(true);
        let before = store.snapshot().await;

        let err = engine(store.clone()).0.merge(A, B).await.unwrap_err();
        assert!(err.is_store_unavailable());
        assert_eq!(store.snapshot().await, before);
    }
}
