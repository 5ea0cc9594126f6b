// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory triple store implementation
//! Used for tests and embedded deployments; remote stores go through
//! `SparqlHttpTripleStore`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::graph::{Graph, Term, Triple};
use crate::domain::repository::{Bindings, PatternTerm, Query, StoreError, TriplePattern, TripleStore};

/// In-memory implementation of TripleStore
pub struct InMemoryTripleStore {
    graph: Arc<RwLock<Graph>>,
    fail_mutations: AtomicBool,
}

impl InMemoryTripleStore {
    pub fn new() -> Self {
        Self::with_graph(Graph::new())
    }

    pub fn with_graph(graph: Graph) -> Self {
        Self {
            graph: Arc::new(RwLock::new(graph)),
            fail_mutations: AtomicBool::new(false),
        }
    }

    /// Make every subsequent insert/remove fail as if the store were down.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Copy of the current contents
    pub async fn snapshot(&self) -> Graph {
        self.graph.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.graph.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.graph.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is not accepting writes".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryTripleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Bind or compare one pattern position against a concrete term.
fn unify(pattern: &PatternTerm, term: &Term, row: &mut Bindings) -> bool {
    match pattern {
        PatternTerm::Const(expected) => expected == term,
        PatternTerm::Var(name) => match row.get(name) {
            Some(bound) => bound == term,
            None => {
                row.insert(name.clone(), term.clone());
                true
            }
        },
    }
}

fn match_triple(pattern: &TriplePattern, triple: &Triple, row: &Bindings) -> Option<Bindings> {
    let mut next = row.clone();
    let predicate = Term::iri(triple.predicate.as_str());
    if unify(&pattern.subject, &triple.subject, &mut next)
        && unify(&pattern.predicate, &predicate, &mut next)
        && unify(&pattern.object, &triple.object, &mut next)
    {
        Some(next)
    } else {
        None
    }
}

/// Left-to-right join of the patterns over the graph, in insertion order.
fn evaluate(graph: &Graph, query: &Query) -> Vec<Bindings> {
    let mut rows = vec![Bindings::new()];
    for pattern in &query.patterns {
        let mut next = Vec::new();
        for row in &rows {
            for triple in graph.iter() {
                if let Some(bound) = match_triple(pattern, triple, row) {
                    next.push(bound);
                }
            }
        }
        rows = next;
        if rows.is_empty() {
            break;
        }
    }
    if query.patterns.is_empty() {
        rows.clear();
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl TripleStore for InMemoryTripleStore {
    async fn query(&self, query: &Query) -> Result<Vec<Bindings>, StoreError> {
        let graph = self.graph.read().await;
        let rows = evaluate(&graph, query);
        debug!(patterns = query.patterns.len(), rows = rows.len(), "Evaluated query");
        Ok(rows)
    }

    async fn insert(&self, graph: &Graph) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut store = self.graph.write().await;
        store.extend(graph.iter().cloned());
        Ok(())
    }

    async fn remove(&self, graph: &Graph) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut store = self.graph.write().await;
        for triple in graph {
            store.remove(triple);
        }
        Ok(())
    }

    async fn get_subject_graph(&self, uri: &str, depth: usize) -> Result<Graph, StoreError> {
        let graph = self.graph.read().await;

        let mut result = Graph::new();
        let mut visited: HashSet<Term> = HashSet::new();
        let mut frontier = vec![Term::iri(uri)];

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in frontier {
                if !visited.insert(node.clone()) {
                    continue;
                }
                for triple in graph.triples_matching(Some(&node), None, None) {
                    result.add(triple.clone());
                    if (triple.object.is_iri() || triple.object.is_blank())
                        && !visited.contains(&triple.object)
                    {
                        next.push(triple.object.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(result)
    }
}
