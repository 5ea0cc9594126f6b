// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Knowledge Graph Ports
//!
//! Persistence contracts consumed by the application services. The triple
//! store is one logical endpoint; mutating calls on one connection are
//! expected to be serialised by the caller.
//!
//! | Trait | Concern | Implementations |
//! |-------|---------|-----------------|
//! | `TripleStore` | query / insert / remove / subject graph | `InMemoryTripleStore`, `SparqlHttpTripleStore` |
//! | `AuditSink` | pre-mutation snapshots | `FilesystemAuditSink`, `InMemoryAuditSink` |

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use super::error::CortexError;
use super::graph::{Graph, Term};

/// One result row: variable name to bound term
pub type Bindings = BTreeMap<String, Term>;

/// Position in a triple pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        PatternTerm::Var(name.into())
    }

    pub fn iri(value: impl Into<String>) -> Self {
        PatternTerm::Const(Term::iri(value))
    }
}

impl From<Term> for PatternTerm {
    fn from(term: Term) -> Self {
        PatternTerm::Const(term)
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Var(name) => write!(f, "?{}", name),
            PatternTerm::Const(term) => write!(f, "{}", term),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

/// Basic graph pattern query: every pattern must match, bindings are joined
/// left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub patterns: Vec<TriplePattern>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(
        mut self,
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        self.patterns.push(TriplePattern {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `<uri> ?p ?o`
    pub fn subject_triples(uri: &str) -> Self {
        Self::new().pattern(
            PatternTerm::iri(uri),
            PatternTerm::var("p"),
            PatternTerm::var("o"),
        )
    }

    /// `?s ?p <uri>`
    pub fn object_triples(uri: &str) -> Self {
        Self::new().pattern(
            PatternTerm::var("s"),
            PatternTerm::var("p"),
            PatternTerm::iri(uri),
        )
    }

    /// Render as SPARQL SELECT text for remote endpoints.
    pub fn to_sparql(&self) -> String {
        let mut out = String::from("SELECT * WHERE {\n");
        for pattern in &self.patterns {
            out.push_str(&format!(
                "    {} {} {} .\n",
                pattern.subject, pattern.predicate, pattern.object
            ));
        }
        out.push('}');
        if let Some(limit) = self.limit {
            out.push_str(&format!(" LIMIT {}", limit));
        }
        out
    }
}

impl From<&str> for PatternTerm {
    fn from(value: &str) -> Self {
        match value.strip_prefix('?') {
            Some(name) => PatternTerm::var(name),
            None => PatternTerm::iri(value),
        }
    }
}

/// Triple store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0} ms")]
    Timeout(u64),

    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Malformed store response: {0}")]
    Malformed(String),
}

/// Triple store port
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Evaluate a basic graph pattern; rows come back in store order.
    async fn query(&self, query: &Query) -> Result<Vec<Bindings>, StoreError>;

    /// Insert every triple of `graph` as one batch.
    async fn insert(&self, graph: &Graph) -> Result<(), StoreError>;

    /// Remove every triple of `graph` as one batch. Absent triples are ignored.
    async fn remove(&self, graph: &Graph) -> Result<(), StoreError>;

    /// Triples reachable from `uri` within `depth` subject hops.
    async fn get_subject_graph(&self, uri: &str, depth: usize) -> Result<Graph, StoreError>;
}

/// Durable, human-inspectable snapshots written before destructive mutations
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist `graph` under `name`; returns where it was written.
    async fn save(&self, name: &str, graph: &Graph) -> Result<String, CortexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_sparql() {
        let query = Query::new()
            .pattern("?i", crate::domain::vocab::rdf::TYPE, "http://x/Organization")
            .pattern(
                PatternTerm::var("i"),
                PatternTerm::iri(crate::domain::vocab::rdfs::LABEL),
                PatternTerm::var("label"),
            )
            .limit(5);

        let sparql = query.to_sparql();
        assert!(sparql.starts_with("SELECT * WHERE {"));
        assert!(sparql.contains(
            "?i <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://x/Organization> ."
        ));
        assert!(sparql.contains("?label"));
        assert!(sparql.ends_with("} LIMIT 5"));
    }

    #[test]
    fn test_subject_and_object_queries() {
        let q = Query::subject_triples("http://x/a");
        assert_eq!(q.patterns[0].subject, PatternTerm::iri("http://x/a"));
        assert_eq!(q.patterns[0].object, PatternTerm::var("o"));

        let q = Query::object_triples("http://x/a");
        assert_eq!(q.patterns[0].object, PatternTerm::iri("http://x/a"));
        assert_eq!(q.patterns[0].subject, PatternTerm::var("s"));
    }

    #[test]
    fn test_literal_constant_renders_quoted() {
        let q = Query::new().pattern(
            PatternTerm::var("s"),
            PatternTerm::iri(crate::domain::vocab::rdfs::LABEL),
            PatternTerm::Const(Term::literal("Acme \"Corp\"")),
        );
        assert!(q.to_sparql().contains("\"Acme \\\"Corp\\\"\""));
    }
}
