// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # EntityResolver: Fuzzy Individual Lookup
//!
//! Finds existing individuals whose canonical label or alt-label matches a
//! candidate label, optionally restricted to one class.
//!
//! ## Ranking
//!
//! Labels are normalised (case, diacritics, punctuation) before comparison.
//! Every candidate that overlaps the query is scored with
//! [`token_set_ratio`](super::label_matching::token_set_ratio); results are
//! sorted by descending score, deduplicated by URI keeping the best score, and
//! truncated to `limit`. Equal scores keep store order.
//!
//! An ambiguous lookup is not an error: the caller gets the ranked list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::label_matching::{labels_overlap, token_set_ratio};
use super::{guarded, DEFAULT_STORE_TIMEOUT};
use crate::domain::vocab::{owl, rdf, LABEL_SEARCH_PREDICATES};
use crate::domain::{is_valid_uri, CortexError, CortexResult, PatternTerm, Query, Term, TripleStore};

/// One ranked match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCandidate {
    pub uri: String,
    /// The label (canonical or alt) that produced the score
    pub label: String,
    pub score: u8,
}

pub struct EntityResolver {
    store: Arc<dyn TripleStore>,
    store_timeout: Duration,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Rank existing individuals against `label`.
    pub async fn resolve(
        &self,
        label: &str,
        class_uri: Option<&str>,
        limit: usize,
    ) -> CortexResult<Vec<ResolvedCandidate>> {
        if label.trim().is_empty() {
            return Err(CortexError::validation("label must not be blank"));
        }
        if let Some(class_uri) = class_uri {
            if !is_valid_uri(class_uri) {
                return Err(CortexError::validation(format!("invalid class URI: {}", class_uri)));
            }
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for predicate in LABEL_SEARCH_PREDICATES {
            let query = candidate_query(class_uri, predicate);
            let rows = guarded(self.store_timeout, "query", self.store.query(&query)).await?;

            for row in rows {
                let (Some(Term::Iri { value: uri }), Some(Term::Literal(candidate))) =
                    (row.get("s"), row.get("label"))
                else {
                    continue;
                };
                if !labels_overlap(label, &candidate.value) {
                    continue;
                }
                scored.push(ResolvedCandidate {
                    uri: uri.clone(),
                    label: candidate.value.clone(),
                    score: token_set_ratio(label, &candidate.value),
                });
            }
        }

        // Stable sort: equal scores keep store order.
        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let mut seen = HashSet::new();
        let ranked: Vec<ResolvedCandidate> = scored
            .into_iter()
            .filter(|c| seen.insert(c.uri.clone()))
            .take(limit)
            .collect();

        debug!(
            label,
            class_uri = class_uri.unwrap_or("*"),
            candidates = ranked.len(),
            top_score = ranked.first().map(|c| c.score),
            "Resolved label"
        );

        Ok(ranked)
    }
}

/// Individuals of `class_uri` (or any NamedIndividual) with a label on `predicate`.
fn candidate_query(class_uri: Option<&str>, predicate: &str) -> Query {
    let mut query = Query::new().pattern(
        PatternTerm::var("s"),
        PatternTerm::iri(rdf::TYPE),
        PatternTerm::iri(owl::NAMED_INDIVIDUAL),
    );
    if let Some(class_uri) = class_uri {
        query = query.pattern(
            PatternTerm::var("s"),
            PatternTerm::iri(rdf::TYPE),
            PatternTerm::iri(class_uri),
        );
    }
    query.pattern(
        PatternTerm::var("s"),
        PatternTerm::iri(predicate),
        PatternTerm::var("label"),
    )
}
