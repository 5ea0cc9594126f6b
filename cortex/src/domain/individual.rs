// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Named individuals and staged merge records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::graph::{Graph, Literal, Term, Triple};
use super::vocab::{owl, rdf, rdfs, skos};

/// Identifier minted for a new individual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualId(pub Uuid);

impl IndividualId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// `<namespace>/<uuid>`; a namespace already ending in `/` or `#` is used as is.
    pub fn to_uri(&self, namespace: &str) -> String {
        if namespace.ends_with('/') || namespace.ends_with('#') {
            format!("{}{}", namespace, self.0)
        } else {
            format!("{}/{}", namespace, self.0)
        }
    }
}

impl Default for IndividualId {
    fn default() -> Self {
        Self::new()
    }
}

/// A graph entity typed `owl:NamedIndividual` plus at least one concrete class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub uri: String,
    pub classes: Vec<String>,
    pub label: Literal,
    pub alt_labels: Vec<Literal>,
}

impl Individual {
    pub fn new(uri: impl Into<String>, class_uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            classes: vec![class_uri.into()],
            label: Literal::new(label),
            alt_labels: Vec::new(),
        }
    }

    /// Read an individual back from its subject graph. Returns `None` when the
    /// graph lacks the NamedIndividual marker, a concrete class, or a label.
    pub fn from_graph(uri: &str, graph: &Graph) -> Option<Self> {
        let subject = Term::iri(uri);
        let types: Vec<&str> = graph
            .triples_matching(Some(&subject), Some(rdf::TYPE), None)
            .filter_map(|t| t.object.as_iri())
            .collect();

        if !types.contains(&owl::NAMED_INDIVIDUAL) {
            return None;
        }

        let classes: Vec<String> = types
            .into_iter()
            .filter(|t| *t != owl::NAMED_INDIVIDUAL)
            .map(str::to_string)
            .collect();
        if classes.is_empty() {
            return None;
        }

        let label = graph.value(&subject, rdfs::LABEL)?.as_literal()?.clone();
        let alt_labels = graph
            .triples_matching(Some(&subject), Some(skos::ALT_LABEL), None)
            .filter_map(|t| t.object.as_literal().cloned())
            .collect();

        Some(Self {
            uri: uri.to_string(),
            classes,
            label,
            alt_labels,
        })
    }

    /// Minimal triple set: the NamedIndividual marker, every class type, the
    /// canonical label and any alt-labels.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        graph.add(Triple::iri(&self.uri, rdf::TYPE, Term::iri(owl::NAMED_INDIVIDUAL)));
        for class in &self.classes {
            graph.add(Triple::iri(&self.uri, rdf::TYPE, Term::iri(class.as_str())));
        }
        graph.add(Triple::iri(&self.uri, rdfs::LABEL, Term::Literal(self.label.clone())));
        for alt in &self.alt_labels {
            graph.add(Triple::iri(&self.uri, skos::ALT_LABEL, Term::Literal(alt.clone())));
        }
        graph
    }
}

/// Merge staged in memory before any store mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub keep: String,
    pub drop: String,
    pub insert: Graph,
    pub remove: Graph,
}

impl MergeRecord {
    pub fn is_noop(&self) -> bool {
        self.insert.is_empty() && self.remove.is_empty()
    }
}
