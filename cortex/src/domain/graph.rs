// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Triple-level entities for the knowledge graph
//!
//! A [`Graph`] is an insertion-ordered, duplicate-free set of [`Triple`]s.
//! Every store call, merge plan and audit snapshot is expressed in terms of
//! these types.

use std::fmt;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Absolute IRI: a scheme, a colon, and no characters N-Triples forbids.
static URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s<>"{}|^`\\]+$"#).expect("static IRI pattern")
});

/// Check whether `value` is an absolute IRI usable as a subject or predicate.
pub fn is_valid_uri(value: &str) -> bool {
    URI_REGEX.is_match(value)
}

/// Typed scalar value carried in object position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    /// Plain string literal
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }
}

/// RDF term: an IRI, a blank node, or a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    Iri { value: String },
    Blank { id: String },
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri { value: value.into() }
    }

    pub fn blank(id: impl Into<String>) -> Self {
        Term::Blank { id: id.into() }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(Literal::new(value))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri { .. })
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank { .. })
    }

    /// Node key used to index subjects: the IRI itself, or `_:id` for blank nodes.
    /// Literals have no node key.
    pub fn node_key(&self) -> Option<String> {
        match self {
            Term::Iri { value } => Some(value.clone()),
            Term::Blank { id } => Some(format!("_:{}", id)),
            Term::Literal(_) => None,
        }
    }

    /// Lexical value regardless of term kind
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri { value } => value,
            Term::Blank { id } => id,
            Term::Literal(lit) => &lit.value,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri { value } => write!(f, "<{}>", value),
            Term::Blank { id } => write!(f, "_:{}", id),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", escape_literal(&lit.value))?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Escape a literal lexical form for N-Triples / SPARQL output.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// A single (subject, predicate, object) statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    /// Shorthand for an IRI-subject triple
    pub fn iri(subject: &str, predicate: &str, object: Term) -> Self {
        Self::new(Term::iri(subject), predicate, object)
    }

    pub fn subject_is(&self, uri: &str) -> bool {
        self.subject.as_iri() == Some(uri)
    }

    pub fn object_is(&self, uri: &str) -> bool {
        self.object.as_iri() == Some(uri)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// Insertion-ordered set of triples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    triples: IndexSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; returns false when it was already present.
    pub fn add(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn extend<I: IntoIterator<Item = Triple>>(&mut self, triples: I) {
        self.triples.extend(triples);
    }

    /// Remove a triple, keeping the relative order of the others.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.shift_remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples matching every provided position; `None` is a wildcard.
    pub fn triples_matching<'g, 'q>(
        &'g self,
        subject: Option<&'q Term>,
        predicate: Option<&'q str>,
        object: Option<&'q Term>,
    ) -> impl Iterator<Item = &'g Triple> + 'q
    where
        'g: 'q,
    {
        self.triples.iter().filter(move |t| {
            subject.map_or(true, |s| &t.subject == s)
                && predicate.map_or(true, |p| t.predicate == p)
                && object.map_or(true, |o| &t.object == o)
        })
    }

    /// First object for `(subject, predicate)`, in insertion order.
    pub fn value(&self, subject: &Term, predicate: &str) -> Option<&Term> {
        self.triples
            .iter()
            .find(|t| &t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Distinct subjects in first-seen order
    pub fn subjects(&self) -> Vec<&Term> {
        let mut seen = IndexSet::new();
        for triple in &self.triples {
            seen.insert(&triple.subject);
        }
        seen.into_iter().collect()
    }

    /// Triples in lexicographic order, used for canonical output.
    pub fn sorted(&self) -> Vec<&Triple> {
        let mut out: Vec<&Triple> = self.triples.iter().collect();
        out.sort();
        out
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = indexmap::set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = indexmap::set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
