// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! N-Triples codec for audit snapshots
//!
//! Parsing and serialisation go through `oxttl`; this module only maps
//! between `oxrdf` terms and the domain [`Term`]. Output is canonical:
//! triples are written in sorted order, so two snapshots of the same graph
//! are byte-identical and diff cleanly.

use oxrdf::vocab::xsd;
use oxrdf::{
    BlankNode, Literal as RdfLiteral, NamedNode, Subject, Term as RdfTerm, Triple as RdfTriple,
};
use oxttl::{NTriplesParser, NTriplesSerializer};
use thiserror::Error;

use crate::domain::graph::{Graph, Literal, Term, Triple};

#[derive(Debug, Error)]
pub enum NTriplesError {
    #[error("N-Triples syntax error: {0}")]
    Syntax(String),

    #[error("Term cannot be written as N-Triples: {0}")]
    Term(String),

    #[error("N-Triples I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialise `graph` as N-Triples in canonical triple order.
pub fn serialize(graph: &Graph) -> Result<String, NTriplesError> {
    let mut buffer = Vec::new();
    let mut writer = NTriplesSerializer::new().for_writer(&mut buffer);
    for triple in graph.sorted() {
        writer.serialize_triple(&to_rdf(triple)?)?;
    }
    writer.finish();

    String::from_utf8(buffer).map_err(|e| NTriplesError::Term(e.to_string()))
}

/// Parse an N-Triples document.
pub fn parse(input: &str) -> Result<Graph, NTriplesError> {
    let mut graph = Graph::new();
    for triple in NTriplesParser::new().for_reader(input.as_bytes()) {
        let triple = triple.map_err(|e| NTriplesError::Syntax(e.to_string()))?;
        graph.add(from_rdf(triple)?);
    }
    Ok(graph)
}

fn named(iri: &str) -> Result<NamedNode, NTriplesError> {
    NamedNode::new(iri).map_err(|e| NTriplesError::Term(format!("<{}>: {}", iri, e)))
}

fn blank(id: &str) -> Result<BlankNode, NTriplesError> {
    BlankNode::new(id).map_err(|e| NTriplesError::Term(format!("_:{}: {}", id, e)))
}

pub(crate) fn to_rdf(triple: &Triple) -> Result<RdfTriple, NTriplesError> {
    let subject: Subject = match &triple.subject {
        Term::Iri { value } => named(value)?.into(),
        Term::Blank { id } => blank(id)?.into(),
        Term::Literal(_) => {
            return Err(NTriplesError::Term(format!("literal subject in {}", triple)));
        }
    };
    Ok(RdfTriple::new(subject, named(&triple.predicate)?, to_rdf_term(&triple.object)?))
}

fn to_rdf_term(term: &Term) -> Result<RdfTerm, NTriplesError> {
    Ok(match term {
        Term::Iri { value } => named(value)?.into(),
        Term::Blank { id } => blank(id)?.into(),
        Term::Literal(literal) => match (&literal.language, &literal.datatype) {
            (Some(language), _) => RdfLiteral::new_language_tagged_literal(literal.value.as_str(), language.as_str())
                .map_err(|e| NTriplesError::Term(format!("@{}: {}", language, e)))?
                .into(),
            (None, Some(datatype)) => RdfLiteral::new_typed_literal(literal.value.as_str(), named(datatype)?).into(),
            (None, None) => RdfLiteral::new_simple_literal(literal.value.as_str()).into(),
        },
    })
}

pub(crate) fn from_rdf(triple: RdfTriple) -> Result<Triple, NTriplesError> {
    let subject = from_rdf_term(RdfTerm::from(triple.subject))?;
    let object = from_rdf_term(triple.object)?;
    Ok(Triple::new(subject, triple.predicate.as_str(), object))
}

/// Map an `oxrdf` term onto the domain model. Plain `xsd:string` literals
/// come back untyped.
pub(crate) fn from_rdf_term(term: RdfTerm) -> Result<Term, NTriplesError> {
    match term {
        RdfTerm::NamedNode(node) => Ok(Term::iri(node.as_str())),
        RdfTerm::BlankNode(node) => Ok(Term::blank(node.as_str())),
        RdfTerm::Literal(literal) => {
            let value = literal.value();
            let mapped = if let Some(language) = literal.language() {
                Literal::lang(value, language)
            } else if literal.datatype() == xsd::STRING {
                Literal::new(value)
            } else {
                Literal::typed(value, literal.datatype().as_str())
            };
            Ok(Term::Literal(mapped))
        }
        // Quoted triples (RDF-star) have no domain counterpart.
        #[allow(unreachable_patterns)]
        other => Err(NTriplesError::Term(format!("unsupported term {}", other))),
    }
}
