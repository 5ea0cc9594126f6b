// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Vocabulary IRIs used by the knowledge-graph core

pub mod rdf {
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
}

pub mod rdfs {
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    pub const RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
    pub const SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
}

pub mod owl {
    pub const CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
    pub const OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const ANNOTATION_PROPERTY: &str = "http://www.w3.org/2002/07/owl#AnnotationProperty";
    pub const UNION_OF: &str = "http://www.w3.org/2002/07/owl#unionOf";
    pub const INTERSECTION_OF: &str = "http://www.w3.org/2002/07/owl#intersectionOf";
    pub const COMPLEMENT_OF: &str = "http://www.w3.org/2002/07/owl#complementOf";
    pub const INVERSE_OF: &str = "http://www.w3.org/2002/07/owl#inverseOf";
}

pub mod skos {
    pub const ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
    pub const DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";
    pub const EXAMPLE: &str = "http://www.w3.org/2004/02/skos/core#example";
}

pub mod abi {
    pub const NAMESPACE: &str = "http://ontology.naas.ai/abi/";
    pub const UNIVERSAL_NAME: &str = "http://ontology.naas.ai/abi/universal_name";
}

/// Default root of the class hierarchy (BFO entity)
pub const BFO_ENTITY: &str = "http://purl.obolibrary.org/obo/BFO_0000001";

/// Predicates carrying an individual's canonical name. A merge never moves
/// these onto the keeper as-is; they become alt-labels instead.
pub const CANONICAL_LABEL_PREDICATES: [&str; 2] = [rdfs::LABEL, abi::UNIVERSAL_NAME];

/// Predicates searched when resolving a label against existing individuals
pub const LABEL_SEARCH_PREDICATES: [&str; 2] = [rdfs::LABEL, skos::ALT_LABEL];

pub fn is_canonical_label(predicate: &str) -> bool {
    CANONICAL_LABEL_PREDICATES.contains(&predicate)
}

/// Local name of an IRI: the segment after the last `#` or `/`.
pub fn local_name(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    trimmed
        .rsplit(['#', '/'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://purl.obolibrary.org/obo/BFO_0000001"), "BFO_0000001");
        assert_eq!(local_name("http://www.w3.org/2002/07/owl#Class"), "Class");
        assert_eq!(local_name("http://x/abc/"), "abc");
        assert_eq!(local_name("urn:thing"), "urn:thing");
    }

    #[test]
    fn test_canonical_label_predicates() {
        assert!(is_canonical_label(rdfs::LABEL));
        assert!(is_canonical_label(abi::UNIVERSAL_NAME));
        assert!(!is_canonical_label(skos::ALT_LABEL));
    }
}
