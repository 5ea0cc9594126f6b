// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// SPARQL 1.1 Protocol Adapter
//
// Anti-Corruption Layer for remote triple stores (Fuseki, GraphDB, Oxigraph
// server, ...). Queries go to the query endpoint as form-encoded SELECTs and
// come back as application/sparql-results+json; mutations go to the update
// endpoint as INSERT DATA / DELETE DATA.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use tracing::{debug, warn};

use super::ntriples::from_rdf_term;
use crate::domain::graph::{Graph, Term, Triple};
use crate::domain::repository::{Bindings, Query, StoreError, TripleStore};

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

pub struct SparqlHttpTripleStore {
    client: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
    timeout: Duration,
}

impl SparqlHttpTripleStore {
    /// `update_endpoint` defaults to the query endpoint when `None`.
    pub fn new(query_endpoint: String, update_endpoint: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            update_endpoint: update_endpoint.unwrap_or_else(|| query_endpoint.clone()),
            query_endpoint,
            timeout,
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout.as_millis() as u64)
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected(format!("HTTP {}: {}", status, error_text)))
    }

    async fn update(&self, update: String) -> Result<(), StoreError> {
        debug!(endpoint = %self.update_endpoint, bytes = update.len(), "Sending SPARQL update");
        let response = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", update)])
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        Self::check(response).await?;
        Ok(())
    }
}

fn contains_blank(triple: &Triple) -> bool {
    triple.subject.is_blank() || triple.object.is_blank()
}

/// Blank nodes cannot be named in DELETE DATA; match them as variables.
fn blank_as_var(term: &Term) -> String {
    match term {
        Term::Blank { id } => format!("?b_{}", id.replace(|c: char| !c.is_ascii_alphanumeric(), "_")),
        other => other.to_string(),
    }
}

fn malformed(err: impl std::fmt::Display) -> StoreError {
    StoreError::Malformed(format!("Failed to parse results: {}", err))
}

/// Decode an `application/sparql-results+json` SELECT response.
fn decode_solutions(body: &[u8]) -> Result<Vec<Bindings>, StoreError> {
    let parser = QueryResultsParser::from_format(QueryResultsFormat::Json);
    let ReaderQueryResultsParserOutput::Solutions(solutions) = parser.for_reader(body).map_err(malformed)? else {
        return Err(StoreError::Malformed("expected SELECT solutions, got a boolean".to_string()));
    };

    let mut rows = Vec::new();
    for solution in solutions {
        let solution = solution.map_err(malformed)?;
        let mut row = Bindings::new();
        for (variable, term) in solution.iter() {
            row.insert(variable.as_str().to_string(), from_rdf_term(term.clone()).map_err(malformed)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Each `_:x` in INSERT DATA mints a fresh node, so blank objects are never
/// linked to an existing one.
fn insert_data(graph: &Graph) -> String {
    let blank = graph.iter().filter(|t| contains_blank(t)).count();
    if blank > 0 {
        warn!(triples = blank, "INSERT DATA with blank nodes creates new nodes");
    }

    let body: Vec<String> = graph.iter().map(|t| format!("    {}", t)).collect();
    format!("INSERT DATA {{\n{}\n}}", body.join("\n"))
}

fn delete_statements(graph: &Graph) -> String {
    let (blank, ground): (Vec<&Triple>, Vec<&Triple>) = graph.iter().partition(|t| contains_blank(t));

    let mut parts = Vec::new();
    if !ground.is_empty() {
        let body: Vec<String> = ground.iter().map(|t| format!("    {}", t)).collect();
        parts.push(format!("DELETE DATA {{\n{}\n}}", body.join("\n")));
    }
    if !blank.is_empty() {
        let body: Vec<String> = blank
            .iter()
            .map(|t| format!("    {} <{}> {} .", blank_as_var(&t.subject), t.predicate, blank_as_var(&t.object)))
            .collect();
        parts.push(format!("DELETE WHERE {{\n{}\n}}", body.join("\n")));
    }
    parts.join(" ;\n")
}

#[async_trait]
impl TripleStore for SparqlHttpTripleStore {
    async fn query(&self, query: &Query) -> Result<Vec<Bindings>, StoreError> {
        let sparql = query.to_sparql();
        debug!(endpoint = %self.query_endpoint, "Sending SPARQL query");

        let response = self
            .client
            .post(&self.query_endpoint)
            .header(reqwest::header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", sparql)])
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let response = Self::check(response).await?;

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;
        decode_solutions(&body)
    }

    async fn insert(&self, graph: &Graph) -> Result<(), StoreError> {
        if graph.is_empty() {
            return Ok(());
        }
        self.update(insert_data(graph)).await
    }

    async fn remove(&self, graph: &Graph) -> Result<(), StoreError> {
        if graph.is_empty() {
            return Ok(());
        }
        self.update(delete_statements(graph)).await
    }

    /// Follows IRI objects only: blank node labels are not stable across requests.
    async fn get_subject_graph(&self, uri: &str, depth: usize) -> Result<Graph, StoreError> {
        let mut result = Graph::new();
        let mut visited = HashSet::new();
        let mut frontier = vec![uri.to_string()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in frontier {
                if !visited.insert(node.clone()) {
                    continue;
                }
                let subject = Term::iri(node.as_str());
                for row in self.query(&Query::subject_triples(&node)).await? {
                    let (Some(Term::Iri { value: p }), Some(o)) = (row.get("p"), row.get("o")) else {
                        continue;
                    };
                    if let Some(object) = o.as_iri() {
                        if !visited.contains(object) {
                            next.push(object.to_string());
                        }
                    }
                    result.add(Triple::new(subject.clone(), p.as_str(), o.clone()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Literal;
    use mockito::Matcher;

    const RESULTS: &str = r#"{
        "head": {"vars": ["p", "o"]},
        "results": {"bindings": [
            {"p": {"type": "uri", "value": "http://www.w3.org/2000/01/rdf-schema#label"},
             "o": {"type": "literal", "value": "Acme", "xml:lang": "en"}},
            {"p": {"type": "uri", "value": "http://x/age"},
             "o": {"type": "literal", "value": "42", "datatype": "http://www.w3.org/2001/XMLSchema#integer"}},
            {"p": {"type": "uri", "value": "http://x/address"},
             "o": {"type": "bnode", "value": "b0"}}
        ]}
    }"#;

    fn store(url: &str) -> SparqlHttpTripleStore {
        SparqlHttpTripleStore::new(format!("{}/query", url), Some(format!("{}/update", url)), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_decodes_bindings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/query")
            .match_header("accept", SPARQL_RESULTS_JSON)
            .match_body(Matcher::Regex("query=SELECT".to_string()))
            .with_status(200)
            .with_header("content-type", SPARQL_RESULTS_JSON)
            .with_body(RESULTS)
            .create_async()
            .await;

        let rows = store(&server.url())
            .query(&Query::subject_triples("http://x/acme"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["o"], Term::Literal(Literal::lang("Acme", "en")));
        assert_eq!(
            rows[1]["o"],
            Term::Literal(Literal::typed("42", "http://www.w3.org/2001/XMLSchema#integer"))
        );
        assert_eq!(rows[2]["o"], Term::blank("b0"));
    }

    #[tokio::test]
    async fn test_insert_posts_update() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/update")
            .match_body(Matcher::Regex("update=INSERT\\+DATA".to_string()))
            .with_status(204)
            .create_async()
            .await;

        let mut graph = Graph::new();
        graph.add(Triple::iri("http://x/a", "http://x/p", Term::literal("v")));
        store(&server.url()).insert(&graph).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/update")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut graph = Graph::new();
        graph.add(Triple::iri("http://x/a", "http://x/p", Term::literal("v")));
        let err = store(&server.url()).remove(&graph).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let store = SparqlHttpTripleStore::new("http://127.0.0.1:9/query".to_string(), None, Duration::from_secs(2))
            .unwrap();
        let err = store.query(&Query::subject_triples("http://x/a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_) | StoreError::Timeout(_)));
    }

    #[test]
    fn test_delete_statements_split_blank_nodes() {
        let mut graph = Graph::new();
        graph.add(Triple::iri("http://x/a", "http://x/p", Term::literal("v")));
        graph.add(Triple::iri("http://x/a", "http://x/addr", Term::blank("b0")));

        let update = delete_statements(&graph);
        assert!(update.starts_with("DELETE DATA {"));
        assert!(update.contains("DELETE WHERE {\n    <http://x/a> <http://x/addr> ?b_b0 ."));
    }

    #[test]
    fn test_decode_rejects_non_solution_bodies() {
        assert!(matches!(decode_solutions(br#"{"head": {}, "boolean": true}"#), Err(StoreError::Malformed(_))));
        assert!(matches!(decode_solutions(b"<html>oops</html>"), Err(StoreError::Malformed(_))));

        let empty = decode_solutions(br#"{"head": {"vars": ["s"]}, "results": {"bindings": []}}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_empty_batches_skip_network() {
        let graph = Graph::new();
        assert_eq!(delete_statements(&graph), "");
    }
}
