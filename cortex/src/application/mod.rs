// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services for the knowledge-graph bounded context

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::domain::{CortexResult, Graph, KnowledgeEvent, Query, StoreError, Term, Triple, TripleStore};

pub mod entity_pipeline;
pub mod entity_resolver;
pub mod label_matching;
pub mod merge_engine;
pub mod removal_engine;
pub mod schema_translator;

pub use entity_pipeline::{EntityPipeline, GetOrCreateOutcome};
pub use entity_resolver::{EntityResolver, ResolvedCandidate};
pub use label_matching::{normalize_label, token_set_ratio};
pub use merge_engine::{MergeEngine, MergeReport};
pub use removal_engine::{RemovalEngine, RemovalOutcome, RemovalReport, RemovalStatus};
pub use schema_translator::SchemaTranslator;

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Event bus trait for publishing domain events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: KnowledgeEvent) -> Result<()>;
}

/// Run one store call under `timeout`. Expiry surfaces as a store-unavailable
/// error, never as an empty result.
pub(crate) async fn guarded<T, F>(timeout: Duration, operation: &'static str, call: F) -> CortexResult<T>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            warn!(operation, error = %err, "Store call failed");
            Err(err.into())
        }
        Err(_) => {
            let millis = timeout.as_millis() as u64;
            warn!(operation, timeout_ms = millis, "Store call timed out");
            Err(StoreError::Timeout(millis).into())
        }
    }
}

/// Every triple where `uri` is the subject or the object. The store is not
/// assumed to be reverse-indexed, so both directions are queried explicitly.
pub(crate) async fn fetch_touching(
    store: &dyn TripleStore,
    timeout: Duration,
    uri: &str,
) -> CortexResult<Graph> {
    let subject = Term::iri(uri);
    let mut graph = Graph::new();

    for row in guarded(timeout, "query", store.query(&Query::subject_triples(uri))).await? {
        if let (Some(Term::Iri { value: p }), Some(o)) = (row.get("p"), row.get("o")) {
            graph.add(Triple::new(subject.clone(), p.as_str(), o.clone()));
        }
    }
    for row in guarded(timeout, "query", store.query(&Query::object_triples(uri))).await? {
        if let (Some(s), Some(Term::Iri { value: p })) = (row.get("s"), row.get("p")) {
            graph.add(Triple::new(s.clone(), p.as_str(), subject.clone()));
        }
    }

    Ok(graph)
}

/// Publish without letting a bus failure fail the committed operation.
pub(crate) async fn publish_quietly(bus: Option<&dyn EventBus>, event: KnowledgeEvent) {
    if let Some(bus) = bus {
        let event_type = event.event_type();
        if let Err(err) = bus.publish(event).await {
            warn!(event_type, error = %err, "Failed to publish knowledge event");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every published event
    #[derive(Default)]
    pub struct MockEventBus {
        events: Arc<Mutex<Vec<KnowledgeEvent>>>,
        fail: bool,
    }

    impl MockEventBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn get_events(&self) -> Vec<KnowledgeEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventBus for MockEventBus {
        async fn publish(&self, event: KnowledgeEvent) -> Result<()> {
            if self.fail {
                anyhow::bail!("event bus closed");
            }
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}
