// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the knowledge-graph bounded context

pub mod audit_store;
pub mod event_bus;
pub mod graph_store;
pub mod ntriples;
pub mod sparql_store;

pub use audit_store::{FilesystemAuditSink, InMemoryAuditSink};
pub use event_bus::{BroadcastEventBus, EventBusError, EventReceiver, IndividualEventReceiver};
pub use graph_store::InMemoryTripleStore;
pub use sparql_store::SparqlHttpTripleStore;
