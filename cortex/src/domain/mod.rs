// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Triples, individuals, schema model and the ports the application layer
//! consumes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and contracts; no I/O

pub mod error;
pub mod events;
pub mod graph;
pub mod individual;
pub mod repository;
pub mod schema;
pub mod vocab;

pub use error::*;
pub use events::*;
pub use graph::*;
pub use individual::*;
pub use repository::*;
pub use schema::*;
