// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cortex Knowledge Graph
//!
//! Entity resolution, get-or-create, merge and removal over a triple store,
//! and translation of an ontology schema into a class hierarchy.
//!
//! # Architecture
//!
//! - **Layer:** Knowledge Layer
//! - **Purpose:** Keeps the semantic graph deduplicated and navigable

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use application::*;
pub use config::CortexConfig;
pub use domain::*;
pub use infrastructure::*;
