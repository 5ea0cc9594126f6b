// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for knowledge-graph operations
//!
//! - [`CortexError::Validation`]: rejected before any store call
//! - [`CortexError::StoreUnavailable`]: transport failure or timeout, always
//!   propagated; stage-then-commit guarantees no partial mutation
//! - [`CortexError::SchemaCycle`]: defensive, raised on a revisited node
//! - [`CortexError::Audit`]: snapshot could not be persisted, so the
//!   destructive step never ran
//!
//! An ambiguous resolution is not an error: it is a ranked candidate list.

use thiserror::Error;

use super::repository::StoreError;

#[derive(Debug, Error)]
pub enum CortexError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Schema cycle detected at {0}")]
    SchemaCycle(String),

    #[error("Audit snapshot failed: {0}")]
    Audit(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CortexError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CortexError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CortexError::Validation(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, CortexError::StoreUnavailable(_))
    }
}

impl From<StoreError> for CortexError {
    fn from(err: StoreError) -> Self {
        // Every store-side failure means the call was not honoured.
        CortexError::StoreUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for CortexError {
    fn from(err: std::io::Error) -> Self {
        CortexError::Audit(err.to_string())
    }
}

pub type CortexResult<T> = Result<T, CortexError>;
