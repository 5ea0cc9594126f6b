// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit snapshot sinks
//! Snapshots are written before a merge or removal touches the store, so a
//! failed or regretted operation can be replayed by hand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ntriples;
use crate::domain::{AuditSink, CortexError, CortexResult, Graph};

/// Writes canonical N-Triples files under one directory
pub struct FilesystemAuditSink {
    directory: PathBuf,
}

impl FilesystemAuditSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Read a snapshot back for replay.
    pub async fn load(path: impl AsRef<Path>) -> CortexResult<Graph> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        ntriples::parse(&text).map_err(|e| CortexError::Audit(e.to_string()))
    }
}

/// Keep file names portable: anything but `[A-Za-z0-9_.-]` becomes `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl AuditSink for FilesystemAuditSink {
    async fn save(&self, name: &str, graph: &Graph) -> CortexResult<String> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let stem = format!("{}_{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), sanitize(name));
        let mut path = self.directory.join(format!("{}.nt", stem));
        let mut attempt = 1;
        while tokio::fs::try_exists(&path).await? {
            path = self.directory.join(format!("{}_{}.nt", stem, attempt));
            attempt += 1;
        }

        let text = ntriples::serialize(graph).map_err(|e| CortexError::Audit(e.to_string()))?;
        tokio::fs::write(&path, text).await?;

        let location = path.display().to_string();
        info!(path = %location, triples = graph.len(), "Wrote audit snapshot");
        Ok(location)
    }
}

/// Keeps snapshots in memory; used in tests and dry runs
#[derive(Default)]
pub struct InMemoryAuditSink {
    snapshots: Arc<Mutex<Vec<(String, Graph)>>>,
    fail: bool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn snapshots(&self) -> Vec<(String, Graph)> {
        self.snapshots.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn save(&self, name: &str, graph: &Graph) -> CortexResult<String> {
        if self.fail {
            return Err(CortexError::Audit(format!("cannot write snapshot {}", name)));
        }
        let mut snapshots = self.snapshots.lock().await;
        snapshots.push((name.to_string(), graph.clone()));
        debug!(name, triples = graph.len(), "Recorded audit snapshot");
        Ok(format!("memory://{}/{}", snapshots.len() - 1, name))
    }
}
