// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cortex configuration
//!
//! Loaded from YAML with the same discovery order the node config uses:
//! 1. `CORTEX_CONFIG_PATH` environment variable
//! 2. `./cortex-config.yaml` (working directory)
//! 3. `~/.cortex/config.yaml` (user home)
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::entity_pipeline::DEFAULT_MATCH_THRESHOLD;
use crate::domain::vocab::{abi, BFO_ENTITY};
use crate::domain::{is_valid_uri, AuditSink, CortexError, CortexResult, TripleStore};
use crate::infrastructure::{FilesystemAuditSink, InMemoryAuditSink, InMemoryTripleStore, SparqlHttpTripleStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    /// Base namespace for newly minted individual URIs
    pub namespace: String,
    pub resolution: ResolutionConfig,
    pub audit: AuditConfig,
    pub store: StoreConfig,
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum fuzzy score (0-100) for get-or-create to reuse a match
    pub default_threshold: u8,
    pub default_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub directory: PathBuf,
    pub enabled: bool,
}

/// Without an `endpoint` the in-memory store is used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_endpoint: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub root_class: String,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            namespace: abi::NAMESPACE.to_string(),
            resolution: ResolutionConfig::default(),
            audit: AuditConfig::default(),
            store: StoreConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_MATCH_THRESHOLD,
            default_limit: 10,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("datastore/ontology/audit"),
            enabled: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            update_endpoint: None,
            timeout_ms: 30_000,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            root_class: BFO_ENTITY.to_string(),
        }
    }
}

impl CortexConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CORTEX_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./cortex-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cortex").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default.
    /// An explicit path must exist and parse.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(namespace) = lookup("CORTEX_NAMESPACE") {
            tracing::info!("Environment override: CORTEX_NAMESPACE={}", namespace);
            self.namespace = namespace;
        }

        if let Some(dir) = lookup("CORTEX_AUDIT_DIR") {
            tracing::info!("Environment override: CORTEX_AUDIT_DIR={}", dir);
            self.audit.directory = PathBuf::from(dir);
        }

        if let Some(val) = lookup("CORTEX_STORE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: CORTEX_STORE_TIMEOUT_MS={}", ms);
                    self.store.timeout_ms = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for CORTEX_STORE_TIMEOUT_MS: '{}'. Expected milliseconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> CortexResult<()> {
        let ns = &self.namespace;
        if !(ns.starts_with("http://") || ns.starts_with("https://")) || !is_valid_uri(ns) {
            return Err(CortexError::Config(format!(
                "namespace must be an absolute http(s) URI, got '{}'",
                ns
            )));
        }
        if !(ns.ends_with('/') || ns.ends_with('#')) {
            return Err(CortexError::Config(format!(
                "namespace must end with '/' or '#', got '{}'",
                ns
            )));
        }

        if self.resolution.default_threshold > 100 {
            return Err(CortexError::Config(format!(
                "resolution.default_threshold must be within 0..=100, got {}",
                self.resolution.default_threshold
            )));
        }
        if self.resolution.default_limit == 0 {
            return Err(CortexError::Config("resolution.default_limit must be > 0".to_string()));
        }

        if self.store.timeout_ms == 0 {
            return Err(CortexError::Config("store.timeout_ms must be > 0".to_string()));
        }
        for endpoint in self.store.endpoint.iter().chain(self.store.update_endpoint.iter()) {
            if !is_valid_uri(endpoint) {
                return Err(CortexError::Config(format!("invalid store endpoint: '{}'", endpoint)));
            }
        }

        if !is_valid_uri(&self.schema.root_class) {
            return Err(CortexError::Config(format!(
                "schema.root_class is not a valid URI: '{}'",
                self.schema.root_class
            )));
        }

        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    /// SPARQL adaptor when an endpoint is configured, in-memory otherwise
    pub fn build_store(&self) -> CortexResult<Arc<dyn TripleStore>> {
        match &self.store.endpoint {
            Some(endpoint) => {
                let store =
                    SparqlHttpTripleStore::new(endpoint.clone(), self.store.update_endpoint.clone(), self.store_timeout())?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(InMemoryTripleStore::new())),
        }
    }

    /// Snapshot files under `audit.directory`. With `audit.enabled: false`
    /// snapshots are still taken but only kept in memory for the process.
    pub fn build_audit_sink(&self) -> Arc<dyn AuditSink> {
        if !self.audit.enabled {
            tracing::warn!("Audit snapshots disabled: merge and removal snapshots are not persisted");
            return Arc::new(InMemoryAuditSink::new());
        }
        Arc::new(FilesystemAuditSink::new(self.audit.directory.clone()))
    }
}
