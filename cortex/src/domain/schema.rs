// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ontology schema model
//!
//! Output of the schema translator: classes placed in a hierarchy relative to
//! a root class, properties with resolved domain/range expressions, and one
//! render-agnostic record per class carrying its inherited property tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Resolved form of an RDF-list-encoded `unionOf` / `intersectionOf` /
/// `complementOf` class expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalExpr {
    Leaf(String),
    And(Vec<LogicalExpr>),
    Or(Vec<LogicalExpr>),
    Not(Box<LogicalExpr>),
}

impl LogicalExpr {
    pub fn leaf(uri: impl Into<String>) -> Self {
        LogicalExpr::Leaf(uri.into())
    }

    /// Splice nested same-operator nodes into their parent, recursively:
    /// `Or(A, Or(B, C))` becomes `Or(A, B, C)`.
    pub fn flatten(self) -> Self {
        match self {
            LogicalExpr::Leaf(_) => self,
            LogicalExpr::Not(inner) => LogicalExpr::Not(Box::new(inner.flatten())),
            LogicalExpr::Or(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.flatten() {
                        LogicalExpr::Or(nested) => out.extend(nested),
                        other => out.push(other),
                    }
                }
                LogicalExpr::Or(out)
            }
            LogicalExpr::And(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.flatten() {
                        LogicalExpr::And(nested) => out.extend(nested),
                        other => out.push(other),
                    }
                }
                LogicalExpr::And(out)
            }
        }
    }

    /// Class URIs a subject may belong to under this expression: leaves of
    /// unions and intersections; anything under a complement is excluded.
    pub fn classes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_classes(&mut out);
        out
    }

    fn collect_classes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            LogicalExpr::Leaf(uri) => out.push(uri),
            LogicalExpr::And(items) | LogicalExpr::Or(items) => {
                for item in items {
                    item.collect_classes(out);
                }
            }
            LogicalExpr::Not(_) => {}
        }
    }

    pub fn operator(&self) -> Option<&'static str> {
        match self {
            LogicalExpr::Leaf(_) => None,
            LogicalExpr::And(_) => Some("and"),
            LogicalExpr::Or(_) => Some("or"),
            LogicalExpr::Not(_) => Some("not"),
        }
    }
}

/// A named class extracted from the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    pub uri: String,
    pub label: String,
    /// Plain-URI `subClassOf` values only
    pub superclasses: Vec<String>,
    pub level: Option<usize>,
    pub hierarchy: Vec<HierarchyEntry>,
}

/// One ancestor step from the root down to a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub uri: String,
    pub label: String,
    pub level: usize,
    pub level_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Object,
    Data,
}

/// Object or data property with resolved domain/range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyNode {
    pub uri: String,
    pub label: String,
    pub kind: PropertyKind,
    pub domain: Vec<LogicalExpr>,
    pub range: Vec<LogicalExpr>,
    pub inverse_of: Option<String>,
    pub definition: Option<String>,
    pub example: Option<String>,
}

impl PropertyNode {
    /// Every class the domain admits, deduplicated.
    pub fn domain_classes(&self) -> BTreeSet<&str> {
        self.domain.iter().flat_map(|e| e.classes()).collect()
    }
}

/// Property as shown in a class's property table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub uri: String,
    pub label: String,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub domain: Vec<LogicalExpr>,
    pub range: Vec<LogicalExpr>,
    pub inverse_of: Option<String>,
    pub inverse_of_label: Option<String>,
    /// Level of the ancestor the property was inherited from
    pub level: usize,
}

/// One record per class in the translated model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub uri: String,
    pub label: String,
    pub definitions: Vec<String>,
    pub examples: Vec<String>,
    pub aliases: Vec<String>,
    pub comments: Vec<String>,
    pub level: usize,
    pub level_path: String,
    pub hierarchy: Vec<HierarchyEntry>,
    pub data_properties: Vec<PropertyRow>,
    pub object_properties: Vec<PropertyRow>,
}

/// Per-node failure isolated during translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationIssue {
    pub subject: String,
    pub message: String,
}

/// Render-agnostic output of a schema translation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalModel {
    pub root: String,
    /// Sorted by level, then level path, then URI
    pub classes: Vec<ClassRecord>,
    /// Every object and data property, sorted by URI
    pub properties: Vec<PropertyNode>,
    pub amount_per_level: BTreeMap<usize, usize>,
    pub issues: Vec<TranslationIssue>,
}

/// Nested view of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTree {
    pub uri: String,
    pub label: String,
    pub level: usize,
    pub children: Vec<ClassTree>,
}

impl HierarchicalModel {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class(&self, uri: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.uri == uri)
    }

    /// Build the nested tree from each class's parent in its hierarchy path.
    /// Children are ordered by URI.
    pub fn to_tree(&self) -> Option<ClassTree> {
        let root = self.class(&self.root)?;

        let mut children: BTreeMap<&str, Vec<&ClassRecord>> = BTreeMap::new();
        for record in &self.classes {
            if record.hierarchy.len() < 2 {
                continue;
            }
            let parent = &record.hierarchy[record.hierarchy.len() - 2].uri;
            children.entry(parent.as_str()).or_default().push(record);
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| a.uri.cmp(&b.uri));
        }

        // Levels are bounded by the acyclic hierarchy; recursion depth follows.
        fn build(record: &ClassRecord, children: &BTreeMap<&str, Vec<&ClassRecord>>) -> ClassTree {
            ClassTree {
                uri: record.uri.clone(),
                label: record.label.clone(),
                level: record.level,
                children: children
                    .get(record.uri.as_str())
                    .map(|list| list.iter().map(|c| build(c, children)).collect())
                    .unwrap_or_default(),
            }
        }

        Some(build(root, &children))
    }
}
