// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SchemaTranslator: Ontology Triples to a Class Hierarchy
//!
//! Turns a raw schema graph into a [`HierarchicalModel`]:
//!
//! 1. Ingestion: triples are grouped by subject into typed records restricted
//!    to the documentation vocabulary.
//! 2. Class extraction: IRI subjects typed `owl:Class` or `rdfs:Class`. Only
//!    plain-IRI `subClassOf` values are kept; anonymous restrictions are
//!    ignored.
//! 3. Levels: depth-first from the root (level 0) over the inverse
//!    `subClassOf` adjacency, children in URI order. A class reachable through
//!    several chains keeps the last chain visited.
//! 4. Domain/range: `unionOf` / `intersectionOf` / `complementOf` RDF lists are
//!    resolved recursively into [`LogicalExpr`] and flattened.
//! 5. Inheritance: a property belongs to every class whose ancestor chain
//!    meets one of its domain classes.
//!
//! Failures are isolated per node and reported as [`TranslationIssue`]s; a
//! missing root yields an empty model.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{publish_quietly, EventBus};
use crate::domain::vocab::{local_name, owl, rdf, rdfs, skos};
use crate::domain::{
    ClassNode, ClassRecord, CortexError, Graph, HierarchicalModel, HierarchyEntry, KnowledgeEvent, LogicalExpr,
    PropertyKind, PropertyNode, PropertyRow, Term, TranslationIssue,
};

/// Documentation-vocabulary view of one subject
#[derive(Debug, Default)]
struct SubjectRecord {
    is_iri: bool,
    types: Vec<String>,
    labels: Vec<String>,
    comments: Vec<String>,
    definitions: Vec<String>,
    examples: Vec<String>,
    alt_labels: Vec<String>,
    subclass_of: Vec<Term>,
    domain: Vec<Term>,
    range: Vec<Term>,
    union_of: Vec<Term>,
    intersection_of: Vec<Term>,
    complement_of: Vec<Term>,
    inverse_of: Vec<String>,
    first: Option<Term>,
    rest: Option<Term>,
}

impl SubjectRecord {
    fn has_type(&self, class: &str) -> bool {
        self.types.iter().any(|t| t == class)
    }

    fn is_class(&self) -> bool {
        self.has_type(owl::CLASS) || self.has_type(rdfs::CLASS)
    }

    fn property_kind(&self) -> Option<PropertyKind> {
        if self.has_type(owl::OBJECT_PROPERTY) {
            Some(PropertyKind::Object)
        } else if self.has_type(owl::DATATYPE_PROPERTY) {
            Some(PropertyKind::Data)
        } else {
            None
        }
    }
}

type Records = BTreeMap<String, SubjectRecord>;

/// Group triples by subject key, keeping only the predicates the model uses.
fn ingest(schema: &Graph) -> Records {
    let mut records = Records::new();

    for triple in schema {
        let Some(key) = triple.subject.node_key() else {
            continue;
        };
        let record = records.entry(key).or_default();
        record.is_iri = triple.subject.is_iri();

        let object = &triple.object;
        let text = || object.lexical().to_string();
        match triple.predicate.as_str() {
            rdf::TYPE => {
                if let Some(class) = object.as_iri() {
                    record.types.push(class.to_string());
                }
            }
            rdf::FIRST => {
                record.first.get_or_insert_with(|| object.clone());
            }
            rdf::REST => {
                record.rest.get_or_insert_with(|| object.clone());
            }
            rdfs::LABEL => record.labels.push(text()),
            rdfs::COMMENT => record.comments.push(text()),
            skos::DEFINITION => record.definitions.push(text()),
            skos::EXAMPLE => record.examples.push(text()),
            skos::ALT_LABEL => record.alt_labels.push(text()),
            rdfs::SUBCLASS_OF => record.subclass_of.push(object.clone()),
            rdfs::DOMAIN => record.domain.push(object.clone()),
            rdfs::RANGE => record.range.push(object.clone()),
            owl::UNION_OF => record.union_of.push(object.clone()),
            owl::INTERSECTION_OF => record.intersection_of.push(object.clone()),
            owl::COMPLEMENT_OF => record.complement_of.push(object.clone()),
            owl::INVERSE_OF => {
                if let Some(uri) = object.as_iri() {
                    record.inverse_of.push(uri.to_string());
                }
            }
            _ => {}
        }
    }

    records
}

/// First letter upper-cased, rest lower-cased, `/` replaced so the label can
/// sit in a `/`-joined path.
fn display_label(label: &str) -> String {
    let mut chars = label.trim().chars();
    let capitalised = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    capitalised.replace('/', "-")
}

#[derive(Debug, Clone, Copy)]
enum ListOperator {
    Union,
    Intersection,
}

/// Resolve one domain/range value. Named classes are leaves; blank nodes must
/// carry a set operator.
fn resolve_expr(records: &Records, term: &Term, visiting: &mut HashSet<String>) -> Result<LogicalExpr, CortexError> {
    if let Some(uri) = term.as_iri() {
        return Ok(LogicalExpr::leaf(uri));
    }

    let key = term
        .node_key()
        .ok_or_else(|| CortexError::validation(format!("literal {} is not a class expression", term)))?;
    if !visiting.insert(key.clone()) {
        return Err(CortexError::SchemaCycle(key));
    }
    let record = records
        .get(&key)
        .ok_or_else(|| CortexError::validation(format!("dangling class expression {}", key)))?;

    let mut parts = Vec::new();
    for head in &record.union_of {
        parts.push(resolve_list(records, head, ListOperator::Union, visiting)?);
    }
    for head in &record.intersection_of {
        parts.push(resolve_list(records, head, ListOperator::Intersection, visiting)?);
    }
    for inner in &record.complement_of {
        parts.push(LogicalExpr::Not(Box::new(resolve_expr(records, inner, visiting)?)));
    }
    visiting.remove(&key);

    match parts.len() {
        0 => Err(CortexError::validation(format!(
            "{} has no unionOf, intersectionOf or complementOf",
            key
        ))),
        1 => Ok(parts.remove(0)),
        _ => Ok(LogicalExpr::And(parts).flatten()),
    }
}

/// Walk an RDF list from `head` to `rdf:nil`, resolving each `rdf:first`.
fn resolve_list(
    records: &Records,
    head: &Term,
    operator: ListOperator,
    visiting: &mut HashSet<String>,
) -> Result<LogicalExpr, CortexError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut node = head.clone();

    while node.as_iri() != Some(rdf::NIL) {
        let key = node
            .node_key()
            .ok_or_else(|| CortexError::validation(format!("literal {} in list position", node)))?;
        if !seen.insert(key.clone()) {
            return Err(CortexError::SchemaCycle(key));
        }
        let record = records
            .get(&key)
            .ok_or_else(|| CortexError::validation(format!("dangling list node {}", key)))?;
        let first = record
            .first
            .as_ref()
            .ok_or_else(|| CortexError::validation(format!("list node {} has no rdf:first", key)))?;

        items.push(resolve_expr(records, first, visiting)?);

        match &record.rest {
            Some(rest) => node = rest.clone(),
            None => break,
        }
    }

    let expr = match operator {
        ListOperator::Union => LogicalExpr::Or(items),
        ListOperator::Intersection => LogicalExpr::And(items),
    };
    Ok(expr.flatten())
}

/// Mutable state of one translation run
struct Translation<'a> {
    records: &'a Records,
    classes: BTreeMap<String, ClassNode>,
    children: BTreeMap<String, Vec<String>>,
    properties: Vec<PropertyNode>,
    issues: Vec<TranslationIssue>,
}

impl<'a> Translation<'a> {
    fn new(records: &'a Records) -> Self {
        Self {
            records,
            classes: BTreeMap::new(),
            children: BTreeMap::new(),
            properties: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn issue(&mut self, subject: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(subject, message = %message, "Schema translation issue");
        self.issues.push(TranslationIssue {
            subject: subject.to_string(),
            message,
        });
    }

    fn label_of(&mut self, uri: &str, record: &SubjectRecord) -> String {
        match record.labels.first() {
            Some(label) => label.clone(),
            None => {
                self.issue(uri, "missing rdfs:label, using local name");
                local_name(uri).to_string()
            }
        }
    }

    fn extract_classes(&mut self) {
        let records = self.records;
        for (uri, record) in records.iter().filter(|(_, r)| r.is_iri && r.is_class()) {
            let superclasses: Vec<String> = record
                .subclass_of
                .iter()
                .filter_map(|t| t.as_iri().map(str::to_string))
                .collect();
            let label = self.label_of(uri, record);

            for parent in &superclasses {
                self.children.entry(parent.clone()).or_default().push(uri.clone());
            }
            self.classes.insert(
                uri.clone(),
                ClassNode {
                    uri: uri.clone(),
                    label,
                    superclasses,
                    level: None,
                    hierarchy: Vec::new(),
                },
            );
        }
        debug!(classes = self.classes.len(), "Extracted classes");
    }

    /// Depth-first level assignment. `trail` holds the ancestor chain of `uri`.
    fn assign_levels(&mut self, uri: &str, trail: &mut Vec<HierarchyEntry>) {
        let Some(class) = self.classes.get_mut(uri) else {
            return;
        };

        let level = trail.len();
        let label = display_label(&class.label);
        let level_path = match trail.last() {
            Some(parent) => format!("{}/{}", parent.level_path, label),
            None => label.clone(),
        };
        trail.push(HierarchyEntry {
            uri: uri.to_string(),
            label,
            level,
            level_path,
        });
        class.level = Some(level);
        class.hierarchy = trail.clone();

        let children = self.children.get(uri).cloned().unwrap_or_default();
        for child in children {
            if trail.iter().any(|entry| entry.uri == child) {
                self.issue(&child, CortexError::SchemaCycle(child.clone()).to_string());
                continue;
            }
            self.assign_levels(&child, trail);
        }

        trail.pop();
    }

    fn resolve_values(&mut self, subject: &str, values: &[Term]) -> Vec<LogicalExpr> {
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            let mut visiting = HashSet::new();
            match resolve_expr(self.records, value, &mut visiting) {
                Ok(expr) => resolved.push(expr.flatten()),
                Err(err) => self.issue(subject, err.to_string()),
            }
        }
        resolved
    }

    fn extract_properties(&mut self) {
        let records = self.records;
        for (uri, record) in records.iter().filter(|(_, r)| r.is_iri) {
            let Some(kind) = record.property_kind() else {
                continue;
            };
            let label = self.label_of(uri, record);
            let domain = self.resolve_values(uri, &record.domain);
            let range = self.resolve_values(uri, &record.range);

            self.properties.push(PropertyNode {
                uri: uri.clone(),
                label,
                kind,
                domain,
                range,
                inverse_of: record.inverse_of.first().cloned(),
                definition: record.definitions.first().cloned(),
                example: record.examples.first().cloned(),
            });
        }
        debug!(properties = self.properties.len(), "Extracted properties");
    }

    fn class_record(&self, class: &ClassNode) -> Option<ClassRecord> {
        let level = class.level?;
        let record = self.records.get(&class.uri)?;
        let ancestors: BTreeMap<&str, usize> = class
            .hierarchy
            .iter()
            .map(|entry| (entry.uri.as_str(), entry.level))
            .collect();

        let mut data_properties = Vec::new();
        let mut object_properties = Vec::new();
        for property in &self.properties {
            // Nearest declaring ancestor wins when several domain classes match.
            let Some(from_level) = property
                .domain_classes()
                .into_iter()
                .filter_map(|uri| ancestors.get(uri).copied())
                .max()
            else {
                continue;
            };

            let row = PropertyRow {
                uri: property.uri.clone(),
                label: property.label.clone(),
                definition: property.definition.clone(),
                example: property.example.clone(),
                domain: property.domain.clone(),
                range: property.range.clone(),
                inverse_of: property.inverse_of.clone(),
                inverse_of_label: property.inverse_of.as_deref().and_then(|inverse| {
                    self.properties
                        .iter()
                        .find(|p| p.uri == inverse)
                        .map(|p| p.label.clone())
                }),
                level: from_level,
            };
            match property.kind {
                PropertyKind::Data => data_properties.push(row),
                PropertyKind::Object => object_properties.push(row),
            }
        }
        for rows in [&mut data_properties, &mut object_properties] {
            rows.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.uri.cmp(&b.uri)));
        }

        Some(ClassRecord {
            uri: class.uri.clone(),
            label: class.label.clone(),
            definitions: record.definitions.clone(),
            examples: record.examples.clone(),
            aliases: record.alt_labels.clone(),
            comments: record.comments.clone(),
            level,
            level_path: class
                .hierarchy
                .last()
                .map(|entry| entry.level_path.clone())
                .unwrap_or_default(),
            hierarchy: class.hierarchy.clone(),
            data_properties,
            object_properties,
        })
    }
}

#[derive(Default)]
pub struct SchemaTranslator {
    event_bus: Option<Arc<dyn EventBus>>,
}

impl SchemaTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the hierarchical model of `schema` rooted at `root_class`.
    pub fn translate(&self, schema: &Graph, root_class: &str) -> HierarchicalModel {
        let records = ingest(schema);
        let mut translation = Translation::new(&records);

        translation.extract_classes();
        if !translation.classes.contains_key(root_class) {
            warn!(root_class, "Root class not found in schema");
            return HierarchicalModel {
                root: root_class.to_string(),
                issues: vec![TranslationIssue {
                    subject: root_class.to_string(),
                    message: "root class not found".to_string(),
                }],
                ..Default::default()
            };
        }

        translation.assign_levels(root_class, &mut Vec::new());
        translation.extract_properties();

        let mut classes: Vec<ClassRecord> = translation
            .classes
            .values()
            .filter_map(|class| translation.class_record(class))
            .collect();
        classes.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| a.level_path.cmp(&b.level_path))
                .then_with(|| a.uri.cmp(&b.uri))
        });

        let mut amount_per_level = BTreeMap::new();
        for class in &classes {
            *amount_per_level.entry(class.level).or_insert(0) += 1;
        }

        let unreachable = translation.classes.len() - classes.len();
        info!(
            root_class,
            classes = classes.len(),
            unreachable,
            properties = translation.properties.len(),
            issues = translation.issues.len(),
            "Translated schema"
        );

        HierarchicalModel {
            root: root_class.to_string(),
            classes,
            properties: translation.properties,
            amount_per_level,
            issues: translation.issues,
        }
    }

    /// [`translate`](Self::translate), then announce the result on the event bus.
    pub async fn translate_and_publish(&self, schema: &Graph, root_class: &str) -> HierarchicalModel {
        let model = self.translate(schema, root_class);
        publish_quietly(
            self.event_bus.as_deref(),
            KnowledgeEvent::SchemaTranslated {
                root: model.root.clone(),
                classes: model.classes.len(),
                issues: model.issues.len(),
                timestamp: Utc::now(),
            },
        )
        .await;
        model
    }
}
