//! Domain ontology: concept hierarchy, relation triples, and coherence checks.
//!
//! The hierarchy is a named forest read from the dataset. Sibling order and
//! duplicate sibling names are preserved exactly as written, so that duplicate
//! children can be reported instead of silently collapsing into a map.
//!
//! Validation never fails: every structural or typing problem is returned as a
//! [`ValidationIssue`], and the caller decides what to do with it.

pub mod coherence;
pub mod hierarchy;
pub mod relations;

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::knowledge::json_type_name;

pub use coherence::{
    HierarchyCheck, OntologyValidator, RelationCheck, VocabularyCheck, default_validators,
    validate_coherence,
};
pub use hierarchy::{OntologyGraph, validate_hierarchy};
pub use relations::{RelationKind, RelationReport, RelationValidator};

// ---------------------------------------------------------------------------
// Validation issues
// ---------------------------------------------------------------------------

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A structural or type violation.
    Error,
    /// An unverifiable but plausible reference.
    Warning,
}

/// Classification of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A malformed rule, triple, or test case that was skipped.
    DataShape,
    /// A node repeats one of its own ancestors.
    CycleDetected,
    /// Two children of one node share a name.
    DuplicateChild,
    /// A node sits deeper than the configured maximum.
    DepthExceeded,
    /// A relation kind outside the recognized or allowed set.
    UnknownRelationKind,
    /// A reference that could not be found in any vocabulary.
    UnverifiedReference,
    /// A destination outside the vocabulary its relation kind requires.
    TypeMismatch,
    /// The hierarchy is not a mapping, or the relations are not a list.
    InvalidRootShape,
}

/// A single finding produced by a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// A named concept and its (possibly empty) ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OntologyNode {
    pub name: String,
    pub children: Vec<OntologyNode>,
}

impl OntologyNode {
    /// A node with no children.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child, builder style.
    pub fn with_child(mut self, child: OntologyNode) -> Self {
        self.children.push(child);
        self
    }
}

/// The hierarchy as read from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyInput {
    /// A forest of root concepts, in document order.
    Forest(Vec<OntologyNode>),
    /// The hierarchy value was not a mapping.
    Malformed { found: String },
}

impl Default for HierarchyInput {
    fn default() -> Self {
        Self::Forest(Vec::new())
    }
}

impl HierarchyInput {
    /// The root nodes, or an empty slice when the input is malformed.
    pub fn roots(&self) -> &[OntologyNode] {
        match self {
            Self::Forest(roots) => roots,
            Self::Malformed { .. } => &[],
        }
    }
}

/// Intermediate shape of a hierarchy value while deserializing.
enum Shape {
    Mapping(Vec<OntologyNode>),
    Other(&'static str),
}

struct ShapeVisitor;

impl<'de> Visitor<'de> for ShapeVisitor {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ontology hierarchy")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Shape, A::Error> {
        let mut nodes = Vec::new();
        // Entries are read one by one so repeated keys survive.
        while let Some(name) = map.next_key::<String>()? {
            let children = match map.next_value::<Shape>()? {
                Shape::Mapping(children) => children,
                Shape::Other(_) => Vec::new(),
            };
            nodes.push(OntologyNode { name, children });
        }
        Ok(Shape::Mapping(nodes))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Shape, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Shape::Other("array"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Shape, E> {
        Ok(Shape::Other("boolean"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Shape, E> {
        Ok(Shape::Other("number"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Shape, E> {
        Ok(Shape::Other("number"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Shape, E> {
        Ok(Shape::Other("number"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Shape, E> {
        Ok(Shape::Other("string"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Shape, E> {
        Ok(Shape::Other("null"))
    }

    fn visit_none<E: de::Error>(self) -> Result<Shape, E> {
        Ok(Shape::Other("null"))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Shape, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ShapeVisitor)
    }
}

impl<'de> Deserialize<'de> for HierarchyInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Shape::deserialize(deserializer)? {
            Shape::Mapping(roots) => Self::Forest(roots),
            Shape::Other(found) => Self::Malformed {
                found: found.to_string(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Relation triples
// ---------------------------------------------------------------------------

/// A semantic edge outside the hierarchy tree.
///
/// Fields that were missing or not strings in the dataset are kept as empty
/// strings; the relation validator reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTriple {
    pub origin: String,
    pub relation_kind: String,
    pub destination: String,
}

impl RelationTriple {
    pub fn new(
        origin: impl Into<String>,
        relation_kind: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            relation_kind: relation_kind.into(),
            destination: destination.into(),
        }
    }

    fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            origin: field("origin"),
            relation_kind: field("relation_kind"),
            destination: field("destination"),
        }
    }
}

impl fmt::Display for RelationTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {})",
            self.origin, self.relation_kind, self.destination
        )
    }
}

/// The relation list as read from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationsInput {
    Triples(Vec<RelationTriple>),
    /// The relations value was not a list.
    Malformed { found: String },
}

impl Default for RelationsInput {
    fn default() -> Self {
        Self::Triples(Vec::new())
    }
}

impl RelationsInput {
    /// Read relations from a JSON value. `null` counts as an empty list.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Array(items) => Self::Triples(items.iter().map(RelationTriple::from_value).collect()),
            other => Self::Malformed {
                found: json_type_name(other).to_string(),
            },
        }
    }

    pub fn triples(&self) -> &[RelationTriple] {
        match self {
            Self::Triples(triples) => triples,
            Self::Malformed { .. } => &[],
        }
    }
}
