//! Serialization Gateway
//!
//! Writes the exposed surface of a script instance into a JSON document and
//! repopulates instances from such documents.
//!
//! # Document format
//!
//! ```json
//! {
//!     "type": "Mover",
//!     "members": {
//!         "Speed": "3.5",
//!         "Heading": "North",
//!         "Position": { "x": "1", "y": "2", "z": "0" },
//!         "Target": "5f0c1a7e-entity",
//!         "Path": [ { "x": "0", "y": "0", "z": "0" } ]
//!     }
//! }
//! ```
//!
//! Leaves are strings in the codec's canonical text. By-value composites nest
//! as objects, reference types are stored as object ids, containers as arrays.
//!
//! Loading never aborts on bad member data: each problem is recorded as a
//! [`LoadIssue`], logged, and the member keeps its current value.

use std::fmt;

use expo_schema::{MemberDescriptor, TypeDescriptor, TypeIntrospector, TypeRef, TypeShape};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::codec::{ValueCodec, format_value};
use crate::error::{GatewayError, Result};
use crate::exposure::ExposurePolicy;
use crate::value::{ObjectRef, ScriptObject, Value};

/// How enum members are written to documents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnumEncoding {
    /// Variant name (e.g. "North")
    #[default]
    Name,
    /// Underlying integral value (e.g. "0")
    Underlying,
}

/// Answers whether an object id refers to a live engine object
pub trait ReferenceResolver {
    fn contains(&self, id: &str) -> bool;
}

impl<F> ReferenceResolver for F
where
    F: Fn(&str) -> bool,
{
    fn contains(&self, id: &str) -> bool {
        self(id)
    }
}

/// A member that could not be loaded
///
/// `type_name` is the document's root type and `member` the path below it,
/// e.g. `Position.y` or `Path[1].x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadIssue {
    /// Document names a member the type does not have
    UnknownMember { type_name: String, member: String },
    /// Member exists but is not on the exposed surface
    NotExposed { type_name: String, member: String },
    /// Text could not be parsed as the member's type
    InvalidData {
        type_name: String,
        member: String,
        text: String,
    },
    /// Node has the wrong JSON shape for the member's type
    UnexpectedNode {
        type_name: String,
        member: String,
        expected: &'static str,
    },
    /// Object id does not belong to any object
    UnresolvedReference {
        type_name: String,
        member: String,
        id: String,
    },
}

impl LoadIssue {
    pub fn type_name(&self) -> &str {
        match self {
            LoadIssue::UnknownMember { type_name, .. }
            | LoadIssue::NotExposed { type_name, .. }
            | LoadIssue::InvalidData { type_name, .. }
            | LoadIssue::UnexpectedNode { type_name, .. }
            | LoadIssue::UnresolvedReference { type_name, .. } => type_name,
        }
    }

    pub fn member(&self) -> &str {
        match self {
            LoadIssue::UnknownMember { member, .. }
            | LoadIssue::NotExposed { member, .. }
            | LoadIssue::InvalidData { member, .. }
            | LoadIssue::UnexpectedNode { member, .. }
            | LoadIssue::UnresolvedReference { member, .. } => member,
        }
    }

    /// What went wrong, without the member prefix
    pub fn reason(&self) -> String {
        match self {
            LoadIssue::UnknownMember { .. } => "ignored, not found in the type".to_string(),
            LoadIssue::NotExposed { .. } => "ignored, not exposed".to_string(),
            LoadIssue::InvalidData { text, .. } => format!("invalid data {:?}", text),
            LoadIssue::UnexpectedNode { expected, .. } => format!("expected {}", expected),
            LoadIssue::UnresolvedReference { id, .. } => {
                format!("id {} does not belong to any object", id)
            }
        }
    }
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.type_name(), self.member(), self.reason())
    }
}

/// Outcome of a load
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of top-level members assigned
    pub assigned: usize,
    /// Problems encountered while walking the document
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    /// True when every member in the document was loaded
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    fn record(&mut self, issue: LoadIssue) {
        tracing::warn!(type_name = issue.type_name(), member = issue.member(), "{}", issue.reason());
        self.issues.push(issue);
    }
}

/// Drives the exposure policy and codec over whole instances
pub struct Gateway<'a> {
    types: &'a dyn TypeIntrospector,
    codec: &'a ValueCodec,
    policy: ExposurePolicy,
    enum_encoding: EnumEncoding,
    resolver: Option<&'a dyn ReferenceResolver>,
}

impl<'a> Gateway<'a> {
    pub fn new(types: &'a dyn TypeIntrospector, codec: &'a ValueCodec) -> Self {
        Self {
            types,
            codec,
            policy: ExposurePolicy::default(),
            enum_encoding: EnumEncoding::default(),
            resolver: None,
        }
    }

    pub fn with_policy(mut self, policy: ExposurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_enum_encoding(mut self, encoding: EnumEncoding) -> Self {
        self.enum_encoding = encoding;
        self
    }

    /// Check object ids on load; without a resolver every id is accepted
    pub fn with_resolver(mut self, resolver: &'a dyn ReferenceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Exposed members of a composite type, in declaration order
    pub fn exposed_members(&self, type_name: &str) -> Result<Vec<&'a MemberDescriptor>> {
        let descriptor = self.composite(type_name)?;
        Ok(self.policy.exposed_members(self.types, descriptor))
    }

    /// Write the exposed members of `object` into a document
    pub fn save(&self, object: &ScriptObject) -> Result<JsonValue> {
        let members = self.save_members(object)?;
        let mut root = Map::new();
        root.insert("type".to_string(), JsonValue::String(object.type_name.clone()));
        root.insert("members".to_string(), JsonValue::Object(members));
        Ok(JsonValue::Object(root))
    }

    /// Assign members from `document` into `object`
    pub fn load_into(&self, object: &mut ScriptObject, document: &JsonValue) -> Result<LoadReport> {
        let root = document
            .as_object()
            .ok_or_else(|| GatewayError::MalformedDocument("root must be an object".to_string()))?;

        let found = root
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| GatewayError::MalformedDocument("missing 'type' field".to_string()))?;
        if found != object.type_name {
            return Err(GatewayError::TypeMismatch {
                expected: object.type_name.clone(),
                found: found.to_string(),
            });
        }

        let empty = Map::new();
        let members = match root.get("members") {
            Some(JsonValue::Object(members)) => members,
            None => &empty,
            Some(_) => {
                return Err(GatewayError::MalformedDocument(
                    "'members' must be an object".to_string(),
                ));
            }
        };

        let root_type = object.type_name.clone();
        let mut report = LoadReport::default();
        let loaded = self.load_members(object, members, &Site::root(&root_type), &mut report)?;
        report.assigned = loaded.assigned;

        tracing::debug!(
            type_name = object.type_name.as_str(),
            "Loaded {} members with {} issues",
            report.assigned,
            report.issues.len()
        );

        Ok(report)
    }

    /// Create a fresh instance of the document's type and load into it
    pub fn instantiate(&self, document: &JsonValue) -> Result<(ScriptObject, LoadReport)> {
        let type_name = document
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| GatewayError::MalformedDocument("missing 'type' field".to_string()))?;

        let mut object = ScriptObject::new(type_name);
        let report = self.load_into(&mut object, document)?;
        Ok((object, report))
    }

    fn composite(&self, type_name: &str) -> Result<&'a TypeDescriptor> {
        let types: &'a dyn TypeIntrospector = self.types;
        let descriptor = types
            .type_info(type_name)
            .ok_or_else(|| GatewayError::UnknownType(type_name.to_string()))?;
        match descriptor.shape {
            TypeShape::Composite { .. } => Ok(descriptor),
            _ => Err(GatewayError::NotComposite(type_name.to_string())),
        }
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    fn save_members(&self, object: &ScriptObject) -> Result<Map<String, JsonValue>> {
        let descriptor = self.composite(&object.type_name)?;
        let mut node = Map::new();

        for member in self.policy.exposed_members(self.types, descriptor) {
            let Some(value) = object.get(&member.name) else {
                continue;
            };
            match self.encode(&member.declared_type, value)? {
                Some(encoded) => {
                    node.insert(member.name.clone(), encoded);
                }
                None => tracing::warn!(
                    type_name = object.type_name.as_str(),
                    member = member.name.as_str(),
                    "Skipping value that does not match declared type {}",
                    member.declared_type
                ),
            }
        }

        Ok(node)
    }

    fn encode(&self, type_ref: &TypeRef, value: &Value) -> Result<Option<JsonValue>> {
        let encoded = match type_ref {
            TypeRef::Primitive(kind) => (value.primitive_kind() == Some(*kind))
                .then(|| JsonValue::String(format_value(value))),
            TypeRef::Named(name) => {
                let Some(descriptor) = self.types.type_info(name) else {
                    return Ok(None);
                };
                self.encode_named(descriptor, value)?
            }
            TypeRef::Array(inner) | TypeRef::List(inner) => {
                let Value::Array(items) = value else {
                    return Ok(None);
                };
                let mut nodes = Vec::with_capacity(items.len());
                for item in items {
                    match self.encode(inner, item)? {
                        Some(node) => nodes.push(node),
                        None => return Ok(None),
                    }
                }
                Some(JsonValue::Array(nodes))
            }
        };
        Ok(encoded)
    }

    fn encode_named(&self, descriptor: &TypeDescriptor, value: &Value) -> Result<Option<JsonValue>> {
        let encoded = match (&descriptor.shape, value) {
            (TypeShape::Enum { .. }, Value::Enum(enum_value)) if enum_value.type_name == descriptor.name => {
                match self.enum_encoding {
                    EnumEncoding::Name => Some(JsonValue::String(enum_value.name.clone())),
                    EnumEncoding::Underlying => self
                        .codec
                        .enum_to_underlying(self.types, &descriptor.name, value)
                        .map(|underlying| JsonValue::String(format_value(&underlying))),
                }
            }
            (TypeShape::Composite { by_value: true, .. }, Value::Composite(object))
                if object.type_name == descriptor.name =>
            {
                Some(JsonValue::Object(self.save_members(object)?))
            }
            (TypeShape::Composite { by_value: false, .. } | TypeShape::Opaque, Value::Reference(reference)) => {
                Some(JsonValue::String(reference.id().to_string()))
            }
            _ => None,
        };
        Ok(encoded)
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    fn load_members(
        &self,
        object: &mut ScriptObject,
        node: &Map<String, JsonValue>,
        scope: &Site<'_>,
        report: &mut LoadReport,
    ) -> Result<Loaded> {
        let descriptor = self.composite(&object.type_name)?;
        let mut loaded = Loaded::default();

        for (name, member_node) in node {
            let site = scope.member(name);
            let Some(member) = descriptor.member(name) else {
                report.record(site.issue(|type_name, member| LoadIssue::UnknownMember { type_name, member }));
                continue;
            };

            if !self.policy.is_exposed(self.types, member) {
                report.record(site.issue(|type_name, member| LoadIssue::NotExposed { type_name, member }));
                continue;
            }

            let current = object.get(name).cloned();
            match self.decode(&site, &member.declared_type, member_node, current, report)? {
                Some(value) => {
                    object.set(name.clone(), value);
                    loaded.assigned += 1;
                }
                None => loaded.rejected += 1,
            }
        }

        Ok(loaded)
    }

    fn decode(
        &self,
        site: &Site<'_>,
        type_ref: &TypeRef,
        node: &JsonValue,
        current: Option<Value>,
        report: &mut LoadReport,
    ) -> Result<Option<Value>> {
        match type_ref {
            TypeRef::Primitive(_) => Ok(self.decode_text(site, type_ref, node, report)),
            TypeRef::Named(name) => {
                let types: &'a dyn TypeIntrospector = self.types;
                match types.type_info(name) {
                    Some(descriptor) => self.decode_named(site, descriptor, node, current, report),
                    None => {
                        report.record(site.invalid(node));
                        Ok(None)
                    }
                }
            }
            TypeRef::Array(inner) | TypeRef::List(inner) => {
                let JsonValue::Array(nodes) = node else {
                    report.record(site.unexpected("an array"));
                    return Ok(None);
                };
                let mut items = Vec::with_capacity(nodes.len());
                for (index, item_node) in nodes.iter().enumerate() {
                    match self.decode(&site.element(index), inner, item_node, None, report)? {
                        Some(item) => items.push(item),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::Array(items)))
            }
        }
    }

    fn decode_named(
        &self,
        site: &Site<'_>,
        descriptor: &TypeDescriptor,
        node: &JsonValue,
        current: Option<Value>,
        report: &mut LoadReport,
    ) -> Result<Option<Value>> {
        match &descriptor.shape {
            TypeShape::Enum { underlying, .. } => match self.enum_encoding {
                EnumEncoding::Name => {
                    Ok(self.decode_text(site, &TypeRef::Named(descriptor.name.clone()), node, report))
                }
                EnumEncoding::Underlying => {
                    let Some(text) = node.as_str() else {
                        report.record(site.unexpected("a string"));
                        return Ok(None);
                    };
                    let value = self
                        .codec
                        .parse_value(self.types, &TypeRef::Primitive(underlying.primitive()), text)
                        .and_then(|raw| self.codec.enum_from_underlying(self.types, &descriptor.name, &raw));
                    if value.is_none() {
                        report.record(site.invalid(node));
                    }
                    Ok(value)
                }
            },
            TypeShape::Composite { by_value: true, .. } => match node {
                JsonValue::Object(members) => {
                    let prior = match current {
                        Some(Value::Composite(object)) if object.type_name == descriptor.name => Some(object),
                        _ => None,
                    };
                    let merging = prior.is_some();
                    let mut nested = prior.unwrap_or_else(|| ScriptObject::new(descriptor.name.clone()));
                    let loaded = self.load_members(&mut nested, members, site, report)?;

                    // A fresh struct must load whole; an existing one keeps the fields that failed.
                    let keep = if merging {
                        loaded.rejected == 0 || loaded.assigned > 0
                    } else {
                        loaded.rejected == 0
                    };
                    Ok(keep.then_some(Value::Composite(nested)))
                }
                JsonValue::String(_) if self.codec.has_parser(&descriptor.name) => {
                    Ok(self.decode_text(site, &TypeRef::Named(descriptor.name.clone()), node, report))
                }
                _ => {
                    report.record(site.unexpected("an object"));
                    Ok(None)
                }
            },
            TypeShape::Composite { by_value: false, .. } | TypeShape::Opaque => {
                let Some(id) = node.as_str() else {
                    report.record(site.unexpected("an object id string"));
                    return Ok(None);
                };
                let known = !id.is_empty() && self.resolver.is_none_or(|resolver| resolver.contains(id));
                if !known {
                    report.record(site.issue(|type_name, member| LoadIssue::UnresolvedReference {
                        type_name,
                        member,
                        id: id.to_string(),
                    }));
                    return Ok(None);
                }
                Ok(Some(Value::Reference(ObjectRef::new(id))))
            }
        }
    }

    fn decode_text(
        &self,
        site: &Site<'_>,
        type_ref: &TypeRef,
        node: &JsonValue,
        report: &mut LoadReport,
    ) -> Option<Value> {
        let Some(text) = node.as_str() else {
            report.record(site.unexpected("a string"));
            return None;
        };
        let value = self.codec.parse_value(self.types, type_ref, text);
        if value.is_none() {
            report.record(site.invalid(node));
        }
        value
    }
}

/// Member counts of one composite node
#[derive(Default)]
struct Loaded {
    assigned: usize,
    rejected: usize,
}

/// Where in the instance a value is being loaded
///
/// `path` is relative to the root type: `Speed`, `Position.y`, `Path[1].x`.
struct Site<'s> {
    type_name: &'s str,
    path: String,
}

impl<'s> Site<'s> {
    fn root(type_name: &'s str) -> Self {
        Self {
            type_name,
            path: String::new(),
        }
    }

    fn member(&self, name: &str) -> Site<'s> {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        };
        Site {
            type_name: self.type_name,
            path,
        }
    }

    fn element(&self, index: usize) -> Site<'s> {
        Site {
            type_name: self.type_name,
            path: format!("{}[{}]", self.path, index),
        }
    }

    fn issue(&self, build: impl FnOnce(String, String) -> LoadIssue) -> LoadIssue {
        build(self.type_name.to_string(), self.path.clone())
    }

    fn invalid(&self, node: &JsonValue) -> LoadIssue {
        let text = match node {
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        self.issue(|type_name, member| LoadIssue::InvalidData {
            type_name,
            member,
            text,
        })
    }

    fn unexpected(&self, expected: &'static str) -> LoadIssue {
        self.issue(|type_name, member| LoadIssue::UnexpectedNode {
            type_name,
            member,
            expected,
        })
    }
}
