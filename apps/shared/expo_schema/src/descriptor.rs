//! Member descriptors
//!
//! Plain, immutable snapshots of what a host introspector knows about a
//! script type's members. The exposure policy only ever looks at these
//! values, never at a live reflection API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Markers and Visibility
// ============================================================================

/// Flag attached to a member or a type that overrides default visibility
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// Force the member (or every member of this type) onto the exposed surface
    Expose,
    /// Keep the member off the exposed surface
    DoNotExpose,
}

/// Accessor visibility as reported by the host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    NonPublic,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

// ============================================================================
// Type References
// ============================================================================

/// Built-in numeric, boolean and character types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Name used in manifests and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }

    /// Inverse of [`PrimitiveKind::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => PrimitiveKind::Bool,
            "char" => PrimitiveKind::Char,
            "i8" => PrimitiveKind::I8,
            "u8" => PrimitiveKind::U8,
            "i16" => PrimitiveKind::I16,
            "u16" => PrimitiveKind::U16,
            "i32" => PrimitiveKind::I32,
            "u32" => PrimitiveKind::U32,
            "i64" => PrimitiveKind::I64,
            "u64" => PrimitiveKind::U64,
            "f32" => PrimitiveKind::F32,
            "f64" => PrimitiveKind::F64,
            _ => return None,
        })
    }

    /// The integral kind, if this primitive is an integer
    pub fn as_integral(self) -> Option<IntegralKind> {
        match self {
            PrimitiveKind::I8 => Some(IntegralKind::I8),
            PrimitiveKind::U8 => Some(IntegralKind::U8),
            PrimitiveKind::I16 => Some(IntegralKind::I16),
            PrimitiveKind::U16 => Some(IntegralKind::U16),
            PrimitiveKind::I32 => Some(IntegralKind::I32),
            PrimitiveKind::U32 => Some(IntegralKind::U32),
            PrimitiveKind::I64 => Some(IntegralKind::I64),
            PrimitiveKind::U64 => Some(IntegralKind::U64),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integral types an enum may be backed by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IntegralKind {
    I8,
    U8,
    I16,
    U16,
    #[default]
    I32,
    U32,
    I64,
    U64,
}

impl IntegralKind {
    /// Corresponding primitive kind
    pub fn primitive(self) -> PrimitiveKind {
        match self {
            IntegralKind::I8 => PrimitiveKind::I8,
            IntegralKind::U8 => PrimitiveKind::U8,
            IntegralKind::I16 => PrimitiveKind::I16,
            IntegralKind::U16 => PrimitiveKind::U16,
            IntegralKind::I32 => PrimitiveKind::I32,
            IntegralKind::U32 => PrimitiveKind::U32,
            IntegralKind::I64 => PrimitiveKind::I64,
            IntegralKind::U64 => PrimitiveKind::U64,
        }
    }

    /// Inclusive value range representable by this kind
    pub fn range(self) -> (i128, i128) {
        match self {
            IntegralKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntegralKind::U8 => (0, u8::MAX as i128),
            IntegralKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntegralKind::U16 => (0, u16::MAX as i128),
            IntegralKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntegralKind::U32 => (0, u32::MAX as i128),
            IntegralKind::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntegralKind::U64 => (0, u64::MAX as i128),
        }
    }

    /// Check whether `value` fits into this kind
    pub fn fits(self, value: i128) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }
}

/// Reference to a value type, as declared on a member
///
/// `Named` types are resolved through a [`crate::TypeIntrospector`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A built-in primitive
    Primitive(PrimitiveKind),
    /// An enum, struct, script or foreign type known by name
    Named(String),
    /// Fixed-element array
    Array(Box<TypeRef>),
    /// Single-type-parameter growable list
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeRef::Primitive(kind)
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn list_of(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    /// Element type when this is a single-element container
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(inner) | TypeRef::List(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.element().is_some()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(kind) => write!(f, "{}", kind),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Array(inner) => write!(f, "{}[]", inner),
            TypeRef::List(inner) => write!(f, "List<{}>", inner),
        }
    }
}

/// Parses the [`fmt::Display`] form: `i32`, `Vector3`, `T[]`, `List<T>`
impl std::str::FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(TypeRef::array_of(inner.parse()?));
        }
        if let Some(inner) = s.strip_prefix("List<").and_then(|rest| rest.strip_suffix('>')) {
            return Ok(TypeRef::list_of(inner.parse()?));
        }
        if s.is_empty() || s.contains(['<', '>', '[', ']']) {
            return Err(format!("Invalid type reference '{}'", s));
        }
        Ok(PrimitiveKind::from_name(s)
            .map(TypeRef::Primitive)
            .unwrap_or_else(|| TypeRef::named(s)))
    }
}

// ============================================================================
// Member Descriptors
// ============================================================================

/// Field or property, with the accessor information each kind carries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberKind {
    Field {
        #[serde(default)]
        visibility: Visibility,
    },
    Property {
        /// `None` when the property has no getter
        #[serde(default)]
        getter: Option<Visibility>,
        /// `None` when the property has no setter
        #[serde(default)]
        setter: Option<Visibility>,
        /// Number of index parameters taken by the getter (indexers have > 0)
        #[serde(default)]
        index_parameters: u32,
    },
}

/// Snapshot of one member of a script type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MemberDescriptor {
    /// Member name as written in the script
    pub name: String,

    /// Field or property accessor shape
    pub kind: MemberKind,

    /// Declared value type
    pub declared_type: TypeRef,

    /// Static (per-type) rather than instance member
    #[serde(rename = "static", default)]
    pub is_static: bool,

    /// Markers attached to the member itself
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub markers: BTreeSet<Marker>,
}

impl MemberDescriptor {
    /// Instance field with the given visibility and no markers
    pub fn field(name: impl Into<String>, declared_type: TypeRef, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field { visibility },
            declared_type,
            is_static: false,
            markers: BTreeSet::new(),
        }
    }

    /// Instance property with the given accessors and no markers
    pub fn property(
        name: impl Into<String>,
        declared_type: TypeRef,
        getter: Option<Visibility>,
        setter: Option<Visibility>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property {
                getter,
                setter,
                index_parameters: 0,
            },
            declared_type,
            is_static: false,
            markers: BTreeSet::new(),
        }
    }

    /// Attach a marker
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.insert(marker);
        self
    }

    /// Mark as static
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Set the getter's index parameter count (properties only)
    pub fn with_index_parameters(mut self, count: u32) -> Self {
        if let MemberKind::Property {
            index_parameters, ..
        } = &mut self.kind
        {
            *index_parameters = count;
        }
        self
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, MemberKind::Field { .. })
    }

    /// Whether the getter (or the field itself) is publicly visible
    pub fn get_accessible(&self) -> bool {
        match &self.kind {
            MemberKind::Field { visibility } => visibility.is_public(),
            MemberKind::Property { getter, .. } => getter.is_some_and(Visibility::is_public),
        }
    }

    /// Whether the setter (or the field itself) is publicly visible
    pub fn set_accessible(&self) -> bool {
        match &self.kind {
            MemberKind::Field { visibility } => visibility.is_public(),
            MemberKind::Property { setter, .. } => setter.is_some_and(Visibility::is_public),
        }
    }

    pub fn has_index_parameters(&self) -> bool {
        matches!(self.kind, MemberKind::Property { index_parameters, .. } if index_parameters > 0)
    }
}
