use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::Validatable;
use crate::descriptor::{IntegralKind, Marker, MemberDescriptor};

/// One named value of an enum type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnumVariant {
    /// Symbolic name, used when values are persisted by name
    pub name: String,
    /// Discriminant, used when values are persisted numerically
    #[serde(
        serialize_with = "discriminant::serialize",
        deserialize_with = "discriminant::deserialize"
    )]
    pub value: i128,
}

/// JSON discriminants are 64-bit integers, signed or unsigned.
///
/// Shapes are internally tagged, and serde buffers tagged content in a form
/// that has no 128-bit integers, so the value is read through `i64`/`u64`.
mod discriminant {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        if let Ok(v) = i64::try_from(*value) {
            serializer.serialize_i64(v)
        } else if let Ok(v) = u64::try_from(*value) {
            serializer.serialize_u64(v)
        } else {
            Err(serde::ser::Error::custom(format!("discriminant {} exceeds 64 bits", value)))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        struct DiscriminantVisitor;

        impl<'de> Visitor<'de> for DiscriminantVisitor {
            type Value = i128;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer in the i64 or u64 range")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<i128, E> {
                Ok(value.into())
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<i128, E> {
                Ok(value.into())
            }
        }

        deserializer.deserialize_any(DiscriminantVisitor)
    }
}

impl EnumVariant {
    pub fn new(name: impl Into<String>, value: i128) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// What kind of type a [`TypeDescriptor`] describes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape {
    /// Enum with an integral backing type
    Enum {
        #[serde(default)]
        underlying: IntegralKind,
        variants: Vec<EnumVariant>,
    },
    /// Type with members of its own
    Composite {
        /// Value types are persisted inline; reference types by object id
        #[serde(default)]
        by_value: bool,
        /// Members in declaration order
        #[serde(default)]
        members: Vec<MemberDescriptor>,
    },
    /// Known type with nothing to inspect (e.g. a standard library type)
    Opaque,
}

/// Metadata for one type known to the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TypeDescriptor {
    /// Type name, unique within a manifest
    pub name: String,

    /// Logical module (assembly, crate, package) defining the type
    pub module: String,

    /// Type-level markers
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub markers: BTreeSet<Marker>,

    pub shape: TypeShape,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, module: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            markers: BTreeSet::new(),
            shape,
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.insert(marker);
        self
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.shape, TypeShape::Enum { .. })
    }

    /// Members in declaration order (empty for non-composite types)
    pub fn members(&self) -> &[MemberDescriptor] {
        match &self.shape {
            TypeShape::Composite { members, .. } => members,
            _ => &[],
        }
    }

    /// Find a member by name
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members().iter().find(|m| m.name == name)
    }

    /// Enum variant by symbolic name
    pub fn variant_by_name(&self, name: &str) -> Option<&EnumVariant> {
        match &self.shape {
            TypeShape::Enum { variants, .. } => variants.iter().find(|v| v.name == name),
            _ => None,
        }
    }

    /// First enum variant carrying the given discriminant
    pub fn variant_by_value(&self, value: i128) -> Option<&EnumVariant> {
        match &self.shape {
            TypeShape::Enum { variants, .. } => variants.iter().find(|v| v.value == value),
            _ => None,
        }
    }

    /// Backing integral kind, for enums
    pub fn underlying(&self) -> Option<IntegralKind> {
        match &self.shape {
            TypeShape::Enum { underlying, .. } => Some(*underlying),
            _ => None,
        }
    }
}

/// Type manifest (types.json)
/// Describes every type the host exposes to the gateway, as produced by the
/// host's introspection pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Type Manifest")]
#[schemars(description = "Script and engine type descriptors consumed by the exposure gateway")]
pub struct TypeManifest {
    /// Module holding the engine's own script-facing types
    #[schemars(description = "Name of the engine module; its types are always exposable")]
    pub engine_module: String,

    /// Type descriptors
    #[schemars(description = "All types that members may refer to")]
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl Validatable for TypeManifest {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{TypeRef, Visibility};

    const MANIFEST: &str = r#"{
        "engine_module": "engine",
        "types": [
            {
                "name": "Direction",
                "module": "game",
                "shape": {
                    "kind": "enum",
                    "underlying": "u8",
                    "variants": [
                        { "name": "North", "value": 0 },
                        { "name": "South", "value": 1 }
                    ]
                }
            },
            {
                "name": "Mover",
                "module": "game",
                "shape": {
                    "kind": "composite",
                    "members": [
                        {
                            "name": "Speed",
                            "kind": { "type": "field", "visibility": "public" },
                            "declared_type": { "primitive": "f32" }
                        },
                        {
                            "name": "Heading",
                            "kind": { "type": "property", "getter": "public", "setter": "public" },
                            "declared_type": { "named": "Direction" }
                        }
                    ]
                }
            },
            { "name": "String", "module": "std", "shape": { "kind": "opaque" } }
        ]
    }"#;

    #[test]
    fn test_valid_manifest() {
        let manifest = TypeManifest::from_json_str(MANIFEST).unwrap();
        assert_eq!(manifest.engine_module, "engine");
        assert_eq!(manifest.types.len(), 3);

        let mover = &manifest.types[1];
        assert_eq!(mover.members().len(), 2);
        let speed = mover.member("Speed").unwrap();
        assert_eq!(speed.declared_type, TypeRef::Primitive(crate::PrimitiveKind::F32));
        assert!(matches!(
            speed.kind,
            crate::MemberKind::Field {
                visibility: Visibility::Public
            }
        ));
    }

    #[test]
    fn test_enum_lookup() {
        let manifest = TypeManifest::from_json_str(MANIFEST).unwrap();
        let direction = &manifest.types[0];
        assert!(direction.is_enum());
        assert_eq!(direction.underlying(), Some(IntegralKind::U8));
        assert_eq!(direction.variant_by_name("South").map(|v| v.value), Some(1));
        assert_eq!(direction.variant_by_value(0).map(|v| v.name.as_str()), Some("North"));
        assert!(direction.variant_by_name("south").is_none());
    }

    #[test]
    fn test_discriminants_span_i64_and_u64() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                {
                    "name": "Mask",
                    "module": "engine",
                    "shape": {
                        "kind": "enum",
                        "underlying": "u64",
                        "variants": [ { "name": "All", "value": 18446744073709551615 } ]
                    }
                },
                {
                    "name": "Offset",
                    "module": "engine",
                    "shape": {
                        "kind": "enum",
                        "underlying": "i64",
                        "variants": [ { "name": "Min", "value": -9223372036854775808 } ]
                    }
                }
            ]
        }"#;
        let manifest = TypeManifest::from_json_str(json).unwrap();
        assert_eq!(manifest.types[0].variant_by_name("All").map(|v| v.value), Some(u64::MAX as i128));
        assert_eq!(manifest.types[1].variant_by_name("Min").map(|v| v.value), Some(i64::MIN as i128));

        let written = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            written["types"][0]["shape"]["variants"][0]["value"],
            serde_json::json!(u64::MAX)
        );
        let reread: TypeManifest = serde_json::from_value(written).unwrap();
        assert_eq!(reread.types, manifest.types);
    }

    #[test]
    fn test_fractional_discriminant_rejected() {
        let json = r#"{
            "engine_module": "engine",
            "types": [ {
                "name": "Half",
                "module": "engine",
                "shape": { "kind": "enum", "variants": [ { "name": "A", "value": 0.5 } ] }
            } ]
        }"#;
        assert!(TypeManifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_manifest_missing_engine_module() {
        let json = r#"{ "types": [] }"#;
        assert!(TypeManifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_manifest_unknown_shape() {
        let json = r#"{
            "engine_module": "engine",
            "types": [ { "name": "X", "module": "m", "shape": { "kind": "union" } } ]
        }"#;
        assert!(TypeManifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_schema_json_generation() {
        let schema = TypeManifest::schema_json().unwrap();
        assert!(schema.contains("Type Manifest"));
        assert!(schema.contains("engine_module"));
    }
}
