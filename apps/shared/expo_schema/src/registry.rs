//! Type registry
//!
//! Indexes a [`TypeManifest`] by type name and cross-checks it, so that every
//! `Named` reference handed to the policy engine or codec resolves.

use std::collections::{HashMap, HashSet};

use crate::descriptor::TypeRef;
use crate::manifest::{TypeDescriptor, TypeManifest, TypeShape};
use crate::{Result, SchemaError, Validatable};

/// Source of type metadata for the exposure policy and value codec
///
/// Implemented by [`TypeRegistry`]; hosts with their own introspection may
/// implement it directly.
pub trait TypeIntrospector {
    /// Look up a type by name
    fn type_info(&self, name: &str) -> Option<&TypeDescriptor>;

    /// Module holding the engine's own script-facing types
    fn engine_module(&self) -> &str;
}

/// Validated, name-indexed set of type descriptors
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    engine_module: String,
    types: HashMap<String, TypeDescriptor>,
    /// Names in manifest order, for stable listings
    order: Vec<String>,
}

impl TypeRegistry {
    /// Build a registry, rejecting duplicates, dangling references and
    /// malformed enums
    pub fn from_manifest(manifest: TypeManifest) -> Result<Self> {
        let mut types = HashMap::with_capacity(manifest.types.len());
        let mut order = Vec::with_capacity(manifest.types.len());

        for descriptor in manifest.types {
            if types.contains_key(&descriptor.name) {
                return Err(SchemaError::DuplicateType(descriptor.name));
            }
            order.push(descriptor.name.clone());
            types.insert(descriptor.name.clone(), descriptor);
        }

        let registry = Self {
            engine_module: manifest.engine_module,
            types,
            order,
        };
        registry.check()?;

        tracing::debug!(
            "Type registry ready: {} types, engine module '{}'",
            registry.order.len(),
            registry.engine_module
        );

        Ok(registry)
    }

    /// Load, schema-validate and index a manifest file
    pub fn from_json_file(path: &str) -> Result<Self> {
        Self::from_manifest(TypeManifest::from_json_file(path)?)
    }

    /// Load, schema-validate and index a manifest string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_manifest(TypeManifest::from_json_str(json)?)
    }

    /// Iterate types in manifest order
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn check(&self) -> Result<()> {
        for descriptor in self.iter() {
            match &descriptor.shape {
                TypeShape::Enum {
                    underlying,
                    variants,
                } => {
                    let mut seen = HashSet::new();
                    for variant in variants {
                        if !seen.insert(variant.name.as_str()) {
                            return Err(SchemaError::InvalidEnum {
                                type_name: descriptor.name.clone(),
                                reason: format!("variant '{}' is declared twice", variant.name),
                            });
                        }
                        if !underlying.fits(variant.value) {
                            return Err(SchemaError::InvalidEnum {
                                type_name: descriptor.name.clone(),
                                reason: format!(
                                    "variant '{}' value {} does not fit in {}",
                                    variant.name,
                                    variant.value,
                                    underlying.primitive()
                                ),
                            });
                        }
                    }
                }
                TypeShape::Composite { members, .. } => {
                    for member in members {
                        self.check_resolves(&descriptor.name, &member.declared_type)?;
                    }
                }
                TypeShape::Opaque => {}
            }
        }
        Ok(())
    }

    fn check_resolves(&self, owner: &str, type_ref: &TypeRef) -> Result<()> {
        match type_ref {
            TypeRef::Primitive(_) => Ok(()),
            TypeRef::Named(name) if self.types.contains_key(name) => Ok(()),
            TypeRef::Named(name) => Err(SchemaError::UnresolvedType {
                owner: owner.to_string(),
                name: name.clone(),
            }),
            TypeRef::Array(inner) | TypeRef::List(inner) => self.check_resolves(owner, inner),
        }
    }
}

impl TypeIntrospector for TypeRegistry {
    fn type_info(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    fn engine_module(&self) -> &str {
        &self.engine_module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{IntegralKind, Marker};

    #[test]
    fn test_registry_from_manifest() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                { "name": "Vector3", "module": "engine", "shape": { "kind": "composite", "by_value": true } },
                {
                    "name": "Mover",
                    "module": "game",
                    "shape": {
                        "kind": "composite",
                        "members": [
                            {
                                "name": "Path",
                                "kind": { "type": "field", "visibility": "public" },
                                "declared_type": { "array": { "named": "Vector3" } }
                            }
                        ]
                    }
                }
            ]
        }"#;

        let registry = TypeRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.engine_module(), "engine");
        assert!(registry.type_info("Vector3").is_some());
        assert!(registry.type_info("Missing").is_none());

        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Vector3", "Mover"]);
    }

    #[test]
    fn test_registry_rejects_duplicate_type() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                { "name": "A", "module": "m", "shape": { "kind": "opaque" } },
                { "name": "A", "module": "m", "shape": { "kind": "opaque" } }
            ]
        }"#;

        let result = TypeRegistry::from_json_str(json);
        assert!(matches!(result, Err(SchemaError::DuplicateType(name)) if name == "A"));
    }

    #[test]
    fn test_registry_rejects_unresolved_reference() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                {
                    "name": "Mover",
                    "module": "game",
                    "shape": {
                        "kind": "composite",
                        "members": [
                            {
                                "name": "Target",
                                "kind": { "type": "field", "visibility": "public" },
                                "declared_type": { "list": { "named": "Ghost" } }
                            }
                        ]
                    }
                }
            ]
        }"#;

        let result = TypeRegistry::from_json_str(json);
        assert!(matches!(
            result,
            Err(SchemaError::UnresolvedType { owner, name }) if owner == "Mover" && name == "Ghost"
        ));
    }

    #[test]
    fn test_registry_rejects_enum_value_out_of_range() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                {
                    "name": "Small",
                    "module": "game",
                    "shape": {
                        "kind": "enum",
                        "underlying": "u8",
                        "variants": [ { "name": "Big", "value": 300 } ]
                    }
                }
            ]
        }"#;

        let result = TypeRegistry::from_json_str(json);
        assert!(matches!(result, Err(SchemaError::InvalidEnum { .. })));
    }

    #[test]
    fn test_registry_rejects_duplicate_variant() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                {
                    "name": "Dir",
                    "module": "game",
                    "shape": {
                        "kind": "enum",
                        "variants": [ { "name": "Up", "value": 0 }, { "name": "Up", "value": 1 } ]
                    }
                }
            ]
        }"#;

        assert!(matches!(
            TypeRegistry::from_json_str(json),
            Err(SchemaError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn test_registry_loads_demo_manifest() {
        let registry = TypeRegistry::from_json_str(include_str!("../../../../demos/types.json")).unwrap();
        assert_eq!(registry.engine_module(), "engine");

        let direction = registry.type_info("Direction").unwrap();
        assert_eq!(direction.underlying(), Some(IntegralKind::U8));
        assert!(direction.has_marker(Marker::Expose));
        assert_eq!(direction.variant_by_name("West").map(|v| v.value), Some(3));
        assert_eq!(direction.variant_by_value(2).map(|v| v.name.as_str()), Some("South"));

        let mover = registry.type_info("Mover").unwrap();
        assert_eq!(
            mover.member("Path").map(|m| &m.declared_type),
            Some(&TypeRef::list_of(TypeRef::named("Vector3")))
        );
        assert!(mover.member("Count").is_some_and(|m| m.is_static));
    }

    #[test]
    fn test_registry_loads_enum_with_underlying_kind() {
        let json = r#"{
            "engine_module": "engine",
            "types": [
                {
                    "name": "Direction",
                    "module": "game",
                    "shape": {
                        "kind": "enum",
                        "underlying": "u8",
                        "variants": [ { "name": "North", "value": 0 }, { "name": "South", "value": 255 } ]
                    }
                },
                {
                    "name": "Mover",
                    "module": "game",
                    "shape": {
                        "kind": "composite",
                        "members": [
                            {
                                "name": "Heading",
                                "kind": { "type": "property", "getter": "public", "setter": "public" },
                                "declared_type": { "named": "Direction" }
                            }
                        ]
                    }
                }
            ]
        }"#;

        let registry = TypeRegistry::from_json_str(json).unwrap();
        let direction = registry.type_info("Direction").unwrap();
        assert!(direction.is_enum());
        assert_eq!(direction.variant_by_name("South").map(|v| v.value), Some(255));
    }
}
