//! Exposure Policy
//!
//! Decides whether a member belongs to the persistable, inspectable surface
//! of its declaring type. The decision depends only on the member descriptor
//! and, when the type gate is on, on what the introspector says about the
//! member's value type.
//!
//! # Rules
//!
//! 1. Static members are never exposed.
//! 2. Properties need a getter and a setter, and the getter must take no
//!    index parameters.
//! 3. Type gate: the value type (the element type for arrays and lists) must
//!    be a primitive, belong to the engine module, or carry a type-level
//!    `Expose` marker. Member markers cannot override a failed gate.
//! 4. `DoNotExpose` excludes, then `Expose` includes.
//! 5. Otherwise a field must be public, and a property must have a public
//!    getter and a public setter.

use expo_schema::{Marker, MemberDescriptor, MemberKind, TypeDescriptor, TypeIntrospector, TypeRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether the value-type check runs before markers are consulted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeGate {
    /// Check the declared type, or the element type of a container
    #[default]
    ContainerAware,
    /// Skip the check; only shape, markers and visibility decide
    Disabled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExposurePolicy {
    pub type_gate: TypeGate,
}

impl ExposurePolicy {
    pub fn new(type_gate: TypeGate) -> Self {
        Self { type_gate }
    }

    /// Decide whether `member` is part of its type's exposed surface
    pub fn is_exposed(&self, types: &dyn TypeIntrospector, member: &MemberDescriptor) -> bool {
        if member.is_static {
            return false;
        }

        if let MemberKind::Property {
            getter,
            setter,
            index_parameters,
        } = &member.kind
        {
            if getter.is_none() || setter.is_none() || *index_parameters != 0 {
                return false;
            }
        }

        if self.type_gate == TypeGate::ContainerAware
            && !is_type_exposable(types, value_type_to_check(&member.declared_type))
        {
            return false;
        }

        if member.has_marker(Marker::DoNotExpose) {
            return false;
        }
        if member.has_marker(Marker::Expose) {
            return true;
        }

        // Fields report the same visibility for both accessors.
        member.get_accessible() && member.set_accessible()
    }

    /// Exposed members of a type, in declaration order
    pub fn exposed_members<'a>(
        &self,
        types: &dyn TypeIntrospector,
        descriptor: &'a TypeDescriptor,
    ) -> Vec<&'a MemberDescriptor> {
        descriptor
            .members()
            .iter()
            .filter(|member| self.is_exposed(types, member))
            .collect()
    }
}

/// [`ExposurePolicy::is_exposed`] with the default, container-aware gate
pub fn is_exposed(types: &dyn TypeIntrospector, member: &MemberDescriptor) -> bool {
    ExposurePolicy::default().is_exposed(types, member)
}

/// The type whose exposability decides the member: the element type for a
/// single-element container, the declared type otherwise
pub fn value_type_to_check(declared: &TypeRef) -> &TypeRef {
    declared.element().unwrap_or(declared)
}

/// Whether the persistence layer can represent values of `type_ref`
pub fn is_type_exposable(types: &dyn TypeIntrospector, type_ref: &TypeRef) -> bool {
    match type_ref {
        TypeRef::Primitive(_) => true,
        TypeRef::Named(name) => types.type_info(name).is_some_and(|descriptor| {
            descriptor.module == types.engine_module() || descriptor.has_marker(Marker::Expose)
        }),
        // Only one level of container is unwrapped.
        TypeRef::Array(_) | TypeRef::List(_) => false,
    }
}
