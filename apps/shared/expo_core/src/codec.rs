//! Value Codec
//!
//! Turns persisted text into typed [`Value`]s and back. Parsing uses one
//! fixed, locale-independent convention so documents load identically on
//! every machine:
//!
//! - surrounding whitespace is ignored (except for `char`)
//! - `.` is the only decimal separator, no digit grouping
//! - integers are plain decimal with an optional sign
//! - booleans are `true`/`false`, case-insensitive
//! - enums are matched by variant name, case-sensitive
//!
//! Every failure is reported as `None`. A custom parser that panics is
//! contained and treated the same way.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use expo_schema::{IntegralKind, PrimitiveKind, TypeDescriptor, TypeIntrospector, TypeRef};

use crate::value::{EnumValue, Value};

/// Parse capability registered for a named leaf type
pub type ParseFn = Box<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Capability table mapping leaf types to their text parsers
///
/// Primitives and enums are built in. Hosts register parsers for simple
/// module-defined types (vectors, colors, ...) by type name.
#[derive(Default)]
pub struct ValueCodec {
    parsers: HashMap<String, ParseFn>,
}

impl ValueCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser for a named leaf type, replacing any previous one
    pub fn register_parser<F>(&mut self, type_name: impl Into<String>, parser: F)
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.parsers.insert(type_name.into(), Box::new(parser));
    }

    /// Builder-style [`ValueCodec::register_parser`]
    pub fn with_parser<F>(mut self, type_name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.register_parser(type_name, parser);
        self
    }

    pub fn has_parser(&self, type_name: &str) -> bool {
        self.parsers.contains_key(type_name)
    }

    /// Reconstruct a value of `target` from persisted text
    pub fn parse_value(&self, types: &dyn TypeIntrospector, target: &TypeRef, text: &str) -> Option<Value> {
        let parsed = match target {
            TypeRef::Primitive(kind) => parse_primitive(*kind, text),
            TypeRef::Named(name) => match types.type_info(name) {
                Some(descriptor) if descriptor.is_enum() => parse_enum(descriptor, text),
                Some(_) => self.parse_custom(name, text),
                None => None,
            },
            TypeRef::Array(_) | TypeRef::List(_) => None,
        };

        if parsed.is_none() {
            tracing::debug!(type_name = %target, "No value parsed from {:?}", text);
        }
        parsed
    }

    /// Reinterpret an enum value as its underlying integral type
    pub fn enum_to_underlying(
        &self,
        types: &dyn TypeIntrospector,
        enum_type: &str,
        value: &Value,
    ) -> Option<Value> {
        let descriptor = types.type_info(enum_type)?;
        let underlying = descriptor.underlying()?;
        let enum_value = value.as_enum()?;
        if enum_value.type_name != descriptor.name {
            return None;
        }
        integral_value(underlying, enum_value.discriminant)
    }

    /// Map an underlying integral value back to the enum variant carrying it
    pub fn enum_from_underlying(
        &self,
        types: &dyn TypeIntrospector,
        enum_type: &str,
        underlying: &Value,
    ) -> Option<Value> {
        let descriptor = types.type_info(enum_type)?;
        let kind = descriptor.underlying()?;
        let discriminant = underlying.as_integral()?;
        if !kind.fits(discriminant) {
            return None;
        }
        let variant = descriptor.variant_by_value(discriminant)?;
        Some(Value::Enum(EnumValue {
            type_name: descriptor.name.clone(),
            name: variant.name.clone(),
            discriminant,
        }))
    }

    fn parse_custom(&self, type_name: &str, text: &str) -> Option<Value> {
        let parser = self.parsers.get(type_name)?;
        match catch_unwind(AssertUnwindSafe(|| parser(text))) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(type_name, "Parser panicked on {:?}", text);
                None
            }
        }
    }
}

impl fmt::Debug for ValueCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ValueCodec").field("parsers", &names).finish()
    }
}

/// Canonical persisted text for a value
///
/// `parse_value(T, &format_value(v))` yields `v` again for every leaf `v` of `T`.
pub fn format_value(value: &Value) -> String {
    value.to_string()
}

/// Parse a primitive with the invariant convention
pub fn parse_primitive(kind: PrimitiveKind, text: &str) -> Option<Value> {
    if kind == PrimitiveKind::Char {
        let mut chars = text.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Value::Char(c)),
            _ => None,
        };
    }

    let text = text.trim();
    match kind {
        PrimitiveKind::Bool => parse_bool(text).map(Value::Bool),
        PrimitiveKind::I8 => text.parse().ok().map(Value::I8),
        PrimitiveKind::U8 => text.parse().ok().map(Value::U8),
        PrimitiveKind::I16 => text.parse().ok().map(Value::I16),
        PrimitiveKind::U16 => text.parse().ok().map(Value::U16),
        PrimitiveKind::I32 => text.parse().ok().map(Value::I32),
        PrimitiveKind::U32 => text.parse().ok().map(Value::U32),
        PrimitiveKind::I64 => text.parse().ok().map(Value::I64),
        PrimitiveKind::U64 => text.parse().ok().map(Value::U64),
        PrimitiveKind::F32 => text.parse().ok().map(Value::F32),
        PrimitiveKind::F64 => text.parse().ok().map(Value::F64),
        PrimitiveKind::Char => None,
    }
}

/// Parse an enum value by variant name
pub fn parse_enum(descriptor: &TypeDescriptor, text: &str) -> Option<Value> {
    let variant = descriptor.variant_by_name(text.trim())?;
    Some(Value::Enum(EnumValue {
        type_name: descriptor.name.clone(),
        name: variant.name.clone(),
        discriminant: variant.value,
    }))
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn integral_value(kind: IntegralKind, value: i128) -> Option<Value> {
    match kind {
        IntegralKind::I8 => i8::try_from(value).ok().map(Value::I8),
        IntegralKind::U8 => u8::try_from(value).ok().map(Value::U8),
        IntegralKind::I16 => i16::try_from(value).ok().map(Value::I16),
        IntegralKind::U16 => u16::try_from(value).ok().map(Value::U16),
        IntegralKind::I32 => i32::try_from(value).ok().map(Value::I32),
        IntegralKind::U32 => u32::try_from(value).ok().map(Value::U32),
        IntegralKind::I64 => i64::try_from(value).ok().map(Value::I64),
        IntegralKind::U64 => u64::try_from(value).ok().map(Value::U64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScriptObject;
    use expo_schema::{EnumVariant, TypeManifest, TypeRegistry, TypeShape};

    fn registry() -> TypeRegistry {
        TypeRegistry::from_manifest(TypeManifest {
            engine_module: "engine".to_string(),
            types: vec![
                TypeDescriptor::new(
                    "Direction",
                    "game",
                    TypeShape::Enum {
                        underlying: IntegralKind::U8,
                        variants: vec![EnumVariant::new("North", 0), EnumVariant::new("South", 1)],
                    },
                ),
                TypeDescriptor::new(
                    "Layer",
                    "engine",
                    TypeShape::Enum {
                        underlying: IntegralKind::I16,
                        variants: vec![EnumVariant::new("Back", -1), EnumVariant::new("Front", 1)],
                    },
                ),
                TypeDescriptor::new(
                    "Vector2",
                    "engine",
                    TypeShape::Composite {
                        by_value: true,
                        members: vec![],
                    },
                ),
                TypeDescriptor::new("Mover", "game", TypeShape::Composite {
                    by_value: false,
                    members: vec![],
                }),
            ],
        })
        .unwrap()
    }

    fn prim(kind: PrimitiveKind) -> TypeRef {
        TypeRef::primitive(kind)
    }

    fn vector2_parser(text: &str) -> Option<Value> {
        let (x, y) = text.split_once(',')?;
        let x = parse_primitive(PrimitiveKind::F32, x)?;
        let y = parse_primitive(PrimitiveKind::F32, y)?;
        Some(Value::Composite(ScriptObject::new("Vector2").with("x", x).with("y", y)))
    }

    #[test]
    fn test_float_scenario() {
        let codec = ValueCodec::new();
        let types = registry();
        assert_eq!(
            codec.parse_value(&types, &prim(PrimitiveKind::F32), "3.5"),
            Some(Value::F32(3.5))
        );
    }

    #[test]
    fn test_enum_scenario() {
        let codec = ValueCodec::new();
        let types = registry();
        let direction = TypeRef::named("Direction");

        let north = codec.parse_value(&types, &direction, "North").unwrap();
        assert_eq!(
            north,
            Value::Enum(EnumValue {
                type_name: "Direction".to_string(),
                name: "North".to_string(),
                discriminant: 0,
            })
        );
        assert_eq!(codec.parse_value(&types, &direction, "Northish"), None);
        assert_eq!(codec.parse_value(&types, &direction, "NonexistentMember"), None);
        assert_eq!(codec.parse_value(&types, &direction, "north"), None);
        assert_eq!(codec.parse_value(&types, &direction, "0"), None);
    }

    #[test]
    fn test_primitive_round_trip() {
        let codec = ValueCodec::new();
        let types = registry();
        let values = [
            Value::Bool(true),
            Value::Bool(false),
            Value::Char('x'),
            Value::Char(' '),
            Value::Char('é'),
            Value::I8(i8::MIN),
            Value::U8(u8::MAX),
            Value::I16(-1234),
            Value::U16(u16::MAX),
            Value::I32(i32::MIN),
            Value::U32(u32::MAX),
            Value::I64(i64::MIN),
            Value::U64(u64::MAX),
            Value::F32(3.5),
            Value::F32(0.1),
            Value::F32(f32::MIN_POSITIVE),
            Value::F32(f32::MAX),
            Value::F32(f32::NEG_INFINITY),
            Value::F64(0.1),
            Value::F64(-2.5e-300),
            Value::F64(f64::MAX),
            Value::F64(f64::INFINITY),
        ];

        for value in values {
            let kind = value.primitive_kind().unwrap();
            let text = format_value(&value);
            assert_eq!(
                codec.parse_value(&types, &prim(kind), &text),
                Some(value.clone()),
                "{} as {}",
                text,
                kind
            );
        }
    }

    #[test]
    fn test_nan_round_trip() {
        let codec = ValueCodec::new();
        let types = registry();
        let text = format_value(&Value::F64(f64::NAN));
        match codec.parse_value(&types, &prim(PrimitiveKind::F64), &text) {
            Some(Value::F64(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_text_yields_no_value() {
        let codec = ValueCodec::new();
        let types = registry();
        let kinds = [
            PrimitiveKind::Bool,
            PrimitiveKind::Char,
            PrimitiveKind::I8,
            PrimitiveKind::U8,
            PrimitiveKind::I32,
            PrimitiveKind::U64,
            PrimitiveKind::F32,
            PrimitiveKind::F64,
        ];

        for kind in kinds {
            assert_eq!(codec.parse_value(&types, &prim(kind), ""), None, "{}", kind);
            assert_eq!(codec.parse_value(&types, &prim(kind), "not-a-number"), None, "{}", kind);
        }

        assert_eq!(codec.parse_value(&types, &prim(PrimitiveKind::U8), "256"), None);
        assert_eq!(codec.parse_value(&types, &prim(PrimitiveKind::U8), "-1"), None);
        assert_eq!(codec.parse_value(&types, &prim(PrimitiveKind::I32), "1,000"), None);
        assert_eq!(codec.parse_value(&types, &prim(PrimitiveKind::F64), "3,5"), None);
        assert_eq!(codec.parse_value(&types, &prim(PrimitiveKind::Char), "ab"), None);
    }

    #[test]
    fn test_invariant_convention() {
        let codec = ValueCodec::new();
        let types = registry();
        assert_eq!(
            codec.parse_value(&types, &prim(PrimitiveKind::I32), "  -42\n"),
            Some(Value::I32(-42))
        );
        assert_eq!(
            codec.parse_value(&types, &prim(PrimitiveKind::I32), "+7"),
            Some(Value::I32(7))
        );
        assert_eq!(
            codec.parse_value(&types, &prim(PrimitiveKind::Bool), "TRUE"),
            Some(Value::Bool(true))
        );
        assert_eq!(
            codec.parse_value(&types, &prim(PrimitiveKind::F64), "1e3"),
            Some(Value::F64(1000.0))
        );
        assert_eq!(
            codec.parse_value(&types, &TypeRef::named("Direction"), " South "),
            Some(Value::Enum(EnumValue {
                type_name: "Direction".to_string(),
                name: "South".to_string(),
                discriminant: 1,
            }))
        );
    }

    #[test]
    fn test_non_leaf_targets_yield_no_value() {
        let codec = ValueCodec::new();
        let types = registry();
        assert_eq!(codec.parse_value(&types, &TypeRef::named("Mover"), "anything"), None);
        assert_eq!(codec.parse_value(&types, &TypeRef::named("Vector2"), "1,2"), None);
        assert_eq!(codec.parse_value(&types, &TypeRef::named("Unknown"), "1"), None);
        assert_eq!(
            codec.parse_value(&types, &TypeRef::array_of(prim(PrimitiveKind::I32)), "1"),
            None
        );
    }

    #[test]
    fn test_custom_parser() {
        let codec = ValueCodec::new().with_parser("Vector2", vector2_parser);
        let types = registry();
        let parsed = codec.parse_value(&types, &TypeRef::named("Vector2"), "1.5, -2").unwrap();
        let object = parsed.as_composite().unwrap();
        assert_eq!(object.get("x"), Some(&Value::F32(1.5)));
        assert_eq!(object.get("y"), Some(&Value::F32(-2.0)));
        assert_eq!(codec.parse_value(&types, &TypeRef::named("Vector2"), "1.5"), None);
        assert!(codec.has_parser("Vector2"));
        assert!(!codec.has_parser("Mover"));
    }

    #[test]
    fn test_panicking_parser_is_contained() {
        let codec = ValueCodec::new().with_parser("Vector2", |text: &str| -> Option<Value> {
            panic!("cannot handle {}", text)
        });
        let types = registry();
        assert_eq!(codec.parse_value(&types, &TypeRef::named("Vector2"), "boom"), None);
    }

    #[test]
    fn test_enum_to_underlying() {
        let codec = ValueCodec::new();
        let types = registry();

        let south = codec.parse_value(&types, &TypeRef::named("Direction"), "South").unwrap();
        assert_eq!(codec.enum_to_underlying(&types, "Direction", &south), Some(Value::U8(1)));

        let back = codec.parse_value(&types, &TypeRef::named("Layer"), "Back").unwrap();
        assert_eq!(codec.enum_to_underlying(&types, "Layer", &back), Some(Value::I16(-1)));

        // Non-enum type, foreign enum value, non-enum value
        assert_eq!(codec.enum_to_underlying(&types, "Mover", &south), None);
        assert_eq!(codec.enum_to_underlying(&types, "Layer", &south), None);
        assert_eq!(codec.enum_to_underlying(&types, "Direction", &Value::U8(1)), None);
        assert_eq!(codec.enum_to_underlying(&types, "Missing", &south), None);
    }

    #[test]
    fn test_enum_from_underlying() {
        let codec = ValueCodec::new();
        let types = registry();

        let south = codec.enum_from_underlying(&types, "Direction", &Value::U8(1)).unwrap();
        assert_eq!(south.as_enum().map(|e| e.name.as_str()), Some("South"));
        assert_eq!(codec.enum_to_underlying(&types, "Direction", &south), Some(Value::U8(1)));

        assert_eq!(codec.enum_from_underlying(&types, "Direction", &Value::U8(9)), None);
        assert_eq!(codec.enum_from_underlying(&types, "Direction", &Value::I32(-1)), None);
        assert_eq!(codec.enum_from_underlying(&types, "Direction", &Value::F32(1.0)), None);
        assert_eq!(codec.enum_from_underlying(&types, "Mover", &Value::U8(0)), None);
    }

    #[test]
    fn test_codec_shared_across_threads() {
        let codec = ValueCodec::new().with_parser("Vector2", vector2_parser);
        let types = registry();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let codec = &codec;
                let types = &types;
                scope.spawn(move || {
                    for j in 0..100 {
                        let text = format!("{}", i * 1000 + j);
                        assert_eq!(
                            codec.parse_value(types, &TypeRef::primitive(PrimitiveKind::I32), &text),
                            Some(Value::I32(i * 1000 + j))
                        );
                        assert!(codec.parse_value(types, &TypeRef::named("Vector2"), "1,2").is_some());
                    }
                });
            }
        });
    }
}
