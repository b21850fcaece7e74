//! Runtime values produced by the codec and assigned by the gateway

use std::collections::BTreeMap;
use std::fmt;

use expo_schema::PrimitiveKind;

/// Value of an enum type, carrying both its name and its discriminant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: String,
    pub name: String,
    pub discriminant: i128,
}

/// Identifier of an engine object persisted by reference
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub String);

impl ObjectRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Live state of a script (or engine struct) instance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScriptObject {
    pub type_name: String,
    pub members: BTreeMap<String, Value>,
}

impl ScriptObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Builder-style member assignment
    pub fn with(mut self, member: impl Into<String>, value: Value) -> Self {
        self.members.insert(member.into(), value);
        self
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    pub fn set(&mut self, member: impl Into<String>, value: Value) {
        self.members.insert(member.into(), value);
    }
}

/// Typed runtime value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(EnumValue),
    Composite(ScriptObject),
    Array(Vec<Value>),
    Reference(ObjectRef),
}

impl Value {
    /// Primitive kind of this value, if it is a primitive
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Char(_) => PrimitiveKind::Char,
            Value::I8(_) => PrimitiveKind::I8,
            Value::U8(_) => PrimitiveKind::U8,
            Value::I16(_) => PrimitiveKind::I16,
            Value::U16(_) => PrimitiveKind::U16,
            Value::I32(_) => PrimitiveKind::I32,
            Value::U32(_) => PrimitiveKind::U32,
            Value::I64(_) => PrimitiveKind::I64,
            Value::U64(_) => PrimitiveKind::U64,
            Value::F32(_) => PrimitiveKind::F32,
            Value::F64(_) => PrimitiveKind::F64,
            _ => return None,
        })
    }

    /// Integer payload widened to i128
    pub fn as_integral(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::I64(v) => Some(v.into()),
            Value::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&ScriptObject> {
        match self {
            Value::Composite(object) => Some(object),
            _ => None,
        }
    }
}

/// Canonical text for leaves; a readable rendering for everything else
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Enum(v) => f.write_str(&v.name),
            Value::Reference(r) => write!(f, "@{}", r.0),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Composite(object) => {
                write!(f, "{} {{", object.type_name)?;
                for (i, (name, value)) in object.members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                f.write_str(" }")
            }
        }
    }
}
