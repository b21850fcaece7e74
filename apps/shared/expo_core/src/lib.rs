//! Exposure Gateway Core
//!
//! Decides which members of a user-authored script type cross the boundary
//! into persisted documents and the editor, and turns persisted text back
//! into typed values.
//!
//! # Architecture
//!
//! - **ExposurePolicy**: pure decision over a [`MemberDescriptor`] (static,
//!   property shape, value-type gate, markers, visibility)
//! - **ValueCodec**: capability table of text parsers for primitives, enums
//!   and host-registered leaf types; never panics, failures are `None`
//! - **Gateway**: saves exposed members into JSON documents and loads them
//!   back into [`ScriptObject`]s, collecting per-member issues
//!
//! Type metadata comes from any [`TypeIntrospector`], usually a
//! [`expo_schema::TypeRegistry`] built from a validated type manifest.

pub mod codec;
pub mod error;
pub mod exposure;
pub mod gateway;
pub mod value;

pub use codec::{ParseFn, ValueCodec, format_value, parse_enum, parse_primitive};
pub use error::{GatewayError, Result};
pub use exposure::{ExposurePolicy, TypeGate, is_exposed, is_type_exposable, value_type_to_check};
pub use gateway::{EnumEncoding, Gateway, LoadIssue, LoadReport, ReferenceResolver};
pub use value::{EnumValue, ObjectRef, ScriptObject, Value};

pub use expo_schema::{MemberDescriptor, TypeIntrospector};
