use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read file '{0}': {1}")]
    IoError(String, #[source] std::io::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    ValidationError(String),

    #[error("Type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("Type '{owner}' refers to unknown type '{name}'")]
    UnresolvedType { owner: String, name: String },

    #[error("Enum '{type_name}' is invalid: {reason}")]
    InvalidEnum { type_name: String, reason: String },
}
