use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Type '{0}' has no members to persist")]
    NotComposite(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Document describes type '{found}' but the instance is of type '{expected}'")]
    TypeMismatch { expected: String, found: String },
}
