use miette::Diagnostic;
use thiserror::Error;

/// Result type for timber operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custom error types for parent tracking and weaving
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(timber::io_error))]
    Io(String),

    #[error("Nodes of type '{parent}' are not allowed to reference parent-aware objects of type '{object}'")]
    #[diagnostic(code(timber::illegal_parent_type))]
    IllegalParentType { object: String, parent: String },

    #[error("Parent-aware object of type '{object}' has {count} distinct parents, expected at most one")]
    #[diagnostic(code(timber::multiple_parents))]
    MultipleParents { object: String, count: usize },

    #[error("Cannot construct wrapper '{wrapper}' for field '{field}': expected constructor 'From<{expected}>'")]
    #[diagnostic(
        code(timber::wrapper_construction),
        help("specify the constructor argument type with `#[timber(wrap(Wrapper, arg = Type))]`")
    )]
    WrapperConstruction {
        wrapper: String,
        expected: String,
        field: String,
    },

    #[error("Failed to weave type '{type_name}': {message}")]
    #[diagnostic(code(timber::weave_error))]
    Weave { type_name: String, message: String },

    #[error("Parse error in {path}: {message}")]
    #[diagnostic(code(timber::parse_error))]
    Parse { path: String, message: String },

    #[error("Deserialization failed: {0}")]
    #[diagnostic(code(timber::deserialize_error))]
    Deserialize(String),

    #[error("Internal error: {message}")]
    #[diagnostic(code(timber::internal_error))]
    Internal { message: String },
}

impl Error {
    /// Create an illegal parent type error from the two type names involved
    pub fn illegal_parent(object: impl Into<String>, parent: impl Into<String>) -> Self {
        Error::IllegalParentType {
            object: object.into(),
            parent: parent.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialize(err.to_string())
    }
}
