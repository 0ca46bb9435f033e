use thiserror::Error;

/// Validation failure while reading or checking a configuration document.
///
/// Field paths look like `Port`, `ControllerType.timestamp` or
/// `actions[2].enabled`.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has the wrong type, expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: String, value: String },

    #[error("duplicate action name `{name}` at `{field}`")]
    DuplicateName { field: String, name: String },

    #[error("extra key `{0}` shadows a document field")]
    ReservedKey(String),

    #[error("invalid JSON document: {0}")]
    Syntax(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn type_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch { field: field.into(), expected }
    }

    pub(crate) fn out_of_range(field: impl Into<String>, value: impl ToString) -> Self {
        Self::OutOfRange { field: field.into(), value: value.to_string() }
    }

    /// Path of the field the error points at, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field)
            | Self::TypeMismatch { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::DuplicateName { field, .. }
            | Self::ReservedKey(field) => Some(field),
            Self::Syntax(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
