//! Error types for the ORM system
//!
//! Every fallible operation in the crate returns [`ModelError`]. Registry,
//! relation and storage failures each get their own variant so callers can
//! tell a misconfigured declaration from a failed query.

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A registry name is already bound to a different definition
    #[error("Name '{name}' is already registered to a different {kind} definition")]
    Conflict { name: String, kind: &'static str },

    /// A registry name (or morph discriminator in strict mode) has no entry
    #[error("No {kind} registered under the name '{name}'")]
    UnresolvedName { name: String, kind: &'static str },

    /// An owner lacks the key value a relation depends on
    #[error("Model '{table}' has no value for key '{key}'")]
    MissingKey { table: String, key: String },

    /// Query execution failed in the underlying store
    #[error("Storage error: {0}")]
    Storage(String),

    /// A required fetch returned no row
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// A relation name is not declared on the owner's model
    #[error("Relation '{relation}' is not defined on model '{table}'")]
    UndefinedRelation { table: String, relation: String },

    /// Invalid relation declaration or loader configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    /// Whether this error is recovered per owner during batch fetches
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ModelError::MissingKey { .. })
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
