use thiserror::Error;

/// Errors raised by a query engine while applying or executing a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{field}' does not support {operation}")]
    TypeMismatch { field: String, operation: String },

    #[error("Query execution failed: {0}")]
    Execution(String),
}

/// Errors that can occur while mutating or reading the filter pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{field}' cannot be used as {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

impl PipelineError {
    pub(crate) fn type_mismatch(field: &str, expected: &str) -> Self {
        PipelineError::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }
}
