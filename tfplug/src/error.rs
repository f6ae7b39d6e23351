//! Framework errors
//!
//! These surface from value access; at the Terraform boundary
//! they are turned into diagnostics by the resource implementations.

#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Resource type not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceNotFound(String),

    /// Value at a path has a different type than the accessor expects
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    /// Path steps through something that is not an object or list
    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("Logging initialization failed: {0}")]
    LoggingError(String),
}

pub type Result<T> = std::result::Result<T, TfplugError>;

impl TfplugError {
    /// Missing and null attributes are treated alike by optional accessors
    pub fn is_missing(&self) -> bool {
        matches!(self, TfplugError::AttributeNotFound(_))
    }
}
