use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpendingExplorerError {
    #[error("Invalid spending category: {0}")]
    InvalidCategory(String),

    #[error("Invalid parameter \"{field}\": {message}")]
    InvalidParameter { field: String, message: String },

    #[error("Aggregate source failure: {0}")]
    DataSource(String),

    #[error("Invalid explorer configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpendingExplorerError {
    pub fn invalid_parameter(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// The request field an `InvalidParameter` error points at.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidParameter { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpendingExplorerError>;
