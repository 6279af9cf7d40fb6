//! Error types for repository operations

use thiserror::Error;

/// Errors that can occur while building or executing statements
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Schema declaration or option problem, expected to surface at start-up
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A WHERE/SET/VALUES fragment could not be built for the given table
    #[error("Failed to compile statement for table '{table}': {message}")]
    Compile { table: String, message: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Operation cancelled")]
    Cancelled,

    /// The untyped filter shape could not be parsed
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn compile(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Compile {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Whether the error came from the database driver
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Sql(_))
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
