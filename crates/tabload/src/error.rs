//! Error types for the pipeline library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required environment variable is not set
    #[error("Environment variable '{0}' is not set")]
    Env(String),

    /// Source file or resource does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File format tag outside the supported set
    #[error("Unsupported file format: '{0}'. Valid formats: csv, json, xlsx, parquet")]
    UnsupportedFormat(String),

    /// Source name outside the supported set
    #[error("Unsupported source: '{0}'. Valid sources: api, file, db")]
    UnsupportedSource(String),

    /// Load mode outside the supported set
    #[error("Unsupported load mode: '{0}'. Valid modes: copy, upsert")]
    UnsupportedMode(String),

    /// Transport or query failure while extracting records
    #[error("Extraction from {source_name} failed at {position}: {message}")]
    Extraction {
        source_name: String,
        position: String,
        message: String,
    },

    /// A record failed normalization
    #[error("Record {index} failed validation on field '{field}': {message}")]
    Validation {
        index: usize,
        field: String,
        message: String,
    },

    /// Transaction failure during bulk or upsert write
    #[error("Load into table {table} failed: {message}")]
    Load { table: String, message: String },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// PostgreSQL driver error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet parse error
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// Parquet parse error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl PipelineError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        PipelineError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Extraction error pinned to a source and position (page, chunk offset).
    pub fn extraction(
        source: impl Into<String>,
        position: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        PipelineError::Extraction {
            source_name: source.into(),
            position: position.into(),
            message: message.to_string(),
        }
    }

    /// Create a Validation error for a record index and field.
    pub fn validation(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            index,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a Load error.
    pub fn load(table: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Load {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error: 2 for usage/configuration mistakes,
    /// 1 for runtime failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_)
            | PipelineError::Env(_)
            | PipelineError::UnsupportedFormat(_)
            | PipelineError::UnsupportedSource(_)
            | PipelineError::UnsupportedMode(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_mode_message_names_valid_modes() {
        let err = PipelineError::UnsupportedMode("foo".to_string());
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains("copy"));
        assert!(msg.contains("upsert"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(PipelineError::UnsupportedSource("x".into()).exit_code(), 2);
        assert_eq!(PipelineError::Env("API_KEY".into()).exit_code(), 2);
        assert_eq!(PipelineError::load("users", "boom").exit_code(), 1);
    }

    #[test]
    fn test_validation_error_carries_index_and_field() {
        let err = PipelineError::validation(3, "first_name", "missing required field");
        assert_eq!(
            err.to_string(),
            "Record 3 failed validation on field 'first_name': missing required field"
        );
    }
}
