use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid line record: {field}: {message}")]
    Schema { field: String, message: String },

    #[error("Source query failed: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("CSV source failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource already closed")]
    ClosedResource,

    #[error("Transaction {next} arrived after {previous}: input is not contiguous")]
    OutOfOrder { previous: i64, next: i64 },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Item not found: {0}")]
    ItemNotFound(String),
}

impl PipelineError {
    pub fn schema(field: &str, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config {
            message: message.into(),
        }
    }
}
