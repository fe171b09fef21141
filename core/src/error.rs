use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Schema error in '{table}': {detail}")]
    Schema { table: String, detail: String },

    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Duplicate key in '{table}': {key}")]
    DuplicateKey { table: String, key: String },

    #[error("Invalid value for {table}.{field}: {detail}")]
    InvalidValue {
        table: String,
        field: String,
        detail: String,
    },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Classifier used before fit")]
    ModelNotFitted,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
