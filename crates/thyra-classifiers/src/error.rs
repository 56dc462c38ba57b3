use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PredictionError>;

/// Errors raised by the prediction service.
///
/// Every variant is request-scoped: callers surface it to the single request
/// that triggered it and keep the process running.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// One or more files of the model bundle are missing.
    #[error("model artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// A bundle file exists but disagrees with the rest of the bundle.
    #[error("corrupt model artifact: {0}")]
    CorruptArtifact(String),

    /// A categorical value was not observed when the category map was fit.
    #[error("unknown category '{value}' for column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// Feature vector width differs from the width seen at fit time.
    #[error("feature vector has {actual} columns, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A numeric feature is NaN or infinite.
    #[error("non-finite value for numeric column '{column}'")]
    NonFiniteFeature { column: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PredictionError {
    /// True when the error was caused by the caller's input rather than by
    /// the service itself.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PredictionError::UnknownCategory { .. }
                | PredictionError::DimensionMismatch { .. }
                | PredictionError::NonFiniteFeature { .. }
        )
    }
}
