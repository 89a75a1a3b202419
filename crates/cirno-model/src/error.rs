use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid weight: {0}")]
    InvalidWeight(String),

    #[error("invalid task spec: {0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
