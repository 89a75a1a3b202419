use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid exec configuration: {0}")]
    InvalidConfig(String),

    #[error("gpu query failed: {0}")]
    Gpu(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
