use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatflowError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MatflowError>;
