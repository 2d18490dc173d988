use thiserror::Error;

#[derive(Error, Debug)]
pub enum CastwayError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, CastwayError>;
