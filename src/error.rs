use thiserror::Error;

#[derive(Debug, Error)]
pub enum UdsError {
    // Transport layer errors
    #[error("transport error: {0}")]
    Transport(String),

    // Physical layer errors
    #[error("bus error: {0}")]
    Bus(String),

    // Generic errors
    #[error("buffer overflow")]
    BufferOverflow,
    #[error("invalid parameter")]
    InvalidParameter,
}

pub type Result<T> = std::result::Result<T, UdsError>;
