//! Harness error types

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum BenchError {
    /// The underlying transport closed, reset, or returned a short read.
    #[error("channel error: {0}")]
    Channel(#[from] std::io::Error),

    /// An operation was issued out of the run's phase order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("OT engine error: {0}")]
    Engine(EngineError),
}

impl From<EngineError> for BenchError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Io(io) => BenchError::Channel(io),
            other => BenchError::Engine(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
