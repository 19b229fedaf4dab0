//! Errors surfaced while iterating a fragment stream.

use llama_engine::EngineError;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// The engine returned a candidate count other than the one requested.
    #[error("engine returned {candidates} candidates, expected exactly 1")]
    ContractViolation { candidates: usize },

    /// Passed through verbatim from the engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
