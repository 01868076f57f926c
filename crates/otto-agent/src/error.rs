use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The LLM stream never opened after all retry attempts.
    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("History error: {0}")]
    History(#[from] otto_sessions::HistoryError),

    #[error("Memory error: {0}")]
    Memory(#[from] otto_memory::MemoryError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
