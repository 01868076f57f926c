use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Screen driver error: {0}")]
    Driver(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Planning failed: {0}")]
    Plan(String),

    #[error("LLM provider error: {0}")]
    Provider(#[from] otto_llm::ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VisionError>;
