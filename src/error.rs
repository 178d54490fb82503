use thiserror::Error;

/// Reasons a model response is rejected before it can reach the database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid SQL output: model returned no statement")]
    Empty,

    #[error("Invalid SQL output: model declined to answer ({0})")]
    Refused(String),

    #[error("Invalid SQL output: Not a SELECT")]
    NotSelect,
}

#[derive(Error, Debug)]
pub enum Nl2SqlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Nl2SqlError {
    fn from(err: rusqlite::Error) -> Self {
        Nl2SqlError::Database(err.to_string())
    }
}

impl Nl2SqlError {
    /// True for failures that happen before any model output is executed.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Nl2SqlError::Llm(_) | Nl2SqlError::Validation(_))
    }

    /// Message without the category prefix, for inline display.
    pub fn detail(&self) -> String {
        match self {
            Nl2SqlError::Config(msg)
            | Nl2SqlError::Database(msg)
            | Nl2SqlError::Llm(msg)
            | Nl2SqlError::Execution(msg) => msg.clone(),
            Nl2SqlError::Validation(e) => e.to_string(),
            Nl2SqlError::Io(e) => e.to_string(),
            Nl2SqlError::Json(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Nl2SqlError>;
