pub mod config;
pub mod dashboard;
pub mod error;
pub mod generator;
pub mod llm;
pub mod prompt;
pub mod render;
pub mod schema;
pub mod server;
pub mod sql_engine;

pub use dashboard::{AskOutcome, AskResponse, Dashboard};
pub use error::{Nl2SqlError, Result, ValidationError};
