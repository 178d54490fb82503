//! Dashboard configuration
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file) and can be overridden by command-line flags in the binaries.

use crate::error::{Nl2SqlError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DB_PATH: &str = "survey.db";
pub const DEFAULT_MODEL_PATH: &str = "models/codellama-nl2sql.Q4_K_M.gguf";
pub const DEFAULT_LLM_BASE_URL: &str = "http://127.0.0.1:8000/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_STOP: &str = "###";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_CONTEXT_SIZE: u32 = 2048;
pub const DEFAULT_THREADS: u32 = 12;
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter for both binaries: `RUST_LOG` when set and valid, otherwise
/// [`DEFAULT_LOG_FILTER`].
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Generation bounds passed with every model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub stop: String,
    pub temperature: f64,
    pub context_size: u32,
    pub threads: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            stop: DEFAULT_STOP.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            context_size: DEFAULT_CONTEXT_SIZE,
            threads: DEFAULT_THREADS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub llm_base_url: String,
    pub api_key: Option<String>,
    pub generation: GenerationSettings,
    pub bind: SocketAddr,
}

impl DashboardConfig {
    /// Load `.env` (if present) and read the `NL2SQL_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys fall back to
    /// the defaults; present but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let generation = GenerationSettings {
            max_tokens: parse_or(
                get("NL2SQL_MAX_TOKENS"),
                "NL2SQL_MAX_TOKENS",
                DEFAULT_MAX_TOKENS,
            )?,
            stop: get("NL2SQL_STOP").unwrap_or_else(|| DEFAULT_STOP.to_string()),
            temperature: parse_or(
                get("NL2SQL_TEMPERATURE"),
                "NL2SQL_TEMPERATURE",
                DEFAULT_TEMPERATURE,
            )?,
            context_size: parse_or(
                get("NL2SQL_CONTEXT_SIZE"),
                "NL2SQL_CONTEXT_SIZE",
                DEFAULT_CONTEXT_SIZE,
            )?,
            threads: parse_or(get("NL2SQL_THREADS"), "NL2SQL_THREADS", DEFAULT_THREADS)?,
        };

        if generation.max_tokens == 0 {
            return Err(Nl2SqlError::Config(
                "NL2SQL_MAX_TOKENS must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(Nl2SqlError::Config(format!(
                "NL2SQL_TEMPERATURE must be between 0 and 2, got {}",
                generation.temperature
            )));
        }

        let bind_default: SocketAddr = DEFAULT_BIND
            .parse()
            .map_err(|e| Nl2SqlError::Config(format!("Invalid default bind address: {}", e)))?;

        Ok(Self {
            db_path: get("NL2SQL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            model_path: get("NL2SQL_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            llm_base_url: get("NL2SQL_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            api_key: get("NL2SQL_API_KEY"),
            generation,
            bind: parse_or(get("NL2SQL_BIND"), "NL2SQL_BIND", bind_default)?,
        })
    }

    /// Fails if the database file does not exist. The dashboard never
    /// creates the database it is pointed at.
    pub fn check_database(&self) -> Result<()> {
        if !self.db_path.is_file() {
            return Err(Nl2SqlError::Config(format!(
                "Database file not found: {}",
                self.db_path.display()
            )));
        }
        Ok(())
    }
}

/// Command-line overrides shared by the binaries.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// SQLite database file (overrides NL2SQL_DB_PATH)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Model artifact served by the completion server (overrides NL2SQL_MODEL_PATH)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Base URL of the completion server (overrides NL2SQL_LLM_BASE_URL)
    #[arg(long)]
    pub llm_url: Option<String>,

    /// Maximum tokens generated per question (overrides NL2SQL_MAX_TOKENS)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Answer every question with this text instead of calling a model
    #[arg(long)]
    pub fixed_response: Option<String>,
}

impl ConfigArgs {
    pub fn apply(&self, mut config: DashboardConfig) -> Result<DashboardConfig> {
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(url) = &self.llm_url {
            config.llm_base_url = url.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(Nl2SqlError::Config(
                    "--max-tokens must be greater than zero".to_string(),
                ));
            }
            config.generation.max_tokens = max_tokens;
        }
        Ok(config)
    }

    /// Environment first, then flags.
    pub fn load(&self) -> Result<DashboardConfig> {
        self.apply(DashboardConfig::from_env()?)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| {
                Nl2SqlError::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))
            }),
        None => Ok(default),
    }
}
