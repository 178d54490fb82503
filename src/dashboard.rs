//! Dashboard orchestration
//!
//! One question in, one [`AskOutcome`] out:
//! read schema → build prompt → call model → validate → execute.
//!
//! The database connection and the model handle are created once by
//! [`Dashboard::open`] and live as long as the dashboard. SQLite work runs on
//! tokio's blocking pool so a slow query never stalls the async workers.

use crate::config::{DashboardConfig, GenerationSettings};
use crate::error::{Nl2SqlError, Result};
use crate::generator::SqlGenerator;
use crate::llm::LanguageModel;
use crate::schema::{read_schema, SchemaDescription};
use crate::sql_engine::{QueryResult, SqlEngine};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Result of one question, typed by where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered {
        sql: String,
        result: QueryResult,
    },
    /// The model call failed or its output was rejected. Nothing ran.
    GenerationFailed {
        message: String,
    },
    /// Schema read or query execution failed.
    ExecutionFailed {
        sql: Option<String>,
        message: String,
    },
}

impl AskOutcome {
    fn from_error(err: &Nl2SqlError, sql: Option<String>) -> Self {
        if err.is_generation_failure() {
            AskOutcome::GenerationFailed { message: err.detail() }
        } else {
            AskOutcome::ExecutionFailed { sql, message: err.detail() }
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            AskOutcome::Answered { sql, .. } => Some(sql),
            AskOutcome::ExecutionFailed { sql, .. } => sql.as_deref(),
            AskOutcome::GenerationFailed { .. } => None,
        }
    }

    /// Inline error line shown under the input, if any.
    pub fn error_line(&self) -> Option<String> {
        match self {
            AskOutcome::Answered { .. } => None,
            AskOutcome::GenerationFailed { message } => {
                Some(format!("SQL Error: {}", message))
            }
            AskOutcome::ExecutionFailed { message, .. } => {
                Some(format!("Database error: {}", message))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub request_id: String,
    pub question: String,
    pub answered_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: AskOutcome,
}

pub struct Dashboard {
    conn: Arc<Mutex<Connection>>,
    generator: SqlGenerator,
}

impl Dashboard {
    pub fn new(
        conn: Connection,
        model: Arc<dyn LanguageModel>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            generator: SqlGenerator::new(model, settings),
        }
    }

    /// Open the configured database read-only and bind it to `model`.
    pub fn open(config: &DashboardConfig, model: Arc<dyn LanguageModel>) -> Result<Self> {
        config.check_database()?;
        let conn = Connection::open_with_flags(
            &config.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(
            db = %config.db_path.display(),
            model = model.name(),
            max_tokens = config.generation.max_tokens,
            "dashboard opened"
        );
        Ok(Self::new(conn, model, config.generation.clone()))
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Current catalog; read fresh on every call.
    pub async fn schema(&self) -> Result<SchemaDescription> {
        self.with_connection(read_schema).await
    }

    pub async fn ask(&self, question: &str) -> AskResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("ask", request_id = %request_id);
        let outcome = self.run(question).instrument(span).await;

        if let Some(line) = outcome.error_line() {
            warn!(request_id = %request_id, "{}", line);
        }

        AskResponse {
            request_id,
            question: question.to_string(),
            answered_at: Utc::now(),
            outcome,
        }
    }

    async fn run(&self, question: &str) -> AskOutcome {
        if question.trim().is_empty() {
            return AskOutcome::GenerationFailed {
                message: "Question is empty".to_string(),
            };
        }
        info!(question = %question, "question received");

        let schema = match self.schema().await {
            Ok(schema) => schema,
            Err(e) => return AskOutcome::from_error(&e, None),
        };

        let sql = match self.generator.generate(question, &schema).await {
            Ok(sql) => sql,
            Err(e) => return AskOutcome::from_error(&e, None),
        };

        let statement = sql.clone();
        let executed = self
            .with_connection(move |conn| SqlEngine::execute(conn, &statement))
            .await;
        match executed {
            Ok(result) => AskOutcome::Answered {
                sql: sql.into_inner(),
                result,
            },
            Err(e) => AskOutcome::from_error(&e, Some(sql.into_inner())),
        }
    }

    /// Run `f` against the connection on the blocking pool. Waiting for the
    /// lock happens there too.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| {
                Nl2SqlError::Database("database connection lock poisoned".to_string())
            })?;
            f(&guard)
        })
        .await
        .map_err(|e| Nl2SqlError::Database(format!("database task failed: {}", e)))?
    }
}
