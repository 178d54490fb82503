//! SQL generation and validation
//!
//! The model is free text and unconstrained. Its output goes through two
//! steps before anything can run it:
//!
//! 1. [`first_statement`] keeps only the text before the first `;`.
//! 2. [`validate_select`] accepts the result only if it starts with
//!    `SELECT` (case-insensitive) and wraps it in [`ValidatedSql`].
//!
//! Nothing else is checked: names are not resolved against the schema and
//! the dialect is not enforced.

use crate::config::GenerationSettings;
use crate::error::{Result, ValidationError};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::{build_prompt, REFUSAL_PHRASE};
use crate::schema::SchemaDescription;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// SQL text that passed [`validate_select`]. The only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim the raw output, cut at the first `;` and re-append a single `;`.
pub fn first_statement(raw: &str) -> String {
    let trimmed = raw.trim();
    let head = trimmed.split(';').next().unwrap_or_default();
    format!("{};", head.trim())
}

/// Gate between model output and the database.
pub fn validate_select(statement: &str) -> std::result::Result<ValidatedSql, ValidationError> {
    let trimmed = statement.trim();
    let body = trimmed.trim_end_matches(';').trim();

    if body.is_empty() {
        return Err(ValidationError::Empty);
    }

    if trimmed.to_uppercase().starts_with("SELECT") {
        return Ok(ValidatedSql(trimmed.to_string()));
    }

    if is_refusal(body) {
        return Err(ValidationError::Refused(REFUSAL_PHRASE.to_string()));
    }

    Err(ValidationError::NotSelect)
}

fn is_refusal(text: &str) -> bool {
    let normalize = |s: &str| {
        s.trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim_end_matches('.')
            .trim()
            .to_lowercase()
    };
    normalize(text) == normalize(REFUSAL_PHRASE)
}

/// Turns a question into validated SQL with one model call.
pub struct SqlGenerator {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl SqlGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn generate(
        &self,
        question: &str,
        schema: &SchemaDescription,
    ) -> Result<ValidatedSql> {
        let prompt = build_prompt(question, schema);
        let request = CompletionRequest::new(prompt, &self.settings);

        let raw = self.model.complete(&request).await?;
        debug!(raw_output = %raw, "model output");

        let statement = first_statement(&raw);
        let sql = validate_select(&statement)?;
        info!(sql = %sql, "generated SQL");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Nl2SqlError;
    use crate::llm::FixedResponseModel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingModel {
        response: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn generator(response: &str) -> SqlGenerator {
        SqlGenerator::new(
            Arc::new(FixedResponseModel::new(response)),
            GenerationSettings::default(),
        )
    }

    #[test]
    fn test_first_statement_keeps_text_before_first_terminator() {
        assert_eq!(first_statement("SELECT 1; DROP TABLE t; SELECT 2;"), "SELECT 1;");
        assert_eq!(first_statement("  SELECT a FROM t  ;\n"), "SELECT a FROM t;");
        assert_eq!(first_statement("SELECT a FROM t"), "SELECT a FROM t;");
        assert_eq!(first_statement(""), ";");
    }

    #[test]
    fn test_validate_accepts_select_case_insensitively() {
        assert_eq!(validate_select("select * from t;").unwrap().as_str(), "select * from t;");
        assert_eq!(validate_select("SeLeCt 1;").unwrap().as_str(), "SeLeCt 1;");
    }

    #[test]
    fn test_validate_rejects_other_statements() {
        assert_eq!(validate_select("DELETE FROM t;"), Err(ValidationError::NotSelect));
        assert_eq!(
            validate_select("WITH x AS (SELECT 1) SELECT * FROM x;"),
            Err(ValidationError::NotSelect)
        );
        assert_eq!(validate_select("```sql SELECT 1;"), Err(ValidationError::NotSelect));
    }

    #[test]
    fn test_validate_rejects_empty_output() {
        assert_eq!(validate_select(";"), Err(ValidationError::Empty));
        assert_eq!(validate_select("   "), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_flags_refusal_phrase() {
        let statement = first_statement("\"I cannot answer this query.\"");
        assert!(matches!(validate_select(&statement), Err(ValidationError::Refused(_))));
        assert!(matches!(
            validate_select("i cannot answer this query;"),
            Err(ValidationError::Refused(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_returns_exact_select() {
        let sql = generator("SELECT * FROM t;")
            .generate("everything", &SchemaDescription::default())
            .await
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT * FROM t;");
    }

    #[tokio::test]
    async fn test_generate_uses_only_first_statement() {
        let sql = generator(" SELECT id FROM t; DELETE FROM t; ")
            .generate("ids", &SchemaDescription::default())
            .await
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT id FROM t;");
    }

    #[tokio::test]
    async fn test_generate_refusal_is_validation_error() {
        let err = generator("I cannot answer this query.")
            .generate("weather?", &SchemaDescription::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Nl2SqlError::Validation(ValidationError::Refused(_))));
        assert!(err.is_generation_failure());
    }

    #[tokio::test]
    async fn test_generate_sends_bounded_request() {
        let model = Arc::new(RecordingModel {
            response: "SELECT 1;".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let generator = SqlGenerator::new(model.clone(), GenerationSettings::default());
        generator
            .generate("How many rows?", &SchemaDescription::default())
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 512);
        assert_eq!(seen[0].stop, vec!["###".to_string()]);
        assert_eq!(seen[0].temperature, 0.1);
        assert!(seen[0].prompt.ends_with("User query: How many rows?\nSQLite query:"));
    }
}
