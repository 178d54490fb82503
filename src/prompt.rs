//! Prompt construction for SQL generation.

use crate::schema::SchemaDescription;

/// Phrase the model is told to emit when the schema cannot answer a question.
pub const REFUSAL_PHRASE: &str = "I cannot answer this query.";

/// Static `role_id` legend. Context for the model only; never checked
/// against the database.
pub const ROLE_CODES: [(u8, &str); 3] = [
    (1, "Focal Manager"),
    (2, "Subordinate"),
    (3, "Reporting Manager"),
];

/// Instruction block preceding the user's question.
pub fn build_context(schema: &SchemaDescription) -> String {
    let roles: String = ROLE_CODES
        .iter()
        .map(|(code, label)| format!("- {} = {}\n", code, label))
        .collect();

    format!(
        r#"You are an expert SQLite analyst.
You must only use table and column names that exist in the schema below:

{schema}

role_id Mapping (from Roles table):
{roles}
Use only valid SQLite syntax. Do NOT use MySQL/Postgres features like ILIKE, LIMIT, AUTO_INCREMENT, etc.

If a question cannot be answered using this schema and role mapping, respond with:
"{refusal}"

Always return a single valid SQLite SELECT query only.
"#,
        schema = schema.render(),
        roles = roles,
        refusal = REFUSAL_PHRASE,
    )
}

/// Full prompt sent to the model. The question goes in verbatim.
pub fn build_prompt(question: &str, schema: &SchemaDescription) -> String {
    format!(
        "{}\nUser query: {}\nSQLite query:",
        build_context(schema),
        question
    )
}
