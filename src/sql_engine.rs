//! SQL Engine - runs validated SELECT statements against SQLite

use crate::error::{Nl2SqlError, Result};
use crate::generator::ValidatedSql;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Tabular result of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct SqlEngine;

impl SqlEngine {
    /// Execute a statement that passed validation. Any SQLite failure
    /// (unknown column, syntax error, ...) comes back as
    /// [`Nl2SqlError::Execution`].
    pub fn execute(conn: &Connection, sql: &ValidatedSql) -> Result<QueryResult> {
        let start = Instant::now();

        let mut stmt = conn
            .prepare(sql.as_str())
            .map_err(|e| Nl2SqlError::Execution(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = Vec::new();
        let mut cursor = stmt
            .query([])
            .map_err(|e| Nl2SqlError::Execution(e.to_string()))?;
        while let Some(row) = cursor
            .next()
            .map_err(|e| Nl2SqlError::Execution(e.to_string()))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| Nl2SqlError::Execution(e.to_string()))?;
                values.push(value_to_json(value));
            }
            rows.push(values);
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(rows = rows.len(), execution_time_ms, "query executed");

        Ok(QueryResult {
            row_count: rows.len(),
            columns,
            rows,
            execution_time_ms,
        })
    }
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        // NaN and infinities have no JSON form
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => {
            serde_json::Value::String(format!("<BLOB {} bytes>", bytes.len()))
        }
    }
}
