//! Schema reader
//!
//! Reads the SQLite catalog and describes every user table, in catalog
//! order, as text the language model can be prompted with. The description
//! is rebuilt on every request; nothing here is cached.

use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in the DDL, empty when none was given.
    pub declared_type: String,
    pub not_null: bool,
}

impl ColumnInfo {
    pub fn nullability_label(&self) -> &'static str {
        if self.not_null {
            "NOT NULL"
        } else {
            "NULLABLE"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescription {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[cfg(test)]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Text block inserted into the prompt:
    ///
    /// ```text
    /// Table: users
    ///     id (INTEGER, NOT NULL)
    ///     email (TEXT, NULLABLE)
    ///
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "Table: {}", table.name);
            for column in &table.columns {
                let _ = writeln!(
                    out,
                    "    {} ({}, {})",
                    column.name,
                    column.declared_type,
                    column.nullability_label()
                );
            }
            out.push('\n');
        }
        out
    }
}

/// Enumerate non-internal tables and their columns from the catalog.
///
/// Catalog failures are returned to the caller unchanged.
pub fn read_schema(conn: &Connection) -> Result<SchemaDescription> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let table_names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = read_columns(conn, &name)?;
        tables.push(TableSchema { name, columns });
    }

    Ok(SchemaDescription { tables })
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
