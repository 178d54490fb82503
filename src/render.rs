//! Terminal rendering for the CLI.

use crate::sql_engine::QueryResult;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

pub fn render_table(result: &QueryResult) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(result.columns.clone());

    for row in &result.rows {
        table.add_row(row.iter().map(cell_text).collect::<Vec<_>>());
    }

    table.to_string()
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
