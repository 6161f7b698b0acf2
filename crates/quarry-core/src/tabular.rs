use serde::{Deserialize, Serialize};
use serde_json::Value;

const CELL_DISPLAY_MAX: usize = 30;

/// One result column. Backends report either `{name, type}` objects or
/// bare name strings; both decode into this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
        }
    }
}

/// A normalized tabular result set: ordered columns, row-major values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularRows {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularRows {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Render at most `max_rows` rows as a markdown table. Long string
    /// cells are truncated for display; nulls render as `null`.
    pub fn to_markdown(&self, max_rows: usize) -> String {
        if self.is_empty() {
            return "No data available.".to_string();
        }

        let names = self.column_names();
        let header = format!("| {} |", names.join(" | "));
        let separator = format!("| {} |", vec!["---"; names.len()].join(" | "));

        let mut lines = vec![header, separator];
        for row in self.rows.iter().take(max_rows) {
            let cells: Vec<String> = row.iter().map(display_cell).collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        if self.rows.len() > max_rows {
            lines.push(format!("... and {} more rows", self.rows.len() - max_rows));
        }
        lines.join("\n")
    }
}

fn display_cell(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) if s.chars().count() > CELL_DISPLAY_MAX => {
            let prefix: String = s.chars().take(CELL_DISPLAY_MAX - 3).collect();
            format!("{prefix}...")
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularRows {
        TabularRows {
            columns: vec![Column::named("client_ip"), Column::named("count")],
            rows: vec![
                vec![Value::String("10.0.0.1".into()), Value::from(42)],
                vec![Value::Null, Value::from(7)],
            ],
        }
    }

    #[test]
    fn markdown_has_header_separator_and_rows() {
        let md = sample().to_markdown(10);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| client_ip | count |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| 10.0.0.1 | 42 |");
        assert_eq!(lines[3], "| null | 7 |");
    }

    #[test]
    fn markdown_truncates_long_cells_and_notes_overflow() {
        let mut t = sample();
        t.rows = vec![
            vec![Value::String("x".repeat(40)), Value::from(1)],
            vec![Value::String("short".into()), Value::from(2)],
        ];
        let md = t.to_markdown(1);
        assert!(md.contains(&format!("{}...", "x".repeat(27))));
        assert!(md.contains("... and 1 more rows"));
    }

    #[test]
    fn markdown_empty_result() {
        assert_eq!(TabularRows::default().to_markdown(10), "No data available.");
    }
}
