use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

use quarry_core::{CsvExport, TabularRows};

/// Write a result set to a timestamped CSV file under `dir`.
pub(crate) fn write_csv(rows: &TabularRows, dir: &Path) -> Result<CsvExport> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let short_id = Uuid::new_v4().to_string()[..8].to_string();
    let path = dir.join(format!("query_result_{timestamp}_{short_id}.csv"));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(rows.column_names())?;
    for row in &rows.rows {
        let record: Vec<String> = row.iter().map(csv_cell).collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let size_bytes = fs::metadata(&path)?.len();
    Ok(CsvExport {
        path,
        rows: rows.row_count(),
        size_bytes,
    })
}

/// Nulls export as empty cells; strings stay unquoted JSON-wise.
fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Column;

    fn sample(rows: usize) -> TabularRows {
        TabularRows {
            columns: vec![Column::named("client_ip"), Column::named("count")],
            rows: (0..rows)
                .map(|i| vec![Value::String(format!("10.0.0.{i}")), Value::from(i)])
                .collect(),
        }
    }

    #[test]
    fn writes_header_and_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let export = write_csv(&sample(25), dir.path()).unwrap();

        assert_eq!(export.rows, 25);
        assert!(export.size_bytes > 0);

        let contents = fs::read_to_string(&export.path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 26); // header + 25 rows
        assert_eq!(lines[0], "client_ip,count");
        assert_eq!(lines[1], "10.0.0.0,0");
    }

    #[test]
    fn nulls_export_as_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let table = TabularRows {
            columns: vec![Column::named("a"), Column::named("b")],
            rows: vec![vec![Value::Null, Value::from(1)]],
        };
        let export = write_csv(&table, dir.path()).unwrap();
        let contents = fs::read_to_string(&export.path).unwrap();
        assert_eq!(contents.lines().nth(1), Some(",1"));
    }
}
