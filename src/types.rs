use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Scraped result table: one header row plus data rows, all cells as text.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResultTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by header name.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell value by row index and header name.
    pub fn cell(&self, row: usize, header: &str) -> Option<&str> {
        let col = self.column_index(header)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// All rows whose `code_column` cell equals `code`.
    pub fn rows_for_code(&self, code_column: &str, code: &str) -> Vec<&Vec<String>> {
        let Some(col) = self.column_index(code_column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|r| r.get(col).map(String::as_str) == Some(code))
            .collect()
    }
}

/// Outcome of a single code lookup: the scraped table plus the
/// full-page screenshot captured after the result rendered.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub code: String,
    pub table: ResultTable,
    pub screenshot: PathBuf,
}

/// Aggregated outcome of a run: the merged result table and the
/// screenshot captured for each successfully processed code.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub table: ResultTable,
    pub screenshots: Vec<(String, PathBuf)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ResultTable {
        ResultTable {
            headers: vec!["STT".to_string(), "MST".to_string()],
            rows: vec![
                vec!["1".to_string(), "0101234567".to_string()],
                vec!["2".to_string(), "0107654321".to_string()],
            ],
        }
    }

    #[test]
    fn test_cell_lookup() {
        let table = sample_table();
        assert_eq!(table.cell(0, "MST"), Some("0101234567"));
        assert_eq!(table.cell(1, "STT"), Some("2"));
        assert_eq!(table.cell(0, "missing"), None);
        assert_eq!(table.cell(5, "MST"), None);
    }

    #[test]
    fn test_rows_for_code() {
        let table = sample_table();
        let rows = table.rows_for_code("MST", "0107654321");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "2");
        assert!(table.rows_for_code("MST", "none").is_empty());
        assert!(table.rows_for_code("missing", "1").is_empty());
    }
}
