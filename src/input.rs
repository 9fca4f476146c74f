//! Input Workbook Reader
//!
//! Reads the list of codes to look up from an Excel workbook: the
//! configured column of the first worksheet, header on the first row.
//! Cells are read as text so leading zeros survive where the sheet
//! stores codes as strings.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// MST (10 digits, optionally a -NNN branch suffix), old CMND (9 digits)
/// or CCCD (12 digits).
static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{9,13}(-\d{3})?$").unwrap()
});

pub fn read_codes(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open input workbook {:?}", path))?;

    let range = workbook
        .worksheet_range_at(0)
        .context("No worksheet found in input workbook")?
        .context("Failed to read worksheet")?;

    let mut rows = range.rows();
    let header = rows.next().context("Input worksheet is empty")?;

    let col = header
        .iter()
        .position(|cell| cell_to_string(cell).trim().eq_ignore_ascii_case(column))
        .with_context(|| format!("Column '{}' not found in {:?}", column, path))?;

    let mut codes = Vec::new();
    for row in rows {
        let Some(cell) = row.get(col) else { continue };
        let value = cell_to_string(cell);
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !CODE_PATTERN.is_match(value) {
            warn!("Skipping value that does not look like a tax/identity code: {}", value);
            continue;
        }
        codes.push(value.to_string());
    }

    Ok(codes)
}

/// Render a cell as text. Integral floats lose their decimal point so a
/// numeric cell holding 101234567 reads back as "101234567".
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Float(f) if f.fract() == 0.0 => format!("{:.0}", f),
        Data::Empty => String::new(),
        other => other.as_string().map(|s| s.to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_fixture(path: &Path, column: &str, values: &[&str]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Ghi chú").unwrap();
        sheet.write_string(0, 1, column).unwrap();
        for (i, value) in values.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, "x").unwrap();
            sheet.write_string(row, 1, *value).unwrap();
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_read_codes_by_header() {
        let path = std::env::temp_dir().join("tracuu_nnt_input_test.xlsx");
        write_fixture(&path, "CCCD", &["012345678912", "", "001234567890"]);

        let codes = read_codes(&path, "CCCD").unwrap();
        assert_eq!(codes, vec!["012345678912", "001234567890"]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_codes_skips_invalid() {
        let path = std::env::temp_dir().join("tracuu_nnt_input_invalid.xlsx");
        write_fixture(&path, "MST", &["0101234567", "not a code", "0101234567-001"]);

        let codes = read_codes(&path, "MST").unwrap();
        assert_eq!(codes, vec!["0101234567", "0101234567-001"]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_column_errors() {
        let path = std::env::temp_dir().join("tracuu_nnt_input_missing.xlsx");
        write_fixture(&path, "MST", &["0101234567"]);

        assert!(read_codes(&path, "CCCD").is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_numeric_cell_reads_without_decimal() {
        let path = std::env::temp_dir().join("tracuu_nnt_input_numeric.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "MST").unwrap();
        sheet.write_number(1, 0, 8800335677.0).unwrap();
        workbook.save(&path).unwrap();

        let codes = read_codes(&path, "MST").unwrap();
        assert_eq!(codes, vec!["8800335677"]);

        let _ = std::fs::remove_file(&path);
    }
}
