//! Excel Report Writer
//!
//! `results.xlsx` with three sheets: the merged result table, a run
//! summary and the screenshot index.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};

use crate::types::RunReport;

pub fn write_results(report: &RunReport, dest: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let results = workbook.add_worksheet();
    results.set_name("Results")?;
    for (col, header) in report.table.headers.iter().enumerate() {
        results.write_string_with_format(0, col as u16, header.as_str(), &bold)?;
    }
    for (row, cells) in report.table.rows.iter().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            results.write_string((row + 1) as u32, col as u16, value.as_str())?;
        }
    }

    let summary = workbook.add_worksheet();
    summary.set_name("Summary")?;
    summary.write_string_with_format(0, 0, "Metric", &bold)?;
    summary.write_string_with_format(0, 1, "Value", &bold)?;
    let rows = [
        ("Total Records", report.table.rows.len().to_string()),
        ("Total Screenshots", report.screenshots.len().to_string()),
        (
            "Processing Date",
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
    ];
    for (i, (metric, value)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        summary.write_string(row, 0, *metric)?;
        summary.write_string(row, 1, value.as_str())?;
    }

    let shots = workbook.add_worksheet();
    shots.set_name("Screenshots")?;
    shots.write_string_with_format(0, 0, "Code", &bold)?;
    shots.write_string_with_format(0, 1, "Screenshot", &bold)?;
    for (i, (code, path)) in report.screenshots.iter().enumerate() {
        let row = (i + 1) as u32;
        shots.write_string(row, 0, code.as_str())?;
        shots.write_string(row, 1, path.to_string_lossy())?;
    }

    workbook
        .save(dest)
        .with_context(|| format!("Failed to write Excel report to {:?}", dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultTable;
    use calamine::{open_workbook, Reader, Xlsx};
    use std::path::PathBuf;

    fn sample_report() -> RunReport {
        RunReport {
            table: ResultTable {
                headers: vec!["STT".to_string(), "MST".to_string()],
                rows: vec![vec!["1".to_string(), "0101234567".to_string()]],
            },
            screenshots: vec![(
                "0101234567".to_string(),
                PathBuf::from("screenshot/0101234567_01012026.png"),
            )],
        }
    }

    #[test]
    fn test_write_results_sheets() {
        let dest = std::env::temp_dir().join("tracuu_nnt_results_test.xlsx");
        write_results(&sample_report(), &dest).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&dest).unwrap();
        let names = workbook.sheet_names().to_vec();
        assert_eq!(names, vec!["Results", "Summary", "Screenshots"]);

        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        let cells: Vec<String> = range
            .rows()
            .flat_map(|r| r.iter().map(|c| c.to_string()))
            .collect();
        assert!(cells.contains(&"MST".to_string()));
        assert!(cells.contains(&"0101234567".to_string()));

        let _ = std::fs::remove_file(&dest);
    }
}
