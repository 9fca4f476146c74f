//! Word Report Writer
//!
//! Landscape document: title, run summary, then one section per code
//! with its result fields and the full-page screenshot scaled to fit the
//! page, separated by page breaks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use docx_rs::{
    AlignmentType, BreakType, Docx, PageOrientationType, Paragraph, Pic, Run, Table, TableCell,
    TableRow,
};
use tracing::info;

use crate::types::RunReport;

/// A4 page in twips, swapped for landscape.
const PAGE_WIDTH: u32 = 16838;
const PAGE_HEIGHT: u32 = 11906;

/// Usable image area on a landscape page, in EMU.
const MAX_IMAGE_WIDTH: f64 = 9.0 * 914400.0;
const MAX_IMAGE_HEIGHT: f64 = 6.0 * 914400.0;

/// Pixels are mapped to EMU at 96 dpi.
const EMU_PER_PIXEL: f64 = 9525.0;

pub fn write_report(
    report: &RunReport,
    code_column: &str,
    data_dir: &Path,
    title: &str,
) -> Result<PathBuf> {
    let mut doc = Docx::new()
        .page_size(PAGE_WIDTH, PAGE_HEIGHT)
        .page_orient(PageOrientationType::Landscape);

    doc = doc.add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(title).size(32).bold())
            .align(AlignmentType::Center),
    );
    doc = doc.add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(format!(
                "Generated on: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            )))
            .align(AlignmentType::Center),
    );

    if !report.table.is_empty() {
        doc = doc.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("Summary:").size(26).bold()),
        );
        let summary = vec![
            ("Total Records", report.table.rows.len().to_string()),
            ("Total Screenshots", report.screenshots.len().to_string()),
            (
                "Processing Date",
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ];
        let mut rows = vec![grid_row("Metric", "Value")];
        for (metric, value) in &summary {
            rows.push(grid_row(metric, value));
        }
        doc = doc.add_table(Table::new(rows));
    }

    for (code, screenshot) in &report.screenshots {
        if !screenshot.exists() {
            continue;
        }

        doc = doc.add_paragraph(Paragraph::new());
        doc = doc.add_paragraph(
            Paragraph::new()
                .add_run(
                    Run::new()
                        .add_text(format!("{}: {}", code_column, code))
                        .bold(),
                )
                .align(AlignmentType::Center),
        );

        // Field/value table for this code's result rows.
        if let Some(row) = report.table.rows_for_code(code_column, code).first() {
            let mut rows = Vec::new();
            for (i, header) in report.table.headers.iter().enumerate() {
                if header == code_column {
                    continue;
                }
                let value = row.get(i).map(String::as_str).unwrap_or("");
                rows.push(grid_row(header, value));
            }
            if !rows.is_empty() {
                doc = doc.add_table(Table::new(rows));
                doc = doc.add_paragraph(Paragraph::new());
            }
        }

        doc = doc.add_paragraph(screenshot_paragraph(screenshot)?);
        doc = doc.add_paragraph(
            Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
        );
    }

    let dest = data_dir.join(format!(
        "report_{}.docx",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = fs::File::create(&dest)
        .with_context(|| format!("Failed to create Word report at {:?}", dest))?;
    doc.build()
        .pack(file)
        .with_context(|| format!("Failed to write Word report to {:?}", dest))?;

    info!("Created Word report at {:?}", dest);
    Ok(dest)
}

fn grid_row(left: &str, right: &str) -> TableRow {
    TableRow::new(vec![
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(left))),
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(right))),
    ])
}

/// Centered paragraph embedding the screenshot scaled to the page.
fn screenshot_paragraph(path: &Path) -> Result<Paragraph> {
    let (width_px, height_px) = image::image_dimensions(path)
        .with_context(|| format!("Failed to read screenshot dimensions from {:?}", path))?;
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read screenshot {:?}", path))?;

    let (width, height) = fit_to_page(width_px, height_px);
    let pic = Pic::new(&bytes).size(width, height);

    Ok(Paragraph::new()
        .add_run(Run::new().add_image(pic))
        .align(AlignmentType::Center))
}

/// Scale pixel dimensions into EMU so the image fits the usable page area.
fn fit_to_page(width_px: u32, height_px: u32) -> (u32, u32) {
    let width_emu = width_px as f64 * EMU_PER_PIXEL;
    let height_emu = height_px as f64 * EMU_PER_PIXEL;

    let scale = (MAX_IMAGE_WIDTH / width_emu).min(MAX_IMAGE_HEIGHT / height_emu);

    ((width_emu * scale) as u32, (height_emu * scale) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultTable;

    #[test]
    fn test_fit_to_page_wide_image() {
        let (w, h) = fit_to_page(1920, 1080);
        assert_eq!(w, MAX_IMAGE_WIDTH as u32);
        assert!(h <= MAX_IMAGE_HEIGHT as u32);
        // Aspect ratio preserved.
        let ratio = w as f64 / h as f64;
        assert!((ratio - 1920.0 / 1080.0).abs() < 0.01);
    }

    #[test]
    fn test_fit_to_page_tall_image() {
        let (w, h) = fit_to_page(1000, 8000);
        assert_eq!(h, MAX_IMAGE_HEIGHT as u32);
        assert!(w < MAX_IMAGE_WIDTH as u32);
    }

    #[test]
    fn test_write_report_without_screenshots() {
        let dir = std::env::temp_dir().join("tracuu_nnt_docx_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let report = RunReport {
            table: ResultTable {
                headers: vec!["STT".to_string(), "MST".to_string()],
                rows: vec![vec!["1".to_string(), "0101234567".to_string()]],
            },
            screenshots: vec![],
        };

        let path = write_report(&report, "MST", &dir, "Invoice Check Report").unwrap();
        assert!(path.exists());
        assert!(fs::metadata(&path).unwrap().len() > 0);

        let _ = fs::remove_dir_all(&dir);
    }
}
