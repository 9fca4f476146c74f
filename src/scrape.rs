//! Result Table Scraping
//!
//! Parses the portal's `.ta_border` result table out of its outerHTML and
//! merges the per-query tables into one report table.

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};

use crate::portal::NO_RESULT_MESSAGE;
use crate::types::ResultTable;

/// Parse the outerHTML of a result table into headers and rows.
///
/// The first row containing `<th>` cells (or the very first row) becomes
/// the header; pagination rows (`Trang: ...`) are dropped.
pub fn parse_result_table(html: &str) -> Result<ResultTable> {
    let document = Html::parse_fragment(html);

    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let header_cell_sel = selector("th")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| anyhow!("No table found in result HTML"))?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(&row_sel) {
        // Spread colspan cells across the columns they cover, the way a
        // visual table reader would.
        let mut cells: Vec<String> = Vec::new();
        for cell in tr.select(&cell_sel) {
            let text = normalize_whitespace(&cell.text().collect::<String>());
            let span = cell
                .value()
                .attr("colspan")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            for _ in 0..span {
                cells.push(text.clone());
            }
        }

        if cells.is_empty() {
            continue;
        }

        if headers.is_empty() {
            let has_th = tr.select(&header_cell_sel).next().is_some();
            if has_th || rows.is_empty() {
                headers = cells;
                continue;
            }
        }

        // Pagination footer rows carry no data.
        if cells[0].starts_with("Trang:") {
            continue;
        }

        rows.push(cells);
    }

    if headers.is_empty() {
        return Err(anyhow!("Result table has no header row"));
    }

    // Pad short rows so every row matches the header width.
    for row in &mut rows {
        row.resize(headers.len(), String::new());
    }

    Ok(ResultTable { headers, rows })
}

/// When the portal found nothing it renders a single row carrying the
/// no-result message; substitute the queried code so the report still has
/// one identifiable row per input.
pub fn apply_no_result(table: &mut ResultTable, code_column: &str, code: &str) {
    let Some(col) = table.column_index(code_column) else {
        return;
    };
    let no_result = table
        .rows
        .last()
        .and_then(|row| row.get(col))
        .map(|cell| cell == NO_RESULT_MESSAGE)
        .unwrap_or(false);
    if no_result {
        if let Some(cell) = table.rows.first_mut().and_then(|row| row.get_mut(col)) {
            *cell = code.to_string();
        }
    }
}

/// Merge per-query tables into one: header union in first-seen order,
/// missing cells empty. If the code column is absent it is appended and
/// backfilled from each row's originating query.
pub fn merge_tables(results: &[(String, ResultTable)], code_column: &str) -> ResultTable {
    let mut headers: Vec<String> = Vec::new();
    for (_, table) in results {
        for header in &table.headers {
            if !headers.contains(header) {
                headers.push(header.clone());
            }
        }
    }
    if headers.is_empty() {
        return ResultTable::default();
    }

    let added_code_column = !headers.iter().any(|h| h == code_column);
    if added_code_column {
        headers.push(code_column.to_string());
    }
    let code_col = headers
        .iter()
        .position(|h| h == code_column)
        .unwrap_or(headers.len() - 1);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (code, table) in results {
        for row in &table.rows {
            let mut merged = vec![String::new(); headers.len()];
            for (i, header) in table.headers.iter().enumerate() {
                if let Some(pos) = headers.iter().position(|h| h == header) {
                    if let Some(value) = row.get(i) {
                        merged[pos] = value.clone();
                    }
                }
            }
            if merged[code_col].is_empty() {
                merged[code_col] = code.clone();
            }
            rows.push(merged);
        }
    }

    ResultTable { headers, rows }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TABLE: &str = r#"
        <table class="ta_border">
            <tr>
                <th>STT</th>
                <th>MST</th>
                <th>Tên người nộp thuế</th>
            </tr>
            <tr>
                <td>1</td>
                <td>0101234567</td>
                <td>  CONG TY
                    TNHH ABC  </td>
            </tr>
            <tr>
                <td>Trang: &gt;&gt;</td>
                <td></td>
                <td></td>
            </tr>
        </table>
    "#;

    #[test]
    fn test_parse_result_table() {
        let table = parse_result_table(SAMPLE_TABLE).unwrap();
        assert_eq!(table.headers, vec!["STT", "MST", "Tên người nộp thuế"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], "0101234567");
        // Internal whitespace collapsed.
        assert_eq!(table.rows[0][2], "CONG TY TNHH ABC");
    }

    #[test]
    fn test_parse_rejects_tableless_html() {
        assert!(parse_result_table("<div>nothing here</div>").is_err());
    }

    #[test]
    fn test_colspan_spreads_across_columns() {
        let html = r#"
            <table>
                <tr><th>STT</th><th>MST</th><th>Tên</th></tr>
                <tr><td colspan="3">Không tìm thấy kết quả.</td></tr>
            </table>
        "#;
        let table = parse_result_table(html).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][1], NO_RESULT_MESSAGE);
    }

    #[test]
    fn test_apply_no_result_substitutes_code() {
        let mut table = ResultTable {
            headers: vec!["STT".to_string(), "MST".to_string()],
            rows: vec![vec!["1".to_string(), NO_RESULT_MESSAGE.to_string()]],
        };
        apply_no_result(&mut table, "MST", "0109999999");
        assert_eq!(table.rows[0][1], "0109999999");
    }

    #[test]
    fn test_apply_no_result_leaves_real_rows() {
        let mut table = ResultTable {
            headers: vec!["MST".to_string()],
            rows: vec![vec!["0101234567".to_string()]],
        };
        apply_no_result(&mut table, "MST", "0109999999");
        assert_eq!(table.rows[0][0], "0101234567");
    }

    #[test]
    fn test_merge_tables_union_headers() {
        let first = ResultTable {
            headers: vec!["STT".to_string(), "MST".to_string()],
            rows: vec![vec!["1".to_string(), "0101234567".to_string()]],
        };
        let second = ResultTable {
            headers: vec!["STT".to_string(), "Địa chỉ".to_string()],
            rows: vec![vec!["1".to_string(), "Hà Nội".to_string()]],
        };
        let merged = merge_tables(
            &[
                ("0101234567".to_string(), first),
                ("0107654321".to_string(), second),
            ],
            "MST",
        );

        assert_eq!(merged.headers, vec!["STT", "MST", "Địa chỉ"]);
        assert_eq!(merged.rows.len(), 2);
        // First row keeps its own MST, empty address.
        assert_eq!(merged.rows[0], vec!["1", "0101234567", ""]);
        // Second row had no MST column; backfilled from the query code.
        assert_eq!(merged.rows[1], vec!["1", "0107654321", "Hà Nội"]);
    }

    #[test]
    fn test_merge_tables_appends_missing_code_column() {
        let table = ResultTable {
            headers: vec!["Tên".to_string()],
            rows: vec![vec!["ABC".to_string()]],
        };
        let merged = merge_tables(&[("012345678912".to_string(), table)], "Số CMT/Thẻ căn cước");
        assert_eq!(merged.headers, vec!["Tên", "Số CMT/Thẻ căn cước"]);
        assert_eq!(merged.rows[0], vec!["ABC", "012345678912"]);
    }

    #[test]
    fn test_merge_tables_empty() {
        let merged = merge_tables(&[], "MST");
        assert!(merged.is_empty());
        assert!(merged.headers.is_empty());
    }
}
