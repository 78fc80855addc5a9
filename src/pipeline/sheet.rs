//! Spreadsheet reading: each worksheet becomes one text page holding a
//! GFM table.

use crate::document::Page;
use crate::error::LoaderError;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

/// Read every non-empty worksheet as a Markdown table page.
pub async fn read_sheets(path: &Path) -> Result<Vec<Page>, LoaderError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_sheets_blocking(&path))
        .await
        .map_err(|e| LoaderError::Spreadsheet(format!("Sheet task panicked: {}", e)))?
}

fn read_sheets_blocking(path: &Path) -> Result<Vec<Page>, LoaderError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| LoaderError::Spreadsheet(e.to_string()))?;

    let mut pages = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| LoaderError::Spreadsheet(format!("sheet '{name}': {e}")))?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .filter(|row: &Vec<String>| row.iter().any(|c| !c.is_empty()))
            .collect();
        if rows.is_empty() {
            debug!("Skipping empty sheet '{}'", name);
            continue;
        }
        pages.push(Page::text(pages.len() + 1, markdown_table(&name, &rows)));
    }
    Ok(pages)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Render rows as a GFM table under a `## sheet` heading; the first row is
/// the header.
pub fn markdown_table(sheet: &str, rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0).max(1);
    let line = |row: &[String]| {
        let cells: Vec<String> = (0..width)
            .map(|i| {
                row.get(i)
                    .map(|c| c.replace('|', "\\|").replace('\n', " "))
                    .unwrap_or_default()
            })
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut out = format!("## {sheet}\n\n");
    if let Some((header, body)) = rows.split_first() {
        out.push_str(&line(header));
        out.push('\n');
        out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        for row in body {
            out.push_str(&line(row));
            out.push('\n');
        }
    }
    out
}
