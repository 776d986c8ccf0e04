//! Line items: the data rows of a section table and the running total.
//!
//! A section table always reads
//!
//! ```text
//! row 0          header   Désignation | Description | Qté | Prix unitaire | Prix total
//! rows 1..n-1    data     one line item each
//! row n-1        total    Total HT (4 merged columns)  | 0.00 €
//! ```
//!
//! The cell text is the only record of an item. Totals are recomputed from
//! the line-total column of every data row after each change, so they stay
//! correct however often an operation is repeated.

use crate::document::{
    cell_text, clear_cell_text, row_cells, row_cells_mut, set_cell_text, table_rows,
    table_rows_mut, Align, TextFormat, WorkingDocument,
};
use crate::engine::section::{find_section, remove_section};
use crate::error::{EngineWarning, OfferDocError};
use docx_rs::Table;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Physical cell index of the line total on a data row.
pub const LINE_TOTAL_COLUMN: usize = 4;

/// Number of columns a section table is expected to have.
pub const SECTION_COLUMNS: usize = 5;

/// One priced line of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub designation: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

/// `12.5` → `"12.50 €"`.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2} €")
}

/// Parse an amount cell: `€`/`EUR` and whitespace are dropped, `,` is a decimal point.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .replace('€', "")
        .replace("EUR", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── Insert ───────────────────────────────────────────────────────────────────

/// Result of [`insert_line`].
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// Row index of the new data row.
    pub row_index: usize,
    /// Physical rows in the table, header and total included.
    pub rows_in_table: usize,
    pub line_total: f64,
    pub table_total: f64,
    pub warnings: Vec<EngineWarning>,
}

/// Insert `item` right above the total row and refresh the total.
///
/// The new row is a copy of the header row with its content replaced, so it
/// inherits cell widths and borders.
pub fn insert_line(table: &mut Table, item: &LineItem) -> Result<Insertion, OfferDocError> {
    let row_count = table.rows.len();
    if row_count < 2 {
        return Err(OfferDocError::MalformedDocument {
            detail: format!("section table has {row_count} rows, needs a header and a total row"),
        });
    }

    let row_index = row_count - 1;
    let shape = table.rows[0].clone();
    table.rows.insert(row_index, shape);

    let line_total = item.line_total();
    let values = [
        item.designation.clone(),
        item.description.clone(),
        item.quantity.to_string(),
        format_amount(item.unit_price),
        format_amount(line_total),
    ];

    let mut warnings = Vec::new();
    let mut rows = table_rows_mut(table);
    let row = rows
        .get_mut(row_index)
        .ok_or_else(|| OfferDocError::Internal(format!("inserted row {row_index} vanished")))?;
    let mut cells = row_cells_mut(row);
    if cells.len() < SECTION_COLUMNS {
        warn!(
            "Section table has {} columns, filling only those",
            cells.len()
        );
        warnings.push(EngineWarning::NarrowTable {
            columns: cells.len(),
        });
    }
    for (i, cell) in cells.iter_mut().enumerate() {
        let value = values.get(i).map(String::as_str).unwrap_or("");
        set_cell_text(cell, value, TextFormat::PLAIN, Align::Justify);
    }

    let recompute = recompute_total(table);
    warnings.extend(recompute.warnings);
    debug!(
        "Inserted '{}' at row {} (line total {})",
        item.designation,
        row_index,
        format_amount(line_total)
    );

    Ok(Insertion {
        row_index,
        rows_in_table: table.rows.len(),
        line_total,
        table_total: recompute.total,
        warnings,
    })
}

// ── Recompute ────────────────────────────────────────────────────────────────

/// Result of [`recompute_total`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recompute {
    pub total: f64,
    pub warnings: Vec<EngineWarning>,
}

/// Sum the line totals of all data rows into the total row's last cell.
///
/// Rows without a line-total cell count as zero. A blank or unparsable
/// amount is skipped with a warning instead of failing the sum.
pub fn recompute_total(table: &mut Table) -> Recompute {
    let mut total = 0.0;
    let mut warnings = Vec::new();

    let rows = table_rows(table);
    if rows.len() < 2 {
        return Recompute { total, warnings };
    }
    let last = rows.len() - 1;
    for (row, data) in rows.iter().enumerate().take(last).skip(1) {
        let Some(cell) = row_cells(data).get(LINE_TOTAL_COLUMN).copied() else {
            continue;
        };
        let text = cell_text(cell);
        if text.trim().is_empty() {
            warn!("Row {}: line total is blank, counted as zero", row);
            warnings.push(EngineWarning::UnparsableAmount { row, text });
            continue;
        }
        match parse_amount(&text) {
            Some(v) => total += v,
            None => {
                warn!("Row {}: cannot parse amount '{}', skipped", row, text);
                warnings.push(EngineWarning::UnparsableAmount { row, text });
            }
        }
    }

    let mut rows = table_rows_mut(table);
    if let Some(cell) = rows
        .get_mut(last)
        .and_then(|r| row_cells_mut(r).into_iter().last())
    {
        set_cell_text(cell, &format_amount(total), TextFormat::BOLD, Align::Justify);
    }

    Recompute { total, warnings }
}

/// Number of data rows (rows strictly between header and total).
pub fn data_row_count(table: &Table) -> usize {
    table_rows(table).len().saturating_sub(2)
}

// ── Delete ───────────────────────────────────────────────────────────────────

/// Which data row to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteSelector {
    /// Table row index; data rows are `1..rows-1`.
    Index(usize),
    /// Case-insensitive substring of the designation; first match wins.
    Name(String),
}

/// Result of [`delete_line`].
#[derive(Debug, Clone, PartialEq)]
pub struct Deletion {
    /// Designation of the removed row.
    pub deleted_label: String,
    /// Data rows left; 0 when the section was deleted.
    pub rows_remaining: usize,
    pub section_deleted: bool,
    pub table_total: f64,
    pub warnings: Vec<EngineWarning>,
}

/// Delete one data row of the section titled `section_title`.
///
/// When no data row remains the whole section goes: its table and its title
/// paragraph are removed from the body. On any error the document is
/// unchanged.
pub fn delete_line(
    doc: &mut WorkingDocument,
    section_title: &str,
    selector: &DeleteSelector,
) -> Result<Deletion, OfferDocError> {
    let entry = find_section(doc, section_title).ok_or_else(|| OfferDocError::SectionNotFound {
        title: section_title.to_string(),
    })?;
    let table = doc.table_mut(entry.table_index).ok_or_else(|| {
        OfferDocError::Internal(format!("table {} disappeared", entry.table_index))
    })?;

    let row_count = table_rows(table).len();
    if row_count < 2 {
        return Err(OfferDocError::MalformedDocument {
            detail: format!("section '{section_title}' table has {row_count} rows"),
        });
    }

    let row_index = match selector {
        DeleteSelector::Index(index) => {
            if *index < 1 || *index >= row_count - 1 {
                return Err(OfferDocError::RowIndexOutOfRange {
                    index: *index,
                    max: row_count - 2,
                });
            }
            *index
        }
        DeleteSelector::Name(name) => {
            find_row_by_name(table, name).ok_or_else(|| OfferDocError::LineItemNotFound {
                name: name.clone(),
                section: section_title.to_string(),
            })?
        }
    };

    let deleted_label = table_rows(table)
        .get(row_index)
        .and_then(|r| row_cells(r).first().map(|c| cell_text(c).trim().to_string()))
        .unwrap_or_default();
    table.rows.remove(row_index);

    let rows_remaining = data_row_count(table);
    if rows_remaining == 0 {
        remove_section(doc, &entry);
        info!(
            "Deleted '{}', section '{}' is now empty and was removed",
            deleted_label, section_title
        );
        return Ok(Deletion {
            deleted_label,
            rows_remaining: 0,
            section_deleted: true,
            table_total: 0.0,
            warnings: Vec::new(),
        });
    }

    let recompute = recompute_total(table);
    info!(
        "Deleted '{}' from '{}', {} rows remain",
        deleted_label, section_title, rows_remaining
    );
    Ok(Deletion {
        deleted_label,
        rows_remaining,
        section_deleted: false,
        table_total: recompute.total,
        warnings: recompute.warnings,
    })
}

fn find_row_by_name(table: &Table, name: &str) -> Option<usize> {
    let needle = name.trim().to_lowercase();
    let rows = table_rows(table);
    let last = rows.len().saturating_sub(1);
    rows.iter()
        .enumerate()
        .take(last)
        .skip(1)
        .find(|(_, row)| {
            row_cells(row)
                .first()
                .map(|c| cell_text(c).trim().to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
}

// ── Clean quote ──────────────────────────────────────────────────────────────

/// Blank every row below the header in every table, keeping rows and formatting.
///
/// Returns the number of rows emptied.
pub fn clear_data_rows(doc: &mut WorkingDocument) -> usize {
    let mut emptied = 0;
    for table in doc.tables_mut() {
        for row in table_rows_mut(table).into_iter().skip(1) {
            for cell in row_cells_mut(row) {
                clear_cell_text(cell);
            }
            emptied += 1;
        }
    }
    info!("Emptied {} table rows", emptied);
    emptied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::row_texts;
    use crate::engine::section::{append_section, find_or_create_section, SectionOrigin};
    use docx_rs::{Paragraph, Run, TableCell, TableRow};

    fn displayed_total(table: &Table) -> Option<f64> {
        let rows = table_rows(table);
        let total_row = rows.last()?;
        let cell = row_cells(total_row).into_iter().last()?;
        parse_amount(&cell_text(cell))
    }

    fn item(designation: &str, quantity: u32, unit_price: f64) -> LineItem {
        LineItem {
            designation: designation.into(),
            description: format!("{designation} licence"),
            quantity,
            unit_price,
        }
    }

    fn section_doc(title: &str) -> (WorkingDocument, usize) {
        let mut doc = WorkingDocument::new();
        let idx = append_section(&mut doc, title);
        (doc, idx)
    }

    fn total_text(doc: &WorkingDocument, table_index: usize) -> String {
        let table = doc.table(table_index).unwrap();
        let rows = table_rows(table);
        row_texts(rows[rows.len() - 1]).last().cloned().unwrap()
    }

    #[test]
    fn amounts_format_and_parse() {
        assert_eq!(format_amount(30.0), "30.00 €");
        assert_eq!(format_amount(12.345), "12.35 €");
        assert_eq!(parse_amount("12,50 €"), Some(12.5));
        assert_eq!(parse_amount(" 1 234.00 EUR"), Some(1234.0));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn insert_fills_row_before_total() {
        let (mut doc, idx) = section_doc("Service cloud");
        let table = doc.table_mut(idx).unwrap();
        let ins = insert_line(table, &item("M365", 3, 10.0)).unwrap();
        assert_eq!(ins.row_index, 1);
        assert_eq!(ins.rows_in_table, 3);
        assert_eq!(ins.table_total, 30.0);
        assert!(ins.warnings.is_empty());

        let rows = table_rows(doc.table(idx).unwrap());
        assert_eq!(
            row_texts(rows[1]),
            vec!["M365", "M365 licence", "3", "10.00 €", "30.00 €"]
        );
        assert_eq!(row_texts(rows[0])[0], "Désignation");
        assert_eq!(total_text(&doc, idx), "30.00 €");
    }

    #[test]
    fn totals_track_inserts() {
        let (mut doc, idx) = section_doc("Supports");
        let table = doc.table_mut(idx).unwrap();
        insert_line(table, &item("A", 3, 10.0)).unwrap();
        let ins = insert_line(table, &item("B", 1, 12.5)).unwrap();
        assert_eq!(ins.row_index, 2);
        assert_eq!(data_row_count(table), 2);
        assert!((ins.table_total - 42.5).abs() < 0.005);
        assert_eq!(displayed_total(table), Some(42.5));
    }

    #[test]
    fn insert_rejects_headerless_table() {
        let mut table = Table::new(vec![TableRow::new(vec![TableCell::new()])]);
        let err = insert_line(&mut table, &item("A", 1, 1.0)).unwrap_err();
        assert!(matches!(err, OfferDocError::MalformedDocument { .. }));
    }

    #[test]
    fn narrow_table_fills_available_columns() {
        let cell = |t: &str| {
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(t)))
        };
        let mut table = Table::new(vec![
            TableRow::new(vec![cell("Désignation"), cell("Description"), cell("Qté")]),
            TableRow::new(vec![cell("Total"), cell(""), cell("0.00 €")]),
        ]);
        let ins = insert_line(&mut table, &item("A", 2, 5.0)).unwrap();
        assert_eq!(ins.warnings, vec![EngineWarning::NarrowTable { columns: 3 }]);
        let rows = table_rows(&table);
        assert_eq!(row_texts(rows[1]), vec!["A", "A licence", "2"]);
        // no line-total column, nothing to sum
        assert_eq!(ins.table_total, 0.0);
    }

    #[test]
    fn recompute_skips_corrupt_row() {
        let (mut doc, idx) = section_doc("Supports");
        let table = doc.table_mut(idx).unwrap();
        insert_line(table, &item("A", 1, 10.0)).unwrap();
        insert_line(table, &item("B", 1, 5.0)).unwrap();
        {
            let mut rows = table_rows_mut(table);
            let mut cells = row_cells_mut(rows[1]);
            set_cell_text(cells[4], "oops", TextFormat::PLAIN, Align::Justify);
        }
        let r = recompute_total(table);
        assert_eq!(r.total, 5.0);
        assert_eq!(
            r.warnings,
            vec![EngineWarning::UnparsableAmount {
                row: 1,
                text: "oops".into()
            }]
        );
        assert_eq!(total_text(&doc, idx), "5.00 €");
    }

    #[test]
    fn blank_line_total_is_reported() {
        let (mut doc, idx) = section_doc("Supports");
        let table = doc.table_mut(idx).unwrap();
        insert_line(table, &item("A", 1, 10.0)).unwrap();
        insert_line(table, &item("B", 1, 5.0)).unwrap();
        {
            let mut rows = table_rows_mut(table);
            let mut cells = row_cells_mut(rows[2]);
            clear_cell_text(cells[4]);
        }
        let r = recompute_total(table);
        assert_eq!(r.total, 10.0);
        assert_eq!(
            r.warnings,
            vec![EngineWarning::UnparsableAmount {
                row: 2,
                text: String::new()
            }]
        );
        assert_eq!(total_text(&doc, idx), "10.00 €");
    }

    #[test]
    fn recompute_is_idempotent() {
        let (mut doc, idx) = section_doc("Supports");
        let table = doc.table_mut(idx).unwrap();
        insert_line(table, &item("A", 2, 7.25)).unwrap();
        let first = recompute_total(table).total;
        let second = recompute_total(table).total;
        assert_eq!(first, second);
        assert_eq!(data_row_count(table), 1);
    }

    #[test]
    fn delete_by_name_keeps_section() {
        let (mut doc, idx) = section_doc("Service cloud");
        let table = doc.table_mut(idx).unwrap();
        insert_line(table, &item("M365 Business", 3, 10.0)).unwrap();
        insert_line(table, &item("Backup", 1, 12.5)).unwrap();

        let del = delete_line(
            &mut doc,
            "Service cloud",
            &DeleteSelector::Name("m365".into()),
        )
        .unwrap();
        assert_eq!(del.deleted_label, "M365 Business");
        assert_eq!(del.rows_remaining, 1);
        assert!(!del.section_deleted);
        assert_eq!(format_amount(del.table_total), "12.50 €");
        assert_eq!(total_text(&doc, idx), "12.50 €");
    }

    #[test]
    fn delete_last_row_removes_section() {
        let mut doc = WorkingDocument::new();
        let handle = find_or_create_section(&mut doc, "Supports");
        assert_eq!(handle.origin, SectionOrigin::Created);
        insert_line(doc.table_mut(handle.table_index).unwrap(), &item("Hotline", 1, 99.0)).unwrap();
        let paragraphs_before = doc.paragraph_count();
        let tables_before = doc.table_count();

        let del = delete_line(&mut doc, "Supports", &DeleteSelector::Index(1)).unwrap();
        assert!(del.section_deleted);
        assert_eq!(del.rows_remaining, 0);
        assert_eq!(del.table_total, 0.0);
        assert_eq!(doc.paragraph_count(), paragraphs_before - 1);
        assert_eq!(doc.table_count(), tables_before - 1);
        assert!(find_section(&doc, "Supports").is_none());
    }

    #[test]
    fn delete_index_out_of_range_leaves_table() {
        let (mut doc, idx) = section_doc("Supports");
        insert_line(doc.table_mut(idx).unwrap(), &item("A", 1, 1.0)).unwrap();
        for bad in [0, 2, 9] {
            let err = delete_line(&mut doc, "Supports", &DeleteSelector::Index(bad)).unwrap_err();
            assert!(
                matches!(err, OfferDocError::RowIndexOutOfRange { index, max: 1 } if index == bad),
                "got {err:?}"
            );
        }
        assert_eq!(data_row_count(doc.table(idx).unwrap()), 1);
    }

    #[test]
    fn delete_unknown_name_or_section() {
        let (mut doc, idx) = section_doc("Supports");
        insert_line(doc.table_mut(idx).unwrap(), &item("A", 1, 1.0)).unwrap();
        let err = delete_line(&mut doc, "Supports", &DeleteSelector::Name("zzz".into())).unwrap_err();
        assert!(matches!(err, OfferDocError::LineItemNotFound { .. }));
        let err = delete_line(&mut doc, "Service cloud", &DeleteSelector::Index(1)).unwrap_err();
        assert!(matches!(err, OfferDocError::SectionNotFound { .. }));
    }

    #[test]
    fn name_never_matches_header_or_total() {
        let (mut doc, idx) = section_doc("Supports");
        insert_line(doc.table_mut(idx).unwrap(), &item("A", 1, 1.0)).unwrap();
        let err = delete_line(&mut doc, "Supports", &DeleteSelector::Name("total".into())).unwrap_err();
        assert!(matches!(err, OfferDocError::LineItemNotFound { .. }));
        let err =
            delete_line(&mut doc, "Supports", &DeleteSelector::Name("désignation".into())).unwrap_err();
        assert!(matches!(err, OfferDocError::LineItemNotFound { .. }));
    }

    #[test]
    fn clear_rows_keeps_headers() {
        let (mut doc, idx) = section_doc("Supports");
        insert_line(doc.table_mut(idx).unwrap(), &item("A", 1, 1.0)).unwrap();
        assert_eq!(clear_data_rows(&mut doc), 2);
        let rows = table_rows(doc.table(idx).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(row_texts(rows[0])[0], "Désignation");
        assert!(row_texts(rows[1]).iter().all(|t| t.is_empty()));
    }
}
