//! The in-memory working document.
//!
//! [`WorkingDocument`] wraps a [`docx_rs::Docx`]. The body is an owned tree:
//! `document.children` holds block-level nodes in order, each table owns its
//! `rows`, each row its `cells`, each cell its paragraphs. Structural edits are
//! plain `Vec` splices on those arrays, so inserting before the last row or
//! removing a block never invalidates anything held elsewhere: callers address
//! nodes by index and re-resolve after every edit.
//!
//! Two index spaces are in use and must not be mixed up:
//!
//! * **block position**: index into `document.children` (paragraphs, tables
//!   and anything else the body contains);
//! * **paragraph / table index**: ordinal among body-level paragraphs or
//!   tables only.

use crate::error::OfferDocError;
use docx_rs::{
    read_docx, AlignmentType, DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild,
    Table, TableCell, TableCellContent, TableChild, TableRow, TableRowChild,
};
use std::io::Cursor;
use tracing::debug;

/// Style reported for paragraphs that carry no explicit style.
pub const DEFAULT_STYLE: &str = "Normal";

/// A body-level node, tagged with its ordinal among nodes of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyBlock {
    Paragraph { paragraph_index: usize },
    Table { table_index: usize },
    /// Section properties, structured tags, tables of contents…
    Other,
}

/// A document loaded for one request: read once, mutated, written back once.
#[derive(Debug, Clone)]
pub struct WorkingDocument {
    docx: Docx,
}

impl Default for WorkingDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingDocument {
    /// An empty document with no body content.
    pub fn new() -> Self {
        Self { docx: Docx::new() }
    }

    /// Wrap a document built or read with docx-rs directly.
    pub fn from_docx(docx: Docx) -> Self {
        Self { docx }
    }

    /// Parse a `.docx` package.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OfferDocError> {
        let docx = read_docx(bytes).map_err(|e| OfferDocError::MalformedDocument {
            detail: e.to_string(),
        })?;
        let doc = Self { docx };
        debug!(
            "Loaded document: {} paragraphs, {} tables",
            doc.paragraph_count(),
            doc.table_count()
        );
        Ok(doc)
    }

    /// Serialise back to a `.docx` package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OfferDocError> {
        let mut buffer = Vec::new();
        self.docx
            .clone()
            .build()
            .pack(&mut Cursor::new(&mut buffer))
            .map_err(|e| OfferDocError::MalformedDocument {
                detail: format!("failed to pack document: {e}"),
            })?;
        Ok(buffer)
    }

    // ── Body navigation ──────────────────────────────────────────────────

    /// Body-level nodes in document order.
    pub fn blocks(&self) -> Vec<BodyBlock> {
        let mut paragraphs = 0;
        let mut tables = 0;
        self.docx
            .document
            .children
            .iter()
            .map(|child| match child {
                DocumentChild::Paragraph(_) => {
                    paragraphs += 1;
                    BodyBlock::Paragraph {
                        paragraph_index: paragraphs - 1,
                    }
                }
                DocumentChild::Table(_) => {
                    tables += 1;
                    BodyBlock::Table {
                        table_index: tables - 1,
                    }
                }
                _ => BodyBlock::Other,
            })
            .collect()
    }

    /// Body-level paragraphs in document order.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        self.docx
            .document
            .children
            .iter()
            .filter_map(as_paragraph)
            .collect()
    }

    /// Body-level tables in document order.
    pub fn tables(&self) -> Vec<&Table> {
        self.docx
            .document
            .children
            .iter()
            .filter_map(as_table)
            .collect()
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().len()
    }

    pub fn table_count(&self) -> usize {
        self.tables().len()
    }

    pub fn table(&self, table_index: usize) -> Option<&Table> {
        self.docx
            .document
            .children
            .iter()
            .filter_map(as_table)
            .nth(table_index)
    }

    pub fn table_mut(&mut self, table_index: usize) -> Option<&mut Table> {
        self.docx
            .document
            .children
            .iter_mut()
            .filter_map(as_table_mut)
            .nth(table_index)
    }

    pub(crate) fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        self.docx
            .document
            .children
            .iter_mut()
            .filter_map(as_paragraph_mut)
            .collect()
    }

    pub(crate) fn tables_mut(&mut self) -> Vec<&mut Table> {
        self.docx
            .document
            .children
            .iter_mut()
            .filter_map(as_table_mut)
            .collect()
    }

    /// Block position of the table with the given table index.
    pub fn table_block(&self, table_index: usize) -> Option<usize> {
        self.blocks()
            .iter()
            .position(|b| *b == BodyBlock::Table { table_index })
    }

    /// Block position of the paragraph with the given paragraph index.
    pub fn paragraph_block(&self, paragraph_index: usize) -> Option<usize> {
        self.blocks()
            .iter()
            .position(|b| *b == BodyBlock::Paragraph { paragraph_index })
    }

    /// Every text a reader would see: body paragraphs, then each table cell.
    pub fn visible_text(&self) -> Vec<String> {
        let mut out: Vec<String> = self.paragraphs().into_iter().map(paragraph_text).collect();
        for table in self.tables() {
            for row in table_rows(table) {
                for cell in row_cells(row) {
                    out.push(cell_text(cell));
                }
            }
        }
        out
    }

    /// Whether `needle` occurs anywhere in [`Self::visible_text`].
    pub fn contains_text(&self, needle: &str) -> bool {
        self.visible_text().iter().any(|t| t.contains(needle))
    }

    // ── Structural edits ─────────────────────────────────────────────────

    pub(crate) fn push_paragraph(&mut self, paragraph: Paragraph) {
        let docx = std::mem::replace(&mut self.docx, Docx::new());
        self.docx = docx.add_paragraph(paragraph);
    }

    pub(crate) fn push_table(&mut self, table: Table) {
        let docx = std::mem::replace(&mut self.docx, Docx::new());
        self.docx = docx.add_table(table);
    }

    /// Remove the body node at `block`. Returns `false` when out of range.
    pub(crate) fn remove_block(&mut self, block: usize) -> bool {
        let children = &mut self.docx.document.children;
        if block < children.len() {
            children.remove(block);
            true
        } else {
            false
        }
    }
}

// ── Node accessors ─────────────────────────────────────────────────────────
//
// docx-rs boxes some variants and not others; binding through a typed `let`
// lets deref coercion absorb the difference.

fn as_paragraph(child: &DocumentChild) -> Option<&Paragraph> {
    match child {
        DocumentChild::Paragraph(p) => {
            let p: &Paragraph = p;
            Some(p)
        }
        _ => None,
    }
}

fn as_paragraph_mut(child: &mut DocumentChild) -> Option<&mut Paragraph> {
    match child {
        DocumentChild::Paragraph(p) => {
            let p: &mut Paragraph = p;
            Some(p)
        }
        _ => None,
    }
}

fn as_table(child: &DocumentChild) -> Option<&Table> {
    match child {
        DocumentChild::Table(t) => {
            let t: &Table = t;
            Some(t)
        }
        _ => None,
    }
}

fn as_table_mut(child: &mut DocumentChild) -> Option<&mut Table> {
    match child {
        DocumentChild::Table(t) => {
            let t: &mut Table = t;
            Some(t)
        }
        _ => None,
    }
}

/// Rows of a table, in order.
#[allow(unreachable_patterns)]
pub fn table_rows(table: &Table) -> Vec<&TableRow> {
    table
        .rows
        .iter()
        .filter_map(|child| match child {
            TableChild::TableRow(row) => {
                let row: &TableRow = row;
                Some(row)
            }
            _ => None,
        })
        .collect()
}

#[allow(unreachable_patterns)]
pub fn table_rows_mut(table: &mut Table) -> Vec<&mut TableRow> {
    table
        .rows
        .iter_mut()
        .filter_map(|child| match child {
            TableChild::TableRow(row) => {
                let row: &mut TableRow = row;
                Some(row)
            }
            _ => None,
        })
        .collect()
}

/// Physical cells of a row (a merged cell counts once).
#[allow(unreachable_patterns)]
pub fn row_cells(row: &TableRow) -> Vec<&TableCell> {
    row.cells
        .iter()
        .filter_map(|child| match child {
            TableRowChild::TableCell(cell) => {
                let cell: &TableCell = cell;
                Some(cell)
            }
            _ => None,
        })
        .collect()
}

#[allow(unreachable_patterns)]
pub fn row_cells_mut(row: &mut TableRow) -> Vec<&mut TableCell> {
    row.cells
        .iter_mut()
        .filter_map(|child| match child {
            TableRowChild::TableCell(cell) => {
                let cell: &mut TableCell = cell;
                Some(cell)
            }
            _ => None,
        })
        .collect()
}

/// Paragraphs directly inside a cell.
pub fn cell_paragraphs(cell: &TableCell) -> Vec<&Paragraph> {
    cell.children
        .iter()
        .filter_map(|c| match c {
            TableCellContent::Paragraph(p) => {
                let p: &Paragraph = p;
                Some(p)
            }
            _ => None,
        })
        .collect()
}

pub fn cell_paragraphs_mut(cell: &mut TableCell) -> Vec<&mut Paragraph> {
    cell.children
        .iter_mut()
        .filter_map(|c| match c {
            TableCellContent::Paragraph(p) => {
                let p: &mut Paragraph = p;
                Some(p)
            }
            _ => None,
        })
        .collect()
}

/// Runs directly inside a paragraph, in order.
pub fn paragraph_runs_mut(paragraph: &mut Paragraph) -> Vec<&mut Run> {
    paragraph
        .children
        .iter_mut()
        .filter_map(|c| match c {
            ParagraphChild::Run(run) => {
                let run: &mut Run = run;
                Some(run)
            }
            _ => None,
        })
        .collect()
}

// ── Text ───────────────────────────────────────────────────────────────────

/// Concatenated text of a run: tabs become `\t`, breaks become `\n`.
pub fn run_text(run: &Run) -> String {
    let mut out = String::new();
    for child in &run.children {
        match child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// Text of a paragraph's direct runs.
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    paragraph
        .children
        .iter()
        .filter_map(|c| match c {
            ParagraphChild::Run(run) => Some(run_text(run)),
            _ => None,
        })
        .collect()
}

/// Paragraph style id, or [`DEFAULT_STYLE`].
pub fn paragraph_style(paragraph: &Paragraph) -> String {
    paragraph
        .property
        .style
        .as_ref()
        .map(|s| s.val.clone())
        .unwrap_or_else(|| DEFAULT_STYLE.to_string())
}

/// Text of a cell: its paragraphs joined by `\n`.
pub fn cell_text(cell: &TableCell) -> String {
    cell_paragraphs(cell)
        .into_iter()
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Texts of every physical cell in a row.
pub fn row_texts(row: &TableRow) -> Vec<String> {
    row_cells(row).into_iter().map(cell_text).collect()
}

// ── Building ───────────────────────────────────────────────────────────────

/// Run formatting applied to text the engine writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextFormat {
    pub bold: bool,
    /// Font size in half-points (28 = 14pt).
    pub size: Option<usize>,
}

impl TextFormat {
    pub const PLAIN: Self = Self {
        bold: false,
        size: None,
    };
    pub const BOLD: Self = Self {
        bold: true,
        size: None,
    };
}

/// Horizontal alignment of a written paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Justify,
}

impl From<Align> for AlignmentType {
    fn from(a: Align) -> Self {
        match a {
            Align::Left => AlignmentType::Left,
            Align::Right => AlignmentType::Right,
            Align::Justify => AlignmentType::Both,
        }
    }
}

/// A one-run paragraph.
pub fn text_paragraph(text: &str, format: TextFormat, align: Align) -> Paragraph {
    let mut run = Run::new().add_text(text);
    if format.bold {
        run = run.bold();
    }
    if let Some(size) = format.size {
        run = run.size(size);
    }
    Paragraph::new().add_run(run).align(align.into())
}

/// Replace everything inside a cell by one paragraph holding `text`.
///
/// Cell properties (width, shading, merge) are kept.
pub fn set_cell_text(cell: &mut TableCell, text: &str, format: TextFormat, align: Align) {
    let mut emptied = cell.clone();
    emptied.children.clear();
    *cell = emptied.add_paragraph(text_paragraph(text, format, align));
}

/// Blank every run of every paragraph in the cell, keeping run formatting.
pub fn clear_cell_text(cell: &mut TableCell) {
    for paragraph in cell_paragraphs_mut(cell) {
        for run in paragraph_runs_mut(paragraph) {
            run.children.retain(|c| {
                !matches!(
                    c,
                    RunChild::Text(_) | RunChild::Tab(_) | RunChild::Break(_)
                )
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkingDocument {
        let mut doc = WorkingDocument::new();
        doc.push_paragraph(text_paragraph("Intro", TextFormat::PLAIN, Align::Left));
        doc.push_table(Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("A"))),
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("B"))),
        ])]));
        doc.push_paragraph(Paragraph::new());
        doc
    }

    #[test]
    fn blocks_tag_both_index_spaces() {
        let doc = sample();
        assert_eq!(
            doc.blocks(),
            vec![
                BodyBlock::Paragraph { paragraph_index: 0 },
                BodyBlock::Table { table_index: 0 },
                BodyBlock::Paragraph { paragraph_index: 1 },
            ]
        );
        assert_eq!(doc.table_block(0), Some(1));
        assert_eq!(doc.paragraph_block(1), Some(2));
        assert_eq!(doc.table_block(1), None);
    }

    #[test]
    fn run_text_maps_tabs_and_breaks() {
        let run = Run::new().add_text("a").add_tab().add_text("b").add_break(docx_rs::BreakType::TextWrapping).add_text("c");
        assert_eq!(run_text(&run), "a\tb\nc");
    }

    #[test]
    fn style_defaults_to_normal() {
        let p = Paragraph::new().add_run(Run::new().add_text("x"));
        assert_eq!(paragraph_style(&p), DEFAULT_STYLE);
        let p = Paragraph::new().style("Heading1");
        assert_eq!(paragraph_style(&p), "Heading1");
    }

    #[test]
    fn set_cell_text_replaces_content() {
        let mut cell = TableCell::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("old")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("more")));
        assert_eq!(cell_text(&cell), "old\nmore");
        set_cell_text(&mut cell, "new", TextFormat::BOLD, Align::Justify);
        assert_eq!(cell_text(&cell), "new");
    }

    #[test]
    fn clear_cell_text_keeps_paragraphs() {
        let mut cell =
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("x")));
        clear_cell_text(&mut cell);
        assert_eq!(cell_text(&cell), "");
        assert_eq!(cell_paragraphs(&cell).len(), 1);
    }

    #[test]
    fn remove_block_splices_body() {
        let mut doc = sample();
        assert!(doc.remove_block(1));
        assert_eq!(doc.table_count(), 0);
        assert_eq!(doc.paragraph_count(), 2);
        assert!(!doc.remove_block(5));
    }

    #[test]
    fn bytes_round_trip_keeps_text() {
        let doc = sample();
        let bytes = doc.to_bytes().unwrap();
        let back = WorkingDocument::from_bytes(&bytes).unwrap();
        assert_eq!(back.table_count(), 1);
        assert!(back.contains_text("Intro"));
        assert!(back.contains_text("B"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = WorkingDocument::from_bytes(b"not a zip").unwrap_err();
        assert!(matches!(err, OfferDocError::MalformedDocument { .. }));
    }
}
