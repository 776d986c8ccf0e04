//! Sections: a title paragraph and the cost table that follows it.
//!
//! Nothing in the file links a title to its table. Membership is inferred
//! from body order and text: a section titled `T` is the **first** paragraph
//! whose text contains `T` (case-insensitive) together with the first table
//! positioned after that paragraph. If that paragraph has no table after it,
//! the section does not exist, even when a later paragraph also mentions `T`.
//!
//! [`SectionRegistry`] resolves those links for a set of titles in one pass
//! over the body. It holds block positions, so it goes stale on the first
//! structural edit; scan again afterwards.

use crate::document::{paragraph_text, text_paragraph, Align, BodyBlock, TextFormat, WorkingDocument};
use crate::engine::line_item::format_amount;
use docx_rs::{Paragraph, Table, TableCell, TableRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Column headers of a section table, in column order.
pub const HEADERS: [&str; 5] = [
    "Désignation",
    "Description",
    "Qté",
    "Prix unitaire",
    "Prix total",
];

/// Label of the merged cell on the total row.
pub const TOTAL_LABEL: &str = "Total HT";

/// Table style applied to created section tables.
pub const TABLE_STYLE: &str = "LightGridAccent1";

/// Section title size in half-points (14pt).
pub const TITLE_SIZE: usize = 28;

/// Column widths of created section tables, in twentieths of a point.
const COLUMN_WIDTHS: [usize; 5] = [2200, 3400, 800, 1500, 1500];

/// Where one section lives in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    /// The title as requested, not as written in the paragraph.
    pub title: String,
    pub title_paragraph: usize,
    pub title_block: usize,
    pub table_index: usize,
    pub table_block: usize,
}

/// Whether a table belongs to a section or is ordinary content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Section,
    #[default]
    Ordinary,
}

/// Title → section index for one document snapshot.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    entries: HashMap<String, SectionEntry>,
    kinds: Vec<TableKind>,
}

impl SectionRegistry {
    /// Resolve every title in `titles` with a single walk over the body.
    pub fn scan<S: AsRef<str>>(doc: &WorkingDocument, titles: &[S]) -> Self {
        struct Pending<'a> {
            title: &'a str,
            needle: String,
            paragraph: Option<(usize, usize)>,
            resolved: bool,
        }

        let mut pending: Vec<Pending<'_>> = titles
            .iter()
            .map(|t| Pending {
                title: t.as_ref(),
                needle: t.as_ref().to_lowercase(),
                paragraph: None,
                resolved: false,
            })
            .collect();

        let paragraphs = doc.paragraphs();
        let mut entries = HashMap::new();
        let mut kinds = vec![TableKind::Ordinary; doc.table_count()];

        for (block, kind) in doc.blocks().into_iter().enumerate() {
            match kind {
                BodyBlock::Paragraph { paragraph_index } => {
                    let text = paragraph_text(paragraphs[paragraph_index]).to_lowercase();
                    for p in pending.iter_mut().filter(|p| p.paragraph.is_none()) {
                        if text.contains(&p.needle) {
                            p.paragraph = Some((paragraph_index, block));
                        }
                    }
                }
                BodyBlock::Table { table_index } => {
                    for p in pending.iter_mut().filter(|p| !p.resolved) {
                        if let Some((title_paragraph, title_block)) = p.paragraph {
                            p.resolved = true;
                            kinds[table_index] = TableKind::Section;
                            entries.entry(p.needle.clone()).or_insert(SectionEntry {
                                title: p.title.to_string(),
                                title_paragraph,
                                title_block,
                                table_index,
                                table_block: block,
                            });
                        }
                    }
                }
                BodyBlock::Other => {}
            }
        }

        debug!(
            "Section scan: {}/{} titles resolved",
            entries.len(),
            titles.len()
        );
        Self { entries, kinds }
    }

    /// Section for `title`, if it was scanned and exists.
    pub fn lookup(&self, title: &str) -> Option<&SectionEntry> {
        self.entries.get(&title.to_lowercase())
    }

    /// Kind of the table at `table_index`; unknown indices are ordinary.
    pub fn kind(&self, table_index: usize) -> TableKind {
        self.kinds
            .get(table_index)
            .copied()
            .unwrap_or(TableKind::Ordinary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether the section table was already present or had to be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionOrigin {
    #[serde(rename = "table_found")]
    Found,
    #[serde(rename = "table_created")]
    Created,
}

/// A section table resolved by [`find_or_create_section`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHandle {
    pub table_index: usize,
    pub origin: SectionOrigin,
}

/// Locate the section for `title`.
pub fn find_section(doc: &WorkingDocument, title: &str) -> Option<SectionEntry> {
    SectionRegistry::scan(doc, &[title]).lookup(title).cloned()
}

/// Locate the section for `title`, appending a new empty one when absent.
pub fn find_or_create_section(doc: &mut WorkingDocument, title: &str) -> SectionHandle {
    if let Some(entry) = find_section(doc, title) {
        debug!("Section '{}' found at table {}", title, entry.table_index);
        return SectionHandle {
            table_index: entry.table_index,
            origin: SectionOrigin::Found,
        };
    }
    let table_index = append_section(doc, title);
    info!("Created section '{}' (table {})", title, table_index);
    SectionHandle {
        table_index,
        origin: SectionOrigin::Created,
    }
}

/// Append title, empty section table and a spacing paragraph to the body.
///
/// Returns the new table's index, which is the last table of the document.
pub fn append_section(doc: &mut WorkingDocument, title: &str) -> usize {
    doc.push_paragraph(text_paragraph(
        title,
        TextFormat {
            bold: true,
            size: Some(TITLE_SIZE),
        },
        Align::Left,
    ));
    doc.push_table(section_table());
    doc.push_paragraph(Paragraph::new());
    doc.table_count() - 1
}

/// Remove a section's table and title paragraph from the body.
pub fn remove_section(doc: &mut WorkingDocument, entry: &SectionEntry) {
    // the title precedes the table, so removing the table first keeps title_block valid
    doc.remove_block(entry.table_block);
    doc.remove_block(entry.title_block);
    info!("Removed section '{}'", entry.title);
}

/// Header row plus a total row whose first four columns are merged.
fn section_table() -> Table {
    let header = TableRow::new(
        HEADERS
            .iter()
            .map(|h| {
                TableCell::new().add_paragraph(text_paragraph(h, TextFormat::BOLD, Align::Justify))
            })
            .collect(),
    );
    let total = TableRow::new(vec![
        TableCell::new()
            .add_paragraph(text_paragraph(TOTAL_LABEL, TextFormat::BOLD, Align::Right))
            .grid_span(4),
        TableCell::new().add_paragraph(text_paragraph(
            &format_amount(0.0),
            TextFormat::BOLD,
            Align::Justify,
        )),
    ]);
    Table::new(vec![header, total])
        .set_grid(COLUMN_WIDTHS.to_vec())
        .style(TABLE_STYLE)
}
