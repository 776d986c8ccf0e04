//! Content extraction: a document's text, tables and body order as plain data.
//!
//! The result is what the cleaning pipeline consumes and what callers show
//! to a user before deciding what to redact. A table that cannot be read is
//! skipped with a warning; the rest of the document is still extracted.

use crate::document::{
    paragraph_style, paragraph_text, row_cells, row_texts, table_rows, BodyBlock, WorkingDocument,
};
use crate::catalog;
use crate::engine::section::{SectionRegistry, TableKind};
use crate::error::EngineWarning;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A non-blank body paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParagraph {
    /// Position among *all* body paragraphs, blank ones included.
    pub index: usize,
    pub text: String,
    pub style: String,
}

/// One table's cell texts. The first row is always taken as headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub table_index: usize,
    /// `section` when the table follows a catalog section title.
    #[serde(default)]
    pub kind: TableKind,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// One body-level node, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureElement {
    Paragraph { text: String },
    Table { index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub elements: Vec<StructureElement>,
}

/// Everything [`extract`] reads from a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Caller-supplied identifier, carried through cleaning untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Non-blank paragraph texts joined by `\n`.
    #[serde(rename = "text", alias = "full_text", default)]
    pub full_text: String,
    #[serde(default)]
    pub paragraphs: Vec<ExtractedParagraph>,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
    #[serde(default)]
    pub structure: DocumentStructure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_paragraphs: usize,
    pub total_tables: usize,
    pub total_characters: usize,
}

/// Output of [`extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(flatten)]
    pub content: ExtractedContent,
    pub stats: ExtractionStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EngineWarning>,
}

/// Read paragraphs, tables and body structure out of `doc`.
pub fn extract(doc: &WorkingDocument) -> Extraction {
    let paragraphs = doc.paragraphs();

    let full_text = paragraphs
        .iter()
        .map(|p| paragraph_text(p))
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let extracted_paragraphs: Vec<ExtractedParagraph> = paragraphs
        .iter()
        .enumerate()
        .filter_map(|(index, p)| {
            let text = paragraph_text(p);
            let text = text.trim();
            (!text.is_empty()).then(|| ExtractedParagraph {
                index,
                text: text.to_string(),
                style: paragraph_style(p),
            })
        })
        .collect();
    debug!("Extracted {} paragraphs", extracted_paragraphs.len());

    let registry = SectionRegistry::scan(doc, &catalog::titles());
    let mut warnings = Vec::new();
    let mut tables = Vec::new();
    for (table_index, table) in doc.tables().into_iter().enumerate() {
        match read_table(table_index, registry.kind(table_index), table) {
            Ok(t) => tables.push(t),
            Err(detail) => {
                warn!("Skipping table {}: {}", table_index, detail);
                warnings.push(EngineWarning::SkippedTable {
                    table_index,
                    detail,
                });
            }
        }
    }
    debug!("Extracted {} tables", tables.len());

    let structure = read_structure(doc);

    let stats = ExtractionStats {
        total_paragraphs: extracted_paragraphs.len(),
        total_tables: tables.len(),
        total_characters: full_text.chars().count(),
    };

    Extraction {
        content: ExtractedContent {
            file_id: None,
            full_text,
            paragraphs: extracted_paragraphs,
            tables,
            structure,
        },
        stats,
        warnings,
    }
}

fn read_table(
    table_index: usize,
    kind: TableKind,
    table: &docx_rs::Table,
) -> Result<ExtractedTable, String> {
    let rows = table_rows(table);
    // w:tr requires at least one w:tc
    if let Some(pos) = rows.iter().position(|r| row_cells(r).is_empty()) {
        return Err(format!("row {pos} has no cells"));
    }

    let mut texts = rows.into_iter().map(|row| {
        row_texts(row)
            .into_iter()
            .map(|t| t.trim().to_string())
            .collect::<Vec<_>>()
    });
    let headers = texts.next().unwrap_or_default();
    Ok(ExtractedTable {
        table_index,
        kind,
        headers,
        rows: texts.collect(),
    })
}

fn read_structure(doc: &WorkingDocument) -> DocumentStructure {
    let paragraphs = doc.paragraphs();
    let elements = doc
        .blocks()
        .into_iter()
        .filter_map(|block| match block {
            BodyBlock::Paragraph { paragraph_index } => Some(StructureElement::Paragraph {
                text: paragraph_text(paragraphs[paragraph_index]).trim().to_string(),
            }),
            BodyBlock::Table { table_index } => Some(StructureElement::Table { index: table_index }),
            BodyBlock::Other => None,
        })
        .collect();
    DocumentStructure { elements }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{text_paragraph, Align, TextFormat};
    use docx_rs::{Paragraph, Run, Table, TableCell, TableRow};

    fn cell(text: &str) -> TableCell {
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
    }

    fn doc() -> WorkingDocument {
        let mut doc = WorkingDocument::new();
        doc.push_paragraph(text_paragraph("  Proposition  ", TextFormat::PLAIN, Align::Left));
        doc.push_paragraph(Paragraph::new());
        doc.push_table(Table::new(vec![
            TableRow::new(vec![cell("Désignation"), cell("Qté")]),
            TableRow::new(vec![cell(" M365 "), cell("3")]),
        ]));
        doc.push_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Client: "))
                .add_run(Run::new().add_text("ACME").bold())
                .style("Heading2"),
        );
        doc
    }

    #[test]
    fn paragraphs_keep_global_index() {
        let out = extract(&doc());
        let idx: Vec<usize> = out.content.paragraphs.iter().map(|p| p.index).collect();
        assert_eq!(idx, vec![0, 2]);
        assert_eq!(out.content.paragraphs[0].text, "Proposition");
        assert_eq!(out.content.paragraphs[1].text, "Client: ACME");
        assert_eq!(out.content.paragraphs[1].style, "Heading2");
    }

    #[test]
    fn full_text_skips_blank_paragraphs() {
        let out = extract(&doc());
        assert_eq!(out.content.full_text, "  Proposition  \nClient: ACME");
        assert_eq!(out.stats.total_characters, out.content.full_text.chars().count());
    }

    #[test]
    fn first_row_becomes_headers() {
        let out = extract(&doc());
        let t = &out.content.tables[0];
        assert_eq!(t.headers, vec!["Désignation", "Qté"]);
        assert_eq!(t.rows, vec![vec!["M365".to_string(), "3".to_string()]]);
        assert_eq!(out.stats.total_tables, 1);
    }

    #[test]
    fn empty_table_has_no_headers() {
        let mut d = WorkingDocument::new();
        d.push_table(Table::new(vec![]));
        let out = extract(&d);
        assert!(out.content.tables[0].headers.is_empty());
        assert!(out.content.tables[0].rows.is_empty());
    }

    #[test]
    fn cell_less_row_skips_only_that_table() {
        let mut d = doc();
        d.push_table(Table::new(vec![TableRow::new(vec![])]));
        let out = extract(&d);
        assert_eq!(out.content.tables.len(), 1);
        assert_eq!(
            out.warnings,
            vec![EngineWarning::SkippedTable {
                table_index: 1,
                detail: "row 0 has no cells".into()
            }]
        );
    }

    #[test]
    fn structure_follows_body_order() {
        let out = extract(&doc());
        assert_eq!(
            out.content.structure.elements,
            vec![
                StructureElement::Paragraph {
                    text: "Proposition".into()
                },
                StructureElement::Paragraph { text: String::new() },
                StructureElement::Table { index: 0 },
                StructureElement::Paragraph {
                    text: "Client: ACME".into()
                },
            ]
        );
    }

    #[test]
    fn section_tables_are_tagged() {
        let mut d = doc();
        crate::engine::section::append_section(&mut d, "Supports");
        let out = extract(&d);
        assert_eq!(out.content.tables[0].kind, TableKind::Ordinary);
        assert_eq!(out.content.tables[1].kind, TableKind::Section);
        let json = serde_json::to_value(&out.content.tables[1]).unwrap();
        assert_eq!(json["kind"], "section");
    }

    #[test]
    fn serialises_with_flat_text_key() {
        let json = serde_json::to_value(extract(&doc())).unwrap();
        assert!(json["text"].is_string());
        assert_eq!(json["structure"]["elements"][2]["type"], "table");
        assert_eq!(json["stats"]["total_paragraphs"], 2);
    }
}
