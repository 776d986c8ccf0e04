//! Cleaning: turn extracted content from a filled proposal into a blank template.
//!
//! ## Rule Order
//!
//! Rules run in a fixed order whatever order they were requested in:
//!
//! 1. `remove_filled_data`: redact the full text and every paragraph
//! 2. `normalize_tables`: redact every data cell, drop rows left blank
//! 3. `remove_empty_paragraphs`: drop paragraphs that are blank or a lone tag
//!
//! Table normalisation runs its own redaction pass, so it works alone too;
//! when it follows rule 1, cells that only held filled data are already tags.
//! Headers are never touched.

use crate::engine::extract::{ExtractedContent, ExtractedTable};
use crate::engine::redact::{is_tag, redact};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// One cleaning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningRule {
    RemoveFilledData,
    NormalizeTables,
    RemoveEmptyParagraphs,
}

impl CleaningRule {
    /// Rules applied when the caller names none.
    pub const DEFAULT: [CleaningRule; 2] = [Self::RemoveFilledData, Self::NormalizeTables];

    pub fn name(self) -> &'static str {
        match self {
            Self::RemoveFilledData => "remove_filled_data",
            Self::NormalizeTables => "normalize_tables",
            Self::RemoveEmptyParagraphs => "remove_empty_paragraphs",
        }
    }
}

impl std::str::FromStr for CleaningRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "remove_filled_data" => Ok(Self::RemoveFilledData),
            "normalize_tables" => Ok(Self::NormalizeTables),
            "remove_empty_paragraphs" => Ok(Self::RemoveEmptyParagraphs),
            other => Err(format!(
                "unknown cleaning rule '{other}' (expected remove_filled_data, normalize_tables or remove_empty_paragraphs)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStats {
    pub paragraphs_remaining: usize,
    pub tables_remaining: usize,
    /// Number of entries in `removed_items`.
    pub changes_made: usize,
}

/// Output of [`clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub cleaned_content: ExtractedContent,
    /// Audit log, one entry per change group.
    pub removed_items: Vec<String>,
    pub stats: CleanStats,
}

/// Apply `rules` to `content`. Duplicated rules run once.
pub fn clean(content: ExtractedContent, rules: &[CleaningRule]) -> CleanOutcome {
    let rules: BTreeSet<CleaningRule> = rules.iter().copied().collect();
    let mut content = content;
    let mut removed_items = Vec::new();

    // ── Rule 1: Redact paragraphs ────────────────────────────────────────
    if rules.contains(&CleaningRule::RemoveFilledData) {
        info!("Applying rule: {}", CleaningRule::RemoveFilledData.name());
        content.full_text = redact(&content.full_text);
        for paragraph in content.paragraphs.iter_mut() {
            let cleaned = redact(&paragraph.text);
            if cleaned != paragraph.text {
                removed_items.push(format!("Paragraph {}: removed filled data", paragraph.index));
                paragraph.text = cleaned;
            }
        }
    }

    // ── Rule 2: Normalise tables ─────────────────────────────────────────
    if rules.contains(&CleaningRule::NormalizeTables) {
        info!("Applying rule: {}", CleaningRule::NormalizeTables.name());
        for table in content.tables.iter_mut() {
            let dropped = normalize_table(table);
            if dropped > 0 {
                removed_items.push(format!(
                    "Table {}: removed {} filled rows",
                    table.table_index, dropped
                ));
            }
        }
    }

    // ── Rule 3: Drop empty paragraphs ────────────────────────────────────
    if rules.contains(&CleaningRule::RemoveEmptyParagraphs) {
        info!("Applying rule: {}", CleaningRule::RemoveEmptyParagraphs.name());
        let before = content.paragraphs.len();
        content.paragraphs.retain(|p| {
            let text = p.text.trim();
            !text.is_empty() && !is_tag(text)
        });
        let dropped = before - content.paragraphs.len();
        if dropped > 0 {
            removed_items.push(format!("Removed {dropped} empty paragraphs"));
        }
    }

    let stats = CleanStats {
        paragraphs_remaining: content.paragraphs.len(),
        tables_remaining: content.tables.len(),
        changes_made: removed_items.len(),
    };
    info!("Cleaning complete. {} changes made", stats.changes_made);

    CleanOutcome {
        file_id: content.file_id.clone(),
        cleaned_content: content,
        removed_items,
        stats,
    }
}

/// Redact every data cell; blank cells and lone tags become empty; all-blank
/// rows are dropped. Returns the number of rows dropped.
fn normalize_table(table: &mut ExtractedTable) -> usize {
    let before = table.rows.len();
    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| {
                    let cleaned = redact(&cell);
                    let trimmed = cleaned.trim();
                    if trimmed.is_empty() || is_tag(trimmed) {
                        String::new()
                    } else {
                        cleaned
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    let dropped = before - table.rows.len();
    debug!("Table {}: {} rows dropped", table.table_index, dropped);
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::extract::ExtractedParagraph;

    fn para(index: usize, text: &str) -> ExtractedParagraph {
        ExtractedParagraph {
            index,
            text: text.into(),
            style: "Normal".into(),
        }
    }

    fn content() -> ExtractedContent {
        ExtractedContent {
            file_id: Some("f-1".into()),
            full_text: "Contact: jean@x.com on 01/02/2024\n12/03/2024\nOffre".into(),
            paragraphs: vec![
                para(0, "Contact: jean@x.com on 01/02/2024"),
                para(2, "12/03/2024"),
                para(3, "Offre"),
            ],
            tables: vec![ExtractedTable {
                table_index: 0,
                kind: Default::default(),
                headers: vec!["Désignation".into(), "Prix total".into()],
                rows: vec![
                    vec!["M365".into(), "30,00 €".into()],
                    vec!["".into(), "12 EUR".into()],
                    vec!["  ".into(), "".into()],
                ],
            }],
            structure: Default::default(),
        }
    }

    #[test]
    fn remove_filled_data_redacts_paragraphs() {
        let out = clean(content(), &[CleaningRule::RemoveFilledData]);
        assert_eq!(
            out.cleaned_content.paragraphs[0].text,
            "Contact: [EMAIL] on [DATE]"
        );
        assert!(out.cleaned_content.full_text.starts_with("Contact: [EMAIL] on [DATE]"));
        assert_eq!(
            out.removed_items,
            vec![
                "Paragraph 0: removed filled data",
                "Paragraph 2: removed filled data"
            ]
        );
        // tables untouched by this rule
        assert_eq!(out.cleaned_content.tables[0].rows.len(), 3);
    }

    #[test]
    fn normalize_tables_drops_blank_rows_and_keeps_headers() {
        let out = clean(content(), &[CleaningRule::NormalizeTables]);
        let t = &out.cleaned_content.tables[0];
        assert_eq!(t.headers, vec!["Désignation", "Prix total"]);
        assert_eq!(t.rows, vec![vec!["M365".to_string(), String::new()]]);
        assert_eq!(out.removed_items, vec!["Table 0: removed 2 filled rows"]);
    }

    #[test]
    fn default_rules_and_stats() {
        let out = clean(content(), &CleaningRule::DEFAULT);
        assert_eq!(out.stats.paragraphs_remaining, 3);
        assert_eq!(out.stats.tables_remaining, 1);
        assert_eq!(out.stats.changes_made, 3);
        assert_eq!(out.file_id.as_deref(), Some("f-1"));
    }

    #[test]
    fn empty_paragraphs_go_after_redaction() {
        let rules = [
            CleaningRule::RemoveEmptyParagraphs,
            CleaningRule::RemoveFilledData,
        ];
        let out = clean(content(), &rules);
        let idx: Vec<usize> = out.cleaned_content.paragraphs.iter().map(|p| p.index).collect();
        assert_eq!(idx, vec![0, 3]);
        assert_eq!(out.removed_items.last().unwrap(), "Removed 1 empty paragraphs");
    }

    #[test]
    fn no_rules_no_changes() {
        let out = clean(content(), &[]);
        assert_eq!(out.cleaned_content, content());
        assert!(out.removed_items.is_empty());
        assert_eq!(out.stats.changes_made, 0);
    }

    #[test]
    fn rule_names_round_trip_through_serde_and_from_str() {
        let rules: Vec<CleaningRule> =
            serde_json::from_str(r#"["normalize_tables","remove_empty_paragraphs"]"#).unwrap();
        assert_eq!(
            rules,
            vec![CleaningRule::NormalizeTables, CleaningRule::RemoveEmptyParagraphs]
        );
        assert_eq!(
            "remove_filled_data".parse::<CleaningRule>(),
            Ok(CleaningRule::RemoveFilledData)
        );
        assert!("shred".parse::<CleaningRule>().is_err());
    }
}
