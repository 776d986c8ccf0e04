//! Placeholder substitution: `{{TOKEN}}` → value, one run at a time.
//!
//! Replacement happens inside each run's text so that bold, colour and size
//! of every run survive. The flip side: a token Word has split across two
//! runs (e.g. after a spell-check or a partial re-format) is not found.
//! Retype the token in one go in the template to fix it.

use crate::document::{
    cell_paragraphs_mut, paragraph_runs_mut, row_cells_mut, table_rows_mut, WorkingDocument,
};
use chrono::{DateTime, TimeZone};
use docx_rs::{Paragraph, RunChild};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CS_NAME: &str = "{{CS_NAME}}";
pub const CS_TEL: &str = "{{CS_TEL}}";
pub const CS_EMAIL: &str = "{{CS_EMAIL}}";
pub const CLIENT_NAME: &str = "{{CLIENT_NAME}}";
pub const CLIENT_CONTACT: &str = "{{CLIENT_CONTACT}}";
pub const CLIENT_EMAIL: &str = "{{CLIENT_EMAIL}}";
pub const DATE: &str = "{{DATE}}";
pub const PROPOSAL_NUMBER: &str = "{{PROPOSAL_NUMBER}}";

/// Ordered token → replacement pairs.
///
/// Tokens are stored in `{{NAME}}` form; bare names are wrapped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite one token.
    pub fn with(mut self, token: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn insert(&mut self, token: impl AsRef<str>, value: impl Into<String>) {
        let token = normalise_token(token.as_ref());
        let value = value.into();
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((token, value)),
        }
    }

    /// Customer-success contact block of a proposal.
    pub fn customer_info(name: &str, tel: &str, email: &str) -> Self {
        Self::new()
            .with(CS_NAME, name)
            .with(CS_TEL, tel)
            .with(CS_EMAIL, email)
    }

    /// Value for a `{{NAME}}` token.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for PlaceholderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn normalise_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("{{") && token.ends_with("}}") {
        token.to_string()
    } else {
        format!("{{{{{token}}}}}")
    }
}

/// Client details merged into a proposal template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub client_name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    /// Generated with [`proposal_number`] when absent.
    #[serde(default)]
    pub proposal_number: Option<String>,
}

/// `PROP-YYYYMMDD-XXXXXXXX`, the suffix being 8 upper-case hex digits of a v4 UUID.
pub fn proposal_number<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("PROP-{}-{}", now.format("%Y%m%d"), suffix)
}

impl PlaceholderMap {
    /// Client block, date (`DD/MM/YYYY`) and proposal number.
    pub fn proposal<Tz: TimeZone>(details: &ProposalDetails, number: &str, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: Display,
    {
        Self::new()
            .with(CLIENT_NAME, details.client_name.as_str())
            .with(CLIENT_CONTACT, details.contact.as_str())
            .with(CLIENT_EMAIL, details.email.as_str())
            .with(DATE, now.format("%d/%m/%Y").to_string())
            .with(PROPOSAL_NUMBER, number)
    }
}

/// Replace every token of `map` in body paragraphs and table cells.
///
/// Each text node is rewritten in one pass, so a value that itself looks like
/// a token is never substituted again.
/// Returns the number of occurrences replaced; 0 means the document is untouched.
pub fn substitute(doc: &mut WorkingDocument, map: &PlaceholderMap) -> usize {
    let Some(pattern) = token_pattern(map) else {
        return 0;
    };

    let mut replaced = 0;
    for paragraph in doc.paragraphs_mut() {
        replaced += substitute_paragraph(paragraph, map, &pattern);
    }
    for table in doc.tables_mut() {
        for row in table_rows_mut(table) {
            for cell in row_cells_mut(row) {
                for paragraph in cell_paragraphs_mut(cell) {
                    replaced += substitute_paragraph(paragraph, map, &pattern);
                }
            }
        }
    }

    if replaced > 0 {
        info!("Replaced {} placeholder occurrences", replaced);
    } else {
        debug!("No placeholder found");
    }
    replaced
}

/// Alternation of the escaped tokens; `None` for an empty map.
fn token_pattern(map: &PlaceholderMap) -> Option<Regex> {
    if map.is_empty() {
        return None;
    }
    let alternation = map
        .iter()
        .map(|(token, _)| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&alternation) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Placeholder pattern rejected: {}", e);
            None
        }
    }
}

fn substitute_paragraph(paragraph: &mut Paragraph, map: &PlaceholderMap, pattern: &Regex) -> usize {
    let mut replaced = 0;
    for run in paragraph_runs_mut(paragraph) {
        for child in run.children.iter_mut() {
            let RunChild::Text(text) = child else {
                continue;
            };
            let mut hits = 0;
            let rewritten = pattern.replace_all(&text.text, |caps: &Captures<'_>| {
                hits += 1;
                map.get(&caps[0]).unwrap_or(&caps[0]).to_string()
            });
            if hits > 0 {
                text.text = rewritten.into_owned();
                replaced += hits;
            }
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{run_text, text_paragraph, Align, TextFormat};
    use chrono::Utc;
    use docx_rs::{Run, Table, TableCell, TableRow};

    fn doc() -> WorkingDocument {
        let mut doc = WorkingDocument::new();
        doc.push_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Contact: ").bold())
                .add_run(Run::new().add_text("{{CS_NAME}}").size(20))
                .add_run(Run::new().add_text(" / {{CS_TEL}}")),
        );
        doc.push_table(Table::new(vec![TableRow::new(vec![TableCell::new()
            .add_paragraph(text_paragraph("Mail: {{CS_EMAIL}}", TextFormat::PLAIN, Align::Left))])]));
        doc
    }

    fn run_properties(doc: &WorkingDocument) -> Vec<serde_json::Value> {
        doc.paragraphs()[0]
            .children
            .iter()
            .filter_map(|c| match c {
                docx_rs::ParagraphChild::Run(r) => Some(serde_json::to_value(&r.run_property).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn replaces_in_paragraphs_and_cells() {
        let mut d = doc();
        let n = substitute(
            &mut d,
            &PlaceholderMap::customer_info("Jean Dupont", "01 02 03 04 05", "jd@x.fr"),
        );
        assert_eq!(n, 3);
        assert!(!d.contains_text("{{CS_NAME}}"));
        assert!(d.contains_text("Contact: Jean Dupont / 01 02 03 04 05"));
        assert!(d.contains_text("Mail: jd@x.fr"));
    }

    #[test]
    fn run_formatting_survives() {
        let mut d = doc();
        let before = run_properties(&d);
        substitute(&mut d, &PlaceholderMap::new().with("CS_NAME", "Jean Dupont"));
        assert_eq!(run_properties(&d), before);

        let texts: Vec<String> = d.paragraphs()[0]
            .children
            .iter()
            .filter_map(|c| match c {
                docx_rs::ParagraphChild::Run(r) => Some(run_text(r)),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Contact: ", "Jean Dupont", " / {{CS_TEL}}"]);
    }

    #[test]
    fn split_token_is_left_alone() {
        let mut d = WorkingDocument::new();
        d.push_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("{{CS_"))
                .add_run(Run::new().add_text("NAME}}")),
        );
        assert_eq!(substitute(&mut d, &PlaceholderMap::customer_info("x", "", "")), 0);
        assert!(d.contains_text("{{CS_NAME}}"));
    }

    #[test]
    fn empty_map_and_second_pass_are_no_ops() {
        let mut d = doc();
        assert_eq!(substitute(&mut d, &PlaceholderMap::new()), 0);
        let map = PlaceholderMap::customer_info("A", "B", "C");
        assert_eq!(substitute(&mut d, &map), 3);
        let snapshot = d.visible_text();
        assert_eq!(substitute(&mut d, &map), 0);
        assert_eq!(d.visible_text(), snapshot);
    }

    #[test]
    fn values_are_not_substituted_twice() {
        let mut d = WorkingDocument::new();
        d.push_paragraph(text_paragraph(
            "{{CS_NAME}} le {{DATE}}",
            TextFormat::PLAIN,
            Align::Left,
        ));
        let map = PlaceholderMap::new()
            .with(CS_NAME, "{{DATE}}")
            .with(DATE, "07/03/2024");
        assert_eq!(substitute(&mut d, &map), 2);
        assert_eq!(d.visible_text(), vec!["{{DATE}} le 07/03/2024"]);
    }

    #[test]
    fn bare_tokens_are_wrapped_and_overwritten() {
        let map: PlaceholderMap = [("CS_NAME", "a"), ("{{CS_NAME}}", "b"), ("DATE", "c")]
            .into_iter()
            .collect();
        let pairs: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(pairs, vec![("{{CS_NAME}}", "b"), ("{{DATE}}", "c")]);
    }

    #[test]
    fn proposal_tokens() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0).unwrap();
        let number = proposal_number(&now);
        assert!(number.starts_with("PROP-20240307-"), "got {number}");
        let suffix = &number["PROP-20240307-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        let details = ProposalDetails {
            client_name: "ACME".into(),
            ..Default::default()
        };
        let map = PlaceholderMap::proposal(&details, &number, &now);
        let date = map.iter().find(|(t, _)| *t == DATE).map(|(_, v)| v);
        assert_eq!(date, Some("07/03/2024"));
        assert_eq!(map.len(), 5);
    }
}
