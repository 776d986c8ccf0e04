//! Error types for the offerdoc library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OfferDocError`]: **Fatal**: the operation cannot proceed at all
//!   (missing field, unknown section, unreadable package, storage outage).
//!   Returned as `Err(OfferDocError)` and nothing is written back.
//!
//! * [`EngineWarning`]: **Non-fatal**: one row or one table could not be
//!   read, but the rest of the document is fine. Collected in operation
//!   outcomes so callers can see partial tolerance at work instead of losing
//!   a multi-section proposal to a single corrupt cell.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used by callers to map failures onto exit codes or
/// response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Structural,
    External,
    Internal,
}

/// All fatal errors returned by the offerdoc library.
#[derive(Debug, Error)]
pub enum OfferDocError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// A required request field is absent or blank.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// A field is present but its value cannot be used.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The uploaded or stored document exceeds the size limit.
    #[error("Document is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// The working document for a user session does not exist.
    #[error("Working document not found: '{path}'\nPrepare a template first.")]
    DocumentNotFound { path: String },

    /// The requested base template does not exist.
    #[error("Template not found: '{path}'")]
    TemplateNotFound { path: String },

    /// No title paragraph followed by a table matches the section name.
    #[error("Section '{title}' not found in document")]
    SectionNotFound { title: String },

    /// No data row's designation matches the requested name.
    #[error("Line item '{name}' not found in section '{section}'")]
    LineItemNotFound { name: String, section: String },

    /// The service code has no entry in the catalog.
    #[error("Unknown service code '{code}'")]
    UnknownServiceCode { code: String },

    // ── Structural errors ─────────────────────────────────────────────────
    /// The package could not be parsed or re-packed.
    #[error("Malformed document: {detail}")]
    MalformedDocument { detail: String },

    /// Data-row index outside `1..rows-1`; the section is left unchanged.
    #[error("Row index {index} is out of range (valid: 1 to {max})")]
    RowIndexOutOfRange { index: usize, max: usize },

    // ── External errors ───────────────────────────────────────────────────
    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The PDF conversion service answered with an error.
    #[error("PDF conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The PDF conversion service did not answer in time.
    #[error("PDF conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OfferDocError {
    /// Which bucket of the error taxonomy this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingField { .. }
            | Self::InvalidInput { .. }
            | Self::FileTooLarge { .. }
            | Self::InvalidConfig(_)
            | Self::RowIndexOutOfRange { .. } => ErrorCategory::Validation,
            Self::DocumentNotFound { .. }
            | Self::TemplateNotFound { .. }
            | Self::SectionNotFound { .. }
            | Self::LineItemNotFound { .. }
            | Self::UnknownServiceCode { .. } => ErrorCategory::NotFound,
            Self::MalformedDocument { .. } => ErrorCategory::Structural,
            Self::Storage(StoreError::NotFound { .. }) => ErrorCategory::NotFound,
            Self::Storage(_) | Self::ConversionFailed { .. } | Self::ConversionTimeout { .. } => {
                ErrorCategory::External
            }
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Failures reported by a [`crate::store::DocumentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object '{container}/{name}' does not exist")]
    NotFound { container: String, name: String },

    #[error("invalid object name '{name}': {reason}")]
    InvalidPath { name: String, reason: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal problem met while reading or mutating one part of a document.
///
/// The operation carries on; the warning travels back in the outcome.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// A line-total cell could not be parsed while summing a section.
    #[error("Row {row}: unparsable amount '{text}' skipped")]
    UnparsableAmount { row: usize, text: String },

    /// A table could not be read during extraction.
    #[error("Table {table_index} skipped: {detail}")]
    SkippedTable { table_index: usize, detail: String },

    /// A section table has fewer than five columns; missing columns were left out.
    #[error("Table has {columns} columns, expected 5")]
    NarrowTable { columns: usize },

    /// Finalisation produced the document but not its PDF rendition.
    #[error("PDF rendition skipped: {detail}")]
    PdfConversionFailed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_not_found_display() {
        let e = OfferDocError::SectionNotFound {
            title: "Supports".into(),
        };
        assert!(e.to_string().contains("Supports"));
        assert_eq!(e.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn row_index_display_and_category() {
        let e = OfferDocError::RowIndexOutOfRange { index: 7, max: 2 };
        let msg = e.to_string();
        assert!(msg.contains('7'), "got: {msg}");
        assert!(msg.contains("1 to 2"), "got: {msg}");
        assert_eq!(e.category(), ErrorCategory::Validation);
    }

    #[test]
    fn missing_store_object_is_not_found() {
        let e: OfferDocError = StoreError::NotFound {
            container: "word-templates".into(),
            name: "bob/temp_working.docx".into(),
        }
        .into();
        assert_eq!(e.category(), ErrorCategory::NotFound);
        assert!(e.to_string().contains("bob/temp_working.docx"));
    }

    #[test]
    fn conversion_timeout_is_external() {
        let e = OfferDocError::ConversionTimeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
        assert_eq!(e.category(), ErrorCategory::External);
    }

    #[test]
    fn warning_serialises_with_kind_tag() {
        let w = EngineWarning::UnparsableAmount {
            row: 2,
            text: "n/a".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "unparsable_amount");
        assert_eq!(json["row"], 2);
    }
}
