//! Proposal workflow: the request-level operations.
//!
//! Every mutating operation follows the same shape:
//!
//! ```text
//! validate request ─▶ load one snapshot ─▶ one engine mutation ─▶ one write-back
//! ```
//!
//! Validation happens before anything is fetched, and the document is fully
//! rebuilt in memory before the single `store` call, so a failed operation
//! never leaves a half-written document behind. There is no locking between
//! requests: two concurrent mutations of the same working document race and
//! the last write wins.

use crate::catalog;
use crate::config::EngineConfig;
use crate::document::WorkingDocument;
use crate::engine::clean::{clean, CleanOutcome, CleaningRule};
use crate::engine::extract::{extract, ExtractedContent, Extraction};
use crate::engine::line_item::{
    clear_data_rows, delete_line, format_amount, insert_line, DeleteSelector, LineItem,
};
use crate::engine::placeholder::{proposal_number, substitute, PlaceholderMap, ProposalDetails};
use crate::engine::section::{find_or_create_section, SectionOrigin};
use crate::error::{EngineWarning, OfferDocError, StoreError};
use crate::pdf::{DisabledConverter, PdfConverter};
use crate::store::{DocumentStore, StoredObject};
use crate::validate::{
    check_expiry_hours, check_file_size, proposal_file_stem, require, template_file_name,
};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// ── Requests ─────────────────────────────────────────────────────────────

/// Customer-success contact merged into `{{CS_*}}` tokens. Absent fields are blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub email: String,
}

impl CustomerInfo {
    fn placeholders(&self) -> PlaceholderMap {
        PlaceholderMap::customer_info(&self.name, &self.tel, &self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub user_folder: String,
    pub template_name: String,
    #[serde(default)]
    pub customer_success: Option<CustomerInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLineRequest {
    pub service_code: String,
    pub designation: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLineRequest {
    pub service_code: String,
    #[serde(default)]
    pub offer_name: Option<String>,
    /// Table row index; wins over `offer_name` when both are given.
    #[serde(default)]
    pub row_index: Option<usize>,
}

impl DeleteLineRequest {
    fn selector(&self) -> Result<DeleteSelector, OfferDocError> {
        if let Some(index) = self.row_index {
            return Ok(DeleteSelector::Index(index));
        }
        match self.offer_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(DeleteSelector::Name(name.to_string())),
            _ => Err(OfferDocError::MissingField {
                field: "offer_name or row_index",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanQuoteRequest {
    pub user_folder: String,
    /// Object in the templates container to start from. Default: the user's working document.
    #[serde(default)]
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub user_folder: String,
    #[serde(default)]
    pub proposal_name: Option<String>,
    #[serde(default = "default_true")]
    pub convert_pdf: bool,
}

fn default_true() -> bool {
    true
}

// ── Outcomes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOutcome {
    pub working_file: String,
    pub template_used: String,
    pub placeholders_replaced: usize,
    pub signed_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOutcome {
    pub working_file: String,
    pub placeholders_replaced: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLineOutcome {
    pub working_file: String,
    pub service_name: String,
    pub table_origin: SectionOrigin,
    /// Physical rows, header and total included.
    pub rows_in_table: usize,
    pub line_total: String,
    pub table_total: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EngineWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteLineOutcome {
    pub working_file: String,
    pub service_name: String,
    pub deleted_offer: String,
    pub table_deleted: bool,
    /// Data rows left in the section.
    pub rows_remaining: usize,
    pub table_total: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EngineWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanQuoteOutcome {
    pub working_file: String,
    pub tables_found: usize,
    pub rows_emptied: usize,
    pub signed_url: String,
}

/// A merged proposal. The document itself is not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProposal {
    pub proposal_number: String,
    pub template_used: String,
    pub placeholders_replaced: usize,
    #[serde(skip)]
    pub document: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub word_file: String,
    pub word_url: String,
    pub pdf_file: Option<String>,
    pub pdf_url: Option<String>,
    pub sas_expiry_hours: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EngineWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Word,
    Pdf,
}

impl DocumentKind {
    fn of(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".docx") {
            Some(Self::Word)
        } else if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// One listed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Name inside its folder.
    pub name: String,
    /// Full object name inside the container.
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: Option<DocumentKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub container: String,
    pub path: String,
    pub url: String,
    pub expiry_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub deleted_count: usize,
    pub deleted_files: Vec<String>,
    pub cutoff_time: DateTime<Utc>,
    pub max_age_hours: u32,
}

// ── Workflow ─────────────────────────────────────────────────────────────

/// Request-level operations over a [`DocumentStore`] and a [`PdfConverter`].
pub struct Workflow<S, P = DisabledConverter> {
    store: S,
    converter: P,
    config: EngineConfig,
}

impl<S: DocumentStore> Workflow<S, DisabledConverter> {
    /// Workflow without PDF output.
    pub fn without_pdf(store: S, config: EngineConfig) -> Self {
        Self::new(store, DisabledConverter, config)
    }
}

impl<S: DocumentStore, P: PdfConverter> Workflow<S, P> {
    pub fn new(store: S, converter: P, config: EngineConfig) -> Self {
        Self {
            store,
            converter,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Template preparation ─────────────────────────────────────────────

    /// Copy a shared template into the user's folder as their working document.
    pub async fn prepare_template(
        &self,
        request: &PrepareRequest,
    ) -> Result<PrepareOutcome, OfferDocError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let user = require("user_folder", Some(request.user_folder.as_str()))?;
        let template_name = template_file_name("template_name", &request.template_name)?;
        let template_path = self.config.template_path(&template_name);
        info!("Preparing '{}' for {}", template_path, user);

        // ── Step 2: Load template ────────────────────────────────────────
        let mut doc = self.load_template(&template_path).await?;

        // ── Step 3: Customer placeholders ────────────────────────────────
        let placeholders_replaced = match &request.customer_success {
            Some(customer) => substitute(&mut doc, &customer.placeholders()),
            None => 0,
        };

        // ── Step 4: Save working document ────────────────────────────────
        let working_file = self.config.working_path(user);
        self.save(&self.config.templates_container, &working_file, &doc)
            .await?;
        let signed_url = self
            .store
            .signed_url(
                &self.config.templates_container,
                &working_file,
                self.config.signed_url_expiry_hours,
            )
            .await?;

        info!("Working document ready: {}", working_file);
        Ok(PrepareOutcome {
            working_file,
            template_used: template_name,
            placeholders_replaced,
            signed_url,
        })
    }

    /// Fill the `{{CS_*}}` tokens of the user's working document.
    pub async fn set_customer_info(
        &self,
        user_folder: &str,
        customer: &CustomerInfo,
    ) -> Result<CustomerOutcome, OfferDocError> {
        let user = require("user_folder", Some(user_folder))?;
        let (working_file, mut doc) = self.load_working(user).await?;

        let placeholders_replaced = substitute(&mut doc, &customer.placeholders());
        if placeholders_replaced == 0 {
            warn!("No customer placeholder found in {}", working_file);
        }

        self.save(&self.config.templates_container, &working_file, &doc)
            .await?;
        Ok(CustomerOutcome {
            working_file,
            placeholders_replaced,
        })
    }

    // ── Line items ───────────────────────────────────────────────────────

    /// Add a priced line to the section of `request.service_code`, creating the section if needed.
    pub async fn add_line_item(
        &self,
        user_folder: &str,
        request: &AddLineRequest,
    ) -> Result<AddLineOutcome, OfferDocError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let user = require("user_folder", Some(user_folder))?;
        let code = require("service_code", Some(request.service_code.as_str()))?;
        let designation = require("designation", Some(request.designation.as_str()))?;
        if request.quantity == 0 {
            return Err(OfferDocError::InvalidInput {
                field: "quantity",
                reason: "must be at least 1".into(),
            });
        }
        if !request.unit_price.is_finite() || request.unit_price < 0.0 {
            return Err(OfferDocError::InvalidInput {
                field: "unit_price",
                reason: format!("{} is not a valid price", request.unit_price),
            });
        }
        let service_name = catalog::section_title(code)?;
        let item = LineItem {
            designation: designation.to_string(),
            description: request.description.trim().to_string(),
            quantity: request.quantity,
            unit_price: request.unit_price,
        };

        // ── Step 2: Load ─────────────────────────────────────────────────
        let (working_file, mut doc) = self.load_working(user).await?;

        // ── Step 3: Locate section and insert ────────────────────────────
        let handle = find_or_create_section(&mut doc, service_name);
        let table = doc.table_mut(handle.table_index).ok_or_else(|| {
            OfferDocError::Internal(format!("section table {} missing", handle.table_index))
        })?;
        let insertion = insert_line(table, &item)?;
        for w in &insertion.warnings {
            warn!("{}", w);
        }

        // ── Step 4: Save ─────────────────────────────────────────────────
        self.save(&self.config.templates_container, &working_file, &doc)
            .await?;

        info!(
            "Added '{}' to '{}' ({}), total {}",
            item.designation,
            service_name,
            if handle.origin == SectionOrigin::Created {
                "new section"
            } else {
                "existing section"
            },
            format_amount(insertion.table_total)
        );
        Ok(AddLineOutcome {
            working_file,
            service_name: service_name.to_string(),
            table_origin: handle.origin,
            rows_in_table: insertion.rows_in_table,
            line_total: format_amount(insertion.line_total),
            table_total: format_amount(insertion.table_total),
            warnings: insertion.warnings,
        })
    }

    /// Remove one line; an emptied section disappears with its title.
    pub async fn delete_line_item(
        &self,
        user_folder: &str,
        request: &DeleteLineRequest,
    ) -> Result<DeleteLineOutcome, OfferDocError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let user = require("user_folder", Some(user_folder))?;
        let code = require("service_code", Some(request.service_code.as_str()))?;
        let selector = request.selector()?;
        let service_name = catalog::section_title(code)?;

        // ── Step 2: Load ─────────────────────────────────────────────────
        let (working_file, mut doc) = self.load_working(user).await?;

        // ── Step 3: Delete ───────────────────────────────────────────────
        let deletion = delete_line(&mut doc, service_name, &selector)?;
        for w in &deletion.warnings {
            warn!("{}", w);
        }

        // ── Step 4: Save ─────────────────────────────────────────────────
        self.save(&self.config.templates_container, &working_file, &doc)
            .await?;

        Ok(DeleteLineOutcome {
            working_file,
            service_name: service_name.to_string(),
            deleted_offer: deletion.deleted_label,
            table_deleted: deletion.section_deleted,
            rows_remaining: deletion.rows_remaining,
            table_total: format_amount(deletion.table_total),
            warnings: deletion.warnings,
        })
    }

    /// Blank every table row below the header and save the result as the working document.
    pub async fn clean_quote(
        &self,
        request: &CleanQuoteRequest,
    ) -> Result<CleanQuoteOutcome, OfferDocError> {
        let user = require("user_folder", Some(request.user_folder.as_str()))?;
        let working_file = self.config.working_path(user);
        let source = match request.source_path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => working_file.clone(),
        };
        info!("Cleaning quote {} for {}", source, user);

        let mut doc = self
            .load(&self.config.templates_container, &source, |path| {
                OfferDocError::DocumentNotFound { path }
            })
            .await?;

        let tables_found = doc.table_count();
        let rows_emptied = clear_data_rows(&mut doc);

        self.save(&self.config.templates_container, &working_file, &doc)
            .await?;
        let signed_url = self
            .store
            .signed_url(
                &self.config.templates_container,
                &working_file,
                self.config.signed_url_expiry_hours,
            )
            .await?;

        Ok(CleanQuoteOutcome {
            working_file,
            tables_found,
            rows_emptied,
            signed_url,
        })
    }

    // ── Proposal output ──────────────────────────────────────────────────

    /// Merge client details into a shared template. Nothing is written.
    pub async fn generate_proposal(
        &self,
        template_name: &str,
        details: &ProposalDetails,
        now: DateTime<Utc>,
    ) -> Result<GeneratedProposal, OfferDocError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let template_name = template_file_name("template_name", template_name)?;
        require("client_name", Some(details.client_name.as_str()))?;
        let number = match details.proposal_number.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => proposal_number(&now),
        };

        // ── Step 2: Load template ────────────────────────────────────────
        let template_path = self.config.template_path(&template_name);
        let mut doc = self.load_template(&template_path).await?;

        // ── Step 3: Substitute ───────────────────────────────────────────
        let map = PlaceholderMap::proposal(details, &number, &now);
        let placeholders_replaced = substitute(&mut doc, &map);

        let document = doc.to_bytes()?;
        info!(
            "Generated proposal {} from '{}' ({} replacements)",
            number, template_name, placeholders_replaced
        );
        Ok(GeneratedProposal {
            proposal_number: number,
            template_used: template_name,
            placeholders_replaced,
            document,
        })
    }

    /// Publish the working document (and its PDF) to the documents container.
    ///
    /// A failed PDF conversion is reported as a warning; the Word file is kept.
    pub async fn finalize(
        &self,
        request: &FinalizeRequest,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome, OfferDocError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let user = require("user_folder", Some(request.user_folder.as_str()))?;
        let stem = proposal_file_stem(request.proposal_name.as_deref().unwrap_or(""), &now);

        // ── Step 2: Load working document ────────────────────────────────
        let working_file = self.config.working_path(user);
        let bytes = self
            .fetch_checked(&self.config.templates_container, &working_file, |path| {
                OfferDocError::DocumentNotFound { path }
            })
            .await?;
        // reject a corrupt working file before publishing it
        WorkingDocument::from_bytes(&bytes)?;

        // ── Step 3: Publish Word file ────────────────────────────────────
        let container = &self.config.documents_container;
        let hours = self.config.signed_url_expiry_hours;
        let word_file = format!("{user}/{stem}.docx");
        self.store.store(container, &word_file, &bytes).await?;
        let word_url = self.store.signed_url(container, &word_file, hours).await?;
        info!("Word file saved to: {}/{}", container, word_file);

        // ── Step 4: PDF rendition ────────────────────────────────────────
        let mut warnings = Vec::new();
        let mut pdf_file = None;
        let mut pdf_url = None;
        if request.convert_pdf {
            match self.converter.convert(&bytes, &format!("{stem}.docx")).await {
                Ok(pdf) => {
                    let name = format!("{user}/{stem}.pdf");
                    self.store.store(container, &name, &pdf).await?;
                    pdf_url = Some(self.store.signed_url(container, &name, hours).await?);
                    info!("PDF file saved to: {}/{}", container, name);
                    pdf_file = Some(name);
                }
                Err(e) => {
                    error!("PDF conversion failed: {}", e);
                    warnings.push(EngineWarning::PdfConversionFailed {
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok(FinalizeOutcome {
            word_file,
            word_url,
            pdf_file,
            pdf_url,
            sas_expiry_hours: hours,
            warnings,
        })
    }

    // ── Extraction and cleaning ──────────────────────────────────────────

    /// Extract the content of a docx package.
    pub fn extract(&self, bytes: &[u8], file_id: Option<&str>) -> Result<Extraction, OfferDocError> {
        check_file_size(bytes.len(), self.config.max_file_size)?;
        let doc = WorkingDocument::from_bytes(bytes)?;
        let mut extraction = extract(&doc);
        extraction.content.file_id = file_id.map(str::to_string);
        for w in &extraction.warnings {
            warn!("{}", w);
        }
        Ok(extraction)
    }

    /// Extract a stored document.
    pub async fn extract_stored(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Extraction, OfferDocError> {
        let bytes = self
            .fetch_checked(container, path, |path| OfferDocError::DocumentNotFound { path })
            .await?;
        self.extract(&bytes, Some(path))
    }

    /// Apply cleaning rules; `None` selects [`CleaningRule::DEFAULT`].
    pub fn clean(&self, content: ExtractedContent, rules: Option<&[CleaningRule]>) -> CleanOutcome {
        clean(content, rules.unwrap_or(&CleaningRule::DEFAULT))
    }

    // ── Listing ──────────────────────────────────────────────────────────

    /// Shared `.docx` templates.
    pub async fn list_general_templates(&self) -> Result<Vec<DocumentEntry>, OfferDocError> {
        let objects = self
            .store
            .list(&self.config.templates_container, &self.config.general_prefix)
            .await?;
        Ok(folder_entries(objects, &self.config.general_prefix, true))
    }

    /// `.docx` files directly inside a user's folder of the templates container.
    pub async fn list_user_documents(
        &self,
        user_folder: &str,
    ) -> Result<Vec<DocumentEntry>, OfferDocError> {
        let prefix = folder_prefix(require("user_folder", Some(user_folder))?);
        let objects = self
            .store
            .list(&self.config.templates_container, &prefix)
            .await?;
        Ok(folder_entries(objects, &prefix, true))
    }

    /// Finalised Word and PDF files of a user, most recent first.
    pub async fn list_created_documents(
        &self,
        user_folder: &str,
    ) -> Result<Vec<DocumentEntry>, OfferDocError> {
        let prefix = folder_prefix(require("user_folder", Some(user_folder))?);
        let objects = self
            .store
            .list(&self.config.documents_container, &prefix)
            .await?;
        let mut entries = folder_entries(objects, &prefix, false);
        entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(entries)
    }

    // ── Housekeeping ─────────────────────────────────────────────────────

    /// Delete one object; a missing object is a not-found error.
    pub async fn delete_document(&self, container: &str, path: &str) -> Result<(), OfferDocError> {
        let path = require("file_path", Some(path))?;
        self.store.delete(container, path).await?;
        info!("Deleted {}/{}", container, path);
        Ok(())
    }

    /// Download link for an existing object, valid 1 to 168 hours.
    pub async fn signed_url(
        &self,
        container: &str,
        path: &str,
        expiry_hours: Option<u32>,
    ) -> Result<SignedUrl, OfferDocError> {
        let path = require("file_path", Some(path))?;
        let hours = check_expiry_hours(expiry_hours.unwrap_or(self.config.signed_url_expiry_hours))?;
        let url = self.store.signed_url(container, path, hours).await?;
        debug!("Signed URL for {}/{} ({}h)", container, path, hours);
        Ok(SignedUrl {
            container: container.to_string(),
            path: path.to_string(),
            url,
            expiry_hours: hours,
        })
    }

    /// Delete templates-container objects older than `max_age_hours`.
    ///
    /// Shared templates are never touched. A failed deletion is logged and
    /// skipped; the sweep carries on.
    pub async fn cleanup_expired(
        &self,
        user_folder: Option<&str>,
        max_age_hours: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<CleanupOutcome, OfferDocError> {
        let max_age_hours = max_age_hours.unwrap_or(self.config.cleanup_max_age_hours);
        let cutoff_time = now - Duration::hours(i64::from(max_age_hours));
        let prefix = user_folder
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(folder_prefix)
            .unwrap_or_default();
        let container = &self.config.templates_container;
        info!(
            "Cleanup: prefix='{}', max_age_hours={}",
            prefix, max_age_hours
        );

        let expired: Vec<String> = self
            .store
            .list(container, &prefix)
            .await?
            .into_iter()
            .filter(|o| o.last_modified < cutoff_time)
            .filter(|o| !o.name.starts_with(&self.config.general_prefix))
            .map(|o| o.name)
            .collect();

        let results: Vec<(String, Result<(), StoreError>)> =
            stream::iter(expired.into_iter().map(|name| async move {
                let result = self.store.delete(container, &name).await;
                (name, result)
            }))
            .buffer_unordered(self.config.cleanup_concurrency.max(1))
            .collect()
            .await;

        let mut deleted_files: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(()) => {
                    info!("Deleted expired file: {}", name);
                    Some(name)
                }
                Err(e) => {
                    error!("Failed to delete {}: {}", name, e);
                    None
                }
            })
            .collect();
        deleted_files.sort();

        info!("Cleanup complete: {} files deleted", deleted_files.len());
        Ok(CleanupOutcome {
            deleted_count: deleted_files.len(),
            deleted_files,
            cutoff_time,
            max_age_hours,
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn fetch_checked(
        &self,
        container: &str,
        path: &str,
        not_found: impl FnOnce(String) -> OfferDocError,
    ) -> Result<Vec<u8>, OfferDocError> {
        let bytes = match self.store.fetch(container, path).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => return Err(not_found(path.to_string())),
            Err(e) => return Err(e.into()),
        };
        check_file_size(bytes.len(), self.config.max_file_size)?;
        debug!("Loaded {}/{} ({} bytes)", container, path, bytes.len());
        Ok(bytes)
    }

    async fn load(
        &self,
        container: &str,
        path: &str,
        not_found: impl FnOnce(String) -> OfferDocError,
    ) -> Result<WorkingDocument, OfferDocError> {
        let bytes = self.fetch_checked(container, path, not_found).await?;
        WorkingDocument::from_bytes(&bytes)
    }

    async fn load_template(&self, template_path: &str) -> Result<WorkingDocument, OfferDocError> {
        self.load(&self.config.templates_container, template_path, |path| {
            OfferDocError::TemplateNotFound { path }
        })
        .await
    }

    async fn load_working(&self, user: &str) -> Result<(String, WorkingDocument), OfferDocError> {
        let working_file = self.config.working_path(user);
        let doc = self
            .load(&self.config.templates_container, &working_file, |path| {
                OfferDocError::DocumentNotFound { path }
            })
            .await?;
        Ok((working_file, doc))
    }

    async fn save(
        &self,
        container: &str,
        path: &str,
        doc: &WorkingDocument,
    ) -> Result<(), OfferDocError> {
        let bytes = doc.to_bytes()?;
        self.store.store(container, path, &bytes).await?;
        debug!("Saved {}/{} ({} bytes)", container, path, bytes.len());
        Ok(())
    }
}

fn folder_prefix(folder: &str) -> String {
    if folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{folder}/")
    }
}

/// Direct children of `prefix`; placeholder `.keep` objects are skipped.
fn folder_entries(objects: Vec<StoredObject>, prefix: &str, docx_only: bool) -> Vec<DocumentEntry> {
    objects
        .into_iter()
        .filter_map(|o| {
            let name = o.name.strip_prefix(prefix)?.to_string();
            if name.is_empty() || name.contains('/') || name.ends_with(".keep") {
                return None;
            }
            let kind = DocumentKind::of(&name);
            if docx_only && kind != Some(DocumentKind::Word) {
                return None;
            }
            Some(DocumentEntry {
                name,
                path: o.name,
                size: o.size,
                last_modified: o.last_modified,
                kind,
            })
        })
        .collect()
}
