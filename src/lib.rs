//! # offerdoc
//!
//! Build commercial proposals out of Word (`.docx`) templates: cost sections
//! with running totals, customer placeholders, and blank templates recovered
//! from filled-in quotes.
//!
//! ## Why this crate?
//!
//! A proposal template is a plain Word file. Cost sections are nothing more
//! than a title paragraph followed by a five-column table, and customer data
//! sits in `{{TOKEN}}` runs. Editing that by hand for every quote is slow and
//! error-prone: totals drift, empty sections linger, formatting breaks. This
//! crate edits the document tree directly so that every change leaves a
//! consistent file behind.
//!
//! ## Pipeline Overview
//!
//! ```text
//! template (general/*.docx)
//!  │
//!  ├─ 1. Prepare    copy into the user's folder, fill {{CS_*}} tokens
//!  ├─ 2. Lines      add / delete priced lines, sections created and removed
//!  ├─ 3. Totals     "Total HT" recomputed from the line-total column
//!  ├─ 4. Finalise   timestamped .docx (+ PDF via an external service)
//!  └─ 5. Sweep      expired working files removed
//!
//! filled quote ─▶ extract ─▶ clean (redact dates, e-mails, phones, amounts)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use offerdoc::{AddLineRequest, EngineConfig, MemoryStore, PrepareRequest, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = Workflow::without_pdf(MemoryStore::new(), EngineConfig::default());
//!     workflow
//!         .prepare_template(&PrepareRequest {
//!             user_folder: "alice".into(),
//!             template_name: "offre.docx".into(),
//!             customer_success: None,
//!         })
//!         .await?;
//!     let added = workflow
//!         .add_line_item(
//!             "alice",
//!             &AddLineRequest {
//!                 service_code: "480810003".into(),
//!                 designation: "M365".into(),
//!                 description: String::new(),
//!                 quantity: 3,
//!                 unit_price: 10.0,
//!             },
//!         )
//!         .await?;
//!     println!("{}", added.table_total); // 30.00 €
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `offerdoc` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! offerdoc = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod pdf;
pub mod store;
pub mod validate;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigBuilder};
pub use document::WorkingDocument;
pub use engine::clean::{CleanOutcome, CleaningRule};
pub use engine::extract::{ExtractedContent, Extraction};
pub use engine::line_item::{DeleteSelector, LineItem};
pub use engine::placeholder::{PlaceholderMap, ProposalDetails};
pub use engine::redact::redact;
pub use engine::section::{SectionOrigin, SectionRegistry, TableKind};
pub use error::{EngineWarning, ErrorCategory, OfferDocError, StoreError};
pub use pdf::{DisabledConverter, HttpPdfConverter, PdfConverter};
pub use store::{DocumentStore, LocalStore, MemoryStore, StoredObject};
pub use workflow::{
    AddLineRequest, CleanQuoteRequest, CustomerInfo, DeleteLineRequest, FinalizeRequest,
    PrepareRequest, Workflow,
};
