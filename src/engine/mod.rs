//! The document mutation engine.
//!
//! Every submodule works on an in-memory [`crate::document::WorkingDocument`]
//! (or on text extracted from one) and performs no I/O. Loading and saving
//! belong to [`crate::workflow`], which runs exactly one engine operation per
//! request between a single read and a single write.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ section ──▶ line_item      (cost tables)
//! document ──┼──▶ placeholder                ({{TOKEN}} runs)
//!            └──▶ extract ──▶ clean          (blank templates)
//!                               │
//!                               └── redact   (pattern scrubbing)
//! ```
//!
//! 1. [`redact`]      : pure text scrubbing of dates, e-mails, phones, amounts
//! 2. [`extract`]     : paragraphs, tables and body order as plain data
//! 3. [`section`]     : title paragraph ↔ table registry; creates missing sections
//! 4. [`line_item`]   : insert / delete data rows, recompute the section total
//! 5. [`placeholder`] : run-level token replacement that keeps formatting
//! 6. [`clean`]       : ordered cleaning rules over extracted content

pub mod clean;
pub mod extract;
pub mod line_item;
pub mod placeholder;
pub mod redact;
pub mod section;
