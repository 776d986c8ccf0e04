//! Static service catalog: external service code → section title.
//!
//! The catalog is fixed at build time. Section titles are what the engine
//! searches for (and writes) in the proposal body.

use crate::error::OfferDocError;

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEntry {
    pub code: &'static str,
    pub title: &'static str,
}

/// Every known service category, in catalog order.
pub const SERVICES: &[ServiceEntry] = &[
    ServiceEntry {
        code: "480810003",
        title: "Service cloud",
    },
    ServiceEntry {
        code: "480810000",
        title: "Services Cloud - Téléphonie",
    },
    ServiceEntry {
        code: "480810004",
        title: "Supports",
    },
];

/// Resolve a service code to its section title.
pub fn section_title(code: &str) -> Result<&'static str, OfferDocError> {
    let code = code.trim();
    SERVICES
        .iter()
        .find(|s| s.code == code)
        .map(|s| s.title)
        .ok_or_else(|| OfferDocError::UnknownServiceCode {
            code: code.to_string(),
        })
}

/// All section titles, for building a [`crate::engine::section::SectionRegistry`].
pub fn titles() -> Vec<&'static str> {
    SERVICES.iter().map(|s| s.title).collect()
}
