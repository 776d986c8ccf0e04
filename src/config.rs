//! Configuration for the proposal workflow.
//!
//! Storage layout, signed-link lifetime, size limits and the PDF service are
//! controlled through [`EngineConfig`], built via its [`EngineConfigBuilder`].
//! The document engine itself takes no configuration; only the
//! [`crate::workflow::Workflow`] that loads and saves documents does.

use crate::error::OfferDocError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a [`crate::workflow::Workflow`].
///
/// Built via [`EngineConfig::builder()`] or using [`EngineConfig::default()`].
///
/// # Example
/// ```rust
/// use offerdoc::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .templates_container("templates")
///     .signed_url_expiry_hours(48)
///     .build()
///     .unwrap();
/// assert_eq!(config.working_path("alice"), "alice/temp_working.docx");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Container holding base templates and per-user working documents.
    /// Default: `word-templates`.
    pub templates_container: String,

    /// Container receiving finalised proposals. Default: `word-documents`.
    pub documents_container: String,

    /// Name prefix of shared base templates inside the templates container.
    /// Default: `general/`.
    ///
    /// Objects under this prefix are never removed by the expiry sweep.
    pub general_prefix: String,

    /// File name of the working document inside a user's folder.
    /// Default: `temp_working.docx`.
    pub working_file_name: String,

    /// Lifetime of generated download links, in hours. Range: 1–168. Default: 24.
    pub signed_url_expiry_hours: u32,

    /// Largest document accepted for loading or extraction. Default: 25 MiB.
    pub max_file_size: usize,

    /// Endpoint of the docx → PDF conversion service. Default: none (PDF disabled).
    ///
    /// May carry an access key in its query string; it is masked in `Debug` output.
    pub pdf_service_url: Option<String>,

    /// Timeout for one conversion call, in seconds. Default: 120.
    pub pdf_timeout_secs: u64,

    /// Age after which user files are removed by the expiry sweep, in hours. Default: 24.
    pub cleanup_max_age_hours: u32,

    /// Number of deletions the expiry sweep keeps in flight. Default: 4.
    pub cleanup_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_container: "word-templates".to_string(),
            documents_container: "word-documents".to_string(),
            general_prefix: "general/".to_string(),
            working_file_name: "temp_working.docx".to_string(),
            signed_url_expiry_hours: 24,
            max_file_size: 25 * 1024 * 1024,
            pdf_service_url: None,
            pdf_timeout_secs: 120,
            cleanup_max_age_hours: 24,
            cleanup_concurrency: 4,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("templates_container", &self.templates_container)
            .field("documents_container", &self.documents_container)
            .field("general_prefix", &self.general_prefix)
            .field("working_file_name", &self.working_file_name)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("max_file_size", &self.max_file_size)
            .field(
                "pdf_service_url",
                &self.pdf_service_url.as_deref().map(mask_query),
            )
            .field("pdf_timeout_secs", &self.pdf_timeout_secs)
            .field("cleanup_max_age_hours", &self.cleanup_max_age_hours)
            .field("cleanup_concurrency", &self.cleanup_concurrency)
            .finish()
    }
}

fn mask_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of a user's working document inside the templates container.
    pub fn working_path(&self, user: &str) -> String {
        format!("{}/{}", user.trim_end_matches('/'), self.working_file_name)
    }

    /// Path of a shared base template inside the templates container.
    pub fn template_path(&self, template_name: &str) -> String {
        format!("{}{}", self.general_prefix, template_name)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn templates_container(mut self, name: impl Into<String>) -> Self {
        self.config.templates_container = name.into();
        self
    }

    pub fn documents_container(mut self, name: impl Into<String>) -> Self {
        self.config.documents_container = name.into();
        self
    }

    /// A trailing `/` is appended when missing.
    pub fn general_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.config.general_prefix = prefix;
        self
    }

    pub fn working_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.working_file_name = name.into();
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours.clamp(1, 168);
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn pdf_service_url(mut self, url: impl Into<String>) -> Self {
        self.config.pdf_service_url = Some(url.into());
        self
    }

    pub fn pdf_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pdf_timeout_secs = secs.max(1);
        self
    }

    pub fn cleanup_max_age_hours(mut self, hours: u32) -> Self {
        self.config.cleanup_max_age_hours = hours;
        self
    }

    pub fn cleanup_concurrency(mut self, n: usize) -> Self {
        self.config.cleanup_concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, OfferDocError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl EngineConfig {
    /// Check a configuration that did not come through the builder
    /// (deserialised, or assembled from public fields).
    pub fn validate(&self) -> Result<(), OfferDocError> {
        if self.templates_container.trim().is_empty() || self.documents_container.trim().is_empty() {
            return Err(OfferDocError::InvalidConfig(
                "container names must not be empty".into(),
            ));
        }
        if self.working_file_name.trim().is_empty() || self.working_file_name.contains('/') {
            return Err(OfferDocError::InvalidConfig(format!(
                "working file name must be a bare file name, got '{}'",
                self.working_file_name
            )));
        }
        if self.general_prefix.trim_matches('/').trim().is_empty() {
            return Err(OfferDocError::InvalidConfig(
                "general template prefix must not be empty".into(),
            ));
        }
        if self.cleanup_concurrency == 0 {
            return Err(OfferDocError::InvalidConfig(
                "cleanup concurrency must be >= 1".into(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(OfferDocError::InvalidConfig(
                "max file size must be > 0".into(),
            ));
        }
        if let Some(url) = &self.pdf_service_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(OfferDocError::InvalidConfig(format!(
                    "PDF service URL must be http(s), got '{}'",
                    mask_query(url)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_storage_layout() {
        let c = EngineConfig::default();
        assert_eq!(c.working_path("Eric FER"), "Eric FER/temp_working.docx");
        assert_eq!(c.template_path("offre.docx"), "general/offre.docx");
        assert_eq!(c.signed_url_expiry_hours, 24);
    }

    #[test]
    fn builder_clamps_expiry() {
        let c = EngineConfig::builder()
            .signed_url_expiry_hours(1000)
            .build()
            .unwrap();
        assert_eq!(c.signed_url_expiry_hours, 168);
        let c = EngineConfig::builder()
            .signed_url_expiry_hours(0)
            .build()
            .unwrap();
        assert_eq!(c.signed_url_expiry_hours, 1);
    }

    #[test]
    fn builder_normalises_prefix() {
        let c = EngineConfig::builder().general_prefix("shared").build().unwrap();
        assert_eq!(c.template_path("a.docx"), "shared/a.docx");
    }

    #[test]
    fn rejects_empty_general_prefix() {
        for prefix in ["", "/", "  "] {
            let err = EngineConfig::builder()
                .general_prefix(prefix)
                .build()
                .unwrap_err();
            assert!(matches!(err, OfferDocError::InvalidConfig(_)), "{prefix:?}");
        }
    }

    #[test]
    fn validate_catches_hand_built_configs() {
        let c = EngineConfig {
            cleanup_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(OfferDocError::InvalidConfig(_))));
        let c = EngineConfig {
            general_prefix: String::new(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
        assert!(EngineConfig::default().validate().is_ok());
        assert_eq!(EngineConfig::builder().cleanup_concurrency(0).build().unwrap().cleanup_concurrency, 1);
    }

    #[test]
    fn rejects_nested_working_file() {
        let err = EngineConfig::builder()
            .working_file_name("a/b.docx")
            .build()
            .unwrap_err();
        assert!(matches!(err, OfferDocError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_http_pdf_service() {
        assert!(EngineConfig::builder()
            .pdf_service_url("ftp://convert")
            .build()
            .is_err());
    }

    #[test]
    fn debug_masks_service_key() {
        let c = EngineConfig::builder()
            .pdf_service_url("https://convert.example/api?code=secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
