//! PDF rendition port.
//!
//! Rendering a docx faithfully needs a real office engine, so conversion is
//! delegated to a remote service. [`HttpPdfConverter`] posts the document and
//! reads back the PDF bytes; [`DisabledConverter`] stands in when no service
//! is configured. A failed conversion never fails finalisation: the workflow
//! records it as a warning and keeps the Word file.

use crate::config::EngineConfig;
use crate::error::OfferDocError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

/// MIME type of a WordprocessingML package.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[async_trait]
pub trait PdfConverter: Send + Sync {
    /// Convert `docx` to PDF. `file_name` is informative (service-side logs).
    async fn convert(&self, docx: &[u8], file_name: &str) -> Result<Vec<u8>, OfferDocError>;
}

#[async_trait]
impl<T: PdfConverter + ?Sized> PdfConverter for Box<T> {
    async fn convert(&self, docx: &[u8], file_name: &str) -> Result<Vec<u8>, OfferDocError> {
        (**self).convert(docx, file_name).await
    }
}

/// Posts the document body to a conversion endpoint.
///
/// Request: `POST {url}?file_name={name}` with the docx as body.
/// A 2xx answer with a non-empty body is the PDF.
#[derive(Debug, Clone)]
pub struct HttpPdfConverter {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpPdfConverter {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, OfferDocError> {
        let timeout_secs = timeout_secs.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OfferDocError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout_secs,
        })
    }

    /// Converter for `config.pdf_service_url`, or `None` when PDF output is disabled.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>, OfferDocError> {
        config
            .pdf_service_url
            .as_deref()
            .map(|url| Self::new(url, config.pdf_timeout_secs))
            .transpose()
    }

    fn request_error(&self, e: reqwest::Error) -> OfferDocError {
        if e.is_timeout() {
            OfferDocError::ConversionTimeout {
                secs: self.timeout_secs,
            }
        } else {
            OfferDocError::ConversionFailed {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl PdfConverter for HttpPdfConverter {
    async fn convert(&self, docx: &[u8], file_name: &str) -> Result<Vec<u8>, OfferDocError> {
        debug!("Converting '{}' ({} bytes) to PDF", file_name, docx.len());

        let response = self
            .client
            .post(&self.url)
            .query(&[("file_name", file_name)])
            .header(CONTENT_TYPE, DOCX_MIME)
            .body(docx.to_vec())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(OfferDocError::ConversionFailed {
                detail: format!("HTTP {status}: {snippet}"),
            });
        }

        let pdf = response.bytes().await.map_err(|e| self.request_error(e))?;
        if pdf.is_empty() {
            return Err(OfferDocError::ConversionFailed {
                detail: "service returned an empty body".into(),
            });
        }
        info!("Converted '{}' to PDF ({} bytes)", file_name, pdf.len());
        Ok(pdf.to_vec())
    }
}

/// Always fails: PDF output is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledConverter;

#[async_trait]
impl PdfConverter for DisabledConverter {
    async fn convert(&self, _docx: &[u8], _file_name: &str) -> Result<Vec<u8>, OfferDocError> {
        Err(OfferDocError::ConversionFailed {
            detail: "no PDF service configured".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering every request with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            // read headers, then exactly Content-Length bytes of body
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            sock.shutdown().await.ok();
        });
        format!("http://{addr}/convert")
    }

    #[tokio::test]
    async fn returns_pdf_bytes_on_success() {
        let url = serve_once("200 OK", b"%PDF-1.7").await;
        let conv = HttpPdfConverter::new(url, 5).unwrap();
        let pdf = conv.convert(b"PK docx", "offre.docx").await.unwrap();
        assert_eq!(pdf, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn non_success_status_is_conversion_failure() {
        let url = serve_once("502 Bad Gateway", b"upstream down").await;
        let conv = HttpPdfConverter::new(url, 5).unwrap();
        let err = conv.convert(b"PK", "offre.docx").await.unwrap_err();
        match &err {
            OfferDocError::ConversionFailed { detail } => {
                assert!(detail.contains("502"), "{detail}");
                assert!(detail.contains("upstream down"), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::External);
    }

    #[tokio::test]
    async fn empty_body_is_conversion_failure() {
        let url = serve_once("200 OK", b"").await;
        let conv = HttpPdfConverter::new(url, 5).unwrap();
        assert!(matches!(
            conv.convert(b"PK", "x.docx").await,
            Err(OfferDocError::ConversionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn disabled_converter_always_fails() {
        assert!(matches!(
            DisabledConverter.convert(b"PK", "x.docx").await,
            Err(OfferDocError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn from_config_is_none_without_url() {
        let config = EngineConfig::default();
        assert!(HttpPdfConverter::from_config(&config).unwrap().is_none());
    }
}
