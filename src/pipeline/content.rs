//! Document content extraction.
//!
//! Classifies each source URL, fetches text-bearing documents (single
//! attempt, no retry), extracts the PDF text layer, and assembles one
//! combined text with exactly one segment per input URL. Fetch failures
//! never abort the batch — they become inline placeholders so downstream
//! consumers see partial results. Image URLs are not fetched; they pass
//! through for direct vision-model consumption.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Cumulative cap on combined extracted document text.
pub const MAX_COMBINED_TEXT_CHARS: usize = 200_000;

/// Cap on caller-supplied auxiliary context.
pub const MAX_EXTRA_CONTEXT_CHARS: usize = 30_000;

/// Literal marker embedded in placeholder segments for failed fetches.
pub const FETCH_FAILURE_MARKER: &str = "could not retrieve";

/// How a source document is handled by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Text layer extracted from the fetched bytes.
    Pdf,
    /// Not fetched; URL passed to the vision model directly.
    Image,
    /// Fetched and decoded as UTF-8.
    Text,
}

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "xml", "csv", "html", "htm"];

/// Classify a URL by the extension of its final path segment. `None`
/// means the extension is unknown and the content type decides after the
/// fetch.
pub fn classify_url(raw: &str) -> Option<DocumentKind> {
    let path = Url::parse(raw)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| raw.to_string());
    let segment = path.rsplit('/').next().unwrap_or(&path);
    let ext = segment.rsplit_once('.')?.1.to_ascii_lowercase();

    if PDF_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Image)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Text)
    } else {
        None
    }
}

/// Classify a MIME content type. Anything that is not a PDF or an image
/// is decoded as text (covers text/*, application/json, application/xml
/// and unlabeled responses).
pub fn classify_content_type(content_type: &str) -> DocumentKind {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/pdf" => DocumentKind::Pdf,
        t if t.starts_with("image/") => DocumentKind::Image,
        _ => DocumentKind::Text,
    }
}

/// Error raised by the fetch boundary, carrying the HTTP status code and
/// response body text when the server answered at all.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

/// A fetched document before decoding.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Fetch boundary, stubbed in tests.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

/// HTTP GET document source over the shared reqwest client.
#[derive(Clone)]
pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| FetchError {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), truncate_chars(&body, 500)),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(|e| FetchError {
            status: None,
            message: e.to_string(),
        })?;

        Ok(FetchedDocument {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Combined extraction output for one analysis request.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    /// One segment per input URL, in input order.
    pub text: String,
    /// Image URLs passed through for vision input.
    pub image_urls: Vec<String>,
}

/// Extract all documents sequentially, preserving input order.
pub async fn extract_documents(source: &dyn DocumentSource, urls: &[String]) -> ExtractedContent {
    let mut text = String::new();
    let mut image_urls = Vec::new();
    let mut remaining = MAX_COMBINED_TEXT_CHARS;

    for (index, url) in urls.iter().enumerate() {
        let body = match classify_url(url) {
            Some(DocumentKind::Image) => {
                image_urls.push(url.clone());
                "[image document, supplied to the vision model directly]".to_string()
            }
            kind => extract_one(source, url, kind, &mut image_urls).await,
        };

        if index > 0 {
            text.push('\n');
        }
        text.push_str(&format!("--- Document {}: {} ---\n", index + 1, url));

        let body = truncate_chars(&body, remaining);
        remaining -= body.chars().count();
        text.push_str(&body);
        text.push('\n');
    }

    ExtractedContent { text, image_urls }
}

async fn extract_one(
    source: &dyn DocumentSource,
    url: &str,
    kind: Option<DocumentKind>,
    image_urls: &mut Vec<String>,
) -> String {
    let document = match source.fetch(url).await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(url = url, error = %e, "Document fetch failed");
            return format!("{}: {}", FETCH_FAILURE_MARKER, e);
        }
    };

    let kind = kind.unwrap_or_else(|| {
        document
            .content_type
            .as_deref()
            .map(classify_content_type)
            .unwrap_or(DocumentKind::Text)
    });

    match kind {
        DocumentKind::Image => {
            // Extension was unknown; the server said it's an image.
            image_urls.push(url.to_string());
            "[image document, supplied to the vision model directly]".to_string()
        }
        DocumentKind::Pdf => match pdf_extract::extract_text_from_mem(&document.bytes) {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!(url = url, error = %e, "PDF text extraction failed");
                format!("{}: PDF text extraction failed: {}", FETCH_FAILURE_MARKER, e)
            }
        },
        DocumentKind::Text => String::from_utf8_lossy(&document.bytes).into_owned(),
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_urls_by_extension() {
        assert_eq!(
            classify_url("https://cdn.example.com/plans/site.pdf"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            classify_url("https://cdn.example.com/photos/kitchen.JPG"),
            Some(DocumentKind::Image)
        );
        assert_eq!(
            classify_url("https://cdn.example.com/specs/notes.txt"),
            Some(DocumentKind::Text)
        );
        assert_eq!(classify_url("https://cdn.example.com/download/38c1"), None);
    }

    #[test]
    fn extension_wins_over_query_noise() {
        assert_eq!(
            classify_url("https://cdn.example.com/a/b/plan.pdf?token=x.y"),
            Some(DocumentKind::Pdf)
        );
    }

    #[test]
    fn classifies_content_types() {
        assert_eq!(classify_content_type("application/pdf"), DocumentKind::Pdf);
        assert_eq!(
            classify_content_type("image/png; charset=binary"),
            DocumentKind::Image
        );
        assert_eq!(
            classify_content_type("text/plain; charset=utf-8"),
            DocumentKind::Text
        );
        assert_eq!(classify_content_type("application/json"), DocumentKind::Text);
        assert_eq!(
            classify_content_type("application/octet-stream"),
            DocumentKind::Text
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
