use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file is not a PDF document")]
    NotPdf,

    #[error("no text could be extracted from the document")]
    NoText,

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Turns an uploaded document into plain text for the prompt.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractError>;
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// `pdf-extract` backed extractor. Parsing is CPU-bound, so it runs on the
/// blocking pool.
#[derive(Debug, Default, Clone)]
pub struct PdfTextExtractor;

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractError> {
        if !is_pdf(&bytes) {
            return Err(ExtractError::NotPdf);
        }

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractError::Pdf(e.to_string()))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let text = tidy_text(&text);
        if text.is_empty() {
            return Err(ExtractError::NoText);
        }
        Ok(text)
    }
}

/// Trims each line and collapses runs of blank lines left by page breaks.
fn tidy_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
