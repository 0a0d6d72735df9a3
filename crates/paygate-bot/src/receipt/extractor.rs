//! Document text extraction.
//!
//! Extraction never fails loudly: an unreadable, encrypted or text-less
//! document yields an empty string, which the validator then rejects like
//! any other receipt without a timestamp.

use std::sync::Arc;

use lopdf::Document;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Converts raw document bytes to plain text.
pub trait TextExtractor: Send + Sync + 'static {
    /// Concatenated page texts in page order, or `""` when nothing can be read.
    fn extract(&self, bytes: &[u8]) -> String;
}

/// PDF text extraction backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> String {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Failed to parse PDF");
                return String::new();
            }
        };

        if document.is_encrypted() {
            warn!("Refusing encrypted PDF");
            return String::new();
        }

        // `get_pages` is keyed by page number, so iteration is in page order.
        let parts: Vec<String> = document
            .get_pages()
            .keys()
            .filter_map(|&page| match document.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    debug!(page, error = %e, "No text on page");
                    None
                }
            })
            .collect();

        parts.join("\n")
    }
}

/// Runs extraction on the blocking thread pool with bounded parallelism.
#[derive(Clone)]
pub struct ExtractionPool {
    extractor: Arc<dyn TextExtractor>,
    permits: Arc<Semaphore>,
}

impl ExtractionPool {
    pub fn new(extractor: Arc<dyn TextExtractor>, workers: usize) -> Self {
        Self {
            extractor,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Extract text off the async executor.
    ///
    /// A panic inside the parser degrades to `""`.
    pub async fn extract(&self, bytes: Vec<u8>) -> String {
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            warn!("Extraction pool closed");
            return String::new();
        };

        let extractor = Arc::clone(&self.extractor);
        match tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Extraction task failed");
                String::new()
            }
        }
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}
