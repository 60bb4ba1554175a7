use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{RagError, Result};

/// Text of one PDF page; `number` is zero-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
}

/// Extract the text of every page of a staged PDF
///
/// Parsing is blocking, so it runs on the blocking pool.
pub async fn extract_pages(path: &Path, file_name: &str) -> Result<Vec<PdfPage>> {
    let path: PathBuf = path.to_path_buf();
    let file = file_name.to_string();

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, &file))
        .await
        .map_err(|e| RagError::IoError(std::io::Error::other(e)))?
}

fn extract_pages_blocking(path: &Path, file_name: &str) -> Result<Vec<PdfPage>> {
    let document = lopdf::Document::load(path).map_err(|source| RagError::PdfError {
        file: file_name.to_string(),
        source,
    })?;

    let mut pages = Vec::new();
    for (index, page_number) in document.get_pages().keys().enumerate() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(PdfPage {
                number: index as u32,
                text,
            }),
            // Pages without a decodable text layer (scans, images) are kept empty.
            Err(e) => {
                warn!("No text on page {} of {}: {}", page_number, file_name, e);
                pages.push(PdfPage {
                    number: index as u32,
                    text: String::new(),
                });
            },
        }
    }
    debug!("Extracted {} pages from {}", pages.len(), file_name);
    Ok(pages)
}
