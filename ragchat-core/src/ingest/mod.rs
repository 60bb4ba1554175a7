//! Ingestion of uploaded files into a user's vector store
//!
//! Each upload is staged in its own temporary directory, decoded by kind,
//! split into overlapping windows, tagged with its file name and handed to
//! the vector store. Unsupported kinds are skipped without error. Batches
//! already added are not rolled back when a later file fails.

mod pdf;
mod splitter;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::errors::{RagError, Result};
use crate::retrieval::VectorStore;
use crate::types::{Document, source_basename};

pub use pdf::{PdfPage, extract_pages};
pub use splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter};

/// A file received from the user
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }
}

/// How an upload is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Pdf,
    Unsupported,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("txt") => FileKind::Text,
            Some("pdf") => FileKind::Pdf,
            _ => FileKind::Unsupported,
        }
    }
}

/// Outcome for one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedFile {
    pub name: String,
    pub kind: FileKind,
    pub chunks: usize,
}

/// Outcome of one upload batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files: Vec<IngestedFile>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.files.iter().map(|f| f.chunks).sum()
    }
}

/// Splits uploads and indexes them
#[derive(Debug, Clone, Default)]
pub struct IngestPipeline {
    splitter: TextSplitter,
}

impl IngestPipeline {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Index every file into `store`, in upload order
    pub async fn ingest(
        &self,
        store: &dyn VectorStore,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for file in files {
            info!("Processing upload {} ({} bytes)", file.name, file.content.len());
            let documents = self.load(&file).await?;
            let chunks = documents.len();

            if !documents.is_empty() {
                store.add_documents(documents).await?;
            }

            match file.kind() {
                FileKind::Unsupported => warn!("Skipped unsupported upload {}", file.name),
                kind => info!("Indexed {} chunks from {} ({:?})", chunks, file.name, kind),
            }
            report.files.push(IngestedFile {
                kind: file.kind(),
                name: file.name,
                chunks,
            });
        }

        Ok(report)
    }

    /// Stage, decode and split one file without indexing it
    pub async fn load(&self, file: &UploadedFile) -> Result<Vec<Document>> {
        let staging = tempfile::tempdir()?;
        let staged_name = match source_basename(&file.name) {
            name if name.is_empty() || name == ".." => "upload".to_string(),
            name => name,
        };
        let staged_path = staging.path().join(staged_name);
        tokio::fs::write(&staged_path, &file.content).await?;

        let documents = match file.kind() {
            FileKind::Text => {
                let text = String::from_utf8(file.content.to_vec()).map_err(|source| {
                    RagError::DecodeError {
                        file: file.name.clone(),
                        source,
                    }
                })?;
                self.splitter.split_document(&text, &file.name, None)
            },
            FileKind::Pdf => extract_pages(&staged_path, &file.name)
                .await?
                .into_iter()
                .flat_map(|page| {
                    self.splitter
                        .split_document(&page.text, &file.name, Some(page.number))
                })
                .collect(),
            FileKind::Unsupported => Vec::new(),
        };

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::MockVectorStore;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("notes.txt"), FileKind::Text);
        assert_eq!(FileKind::from_name("Report.PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("contract.docx"), FileKind::Unsupported);
        assert_eq!(FileKind::from_name("README"), FileKind::Unsupported);
    }

    #[tokio::test]
    async fn test_text_upload_is_split_and_tagged() {
        let mut store = MockVectorStore::new();
        store
            .expect_add_documents()
            .withf(|docs| docs.len() == 3 && docs.iter().all(|d| d.metadata.source == "long.txt"))
            .times(1)
            .returning(|docs| Ok(docs.len()));

        let upload = UploadedFile::new("long.txt", "x".repeat(3000));
        let report = IngestPipeline::default().ingest(&store, vec![upload]).await.unwrap();

        assert_eq!(report.files[0].chunks, 3);
        assert_eq!(report.files[0].kind, FileKind::Text);
    }

    #[tokio::test]
    async fn test_pdf_upload_is_split_per_page() {
        let upload = UploadedFile::new(
            "policy.pdf",
            pdf_with_pages(&[
                "Refunds are processed within 14 days.",
                "Shipping is free above 50 euros.",
            ]),
        );
        let pipeline = IngestPipeline::default();

        let docs = pipeline.load(&upload).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.metadata.source == "policy.pdf"));
        assert_eq!(docs[0].metadata.page, Some(0));
        assert!(docs[0].page_content.contains("Refunds are processed"));
        assert_eq!(docs[1].metadata.page, Some(1));
        assert!(docs[1].page_content.contains("Shipping is free"));

        let mut store = MockVectorStore::new();
        store
            .expect_add_documents()
            .withf(|docs| docs.len() == 2 && docs[1].metadata.page == Some(1))
            .times(1)
            .returning(|docs| Ok(docs.len()));
        let report = pipeline.ingest(&store, vec![upload]).await.unwrap();

        assert_eq!(report.files[0].kind, FileKind::Pdf);
        assert_eq!(report.files[0].chunks, 2);
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_skipped() {
        let mut store = MockVectorStore::new();
        store.expect_add_documents().never();

        let upload = UploadedFile::new("contract.docx", vec![0x50, 0x4b, 0x03, 0x04]);
        let report = IngestPipeline::default().ingest(&store, vec![upload]).await.unwrap();

        assert_eq!(report.total_chunks(), 0);
        assert_eq!(report.files[0].kind, FileKind::Unsupported);
    }

    #[tokio::test]
    async fn test_invalid_utf8_propagates() {
        let mut store = MockVectorStore::new();
        store.expect_add_documents().never();

        let upload = UploadedFile::new("latin1.txt", vec![0x63, 0x61, 0x66, 0xe9]);
        let err = IngestPipeline::default()
            .ingest(&store, vec![upload])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DecodeError { ref file, .. } if file == "latin1.txt"));
    }

    #[tokio::test]
    async fn test_traversal_names_are_staged_safely() {
        let upload = UploadedFile::new("../../etc/notes.txt", "hello");
        let docs = IngestPipeline::default().load(&upload).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "../../etc/notes.txt");
    }
}
