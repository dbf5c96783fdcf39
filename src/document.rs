//! Document extraction and output rendering.
//!
//! PDF parsing is delegated to `pdf-extract`, which reports text page by page. Each page is
//! rendered under a `--- Page N ---` marker surrounded by blank lines, so page boundaries are always
//! paragraph boundaries for the chunker.

use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;

const PDF_MAGIC: &[u8] = b"%PDF";
const OUTPUT_SUFFIX: &str = "_tts-optimized.txt";

/// Errors raised while turning an input file into a [`Document`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The input is not a PDF.
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
    /// `pdf-extract` could not read the file.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The input file could not be read.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata captured at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DocumentMetadata {
    /// Number of pages in the source.
    pub page_count: usize,
    /// File name the text came from.
    pub source_name: String,
}

/// Extracted text plus metadata. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    metadata: DocumentMetadata,
}

impl Document {
    /// Wrap already-extracted text; `page_count` is clamped to at least one.
    pub fn new(text: String, page_count: usize, source_name: impl Into<String>) -> Self {
        Self {
            text,
            metadata: DocumentMetadata {
                page_count: page_count.max(1),
                source_name: source_name.into(),
            },
        }
    }

    /// Treat plain text as a single-page document.
    pub fn from_text(text: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::new(text.into(), 1, source_name)
    }

    /// Full document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Extraction metadata.
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }
}

/// Extract text from in-memory PDF bytes.
pub fn extract_pdf(bytes: &[u8], source_name: &str) -> Result<Document, ExtractionError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::InvalidFormat(format!(
            "{source_name} is not a PDF"
        )));
    }

    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|error| ExtractionError::Pdf(error.to_string()))?;
    let page_count = pages.len();
    let text = render_pages(&pages);

    tracing::info!(
        source = source_name,
        pages = page_count,
        characters = text.len(),
        "Extracted PDF text"
    );
    Ok(Document::new(text, page_count, source_name))
}

/// Join per-page text under page markers.
fn render_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let capacity = pages.iter().map(|page| page.as_ref().len() + 24).sum();
    let mut text = String::with_capacity(capacity);
    for (index, page) in pages.iter().enumerate() {
        text.push_str(&format!(
            "\n\n--- Page {} ---\n\n{}",
            index + 1,
            page.as_ref().trim()
        ));
    }
    text.trim().to_string()
}

/// Load a document from disk.
///
/// Files with a `.pdf` extension are extracted on a blocking thread; anything else is read as
/// already-extracted UTF-8 text.
pub async fn load_document(path: &Path) -> Result<Document, ExtractionError> {
    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let is_pdf = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        let text = tokio::fs::read_to_string(path).await?;
        return Ok(Document::from_text(text, source_name));
    }

    let bytes = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || extract_pdf(&bytes, &source_name))
        .await
        .map_err(|error| ExtractionError::Pdf(format!("extraction task failed: {error}")))?
}

/// Output file name for a source, e.g. `paper.pdf` becomes `paper_tts-optimized.txt`.
pub fn output_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}{OUTPUT_SUFFIX}")
}

/// Render the rewritten text under a title and generation timestamp.
pub fn render_output(source_name: &str, body: &str, generated_at: OffsetDateTime) -> String {
    let timestamp = generated_at
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
    format!("TTS-Optimized: {source_name}\nGenerated: {timestamp}\n\n{body}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Build an uncompressed PDF with one line of Courier text per page.
    fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
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

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize pdf");
        bytes
    }

    #[test]
    fn pages_are_rendered_under_markers() {
        let text = render_pages(&["First page text.\n", "  Second page.\n"]);
        assert_eq!(
            text,
            "--- Page 1 ---\n\nFirst page text.\n\n--- Page 2 ---\n\nSecond page."
        );
    }

    #[test]
    fn single_page_renders_one_marker() {
        assert_eq!(render_pages(&["  Only page.  "]), "--- Page 1 ---\n\nOnly page.");
    }

    #[test]
    fn multi_page_pdf_keeps_page_boundaries() {
        let bytes = pdf_with_pages(&["First page words.", "Second page words."]);

        let document = extract_pdf(&bytes, "two-pages.pdf").expect("extract");

        assert_eq!(document.metadata().page_count, 2);
        let text = document.text();
        let second = text.find("--- Page 2 ---").expect("second page marker");
        let (first_page, second_page) = text.split_at(second);
        assert!(first_page.starts_with("--- Page 1 ---"));
        assert!(first_page.contains("First page words."));
        assert!(!first_page.contains("Second page"));
        assert!(second_page.contains("Second page words."));
        assert!(first_page.ends_with("\n\n"));
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        let error = extract_pdf(b"hello world", "notes.pdf").unwrap_err();
        assert!(matches!(error, ExtractionError::InvalidFormat(_)));
    }

    #[test]
    fn output_name_replaces_extension() {
        assert_eq!(output_file_name("paper.pdf"), "paper_tts-optimized.txt");
        assert_eq!(output_file_name("notes"), "notes_tts-optimized.txt");
        assert_eq!(output_file_name(""), "document_tts-optimized.txt");
    }

    #[test]
    fn rendered_output_has_title_and_timestamp() {
        let output = render_output("paper.pdf", "Body.", OffsetDateTime::UNIX_EPOCH);
        assert_eq!(
            output,
            "TTS-Optimized: paper.pdf\nGenerated: 1970-01-01T00:00:00Z\n\nBody.\n"
        );
    }

    #[test]
    fn page_count_is_at_least_one() {
        let document = Document::new(String::new(), 0, "empty.pdf");
        assert_eq!(document.metadata().page_count, 1);
    }

    #[tokio::test]
    async fn plain_text_files_load_as_single_page_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chapter.txt");
        std::fs::write(&path, "Para one.\n\nPara two.").expect("write");

        let document = load_document(&path).await.expect("load");
        assert_eq!(document.text(), "Para one.\n\nPara two.");
        assert_eq!(document.metadata().source_name, "chapter.txt");
        assert_eq!(document.metadata().page_count, 1);
    }
}
