//! Local PDF text extraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{required_str, Tool, ToolArg, ToolArgs};

/// Read the text of a PDF file on disk.
pub struct PdfReaderTool {
    /// Maximum number of words returned.
    max_length: usize,
    /// Pages read from the start of the document; `None` reads them all.
    number_of_pages: Option<usize>,
}

impl Default for PdfReaderTool {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfReaderTool {
    pub fn new() -> Self {
        Self {
            max_length: 1024,
            number_of_pages: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_number_of_pages(mut self, number_of_pages: usize) -> Self {
        self.number_of_pages = Some(number_of_pages);
        self
    }
}

#[async_trait]
impl Tool for PdfReaderTool {
    fn name(&self) -> &str {
        "PDFReaderTool"
    }

    fn description(&self) -> &str {
        "This tool is useful when you want to read a pdf file."
    }

    fn arguments(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::new("filepath", "A valid path of a pdf file.")];
        ARGS
    }

    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
        let filepath = required_str(args, "filepath")?;
        let path = checked_path(filepath)?;
        info!("Reading a pdf from {}", path.display());

        let pages = self.number_of_pages;
        let text = tokio::task::spawn_blocking(move || read_pages(&path, pages)).await??;
        Ok(truncate_words(&text, self.max_length))
    }
}

fn checked_path(filepath: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(filepath);
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(anyhow::anyhow!(
            "Please input a valid PDF file. Now the input is {}",
            filepath
        ));
    }
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Please input the direct path of a valid PDF file."
        ));
    }
    Ok(path.to_path_buf())
}

fn read_pages(path: &Path, limit: Option<usize>) -> anyhow::Result<String> {
    let doc = lopdf::Document::load(path)?;
    let pages = doc.get_pages();
    let limit = limit.unwrap_or(pages.len());
    debug!("PDF has {} pages, reading {}", pages.len(), limit.min(pages.len()));

    let mut output = Vec::new();
    for page in pages.keys().copied().take(limit) {
        let text = doc.extract_text(&[page])?;
        if !text.trim().is_empty() {
            output.push(text);
        }
    }
    Ok(output.join("\n"))
}

/// Keep the first `max_words` whitespace-separated words.
fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
