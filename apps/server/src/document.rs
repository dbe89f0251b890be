//! # Document Renderer
//!
//! Printable copies of productions, invoices, purchase invoices and
//! prescriptions.
//!
//! ## Output
//! ```text
//! <document_dir>/
//!   production/        42-8d7c...e1.pdf
//!   invoice/           INV-0007-1f2a...90.pdf
//!   purchase_invoice/  PO-118-77b3...0c.pdf
//!   prescription/      RX-3-c0de...42.pdf
//! ```
//!
//! A file name always carries a fresh UUID, so re-rendering a modified
//! document never overwrites the copy a pending rollback may still need.
//!
//! ## Format
//! Plain PDF 1.4 written by hand: A4 pages, Helvetica, 50 lines per page,
//! table rows laid out on fixed column stops. No images, no wrapping.
//!
//! Renderers do blocking file I/O. Request flows reach them through
//! [`render_blocking`] and [`remove_blocking`], which run on tokio's
//! blocking pool.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file system error: {0}")]
    Io(#[from] io::Error),

    #[error("document has nothing to print")]
    Empty,

    /// Used by renderers that refuse on purpose.
    #[error("{0}")]
    Refused(String),

    /// The blocking task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Task(String),
}

/// One printed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Heading(String),
    Text(String),
    /// Cells placed on evenly spaced column stops.
    Cells(Vec<String>),
    Blank,
}

/// Everything a renderer needs, already formatted as text.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintableDocument {
    /// Sub-directory, e.g. `invoice`.
    pub folder: String,
    pub title: String,
    /// Document number as shown to people.
    pub reference: String,
    pub date: NaiveDate,
    pub header: Vec<Line>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<Line>,
}

impl PrintableDocument {
    pub fn new(folder: impl Into<String>, title: impl Into<String>, reference: impl Into<String>, date: NaiveDate) -> Self {
        PrintableDocument {
            folder: folder.into(),
            title: title.into(),
            reference: reference.into(),
            date,
            header: Vec::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            footer: Vec::new(),
        }
    }

    /// Flattens the document into printed lines.
    pub fn lines(&self) -> Vec<Line> {
        let mut lines = Vec::with_capacity(self.header.len() + self.rows.len() + self.footer.len() + 6);
        lines.push(Line::Heading(format!("{} {}", self.title, self.reference)));
        lines.push(Line::Text(format!("Date: {}", self.date.format("%Y-%m-%d"))));
        lines.push(Line::Blank);
        lines.extend(self.header.iter().cloned());
        if !self.columns.is_empty() {
            lines.push(Line::Blank);
            lines.push(Line::Cells(self.columns.clone()));
        }
        lines.extend(self.rows.iter().cloned().map(Line::Cells));
        if !self.footer.is_empty() {
            lines.push(Line::Blank);
            lines.extend(self.footer.iter().cloned());
        }
        lines
    }
}

/// Writes and removes printable files.
pub trait DocumentRenderer: Send + Sync {
    /// Renders the document and returns where it was stored.
    fn render(&self, document: &PrintableDocument) -> Result<String, RenderError>;

    /// Removes a rendered file. A missing file is not an error.
    fn remove(&self, path: &str) -> Result<(), RenderError>;
}

/// Renders on the blocking pool.
pub async fn render_blocking(
    renderer: Arc<dyn DocumentRenderer>,
    document: PrintableDocument,
) -> Result<String, RenderError> {
    tokio::task::spawn_blocking(move || renderer.render(&document))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

/// Removes a rendered file on the blocking pool.
pub async fn remove_blocking(renderer: Arc<dyn DocumentRenderer>, path: String) -> Result<(), RenderError> {
    tokio::task::spawn_blocking(move || renderer.remove(&path))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

// =============================================================================
// PDF Renderer
// =============================================================================

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const LINES_PER_PAGE: usize = 50;
const LINE_HEIGHT: u32 = 14;
const FONT_SIZE: u32 = 10;
const HEADING_SIZE: u32 = 14;

pub struct PdfRenderer {
    root: PathBuf,
}

impl PdfRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PdfRenderer { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_path(&self, document: &PrintableDocument) -> PathBuf {
        let name = format!("{}-{}.pdf", file_safe(&document.reference), Uuid::new_v4());
        self.root.join(file_safe(&document.folder)).join(name)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &PrintableDocument) -> Result<String, RenderError> {
        let lines = document.lines();
        if document.reference.trim().is_empty() {
            return Err(RenderError::Empty);
        }

        let path = self.target_path(document);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let bytes = write_pdf(&lines);
        fs::write(&path, &bytes)?;

        let path = path.to_string_lossy().to_string();
        info!(path = %path, bytes = bytes.len(), "Document rendered");
        Ok(path)
    }

    fn remove(&self, path: &str) -> Result<(), RenderError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path, "Document removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps letters, digits, `-` and `_`; everything else becomes `_`.
fn file_safe(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Escapes a string for a PDF literal. Non-ASCII becomes `?`.
fn pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Content stream for one page.
fn page_stream(lines: &[Line]) -> String {
    let mut stream = String::new();
    let column_span = PAGE_WIDTH - 2 * MARGIN;

    for (i, line) in lines.iter().enumerate() {
        let y = PAGE_HEIGHT - MARGIN - (i as u32 + 1) * LINE_HEIGHT;
        match line {
            Line::Blank => {}
            Line::Heading(text) => {
                let _ = writeln!(
                    stream,
                    "BT /F1 {} Tf 1 0 0 1 {} {} Tm ({}) Tj ET",
                    HEADING_SIZE,
                    MARGIN,
                    y,
                    pdf_text(text)
                );
            }
            Line::Text(text) => {
                let _ = writeln!(
                    stream,
                    "BT /F1 {} Tf 1 0 0 1 {} {} Tm ({}) Tj ET",
                    FONT_SIZE,
                    MARGIN,
                    y,
                    pdf_text(text)
                );
            }
            Line::Cells(cells) => {
                let stop = column_span / cells.len().max(1) as u32;
                for (col, cell) in cells.iter().enumerate() {
                    let _ = writeln!(
                        stream,
                        "BT /F1 {} Tf 1 0 0 1 {} {} Tm ({}) Tj ET",
                        FONT_SIZE,
                        MARGIN + col as u32 * stop,
                        y,
                        pdf_text(cell)
                    );
                }
            }
        }
    }
    stream
}

/// Serializes lines into a complete PDF file.
///
/// Object layout: 1 catalog, 2 page tree, 3 font, then a (page, content)
/// pair per page.
fn write_pdf(lines: &[Line]) -> Vec<u8> {
    let pages: Vec<&[Line]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut objects: Vec<String> = Vec::with_capacity(3 + pages.len() * 2);
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 4 + i * 2)).collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string());

    for (i, page) in pages.iter().enumerate() {
        let content_id = 5 + i * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT, content_id
        ));
        let stream = page_stream(page);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    out.into_bytes()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn document(rows: usize) -> PrintableDocument {
        let mut doc = PrintableDocument::new(
            "invoice",
            "Invoice",
            "INV/0007",
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        doc.header.push(Line::Text("Customer: Walk-in (cash)".to_string()));
        doc.columns = vec!["Medicine".to_string(), "Qty".to_string()];
        doc.rows = (0..rows).map(|i| vec![format!("Item {i}"), "1".to_string()]).collect();
        doc
    }

    #[test]
    fn test_render_writes_pdf_under_kind_folder() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PdfRenderer::new(dir.path());

        let path = renderer.render(&document(3)).unwrap();
        assert!(path.contains("invoice"));
        assert!(path.contains("INV_0007-"));

        let bytes = fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("Walk-in \\(cash\\)"));
    }

    #[test]
    fn test_long_documents_paginate() {
        let bytes = write_pdf(&document(120).lines());
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = write_pdf(&document(2).lines());
        let text = String::from_utf8_lossy(&bytes).to_string();
        let xref = text.find("xref\n").unwrap();
        let first_entry = text[xref..].lines().nth(3).unwrap();
        let offset: usize = first_entry[..10].parse().unwrap();
        assert!(text[offset..].starts_with("1 0 obj"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PdfRenderer::new(dir.path());
        let path = renderer.render(&document(1)).unwrap();

        renderer.remove(&path).unwrap();
        assert!(!Path::new(&path).exists());
        renderer.remove(&path).unwrap();
    }

    #[tokio::test]
    async fn test_blocking_helpers_render_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer::new(dir.path()));

        let path = render_blocking(renderer.clone(), document(2)).await.unwrap();
        assert!(Path::new(&path).exists());

        remove_blocking(renderer, path.clone()).await.unwrap();
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_each_render_gets_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PdfRenderer::new(dir.path());
        let a = renderer.render(&document(1)).unwrap();
        let b = renderer.render(&document(1)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(pdf_text("a(b)\\c"), "a\\(b\\)\\\\c");
        assert_eq!(pdf_text("Obat batuk ±"), "Obat batuk ?");
        assert_eq!(file_safe(" ../etc "), "___etc");
    }
}
