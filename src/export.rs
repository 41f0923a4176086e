//! JSON and PDF export, plus the share hand-off.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ExportError;
use crate::model::InvoiceDocument;
use crate::render::{Output, TemplateRegistry};

static FILENAME_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// Strips every character outside `[A-Za-z0-9-_]`.
pub fn sanitize_filename_part(value: &str) -> String {
    FILENAME_UNSAFE.replace_all(value, "").into_owned()
}

fn number_or_draft(doc: &InvoiceDocument) -> String {
    let number = sanitize_filename_part(&doc.invoice.number);
    if number.is_empty() { "draft".to_string() } else { number }
}

pub fn json_filename(doc: &InvoiceDocument) -> String {
    format!("invoice-{}.json", number_or_draft(doc))
}

/// Pretty-printed document and the filename to save it under.
pub fn export_json(doc: &InvoiceDocument) -> Result<(String, String), ExportError> {
    Ok((json_filename(doc), serde_json::to_string_pretty(doc)?))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameStyle {
    #[default]
    Number,
    NumberAndCustomer,
}

pub fn pdf_filename(doc: &InvoiceDocument, style: FilenameStyle) -> String {
    let number = number_or_draft(doc);
    let customer = sanitize_filename_part(&doc.bill_to.name);
    match style {
        FilenameStyle::NumberAndCustomer if !customer.is_empty() => {
            format!("Invoice-{number}-{customer}.pdf")
        }
        _ => format!("Invoice-{number}.pdf"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfArtifact {
    pub filename: String,
    pub path: PathBuf,
}

/// Turns a finished document into a PDF file.
pub trait PdfExporter {
    fn export(&mut self, doc: &InvoiceDocument) -> Result<PdfArtifact, ExportError>;
}

/// Renders the typst template and compiles it with the `typst` binary.
pub struct TypstExporter {
    registry: TemplateRegistry,
    output_dir: PathBuf,
    style: FilenameStyle,
}

impl TypstExporter {
    pub fn new(registry: TemplateRegistry, output_dir: impl Into<PathBuf>, style: FilenameStyle) -> Self {
        Self { registry, output_dir: output_dir.into(), style }
    }
}

impl PdfExporter for TypstExporter {
    fn export(&mut self, doc: &InvoiceDocument) -> Result<PdfArtifact, ExportError> {
        if Command::new("typst").arg("--version").output().is_err() {
            return Err(ExportError::BackendUnavailable(
                "'typst' is not installed (https://github.com/typst/typst)".to_string(),
            ));
        }

        let source = self.registry.render(doc, Output::Typst)?;
        fs::create_dir_all(&self.output_dir)?;

        let filename = pdf_filename(doc, self.style);
        let pdf_path = self.output_dir.join(&filename);
        let typ_path = pdf_path.with_extension("typ");
        fs::write(&typ_path, source)?;

        let output = Command::new("typst").arg("compile").arg(&typ_path).arg(&pdf_path).output()?;
        if !output.status.success() {
            return Err(ExportError::Compile(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        info!(path = %pdf_path.display(), "PDF generated");
        Ok(PdfArtifact { filename, path: pdf_path })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    /// The user dismissed the share sheet. Not an error.
    Aborted,
    /// File sharing is unsupported; the PDF was saved instead.
    Downloaded(PathBuf),
}

pub trait ShareTarget {
    fn supports_files(&self) -> bool;
    fn share(&mut self, artifact: &PdfArtifact) -> Result<ShareOutcome, ExportError>;
}
