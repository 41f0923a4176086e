//! Template registry shared by the preview and the PDF exporter.
//!
//! A template is selected by the document's `settings.templateId` and is a
//! pure function of the document: the renderers read the totals the
//! document already carries and never recompute them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tera::{Context, Tera, Value};
use tracing::debug;

use crate::error::ExportError;
use crate::format::{format_currency, format_date, number_from_value};
use crate::model::InvoiceDocument;

pub const DEFAULT_TEMPLATE: &str = "classic";

struct BuiltinTemplate {
    id: &'static str,
    preview: &'static str,
    typst: &'static str,
}

// Embed templates at compile time so a fresh install renders without setup.
const BUILTIN: [BuiltinTemplate; 2] = [
    BuiltinTemplate {
        id: "classic",
        preview: include_str!("../templates/classic.preview.tera"),
        typst: include_str!("../templates/classic.typ.tera"),
    },
    BuiltinTemplate {
        id: "compact",
        preview: include_str!("../templates/compact.preview.tera"),
        typst: include_str!("../templates/compact.typ.tera"),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Preview,
    Typst,
}

impl Output {
    fn suffix(&self) -> &'static str {
        match self {
            Output::Preview => "preview",
            Output::Typst => "typ",
        }
    }
}

fn template_name(id: &str, output: Output) -> String {
    format!("{id}.{}", output.suffix())
}

fn money_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = number_from_value(value, 0.0);
    let currency = args.get("currency").and_then(Value::as_str).unwrap_or_default();
    let locale = args.get("locale").and_then(Value::as_str).unwrap_or_default();
    Ok(Value::String(format_currency(amount, currency, locale)))
}

fn dmy_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format_date(value.as_str().unwrap_or_default())))
}

/// Quotes a value as a typst string literal.
fn typst_str_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', "\\n");
    Ok(Value::String(format!("\"{escaped}\"")))
}

pub struct TemplateRegistry {
    tera: Tera,
}

impl TemplateRegistry {
    pub fn builtin() -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        for template in &BUILTIN {
            tera.add_raw_template(&template_name(template.id, Output::Preview), template.preview)?;
            tera.add_raw_template(&template_name(template.id, Output::Typst), template.typst)?;
        }
        tera.register_filter("money", money_filter);
        tera.register_filter("dmy", dmy_filter);
        tera.register_filter("typst_str", typst_str_filter);
        Ok(Self { tera })
    }

    /// Built-in templates, with any `<id>.<preview|typ>.tera` file found in
    /// `dir` taking precedence over the embedded copy.
    pub fn with_overrides(dir: &Path) -> Result<Self, ExportError> {
        let mut registry = Self::builtin()?;
        for template in &BUILTIN {
            for output in [Output::Preview, Output::Typst] {
                let name = template_name(template.id, output);
                let path = dir.join(format!("{name}.tera"));
                if path.exists() {
                    debug!(path = %path.display(), "using template override");
                    let source = fs::read_to_string(&path)?;
                    registry.tera.add_raw_template(&name, &source)?;
                }
            }
        }
        Ok(registry)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        BUILTIN.iter().map(|t| t.id).collect()
    }

    /// Registered id for `template_id`, falling back to the default.
    pub fn resolve(&self, template_id: Option<&str>) -> &'static str {
        template_id
            .and_then(|id| BUILTIN.iter().find(|t| t.id == id.trim()))
            .map(|t| t.id)
            .unwrap_or(DEFAULT_TEMPLATE)
    }

    pub fn render(&self, doc: &InvoiceDocument, output: Output) -> Result<String, ExportError> {
        let id = self.resolve(doc.settings.template_id.as_deref());
        let context = Context::from_serialize(doc)?;
        Ok(self.tera.render(&template_name(id, output), &context)?)
    }
}

/// Consumer of finished documents for the on-screen preview.
pub trait PreviewRenderer {
    fn render(&mut self, doc: &InvoiceDocument) -> Result<(), ExportError>;
}

/// Renders the preview template to text and keeps the latest result.
pub struct TextPreview {
    registry: TemplateRegistry,
    last: Option<String>,
}

impl TextPreview {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry, last: None }
    }

    pub fn output(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl PreviewRenderer for TextPreview {
    fn render(&mut self, doc: &InvoiceDocument) -> Result<(), ExportError> {
        self.last = Some(self.registry.render(doc, Output::Preview)?);
        Ok(())
    }
}
