//! JSON import: parsing, file acceptance and the merge onto the current
//! document.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::ImportError;
use crate::merge::deep_merge;
use crate::model::InvoiceDocument;

pub const JSON_MIME: &str = "application/json";

/// Parses raw import text. Anything but a JSON object is rejected.
pub fn parse_import(text: &str) -> Result<Value, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(ImportError::InvalidJson)?;
    if !value.is_object() {
        return Err(ImportError::NotAnObject);
    }
    Ok(value)
}

/// Dropped or picked files must end in `.json` or be typed `application/json`.
pub fn check_import_file(path: &Path, mime: Option<&str>) -> Result<(), ImportError> {
    let by_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let by_mime = mime
        .map(|m| m.split(';').next().unwrap_or_default().trim().eq_ignore_ascii_case(JSON_MIME))
        .unwrap_or(false);

    if by_extension || by_mime {
        Ok(())
    } else {
        Err(ImportError::UnsupportedFile(path.display().to_string()))
    }
}

pub fn read_import_file(path: &Path, mime: Option<&str>) -> Result<String, ImportError> {
    check_import_file(path, mime)?;
    fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Deep-merges `imported` onto `base`, so a partial file only replaces the
/// fields it names.
pub fn merge_import(base: &InvoiceDocument, imported: &Value) -> Result<InvoiceDocument, ImportError> {
    let mut merged = serde_json::to_value(base).map_err(ImportError::InvalidDocument)?;
    deep_merge(&mut merged, imported);
    serde_json::from_value(merged).map_err(ImportError::InvalidDocument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;
    use serde_json::json;

    #[test]
    fn rejects_invalid_json_and_non_objects() {
        assert!(matches!(parse_import("{oops"), Err(ImportError::InvalidJson(_))));
        assert!(matches!(parse_import("[1, 2]"), Err(ImportError::NotAnObject)));
        assert!(parse_import("{\"seller\": {}}").is_ok());
    }

    #[test]
    fn file_acceptance_rules() {
        assert!(check_import_file(Path::new("a/invoice.json"), None).is_ok());
        assert!(check_import_file(Path::new("INVOICE.JSON"), None).is_ok());
        assert!(check_import_file(Path::new("paste"), Some("application/json; charset=utf-8")).is_ok());
        assert!(matches!(
            check_import_file(Path::new("invoice.txt"), Some("text/plain")),
            Err(ImportError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn read_import_file_reads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(read_import_file(&path, None).unwrap(), "{}");
        assert!(matches!(
            read_import_file(&dir.path().join("missing.json"), None),
            Err(ImportError::Io { .. })
        ));
    }

    #[test]
    fn partial_import_supplements_base() {
        let mut base = InvoiceDocument::default();
        base.seller.name = "Acme".into();
        base.invoice.number = "INV-1".into();

        let merged = merge_import(&base, &json!({ "billTo": { "name": "Client" } })).unwrap();
        assert_eq!(merged.seller.name, "Acme");
        assert_eq!(merged.invoice.number, "INV-1");
        assert_eq!(merged.bill_to.name, "Client");
    }

    #[test]
    fn null_or_misshaped_sections_fall_back_to_defaults() {
        let mut base = InvoiceDocument::default();
        base.seller.name = "Acme".into();
        base.items = vec![LineItem::new("Bolts", 1.0, 2.0)];

        let merged = merge_import(&base, &json!({ "seller": null, "billTo": { "name": "X" } })).unwrap();
        assert_eq!(merged.seller.name, "");
        assert_eq!(merged.bill_to.name, "X");
        assert_eq!(merged.items.len(), 1);

        let merged = merge_import(&base, &json!({ "items": null })).unwrap();
        assert!(merged.items.is_empty());

        let merged = merge_import(&base, &json!({ "items": "lots", "meta": null })).unwrap();
        assert!(merged.items.is_empty());
        assert!(!merged.meta.show_invoice);
    }
}
