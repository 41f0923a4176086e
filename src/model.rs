use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_LOCALE: &str = "en-IN";
pub const DEFAULT_TITLE: &str = "INVOICE";

fn schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// The one document shared by the form, the preview, the PDF, the draft
/// slot and the history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    #[serde(default = "schema_version", deserialize_with = "lenient::version")]
    pub schema_version: u32,
    #[serde(default, deserialize_with = "lenient::section")]
    pub settings: Settings,
    #[serde(default, deserialize_with = "lenient::section")]
    pub seller: Party,
    #[serde(default, deserialize_with = "lenient::section")]
    pub bill_to: Party,
    #[serde(default, deserialize_with = "lenient::section")]
    pub invoice: InvoiceDetails,
    #[serde(default, deserialize_with = "lenient::items")]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub totals: Totals,
    #[serde(default, deserialize_with = "lenient::section")]
    pub meta: Meta,
}

impl Default for InvoiceDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            settings: Settings::default(),
            seller: Party::default(),
            bill_to: Party::default(),
            invoice: InvoiceDetails::default(),
            items: Vec::new(),
            totals: Totals::default(),
            meta: Meta::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_currency", deserialize_with = "lenient::text")]
    pub currency: String,
    #[serde(default = "default_locale", deserialize_with = "lenient::text")]
    pub locale: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_text"
    )]
    pub template_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            locale: default_locale(),
            template_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: String,
    /// Legacy bank block; read on input, folded into the payment
    /// instructions by the form binder, never written back.
    #[serde(default, skip_serializing)]
    pub bank: Option<BankDetails>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub account_no: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub ifsc: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetails {
    #[serde(default = "default_title", deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_text"
    )]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub number: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_text"
    )]
    pub notes: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_text"
    )]
    pub instructions: Option<String>,
    /// Legacy alias of `instructions`.
    #[serde(default, skip_serializing, deserialize_with = "lenient::optional_text")]
    pub terms: Option<String>,
}

impl Default for InvoiceDetails {
    fn default() -> Self {
        Self {
            title: default_title(),
            date: String::new(),
            due_date: None,
            number: String::new(),
            notes: None,
            instructions: None,
            terms: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total: crate::totals::line_total(quantity, unit_price),
        }
    }
}

impl Default for LineItem {
    /// The row the form shows when it would otherwise have none.
    fn default() -> Self {
        LineItem::new("", 1.0, 0.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    #[serde(default, deserialize_with = "lenient::number")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tax_rate: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tax_amount: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub balance_due: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, deserialize_with = "lenient::text")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub show_invoice: bool,
}

/// Archived snapshot of a generated invoice.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: f64,
    #[serde(default = "default_currency", deserialize_with = "lenient::text")]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::section")]
    pub data: InvoiceDocument,
}

impl HistoryEntry {
    pub fn from_document(id: i64, doc: &InvoiceDocument) -> Self {
        Self {
            id,
            number: doc.invoice.number.clone(),
            customer_name: doc.bill_to.name.clone(),
            total: doc.totals.total,
            currency: doc.settings.currency.clone(),
            date: doc.invoice.date.clone(),
            data: doc.clone(),
        }
    }
}

/// Deserializers that accept whatever an older build or a hand-edited
/// file put in a field, instead of rejecting the whole document.
mod lenient {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{LineItem, SCHEMA_VERSION};
    use crate::format::number_from_value;

    fn to_text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(to_text(Value::deserialize(deserializer)?))
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let text = to_text(Value::deserialize(deserializer)?);
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(number_from_value(&Value::deserialize(deserializer)?, 0.0))
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(number_from_value(&Value::deserialize(deserializer)?, 0.0).trunc() as i64)
    }

    pub fn version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let version = number_from_value(&Value::deserialize(deserializer)?, f64::from(SCHEMA_VERSION));
        Ok(if version >= 1.0 { version.trunc() as u32 } else { SCHEMA_VERSION })
    }

    /// A whole block such as `seller` or `totals`; `null` or any non-object
    /// value reads as the block's defaults.
    pub fn section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => serde_json::from_value(value).map_err(D::Error::custom),
            _ => Ok(T::default()),
        }
    }

    /// Line items; a non-array reads as no items and non-object rows are
    /// dropped.
    pub fn items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<LineItem>, D::Error> {
        let Value::Array(rows) = Value::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        rows.into_iter()
            .filter(Value::is_object)
            .map(|row| serde_json::from_value(row).map_err(D::Error::custom))
            .collect()
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => s == "true",
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut doc = InvoiceDocument::default();
        doc.items.push(LineItem::new("Design", 2.0, 50.0));
        doc.invoice.due_date = Some("2025-01-31".into());
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["schemaVersion"], json!(1));
        assert_eq!(value["billTo"]["name"], json!(""));
        assert_eq!(value["invoice"]["dueDate"], json!("2025-01-31"));
        assert_eq!(value["items"][0]["unitPrice"], json!(50.0));
        assert_eq!(value["items"][0]["total"], json!(100.0));
        assert_eq!(value["totals"]["balanceDue"], json!(0.0));
        assert_eq!(value["meta"]["showInvoice"], json!(false));
        assert!(value["invoice"].get("notes").is_none());
    }

    #[test]
    fn legacy_fields_are_read_but_never_written() {
        let doc: InvoiceDocument = serde_json::from_value(json!({
            "seller": { "name": "Acme", "bank": { "accountNo": 123, "ifsc": "ABC", "name": "X" } },
            "invoice": { "terms": "Net 30" }
        }))
        .unwrap();

        let bank = doc.seller.bank.clone().unwrap();
        assert_eq!(bank.account_no, "123");
        assert_eq!(doc.invoice.terms.as_deref(), Some("Net 30"));

        let value = serde_json::to_value(&doc).unwrap();
        assert!(value["seller"].get("bank").is_none());
        assert!(value["invoice"].get("terms").is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let doc: InvoiceDocument = serde_json::from_value(json!({})).unwrap();
        assert_eq!(doc, InvoiceDocument::default());
        assert_eq!(doc.settings.currency, "INR");
        assert_eq!(doc.invoice.title, "INVOICE");
    }

    #[test]
    fn lenient_fields_accept_loose_types() {
        let doc: InvoiceDocument = serde_json::from_value(json!({
            "invoice": { "number": 42, "notes": null },
            "items": [{ "description": "Bolts", "quantity": "3", "unitPrice": "2.5x" }],
            "meta": { "showInvoice": "true" }
        }))
        .unwrap();

        assert_eq!(doc.invoice.number, "42");
        assert_eq!(doc.invoice.notes, None);
        assert_eq!(doc.items[0].quantity, 3.0);
        assert_eq!(doc.items[0].unit_price, 2.5);
        assert!(doc.meta.show_invoice);
    }

    #[test]
    fn null_or_misshaped_sections_take_defaults() {
        let doc: InvoiceDocument = serde_json::from_value(json!({
            "schemaVersion": "1",
            "seller": null,
            "billTo": "Globex",
            "invoice": { "number": "INV-7" },
            "items": [{ "description": "Bolts", "quantity": 2, "unitPrice": 3 }, 7, null],
            "totals": [],
            "meta": null
        }))
        .unwrap();

        assert_eq!(doc.schema_version, 1);
        assert_eq!(doc.seller, Party::default());
        assert_eq!(doc.bill_to, Party::default());
        assert_eq!(doc.invoice.number, "INV-7");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.totals, Totals::default());
        assert_eq!(doc.meta, Meta::default());

        let doc: InvoiceDocument = serde_json::from_value(json!({ "items": null })).unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn history_entry_reads_loose_fields() {
        let entry: HistoryEntry = serde_json::from_value(json!({
            "id": "1700000000000",
            "number": 12,
            "total": "12.5",
            "data": null
        }))
        .unwrap();

        assert_eq!(entry.id, 1_700_000_000_000);
        assert_eq!(entry.number, "12");
        assert_eq!(entry.total, 12.5);
        assert_eq!(entry.currency, "INR");
        assert_eq!(entry.customer_name, "");
        assert_eq!(entry.data, InvoiceDocument::default());
    }

    #[test]
    fn default_item_is_one_empty_unit() {
        let item = LineItem::default();
        assert_eq!(item.description, "");
        assert_eq!(item.quantity, 1.0);
        assert_eq!(item.unit_price, 0.0);
        assert_eq!(item.total, 0.0);
    }
}
