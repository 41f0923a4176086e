//! Form capability and the binder that maps it to and from the canonical
//! document.
//!
//! The core only knows semantic field names. Whatever draws the form (the
//! terminal front-end, a test double) implements [`FormFields`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};

use crate::format::{format_currency, parse_number};
use crate::model::{
    BankDetails, InvoiceDetails, InvoiceDocument, LineItem, Meta, Party, SCHEMA_VERSION, Settings,
    DEFAULT_CURRENCY, DEFAULT_LOCALE, DEFAULT_TITLE,
};
use crate::totals::calculate_totals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    SellerName,
    SellerAddress,
    SellerEmail,
    SellerPhone,
    BillToName,
    BillToAddress,
    BillToEmail,
    BillToPhone,
    Title,
    Date,
    DueDate,
    Number,
    Notes,
    Instructions,
    Currency,
    Locale,
    TemplateId,
    TaxRate,
    Discount,
}

impl Field {
    pub const ALL: [Field; 19] = [
        Field::SellerName,
        Field::SellerAddress,
        Field::SellerEmail,
        Field::SellerPhone,
        Field::BillToName,
        Field::BillToAddress,
        Field::BillToEmail,
        Field::BillToPhone,
        Field::Title,
        Field::Date,
        Field::DueDate,
        Field::Number,
        Field::Notes,
        Field::Instructions,
        Field::Currency,
        Field::Locale,
        Field::TemplateId,
        Field::TaxRate,
        Field::Discount,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::SellerName => "Seller name",
            Field::SellerAddress => "Seller address",
            Field::SellerEmail => "Seller email",
            Field::SellerPhone => "Seller phone",
            Field::BillToName => "Customer name",
            Field::BillToAddress => "Customer address",
            Field::BillToEmail => "Customer email",
            Field::BillToPhone => "Customer phone",
            Field::Title => "Title",
            Field::Date => "Invoice date",
            Field::DueDate => "Due date",
            Field::Number => "Invoice number",
            Field::Notes => "Notes",
            Field::Instructions => "Payment instructions",
            Field::Currency => "Currency",
            Field::Locale => "Locale",
            Field::TemplateId => "Template",
            Field::TaxRate => "Tax rate %",
            Field::Discount => "Discount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemField {
    Description,
    Quantity,
    UnitPrice,
}

/// Display-only outputs the form shows next to the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Readout {
    RowTotal(usize),
    Subtotal,
    TaxAmount,
    Discount,
    Total,
    BalanceDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Preview,
    History,
    Downloads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Control {
    DownloadPdf,
    Share,
}

pub trait FormFields {
    fn read(&self, field: Field) -> String;
    fn write(&mut self, field: Field, value: &str);

    fn item_rows(&self) -> usize;
    fn read_item(&self, row: usize, field: ItemField) -> String;
    fn write_item(&mut self, row: usize, field: ItemField, value: &str);
    /// Appends a blank row; [`add_item_row`] fills in the defaults.
    fn push_item_row(&mut self);
    fn remove_item_row(&mut self, row: usize);

    fn write_readout(&mut self, readout: Readout, value: &str);
    fn set_visible(&mut self, region: Region, visible: bool);
    fn is_visible(&self, region: Region) -> bool;
    fn set_busy(&mut self, control: Control, busy: bool);
}

/// In-memory form. Backs the terminal front-end and the tests.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: BTreeMap<Field, String>,
    rows: Vec<BTreeMap<ItemField, String>>,
    readouts: BTreeMap<Readout, String>,
    visible: BTreeSet<Region>,
    busy: BTreeSet<Control>,
    busy_log: Vec<(Control, bool)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readout(&self, readout: Readout) -> Option<&str> {
        self.readouts.get(&readout).map(String::as_str)
    }

    pub fn is_busy(&self, control: Control) -> bool {
        self.busy.contains(&control)
    }

    /// Every busy/idle transition in order, oldest first.
    pub fn busy_log(&self) -> &[(Control, bool)] {
        &self.busy_log
    }
}

impl FormFields for FieldMap {
    fn read(&self, field: Field) -> String {
        self.fields.get(&field).cloned().unwrap_or_default()
    }

    fn write(&mut self, field: Field, value: &str) {
        self.fields.insert(field, value.to_string());
    }

    fn item_rows(&self) -> usize {
        self.rows.len()
    }

    fn read_item(&self, row: usize, field: ItemField) -> String {
        self.rows
            .get(row)
            .and_then(|r| r.get(&field))
            .cloned()
            .unwrap_or_default()
    }

    fn write_item(&mut self, row: usize, field: ItemField, value: &str) {
        if let Some(r) = self.rows.get_mut(row) {
            r.insert(field, value.to_string());
        }
    }

    fn push_item_row(&mut self) {
        self.rows.push(BTreeMap::new());
    }

    fn remove_item_row(&mut self, row: usize) {
        if row < self.rows.len() {
            self.rows.remove(row);
            self.readouts.remove(&Readout::RowTotal(self.rows.len()));
        }
    }

    fn write_readout(&mut self, readout: Readout, value: &str) {
        self.readouts.insert(readout, value.to_string());
    }

    fn set_visible(&mut self, region: Region, visible: bool) {
        if visible {
            self.visible.insert(region);
        } else {
            self.visible.remove(&region);
        }
    }

    fn is_visible(&self, region: Region) -> bool {
        self.visible.contains(&region)
    }

    fn set_busy(&mut self, control: Control, busy: bool) {
        if busy {
            self.busy.insert(control);
        } else {
            self.busy.remove(&control);
        }
        self.busy_log.push((control, busy));
    }
}

// ==========================================
// Binder: form -> document
// ==========================================

fn read_or<F: FormFields + ?Sized>(form: &F, field: Field, default: &str) -> String {
    let value = form.read(field);
    if value.trim().is_empty() { default.to_string() } else { value }
}

fn read_optional<F: FormFields + ?Sized>(form: &F, field: Field) -> Option<String> {
    let value = form.read(field);
    if value.is_empty() { None } else { Some(value) }
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the canonical document from the current form state.
///
/// Row totals are recomputed and written back to the row readouts on every
/// pass. Quantities and prices below zero are read as zero.
pub fn collect<F: FormFields + ?Sized>(form: &mut F) -> InvoiceDocument {
    let settings = Settings {
        currency: read_or(form, Field::Currency, DEFAULT_CURRENCY),
        locale: read_or(form, Field::Locale, DEFAULT_LOCALE),
        template_id: read_optional(form, Field::TemplateId),
    };

    let mut items = Vec::with_capacity(form.item_rows());
    for row in 0..form.item_rows() {
        let quantity = parse_number(&form.read_item(row, ItemField::Quantity), 0.0).max(0.0);
        let unit_price = parse_number(&form.read_item(row, ItemField::UnitPrice), 0.0).max(0.0);
        let item = LineItem::new(form.read_item(row, ItemField::Description), quantity, unit_price);
        let shown = format_currency(item.total, &settings.currency, &settings.locale);
        form.write_readout(Readout::RowTotal(row), &shown);
        items.push(item);
    }

    let tax_rate = parse_number(&form.read(Field::TaxRate), 0.0);
    let discount = parse_number(&form.read(Field::Discount), 0.0);
    let totals = calculate_totals(&items, tax_rate, discount);

    InvoiceDocument {
        schema_version: SCHEMA_VERSION,
        seller: Party {
            name: form.read(Field::SellerName),
            address: form.read(Field::SellerAddress),
            email: form.read(Field::SellerEmail),
            phone: form.read(Field::SellerPhone),
            bank: None,
        },
        bill_to: Party {
            name: form.read(Field::BillToName),
            address: form.read(Field::BillToAddress),
            email: form.read(Field::BillToEmail),
            phone: form.read(Field::BillToPhone),
            bank: None,
        },
        invoice: InvoiceDetails {
            title: read_or(form, Field::Title, DEFAULT_TITLE),
            date: form.read(Field::Date),
            due_date: read_optional(form, Field::DueDate),
            number: form.read(Field::Number),
            notes: read_optional(form, Field::Notes),
            instructions: read_optional(form, Field::Instructions),
            terms: None,
        },
        items,
        totals,
        meta: Meta {
            updated_at: now_timestamp(),
            show_invoice: form.is_visible(Region::Preview),
        },
        settings,
    }
}

// ==========================================
// Binder: document -> form
// ==========================================

pub const BANK_INSTRUCTIONS_LEAD: &str = "Please make the payment to the following bank account:";

fn bank_instructions(bank: &BankDetails) -> Option<String> {
    let lines: Vec<String> = [
        ("Account Name", &bank.name),
        ("Account No", &bank.account_no),
        ("IFSC", &bank.ifsc),
    ]
    .iter()
    .filter(|(_, value)| !value.trim().is_empty())
    .map(|(label, value)| format!("{label}: {value}"))
    .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!("{BANK_INSTRUCTIONS_LEAD}\n{}", lines.join("\n")))
}

/// Payment instructions for a document, falling back to the legacy `terms`
/// field and then to the legacy `seller.bank` block.
pub fn resolve_instructions(doc: &InvoiceDocument) -> Option<String> {
    doc.invoice
        .instructions
        .clone()
        .or_else(|| doc.invoice.terms.clone())
        .or_else(|| doc.seller.bank.as_ref().and_then(bank_instructions))
}

fn write_number<F: FormFields + ?Sized>(form: &mut F, field: Field, value: f64) {
    form.write(field, &value.to_string());
}

fn write_row<F: FormFields + ?Sized>(form: &mut F, row: usize, item: &LineItem) {
    form.write_item(row, ItemField::Description, &item.description);
    form.write_item(row, ItemField::Quantity, &item.quantity.to_string());
    form.write_item(row, ItemField::UnitPrice, &item.unit_price.to_string());
}

fn resize_rows<F: FormFields + ?Sized>(form: &mut F, rows: usize) {
    while form.item_rows() > rows {
        form.remove_item_row(form.item_rows() - 1);
    }
    while form.item_rows() < rows {
        form.push_item_row();
    }
}

/// Writes a document into the form. Callers treat these writes as
/// programmatic and must not react to them as user edits.
pub fn apply<F: FormFields + ?Sized>(form: &mut F, doc: &InvoiceDocument) {
    form.write(Field::SellerName, &doc.seller.name);
    form.write(Field::SellerAddress, &doc.seller.address);
    form.write(Field::SellerEmail, &doc.seller.email);
    form.write(Field::SellerPhone, &doc.seller.phone);
    form.write(Field::BillToName, &doc.bill_to.name);
    form.write(Field::BillToAddress, &doc.bill_to.address);
    form.write(Field::BillToEmail, &doc.bill_to.email);
    form.write(Field::BillToPhone, &doc.bill_to.phone);

    form.write(Field::Title, &doc.invoice.title);
    form.write(Field::Date, &doc.invoice.date);
    form.write(Field::DueDate, doc.invoice.due_date.as_deref().unwrap_or_default());
    form.write(Field::Number, &doc.invoice.number);
    form.write(Field::Notes, doc.invoice.notes.as_deref().unwrap_or_default());
    let instructions = resolve_instructions(doc).unwrap_or_default();
    form.write(Field::Instructions, &instructions);

    form.write(Field::Currency, &doc.settings.currency);
    form.write(Field::Locale, &doc.settings.locale);
    form.write(Field::TemplateId, doc.settings.template_id.as_deref().unwrap_or_default());
    write_number(form, Field::TaxRate, doc.totals.tax_rate);
    write_number(form, Field::Discount, doc.totals.discount);

    if doc.items.is_empty() {
        resize_rows(form, 1);
        write_row(form, 0, &LineItem::default());
    } else {
        resize_rows(form, doc.items.len());
        for (row, item) in doc.items.iter().enumerate() {
            write_row(form, row, item);
        }
    }

    form.set_visible(Region::Preview, doc.meta.show_invoice);
}

// ==========================================
// Item rows
// ==========================================

pub fn add_item_row<F: FormFields + ?Sized>(form: &mut F) -> usize {
    form.push_item_row();
    let row = form.item_rows() - 1;
    write_row(form, row, &LineItem::default());
    row
}

/// Removes a row, re-adding a default one if the form would be left empty.
pub fn remove_item_row<F: FormFields + ?Sized>(form: &mut F, row: usize) {
    form.remove_item_row(row);
    if form.item_rows() == 0 {
        add_item_row(form);
    }
}
