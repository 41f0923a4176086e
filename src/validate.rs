use crate::model::{InvoiceDocument, LineItem, Party};

/// Shown whenever the bill-generation gate fails. It deliberately does not
/// name the missing field.
pub const VALIDATION_MESSAGE: &str =
    "Please fill in seller and customer name and address, the invoice date and number, and at least one item.";

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

fn party_complete(party: &Party) -> bool {
    filled(&party.name) && filled(&party.address)
}

fn item_billable(item: &LineItem) -> bool {
    filled(&item.description) && item.quantity > 0.0 && item.unit_price >= 0.0
}

/// Bill-generation gate.
pub fn validate_data(doc: &InvoiceDocument) -> bool {
    party_complete(&doc.seller)
        && party_complete(&doc.bill_to)
        && filled(&doc.invoice.date)
        && filled(&doc.invoice.number)
        && !doc.items.is_empty()
        && doc.items.iter().any(item_billable)
}
