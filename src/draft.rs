//! Draft slot and the last-generated-number slot.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::model::InvoiceDocument;
use crate::store::KeyValueStore;

pub const DRAFT_KEY: &str = "invoice.draft.v1";
pub const LAST_NUMBER_KEY: &str = "invoice.lastNumber";
pub const FIRST_NUMBER: &str = "INV-0001";

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d+)(\D*)$").unwrap());

fn increment_digits(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for byte in out.iter_mut().rev() {
        if *byte == b'9' {
            *byte = b'0';
        } else {
            *byte += 1;
            return String::from_utf8_lossy(&out).to_string();
        }
    }
    format!("1{}", String::from_utf8_lossy(&out))
}

/// Number to seed a fresh draft with, given the last generated one.
///
/// The last run of digits is incremented with its zero padding kept
/// (`INV-0009` becomes `INV-0010`); a number without digits gets `-1`
/// appended.
pub fn next_invoice_number(last: Option<&str>) -> String {
    let last = match last.map(str::trim) {
        Some(last) if !last.is_empty() => last,
        _ => return FIRST_NUMBER.to_string(),
    };
    match TRAILING_DIGITS.captures(last) {
        Some(caps) => format!("{}{}{}", &caps[1], increment_digits(&caps[2]), &caps[3]),
        None => format!("{last}-1"),
    }
}

/// Single-slot draft persistence. Every failure is logged and swallowed:
/// losing a draft never blocks editing.
pub struct DraftStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> DraftStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Stored draft, or `None` when absent, unreadable or corrupt.
    pub fn load(&self) -> Option<InvoiceDocument> {
        let raw = match self.store.get(DRAFT_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read draft");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "ignoring corrupt draft");
                None
            }
        }
    }

    /// Returns whether the draft was written.
    pub fn save(&mut self, doc: &InvoiceDocument) -> bool {
        let result = serde_json::to_string(doc)
            .map_err(Into::into)
            .and_then(|json| self.store.set(DRAFT_KEY, &json));
        match result {
            Ok(()) => {
                debug!(number = %doc.invoice.number, "draft saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to save draft");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        match self.store.remove(DRAFT_KEY) {
            Ok(()) => info!("draft cleared"),
            Err(e) => warn!(error = %e, "failed to clear draft"),
        }
    }

    pub fn last_number(&self) -> Option<String> {
        match self.store.get(LAST_NUMBER_KEY) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "failed to read last invoice number");
                None
            }
        }
    }

    pub fn record_last_number(&mut self, number: &str) {
        if let Err(e) = self.store.set(LAST_NUMBER_KEY, number) {
            warn!(error = %e, "failed to record last invoice number");
        }
    }

    pub fn next_number(&self) -> String {
        next_invoice_number(self.last_number().as_deref())
    }
}
