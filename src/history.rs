//! Bounded, number-deduplicated archive of generated invoices.
//!
//! Saving a number that is already archived removes the old entry and puts
//! the new one at the front with a fresh id, so the list is always ordered
//! newest-first by id.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::model::{HistoryEntry, InvoiceDocument};
use crate::store::KeyValueStore;

pub const HISTORY_KEY: &str = "invoice.history";
pub const HISTORY_LIMIT: usize = 50;

pub struct HistoryStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> HistoryStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// All entries, newest first. Entries that cannot be read are skipped;
    /// an unreadable slot reads as empty.
    pub fn list(&self) -> Vec<HistoryEntry> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read history");
                return Vec::new();
            }
        };
        let rows: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "ignoring corrupt history");
                return Vec::new();
            }
        };
        rows.into_iter()
            .enumerate()
            .filter_map(|(index, row)| {
                if !row.is_object() {
                    warn!(index, "skipping history entry that is not an object");
                    return None;
                }
                serde_json::from_value(row)
                    .map_err(|e| warn!(index, error = %e, "skipping unreadable history entry"))
                    .ok()
            })
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<HistoryEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// Archives `doc` and returns the new entry's id.
    ///
    /// The entry is returned even when persisting it failed; the failure is
    /// logged.
    pub fn save(&mut self, doc: &InvoiceDocument) -> i64 {
        let mut entries = self.list();
        let number = doc.invoice.number.trim();
        if !number.is_empty() {
            entries.retain(|entry| entry.number.trim() != number);
        }

        let newest = entries.iter().map(|entry| entry.id).max().unwrap_or(i64::MIN);
        let id = Utc::now().timestamp_millis().max(newest.saturating_add(1));
        entries.insert(0, HistoryEntry::from_document(id, doc));
        entries.truncate(HISTORY_LIMIT);

        self.persist(&entries);
        info!(id, number = %doc.invoice.number, entries = entries.len(), "saved to history");
        id
    }

    pub fn delete(&mut self, id: i64) {
        let mut entries = self.list();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() != before {
            self.persist(&entries);
        }
    }

    /// Wipes every entry. Confirmation belongs to the caller.
    pub fn clear(&mut self) {
        match self.store.remove(HISTORY_KEY) {
            Ok(()) => info!("history cleared"),
            Err(e) => warn!(error = %e, "failed to clear history"),
        }
    }

    fn persist(&mut self, entries: &[HistoryEntry]) {
        let result = serde_json::to_string(entries)
            .map_err(Into::into)
            .and_then(|json| self.store.set(HISTORY_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn document(number: &str, customer: &str, total: f64) -> InvoiceDocument {
        let mut doc = InvoiceDocument::default();
        doc.invoice.number = number.into();
        doc.bill_to.name = customer.into();
        doc.totals.total = total;
        doc
    }

    #[test]
    fn save_builds_entry_from_document() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        let id = history.save(&document("INV-1", "Client", 42.0));

        let entry = history.get(id).unwrap();
        assert_eq!(entry.number, "INV-1");
        assert_eq!(entry.customer_name, "Client");
        assert_eq!(entry.total, 42.0);
        assert_eq!(entry.currency, "INR");
        assert_eq!(entry.data.invoice.number, "INV-1");
    }

    #[test]
    fn list_is_newest_first_with_increasing_ids() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        let first = history.save(&document("A", "a", 1.0));
        let second = history.save(&document("B", "b", 2.0));

        assert!(second > first);
        let numbers: Vec<String> = history.list().into_iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec!["B", "A"]);
    }

    #[test]
    fn duplicate_number_replaces_and_moves_to_front() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        history.save(&document("A", "a", 1.0));
        history.save(&document("B", "b", 2.0));
        history.save(&document("A", "a", 99.0));

        let entries = history.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].number, "A");
        assert_eq!(entries[0].total, 99.0);
        assert_eq!(entries[1].number, "B");
    }

    #[test]
    fn empty_numbers_are_never_deduplicated() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        history.save(&document("", "a", 1.0));
        history.save(&document("", "b", 2.0));
        assert_eq!(history.list().len(), 2);
    }

    #[test]
    fn cap_evicts_oldest() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        for n in 0..=HISTORY_LIMIT {
            history.save(&document(&format!("INV-{n}"), "c", n as f64));
        }

        let entries = history.list();
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0].number, format!("INV-{HISTORY_LIMIT}"));
        assert!(entries.iter().all(|e| e.number != "INV-0"));
    }

    #[test]
    fn delete_and_clear() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        let a = history.save(&document("A", "a", 1.0));
        history.save(&document("B", "b", 2.0));

        history.delete(a);
        history.delete(a);
        assert!(history.get(a).is_none());
        assert_eq!(history.list().len(), 1);

        history.clear();
        assert!(history.list().is_empty());
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "[{\"id\":").unwrap();
        assert!(HistoryStore::new(&mut store).list().is_empty());
    }

    #[test]
    fn one_bad_entry_does_not_evict_the_rest() {
        let mut store = MemoryStore::new();
        let mut history = HistoryStore::new(&mut store);
        for number in ["A", "B", "C"] {
            history.save(&document(number, "c", 1.0));
        }

        let raw = store.get(HISTORY_KEY).unwrap().unwrap();
        let mut rows: Vec<Value> = serde_json::from_str(&raw).unwrap();
        rows[2]["total"] = Value::String("12.5".into());
        rows.push(Value::from(42));
        store.set(HISTORY_KEY, &serde_json::to_string(&rows).unwrap()).unwrap();

        let mut history = HistoryStore::new(&mut store);
        let entries = history.list();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].number, "A");
        assert_eq!(entries[2].total, 12.5);

        history.save(&document("NEW", "c", 1.0));
        let numbers: Vec<String> = history.list().into_iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec!["NEW", "C", "B", "A"]);
    }

    #[test]
    fn persistence_failure_does_not_panic() {
        let mut store = MemoryStore::with_quota(16);
        let mut history = HistoryStore::new(&mut store);
        history.save(&document("A", "a", 1.0));
        assert!(history.list().is_empty());
    }
}
