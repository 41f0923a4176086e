//! The sync orchestrator and the user workflows built on it.
//!
//! Every path that changes persisted state (field edits, row add/remove,
//! import, history load, draft restore, reset) ends in
//! [`Editor::sync_from_form`], which is the only writer of the draft slot.

use chrono::Local;
use tracing::{debug, info, warn};

use crate::draft::DraftStore;
use crate::error::EditorError;
use crate::export::{self, PdfArtifact, PdfExporter, ShareOutcome, ShareTarget};
use crate::form::{self, Control, FormFields, Readout, Region};
use crate::format::format_currency;
use crate::history::HistoryStore;
use crate::import;
use crate::model::{InvoiceDocument, LineItem, Party};
use crate::render::PreviewRenderer;
use crate::store::KeyValueStore;
use crate::validate::validate_data;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub render: bool,
    /// Overrides `meta.showInvoice` when set.
    pub show_invoice: Option<bool>,
}

impl SyncOptions {
    pub fn shown() -> Self {
        Self { render: true, show_invoice: Some(true) }
    }
}

/// Who wrote to the form. Programmatic writes (import, history load, draft
/// restore) must not be mistaken for user edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    User,
    Programmatic,
}

/// Values a freshly reset draft starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftDefaults {
    pub currency: String,
    pub locale: String,
    pub template_id: Option<String>,
    pub tax_rate: f64,
    pub seller: Party,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        let doc = InvoiceDocument::default();
        Self {
            currency: doc.settings.currency,
            locale: doc.settings.locale,
            template_id: None,
            tax_rate: 0.0,
            seller: Party::default(),
        }
    }
}

/// Marks an export control busy for as long as it lives.
struct BusyGuard<'a, F: FormFields + ?Sized> {
    form: &'a mut F,
    control: Control,
}

impl<'a, F: FormFields + ?Sized> BusyGuard<'a, F> {
    fn new(form: &'a mut F, control: Control) -> Self {
        form.set_busy(control, true);
        Self { form, control }
    }
}

impl<F: FormFields + ?Sized> Drop for BusyGuard<'_, F> {
    fn drop(&mut self) {
        self.form.set_busy(self.control, false);
    }
}

pub struct Editor<F: FormFields, S: KeyValueStore, P: PreviewRenderer> {
    form: F,
    store: S,
    preview: P,
}

impl<F: FormFields, S: KeyValueStore, P: PreviewRenderer> Editor<F, S, P> {
    pub fn new(form: F, store: S, preview: P) -> Self {
        Self { form, store, preview }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    /// Direct field access for the UI layer. Report the edit afterwards
    /// with [`Editor::field_changed`].
    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn preview(&self) -> &P {
        &self.preview
    }

    pub fn history(&mut self) -> HistoryStore<'_, S> {
        HistoryStore::new(&mut self.store)
    }

    // ==========================================
    // Sync
    // ==========================================

    /// Collects the document from the form, refreshes the totals readouts,
    /// persists the draft and optionally re-renders the preview.
    pub fn sync_from_form(&mut self, options: SyncOptions) -> InvoiceDocument {
        let mut doc = form::collect(&mut self.form);
        if let Some(show) = options.show_invoice {
            doc.meta.show_invoice = show;
        }
        self.form.set_visible(Region::Preview, doc.meta.show_invoice);
        self.form.set_visible(Region::Downloads, doc.meta.show_invoice);

        self.show_totals(&doc);
        DraftStore::new(&mut self.store).save(&doc);

        if options.render {
            if let Err(e) = self.preview.render(&doc) {
                warn!(error = %e, "preview render failed");
            }
        }
        debug!(number = %doc.invoice.number, total = doc.totals.total, "synced");
        doc
    }

    fn show_totals(&mut self, doc: &InvoiceDocument) {
        let money = |amount: f64| format_currency(amount, &doc.settings.currency, &doc.settings.locale);
        let totals = doc.totals;
        self.form.write_readout(Readout::Subtotal, &money(totals.subtotal));
        self.form.write_readout(Readout::TaxAmount, &money(totals.tax_amount));
        self.form.write_readout(Readout::Discount, &money(totals.discount));
        self.form.write_readout(Readout::Total, &money(totals.total));
        self.form.write_readout(Readout::BalanceDue, &money(totals.balance_due));
    }

    /// Form edit hook. Returns the synced document for user edits and
    /// `None` for programmatic writes, which are ignored.
    pub fn field_changed(&mut self, origin: EditOrigin) -> Option<InvoiceDocument> {
        match origin {
            EditOrigin::Programmatic => None,
            EditOrigin::User => {
                let render = self.form.is_visible(Region::Preview);
                Some(self.sync_from_form(SyncOptions { render, show_invoice: None }))
            }
        }
    }

    /// Programmatic write of a whole document. The caller syncs afterwards.
    fn apply_document(&mut self, doc: &InvoiceDocument) {
        form::apply(&mut self.form, doc);
    }

    // ==========================================
    // Draft lifecycle
    // ==========================================

    /// Clears the draft and starts a blank invoice numbered after the last
    /// generated one.
    pub fn reset(&mut self, defaults: &DraftDefaults) -> InvoiceDocument {
        let mut drafts = DraftStore::new(&mut self.store);
        drafts.clear();
        let number = drafts.next_number();

        let mut doc = InvoiceDocument::default();
        doc.seller = defaults.seller.clone();
        doc.settings.currency = defaults.currency.clone();
        doc.settings.locale = defaults.locale.clone();
        doc.settings.template_id = defaults.template_id.clone();
        doc.totals.tax_rate = defaults.tax_rate;
        doc.invoice.number = number;
        doc.invoice.date = Local::now().date_naive().format("%Y-%m-%d").to_string();
        doc.items = vec![LineItem::default()];

        self.apply_document(&doc);
        info!(number = %doc.invoice.number, "started new draft");
        self.sync_from_form(SyncOptions { render: false, show_invoice: Some(false) })
    }

    /// Restores the stored draft into the form, or resets when there is
    /// none (or it is unreadable).
    pub fn restore_draft(&mut self, defaults: &DraftDefaults) -> InvoiceDocument {
        self.refresh_history_region();
        match DraftStore::new(&mut self.store).load() {
            Some(doc) => {
                self.apply_document(&doc);
                let show = doc.meta.show_invoice;
                self.sync_from_form(SyncOptions { render: show, show_invoice: Some(show) })
            }
            None => self.reset(defaults),
        }
    }

    pub fn hide_preview(&mut self) -> InvoiceDocument {
        self.sync_from_form(SyncOptions { render: false, show_invoice: Some(false) })
    }

    // ==========================================
    // Item rows
    // ==========================================

    pub fn add_item_row(&mut self) -> InvoiceDocument {
        form::add_item_row(&mut self.form);
        self.field_changed(EditOrigin::User).unwrap_or_default()
    }

    pub fn remove_item_row(&mut self, row: usize) -> InvoiceDocument {
        form::remove_item_row(&mut self.form, row);
        self.field_changed(EditOrigin::User).unwrap_or_default()
    }

    // ==========================================
    // Bill generation & history
    // ==========================================

    /// Validates, shows the invoice, archives it and records its number.
    pub fn generate_bill(&mut self) -> Result<InvoiceDocument, EditorError> {
        if !validate_data(&form::collect(&mut self.form)) {
            return Err(EditorError::Validation);
        }
        let doc = self.sync_from_form(SyncOptions::shown());
        HistoryStore::new(&mut self.store).save(&doc);
        DraftStore::new(&mut self.store).record_last_number(&doc.invoice.number);
        self.refresh_history_region();
        Ok(doc)
    }

    pub fn delete_history(&mut self, id: i64) {
        HistoryStore::new(&mut self.store).delete(id);
        self.refresh_history_region();
    }

    /// Wipes the history. Ask the user before calling this.
    pub fn clear_history(&mut self) {
        HistoryStore::new(&mut self.store).clear();
        self.refresh_history_region();
    }

    fn refresh_history_region(&mut self) {
        let has_entries = !HistoryStore::new(&mut self.store).list().is_empty();
        self.form.set_visible(Region::History, has_entries);
    }

    pub fn load_history(&mut self, id: i64) -> Result<InvoiceDocument, EditorError> {
        let entry = HistoryStore::new(&mut self.store)
            .get(id)
            .ok_or(EditorError::HistoryNotFound(id))?;
        self.apply_document(&entry.data);
        Ok(self.sync_from_form(SyncOptions::shown()))
    }

    // ==========================================
    // Import / export
    // ==========================================

    /// Merges raw JSON onto the current document and shows the result.
    /// Nothing is touched when the text does not parse.
    pub fn import_json(&mut self, text: &str) -> Result<InvoiceDocument, EditorError> {
        let imported = import::parse_import(text)?;
        let base = form::collect(&mut self.form);
        let mut doc = import::merge_import(&base, &imported)?;
        doc.meta.show_invoice = true;

        self.apply_document(&doc);
        info!(number = %doc.invoice.number, "imported invoice JSON");
        Ok(self.sync_from_form(SyncOptions::shown()))
    }

    /// Filename and pretty JSON of the current document.
    pub fn export_json(&mut self) -> Result<(String, String), EditorError> {
        let doc = self.sync_from_form(SyncOptions::default());
        Ok(export::export_json(&doc)?)
    }

    pub fn export_pdf(&mut self, exporter: &mut dyn PdfExporter) -> Result<PdfArtifact, EditorError> {
        let doc = self.sync_from_form(SyncOptions::default());
        let _busy = BusyGuard::new(&mut self.form, Control::DownloadPdf);
        Ok(exporter.export(&doc)?)
    }

    /// Shares the PDF when the target can take files, otherwise leaves it
    /// saved where the exporter wrote it.
    pub fn share_pdf(
        &mut self,
        exporter: &mut dyn PdfExporter,
        target: &mut dyn ShareTarget,
    ) -> Result<ShareOutcome, EditorError> {
        let doc = self.sync_from_form(SyncOptions::default());
        let _busy = BusyGuard::new(&mut self.form, Control::Share);
        let artifact = exporter.export(&doc)?;

        if !target.supports_files() {
            info!(path = %artifact.path.display(), "file sharing unsupported, saved instead");
            return Ok(ShareOutcome::Downloaded(artifact.path));
        }
        let outcome = target.share(&artifact)?;
        if outcome == ShareOutcome::Aborted {
            debug!("share dismissed by user");
        }
        Ok(outcome)
    }
}
