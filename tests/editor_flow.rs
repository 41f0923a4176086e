use std::path::PathBuf;

use invoice_drafter::draft::{DRAFT_KEY, LAST_NUMBER_KEY};
use invoice_drafter::error::{EditorError, ExportError, ImportError};
use invoice_drafter::export::{PdfArtifact, PdfExporter, ShareOutcome, ShareTarget};
use invoice_drafter::form::{Control, Field, FieldMap, FormFields, ItemField, Readout, Region};
use invoice_drafter::history::HISTORY_LIMIT;
use invoice_drafter::render::PreviewRenderer;
use invoice_drafter::store::{FileStore, KeyValueStore, MemoryStore};
use invoice_drafter::{DraftDefaults, EditOrigin, Editor, InvoiceDocument, SyncOptions};

#[derive(Default)]
struct RecordingPreview {
    rendered: Vec<InvoiceDocument>,
}

impl PreviewRenderer for RecordingPreview {
    fn render(&mut self, doc: &InvoiceDocument) -> Result<(), ExportError> {
        self.rendered.push(doc.clone());
        Ok(())
    }
}

struct StubExporter;

impl PdfExporter for StubExporter {
    fn export(&mut self, doc: &InvoiceDocument) -> Result<PdfArtifact, ExportError> {
        let filename = format!("Invoice-{}.pdf", doc.invoice.number);
        Ok(PdfArtifact { path: PathBuf::from("/tmp").join(&filename), filename })
    }
}

struct StubShare {
    files: bool,
    outcome: ShareOutcome,
    calls: usize,
}

impl ShareTarget for StubShare {
    fn supports_files(&self) -> bool {
        self.files
    }

    fn share(&mut self, _artifact: &PdfArtifact) -> Result<ShareOutcome, ExportError> {
        self.calls += 1;
        Ok(self.outcome.clone())
    }
}

type TestEditor<S> = Editor<FieldMap, S, RecordingPreview>;

fn new_editor<S: KeyValueStore>(store: S) -> TestEditor<S> {
    let mut editor = Editor::new(FieldMap::new(), store, RecordingPreview::default());
    editor.restore_draft(&DraftDefaults::default());
    editor
}

fn fill_valid<S: KeyValueStore>(editor: &mut TestEditor<S>, number: &str) {
    let form = editor.form_mut();
    form.write(Field::SellerName, "Acme Tools");
    form.write(Field::SellerAddress, "1 Market Road\nPune");
    form.write(Field::BillToName, "Globex");
    form.write(Field::BillToAddress, "9 Harbour St");
    form.write(Field::Number, number);
    form.write(Field::TaxRate, "10");
    form.write(Field::Discount, "100");
    form.write(Field::Notes, "Thanks!");
    form.write_item(0, ItemField::Description, "Consulting");
    form.write_item(0, ItemField::Quantity, "2");
    form.write_item(0, ItemField::UnitPrice, "1000");
    editor.field_changed(EditOrigin::User);
}

fn without_timestamp(mut doc: InvoiceDocument) -> InvoiceDocument {
    doc.meta.updated_at.clear();
    doc
}

#[test]
fn basic_scenario_totals() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");

    let doc = editor.sync_from_form(SyncOptions::default());
    assert_eq!(doc.totals.subtotal, 2000.0);
    assert_eq!(doc.totals.tax_amount, 200.0);
    assert_eq!(doc.totals.total, 2100.0);
    assert_eq!(doc.totals.balance_due, 2100.0);
    assert_eq!(editor.form().readout(Readout::Total), Some("₹2,100.00"));
    assert_eq!(editor.form().readout(Readout::RowTotal(0)), Some("₹2,000.00"));
}

#[test]
fn sync_is_idempotent() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");

    let first = editor.sync_from_form(SyncOptions::default());
    let second = editor.sync_from_form(SyncOptions::default());
    assert_eq!(without_timestamp(first), without_timestamp(second));
}

#[test]
fn export_then_import_round_trips() {
    let mut source = new_editor(MemoryStore::new());
    fill_valid(&mut source, "INV-0042");
    source.form_mut().write(Field::DueDate, "2026-01-31");
    source.form_mut().write(Field::TemplateId, "compact");
    let generated = source.generate_bill().unwrap();
    let (filename, json) = source.export_json().unwrap();
    assert_eq!(filename, "invoice-INV-0042.json");

    let mut target = Editor::new(FieldMap::new(), MemoryStore::new(), RecordingPreview::default());
    let imported = target.import_json(&json).unwrap();

    assert_eq!(without_timestamp(imported), without_timestamp(generated));
    assert_eq!(target.preview().rendered.len(), 1);
    assert!(target.form().is_visible(Region::Preview));
}

#[test]
fn legacy_bank_block_becomes_instructions() {
    let mut editor = Editor::new(FieldMap::new(), MemoryStore::new(), RecordingPreview::default());
    let doc = editor
        .import_json(r#"{"seller":{"name":"S","bank":{"accountNo":"123","ifsc":"ABC","name":"X"}}}"#)
        .unwrap();

    let instructions = doc.invoice.instructions.unwrap();
    assert!(instructions.contains("Account No: 123"));
    assert!(instructions.contains("IFSC: ABC"));
    assert_eq!(editor.form().read(Field::Instructions), instructions);

    let draft = editor.store().get(DRAFT_KEY).unwrap().unwrap();
    assert!(!draft.contains("\"bank\""));
}

#[test]
fn prototype_keys_never_reach_the_document() {
    let mut editor = Editor::new(FieldMap::new(), MemoryStore::new(), RecordingPreview::default());
    let doc = editor
        .import_json(r#"{"__proto__":{"polluted":true},"billTo":{"name":"Safe"},"settings":{"constructor":{"x":1}}}"#)
        .unwrap();

    assert_eq!(doc.bill_to.name, "Safe");
    let draft = editor.store().get(DRAFT_KEY).unwrap().unwrap();
    assert!(!draft.contains("polluted"));
    assert!(!draft.contains("constructor"));
}

#[test]
fn null_sections_import_as_defaults() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");

    let doc = editor.import_json(r#"{"seller":null,"billTo":{"name":"X"}}"#).unwrap();
    assert_eq!(doc.seller.name, "");
    assert_eq!(doc.bill_to.name, "X");
    assert_eq!(doc.invoice.number, "INV-0001");

    let doc = editor.import_json(r#"{"items":null,"meta":null}"#).unwrap();
    assert_eq!(doc.items.len(), 1);
    assert_eq!(doc.items[0].description, "");
    assert!(doc.meta.show_invoice);
    assert_eq!(editor.form().item_rows(), 1);
}

#[test]
fn invalid_import_leaves_state_untouched() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");
    let draft_before = editor.store().get(DRAFT_KEY).unwrap();
    let renders_before = editor.preview().rendered.len();

    let err = editor.import_json("{ not json").unwrap_err();
    assert!(matches!(err, EditorError::Import(ImportError::InvalidJson(_))));
    let err = editor.import_json("42").unwrap_err();
    assert!(matches!(err, EditorError::Import(ImportError::NotAnObject)));

    assert_eq!(editor.store().get(DRAFT_KEY).unwrap(), draft_before);
    assert_eq!(editor.preview().rendered.len(), renders_before);
    assert_eq!(editor.form().read(Field::Number), "INV-0001");
}

#[test]
fn validation_gates_bill_generation() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");
    editor.form_mut().write(Field::BillToAddress, "   ");

    let err = editor.generate_bill().unwrap_err();
    assert!(matches!(err, EditorError::Validation));
    assert!(editor.history().list().is_empty());
    assert!(editor.store().get(LAST_NUMBER_KEY).unwrap().is_none());
    assert!(!editor.form().is_visible(Region::Preview));
}

#[test]
fn generated_numbers_seed_the_next_draft() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0009");
    editor.generate_bill().unwrap();

    let fresh = editor.reset(&DraftDefaults::default());
    assert_eq!(fresh.invoice.number, "INV-0010");
    assert!(fresh.bill_to.name.is_empty());
}

#[test]
fn history_is_capped_and_deduplicated() {
    let mut editor = new_editor(MemoryStore::new());
    for n in 0..=HISTORY_LIMIT {
        fill_valid(&mut editor, &format!("INV-{n:04}"));
        editor.generate_bill().unwrap();
    }
    let entries = editor.history().list();
    assert_eq!(entries.len(), HISTORY_LIMIT);
    assert!(entries.iter().all(|e| e.number != "INV-0000"));

    // Re-generating an archived number moves it to the front.
    fill_valid(&mut editor, "INV-0010");
    editor.form_mut().write(Field::Discount, "0");
    editor.generate_bill().unwrap();
    let entries = editor.history().list();
    assert_eq!(entries.len(), HISTORY_LIMIT);
    assert_eq!(entries[0].number, "INV-0010");
    assert_eq!(entries[0].total, 2200.0);
    assert_eq!(entries.iter().filter(|e| e.number == "INV-0010").count(), 1);
    assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
}

#[test]
fn loading_history_shows_the_archived_invoice() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");
    editor.generate_bill().unwrap();
    let id = editor.history().list()[0].id;

    editor.reset(&DraftDefaults::default());
    let doc = editor.load_history(id).unwrap();
    assert_eq!(doc.invoice.number, "INV-0001");
    assert!(doc.meta.show_invoice);
    assert_eq!(editor.form().read(Field::BillToName), "Globex");

    assert!(matches!(editor.load_history(-1), Err(EditorError::HistoryNotFound(-1))));
}

#[test]
fn removing_rows_keeps_one_and_updates_totals() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");
    editor.add_item_row();
    editor.form_mut().write_item(1, ItemField::Description, "Travel");
    editor.form_mut().write_item(1, ItemField::UnitPrice, "500");
    let doc = editor.field_changed(EditOrigin::User).unwrap();
    assert_eq!(doc.totals.subtotal, 2500.0);

    let doc = editor.remove_item_row(0);
    assert_eq!(doc.items.len(), 1);
    assert_eq!(doc.totals.subtotal, 500.0);

    let doc = editor.remove_item_row(0);
    assert_eq!(doc.items.len(), 1);
    assert_eq!(doc.items[0].description, "");
    assert_eq!(doc.items[0].quantity, 1.0);
    assert_eq!(doc.totals.subtotal, 0.0);
}

#[test]
fn share_falls_back_and_aborts_quietly() {
    let mut editor = new_editor(MemoryStore::new());
    fill_valid(&mut editor, "INV-0001");

    let mut no_files = StubShare { files: false, outcome: ShareOutcome::Shared, calls: 0 };
    let outcome = editor.share_pdf(&mut StubExporter, &mut no_files).unwrap();
    assert_eq!(outcome, ShareOutcome::Downloaded(PathBuf::from("/tmp/Invoice-INV-0001.pdf")));
    assert_eq!(no_files.calls, 0);

    let mut dismissed = StubShare { files: true, outcome: ShareOutcome::Aborted, calls: 0 };
    let outcome = editor.share_pdf(&mut StubExporter, &mut dismissed).unwrap();
    assert_eq!(outcome, ShareOutcome::Aborted);
    assert_eq!(dismissed.calls, 1);
    assert!(!editor.form().is_busy(Control::Share));
}

#[test]
fn draft_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut editor = new_editor(FileStore::open(dir.path()).unwrap());
        fill_valid(&mut editor, "INV-0077");
        editor.sync_from_form(SyncOptions::shown());
    }

    let editor = new_editor(FileStore::open(dir.path()).unwrap());
    assert_eq!(editor.form().read(Field::Number), "INV-0077");
    assert_eq!(editor.form().read(Field::SellerAddress), "1 Market Road\nPune");
    assert!(editor.form().is_visible(Region::Preview));
    assert_eq!(editor.preview().rendered.len(), 1);
}

#[test]
fn corrupt_draft_starts_fresh() {
    let mut store = MemoryStore::new();
    store.set(DRAFT_KEY, "{\"items\": [").unwrap();
    let editor = new_editor(store);

    assert_eq!(editor.form().read(Field::Number), "INV-0001");
    assert_eq!(editor.form().item_rows(), 1);
}
