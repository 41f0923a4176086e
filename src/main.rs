use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use comfy_table::{Attribute, Cell, Color, Table};
use inquire::{Confirm, DateSelect, InquireError, Select, Text};
use tracing_subscriber::EnvFilter;

use invoice_drafter::config::{self, AppSettings};
use invoice_drafter::editor::{EditOrigin, Editor, SyncOptions};
use invoice_drafter::error::{EditorError, ExportError};
use invoice_drafter::export::{PdfArtifact, ShareOutcome, ShareTarget, TypstExporter};
use invoice_drafter::form::{Field, FieldMap, FormFields, ItemField, Readout};
use invoice_drafter::format::{format_currency, format_date};
use invoice_drafter::import::read_import_file;
use invoice_drafter::render::{TemplateRegistry, TextPreview};
use invoice_drafter::store::FileStore;

type CliEditor = Editor<FieldMap, FileStore, TextPreview>;

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-drafter")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discard the draft and start a new invoice
    New,
    /// Edit draft fields interactively
    Edit,
    /// Add or remove line items
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },
    /// Show the invoice preview
    Preview,
    /// Hide the invoice preview
    Hide,
    /// Validate, show and archive the invoice
    Generate,
    /// Import invoice JSON (opens a file picker when no path is given)
    Import { path: Option<PathBuf> },
    /// Export the draft as JSON
    Export {
        /// Target file (defaults to the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate the PDF
    Pdf,
    /// Generate the PDF and hand it to another app
    Share,
    /// Browse generated invoices
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Configure data directory and draft defaults
    Config,
}

#[derive(Subcommand)]
enum ItemAction {
    /// Add a line item (prompts when no description is given)
    Add {
        description: Option<String>,
        #[arg(short, long, default_value_t = 1.0)]
        quantity: f64,
        #[arg(short, long, default_value_t = 0.0)]
        price: f64,
    },
    /// Remove a line item by its 1-based row
    Remove { row: usize },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List archived invoices
    List,
    /// Load an archived invoice into the draft
    Load { id: i64 },
    /// Delete one archived invoice
    Delete { id: i64 },
    /// Delete every archived invoice
    Clear,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        return;
    };

    if let Commands::Config = command {
        setup_config_wizard();
        return;
    }

    let settings = match config::load_settings() {
        Ok(Some(settings)) => settings,
        Ok(None) => setup_config_wizard().unwrap_or_else(|| process::exit(1)),
        Err(e) => {
            eprintln!("❌ Error: {e}");
            process::exit(1);
        }
    };

    let mut editor = match open_editor(&settings) {
        Ok(editor) => editor,
        Err(message) => {
            eprintln!("❌ Error: {message}");
            process::exit(1);
        }
    };
    let defaults = settings.draft_defaults();
    editor.restore_draft(&defaults);

    match command {
        Commands::New => {
            let doc = editor.reset(&defaults);
            println!("✨ Started new draft {}", doc.invoice.number);
        }
        Commands::Edit => edit_wizard(&mut editor),
        Commands::Item { action } => match action {
            ItemAction::Add { description, quantity, price } => {
                add_items(&mut editor, description, quantity, price)
            }
            ItemAction::Remove { row } => {
                if row == 0 || row > editor.form().item_rows() {
                    println!("❌ No item row {row}.");
                } else {
                    editor.remove_item_row(row - 1);
                    println!("🗑️  Removed item {row}.");
                    print_items(&editor);
                }
            }
        },
        Commands::Preview => {
            editor.sync_from_form(SyncOptions::shown());
            print_preview(&editor);
        }
        Commands::Hide => {
            editor.hide_preview();
            println!("🙈 Preview hidden.");
        }
        Commands::Generate => match editor.generate_bill() {
            Ok(doc) => {
                print_preview(&editor);
                println!("✅ Invoice {} saved to history.", doc.invoice.number);
            }
            Err(e) => println!("❌ {e}"),
        },
        Commands::Import { path } => import_file(&mut editor, path),
        Commands::Export { output } => export_json(&mut editor, &settings, output),
        Commands::Pdf => {
            let Some(mut exporter) = pdf_exporter(&settings) else { return };
            println!("\n🔨 Compiling PDF...");
            match editor.export_pdf(&mut exporter) {
                Ok(artifact) => {
                    println!("✅ PDF Generated: {:?}", artifact.path);
                    open_and_reveal(&artifact.path);
                }
                Err(e) => println!("❌ {e}"),
            }
        }
        Commands::Share => {
            let Some(mut exporter) = pdf_exporter(&settings) else { return };
            match editor.share_pdf(&mut exporter, &mut SystemShare) {
                Ok(ShareOutcome::Shared) => println!("📤 Shared."),
                Ok(ShareOutcome::Aborted) => {}
                Ok(ShareOutcome::Downloaded(path)) => {
                    println!("💾 Sharing unavailable, PDF saved: {:?}", path);
                    open_and_reveal(&path);
                }
                Err(e) => println!("❌ {e}"),
            }
        }
        Commands::History { action } => match action {
            HistoryAction::List => show_history(&mut editor),
            HistoryAction::Load { id } => match editor.load_history(id) {
                Ok(doc) => {
                    print_preview(&editor);
                    println!("✅ Loaded invoice {} into the draft.", doc.invoice.number);
                }
                Err(e) => println!("❌ {e}"),
            },
            HistoryAction::Delete { id } => {
                editor.delete_history(id);
                println!("🗑️  Deleted history entry {id}.");
            }
            HistoryAction::Clear => {
                let confirmed = Confirm::new("Delete every archived invoice?")
                    .with_default(false)
                    .prompt()
                    .unwrap_or(false);
                if confirmed {
                    editor.clear_history();
                    println!("✅ History cleared.");
                } else {
                    println!("Cancelled");
                }
            }
        },
        Commands::Config => unreachable!("handled before the editor is opened"),
    }
}

fn open_editor(settings: &AppSettings) -> Result<CliEditor, String> {
    let store = FileStore::open(settings.store_dir()).map_err(|e| e.to_string())?;
    let registry = TemplateRegistry::with_overrides(&settings.templates_dir()).map_err(|e| e.to_string())?;
    Ok(Editor::new(FieldMap::new(), store, TextPreview::new(registry)))
}

// ==========================================
// 1. Editing
// ==========================================

const DONE_OPT: &str = "✅ Done";

fn edit_wizard(editor: &mut CliEditor) {
    loop {
        let mut options: Vec<String> = Field::ALL
            .iter()
            .map(|field| format!("{}: {}", field.label(), first_line(&editor.form().read(*field))))
            .collect();
        options.push(DONE_OPT.to_string());

        let choice = match Select::new("Field to edit:", options).with_page_size(20).raw_prompt() {
            Ok(choice) => choice,
            Err(_) => break,
        };
        let Some(field) = Field::ALL.get(choice.index).copied() else { break };

        let current = editor.form().read(field);
        let value = match field {
            Field::Date => prompt_date(field.label(), &current),
            Field::Notes | Field::Instructions | Field::SellerAddress | Field::BillToAddress => {
                println!("💡 Tip: Use '\\n' for new lines.");
                Text::new(&format!("{}:", field.label()))
                    .with_initial_value(&current.replace('\n', "\\n"))
                    .prompt()
                    .ok()
                    .map(|v| v.replace("\\n", "\n"))
            }
            _ => Text::new(&format!("{}:", field.label())).with_initial_value(&current).prompt().ok(),
        };

        if let Some(value) = value {
            editor.form_mut().write(field, &value);
            editor.field_changed(EditOrigin::User);
        }
    }

    print_totals(editor);
}

fn prompt_date(label: &str, current: &str) -> Option<String> {
    let default = NaiveDate::parse_from_str(current, "%Y-%m-%d").unwrap_or_else(|_| Local::now().date_naive());
    DateSelect::new(&format!("{label}:"))
        .with_default(default)
        .prompt()
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn first_line(value: &str) -> &str {
    value.lines().next().unwrap_or_default()
}

fn add_items(editor: &mut CliEditor, description: Option<String>, quantity: f64, price: f64) {
    let entries = match description {
        Some(description) => vec![(description, quantity.to_string(), price.to_string())],
        None => enter_items(),
    };
    if entries.is_empty() {
        println!("❌ No items entered.");
        return;
    }

    for (description, quantity, price) in entries {
        // Fill the blank default row before adding new ones.
        let rows = editor.form().item_rows();
        let last_is_blank = rows > 0 && editor.form().read_item(rows - 1, ItemField::Description).trim().is_empty();
        let row = if last_is_blank {
            rows - 1
        } else {
            editor.add_item_row();
            editor.form().item_rows() - 1
        };

        let form = editor.form_mut();
        form.write_item(row, ItemField::Description, &description);
        form.write_item(row, ItemField::Quantity, &quantity);
        form.write_item(row, ItemField::UnitPrice, &price);
        editor.field_changed(EditOrigin::User);
    }
    print_items(editor);
}

fn enter_items() -> Vec<(String, String, String)> {
    let mut items = Vec::new();
    println!("\n--- Enter Invoice Items ---");
    println!("(Leave Description empty to finish)");

    loop {
        let desc = Text::new("Description (leave empty to finish):").prompt().unwrap_or_default();
        if desc.trim().is_empty() {
            break;
        }
        let quantity = Text::new("Quantity:").with_default("1").prompt().unwrap_or_else(|_| "1".into());
        let price = Text::new("Unit price:").with_default("0").prompt().unwrap_or_else(|_| "0".into());
        items.push((desc, quantity, price));
    }
    items
}

// ==========================================
// 2. Output
// ==========================================

fn print_preview(editor: &CliEditor) {
    match editor.preview().output() {
        Some(text) => println!("\n{text}"),
        None => println!("❌ Preview unavailable."),
    }
}

fn print_items(editor: &CliEditor) {
    let form = editor.form();
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Description"),
        Cell::new("Qty"),
        Cell::new("Unit Price"),
        Cell::new("Total"),
    ]);
    for row in 0..form.item_rows() {
        table.add_row(vec![
            Cell::new(row + 1),
            Cell::new(form.read_item(row, ItemField::Description)),
            Cell::new(form.read_item(row, ItemField::Quantity)),
            Cell::new(form.read_item(row, ItemField::UnitPrice)),
            Cell::new(form.readout(Readout::RowTotal(row)).unwrap_or_default()),
        ]);
    }
    println!("{table}");
    print_totals(editor);
}

fn print_totals(editor: &CliEditor) {
    let form = editor.form();
    for (label, readout) in [
        ("Subtotal", Readout::Subtotal),
        ("Tax", Readout::TaxAmount),
        ("Discount", Readout::Discount),
        ("Total", Readout::Total),
        ("Balance Due", Readout::BalanceDue),
    ] {
        println!("{label:>12}: {}", form.readout(readout).unwrap_or_default());
    }
}

fn show_history(editor: &mut CliEditor) {
    let entries = editor.history().list();
    if entries.is_empty() {
        println!("(None found)");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Number"),
        Cell::new("Customer"),
        Cell::new("Date"),
        Cell::new("Total"),
    ]);
    for entry in &entries {
        let total = format_currency(entry.total, &entry.currency, &entry.data.settings.locale);
        let total_cell = if entry.total < 0.0 {
            Cell::new(total).fg(Color::Rgb { r: 185, g: 28, b: 28 })
        } else {
            Cell::new(total)
        };
        table.add_row(vec![
            Cell::new(entry.id),
            Cell::new(&entry.number).add_attribute(Attribute::Bold),
            Cell::new(&entry.customer_name),
            Cell::new(format_date(&entry.date)),
            total_cell,
        ]);
    }

    println!("\n--- Invoice History ({}) ---", entries.len());
    println!("{table}");
}

// ==========================================
// 3. Import / Export
// ==========================================

fn import_file(editor: &mut CliEditor, path: Option<PathBuf>) {
    let path = match path {
        Some(path) => path,
        None => {
            println!("📂 Opening file picker...");
            match rfd::FileDialog::new()
                .set_title("Import Invoice JSON")
                .add_filter("JSON", &["json"])
                .pick_file()
            {
                Some(path) => path,
                None => {
                    println!("Cancelled");
                    return;
                }
            }
        }
    };

    let result = read_import_file(&path, None)
        .map_err(EditorError::from)
        .and_then(|text| editor.import_json(&text));
    match result {
        Ok(doc) => {
            print_preview(editor);
            println!("✅ Imported invoice {}.", doc.invoice.number);
        }
        Err(e) => println!("❌ Import failed: {e}"),
    }
}

fn export_json(editor: &mut CliEditor, settings: &AppSettings, output: Option<PathBuf>) {
    let (filename, json) = match editor.export_json() {
        Ok(exported) => exported,
        Err(e) => {
            println!("❌ {e}");
            return;
        }
    };
    let path = output.unwrap_or_else(|| settings.output_dir().join(filename));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).ok();
    }
    match fs::write(&path, json) {
        Ok(()) => println!("✅ JSON saved: {:?}", path),
        Err(e) => println!("❌ Failed to write {:?}: {e}", path),
    }
}

fn pdf_exporter(settings: &AppSettings) -> Option<TypstExporter> {
    match TemplateRegistry::with_overrides(&settings.templates_dir()) {
        Ok(registry) => Some(TypstExporter::new(registry, settings.output_dir(), settings.filename_style)),
        Err(e) => {
            println!("❌ Template Error: {e}");
            None
        }
    }
}

/// Hands the PDF to the desktop's default app after the user agrees.
struct SystemShare;

impl ShareTarget for SystemShare {
    fn supports_files(&self) -> bool {
        cfg!(any(target_os = "macos", target_os = "windows", target_os = "linux"))
    }

    fn share(&mut self, artifact: &PdfArtifact) -> Result<ShareOutcome, ExportError> {
        let question = format!("Open {} to send it?", artifact.filename);
        match Confirm::new(&question).with_default(true).prompt() {
            Ok(true) => {
                open_and_reveal(&artifact.path);
                Ok(ShareOutcome::Shared)
            }
            Ok(false) | Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                Ok(ShareOutcome::Aborted)
            }
            Err(e) => Err(ExportError::Share(e.to_string())),
        }
    }
}

// ==========================================
// 4. Config & Utilities
// ==========================================

fn setup_config_wizard() -> Option<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = config::load_settings().ok().flatten().unwrap_or_default();

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Data Directory")
        .pick_folder();

    let data_root = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            Text::new("Enter Data Directory:").with_default(&current.data_root).prompt().ok()?
        }
    };

    let currency = Text::new("Default currency (ISO code):").with_default(&current.currency).prompt().ok()?;
    let locale = Text::new("Default locale:").with_default(&current.locale).prompt().ok()?;
    let tax_rate = Text::new("Default tax rate %:")
        .with_default(&current.tax_rate.to_string())
        .prompt()
        .ok()?
        .trim()
        .parse()
        .unwrap_or(current.tax_rate);

    println!("\n--- Seller Details (prefilled on new drafts) ---");
    let mut seller = current.seller.clone();
    seller.name = Text::new("Seller name:").with_default(&seller.name).prompt().ok()?;
    seller.address = Text::new("Seller address:").with_default(&seller.address).prompt().ok()?;
    seller.email = Text::new("Seller email:").with_default(&seller.email).prompt().ok()?;
    seller.phone = Text::new("Seller phone:").with_default(&seller.phone).prompt().ok()?;

    let settings = AppSettings { data_root, currency, locale, tax_rate, seller, ..current };
    match config::save_settings(&settings) {
        Ok(()) => println!("✅ Settings saved."),
        Err(e) => println!("❌ {e}"),
    }
    Some(settings)
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    if let Some(parent) = path.parent() {
        Command::new("xdg-open").arg(parent).spawn().ok();
    }

    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
