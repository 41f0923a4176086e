//! Invoice drafting core: a single invoice document kept in sync between an
//! editable form, a rendered preview, a persisted draft and a bounded
//! history of generated bills.

pub mod config;
pub mod draft;
pub mod editor;
pub mod error;
pub mod export;
pub mod form;
pub mod format;
pub mod history;
pub mod import;
pub mod merge;
pub mod model;
pub mod render;
pub mod store;
pub mod totals;
pub mod validate;

pub use editor::{DraftDefaults, EditOrigin, Editor, SyncOptions};
pub use model::{InvoiceDocument, LineItem};
