// Ledger module - models, SQLite store, and the import protocol

pub mod models;
pub mod service;
pub mod store;

pub use models::{
    Conflict, CreateParams, Direction, DuplicateKey, ImportOutcome, LedgerTransaction,
    ListFilter, Status,
};
pub use service::{confirm_batch, import_batch};
pub use store::{get_default_db_path, init_database, list_transactions, open_db};
